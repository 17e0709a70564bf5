//! Adapters wiring the SunSpec and Speedwire layers to the plant readers.

use crate::meter::GRID_IMPORT;
use crate::prelude::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Reads plant power from a SunSpec inverter.
///
/// The probe list covers the unknown phase count of the plant; the first
/// implemented point wins. Negative instantaneous power clamps to zero.
pub struct SunSpecPowerReader {
    device: Arc<Mutex<ModbusDevice>>,
    probes: Vec<Point>,
}

impl SunSpecPowerReader {
    pub fn new(device: ModbusDevice) -> Self {
        Self::with_probes(device, points::POWER_ANY_PHASE.to_vec())
    }

    pub fn with_probes(device: ModbusDevice, probes: Vec<Point>) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            probes,
        }
    }
}

#[async_trait]
impl PowerReader for SunSpecPowerReader {
    async fn read_power(&self) -> Result<u32> {
        let watts = self.device.lock().await.get_any_point(&self.probes).await?;
        Ok(watts.max(0.0) as u32)
    }
}

/// Reads battery power and state of charge from a SunSpec battery inverter.
pub struct SunSpecBatteryReader {
    device: Arc<Mutex<ModbusDevice>>,
    probes: Vec<Point>,
}

impl SunSpecBatteryReader {
    pub fn new(device: ModbusDevice) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            probes: points::POWER_ANY_PHASE.to_vec(),
        }
    }
}

#[async_trait]
impl PowerReader for SunSpecBatteryReader {
    async fn read_power(&self) -> Result<u32> {
        let watts = self.device.lock().await.get_any_point(&self.probes).await?;
        Ok(watts.max(0.0) as u32)
    }
}

#[async_trait]
impl BatteryReader for SunSpecBatteryReader {
    async fn read_soc(&self) -> Result<u8> {
        let soc = self.device.lock().await.get_point(&points::SOC).await?;
        Ok(soc as u8)
    }
}

/// Reads grid power from the energy meter broadcasts.
pub struct SpeedwireMeter {
    meter: EnergyMeter,
}

impl SpeedwireMeter {
    pub fn new(meter: EnergyMeter) -> Self {
        Self { meter }
    }
}

#[async_trait]
impl MeterReader for SpeedwireMeter {
    async fn read_grid(&self) -> Result<i32> {
        let telegram = self.meter.read_telegram().await?;
        telegram
            .grid_watts()
            .ok_or(Error::Telegram(TelegramError::MissingMeasurement(
                GRID_IMPORT,
            )))
    }
}

impl Plant {
    /// Builds a plant from configuration: one power reader per PV inverter,
    /// the battery inverter and the meter listener.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut pv: Vec<Arc<dyn PowerReader>> = Vec::with_capacity(config.inverters.len());
        for inverter in &config.inverters {
            pv.push(Arc::new(SunSpecPowerReader::new(
                connect_inverter(inverter, config).await?,
            )));
        }

        let battery = config
            .battery
            .as_ref()
            .ok_or_else(|| Error::Config("a battery inverter is required".to_string()))?;
        let bat = Arc::new(SunSpecBatteryReader::new(
            connect_inverter(battery, config).await?,
        ));

        let meter = EnergyMeter::listen_on(config.meter.interface()).await?;

        Ok(Plant {
            pv,
            bat,
            meter: Arc::new(SpeedwireMeter::new(meter)),
        })
    }
}

async fn connect_inverter(inverter: &InverterConfig, config: &Config) -> Result<ModbusDevice> {
    let mut device = ModbusDevice::connect_with(inverter.addr(), config.modbus.clone()).await?;
    match inverter.slave_id {
        Some(id) => device.set_device_address(id),
        None => device.auto_set_device_address().await?,
    }
    Ok(device)
}
