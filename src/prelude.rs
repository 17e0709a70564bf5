pub use crate::config::{Config, InverterConfig, MeterConfig, ModbusConfig};
pub use crate::discovery::{discover_from_config, discover_inverters};
pub use crate::error::{Error, Result, TelegramError};
pub use crate::meter::{EnergyMeter, ObisId, SoftwareVersion, Telegram};
pub use crate::modbus::{CancellationToken, Connection, Mockbus, RegisterRead};
pub use crate::plant::{BatteryReader, MeterReader, Plant, PlantSummary, PowerReader};
pub use crate::readers::{SpeedwireMeter, SunSpecBatteryReader, SunSpecPowerReader};
pub use crate::sunspec::{points, Device, ModbusDevice, ModelDirectory, Point, PointKind};

pub use log::{debug, error, info, trace, warn};
