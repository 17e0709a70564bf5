//! Concurrent plant summary across PV inverters, battery and grid meter.

use crate::prelude::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Reads instantaneous power production in W.
#[async_trait]
pub trait PowerReader: Send + Sync {
    async fn read_power(&self) -> Result<u32>;
}

/// Reads battery power and state of charge.
#[async_trait]
pub trait BatteryReader: PowerReader {
    async fn read_soc(&self) -> Result<u8>;
}

/// Reads signed grid power in W. Negative values are export to the utility.
#[async_trait]
pub trait MeterReader: Send + Sync {
    async fn read_grid(&self) -> Result<i32>;
}

/// The readers of one plant.
pub struct Plant {
    pub pv: Vec<Arc<dyn PowerReader>>,
    pub bat: Arc<dyn BatteryReader>,
    pub meter: Arc<dyn MeterReader>,
}

/// One consistent snapshot of the plant's power flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantSummary {
    /// Grid power in W, negative when exporting.
    pub grid: i32,
    pub pv: u32,
    pub bat: u32,
    /// `pv + bat + grid`.
    pub self_consumption: i32,
    pub bat_percentage: u8,
}

enum Part {
    Pv(u32),
    BatPower(u32),
    BatSoc(u8),
}

impl Plant {
    /// Fetches a summary of all readers.
    ///
    /// The meter is read first and paces the call, since it emits one frame
    /// per second. The SunSpec readers are then polled concurrently. The
    /// first error aborts the remaining workers; no worker outlives the
    /// call on any path.
    pub async fn fetch_summary(&self) -> Result<PlantSummary> {
        let grid = self.meter.read_grid().await?;

        let mut tasks: JoinSet<Result<Part>> = JoinSet::new();

        let pv_readers = self.pv.clone();
        tasks.spawn(async move { Ok(Part::Pv(fetch_sum(&pv_readers).await?)) });

        let bat = Arc::clone(&self.bat);
        tasks.spawn(async move { Ok(Part::BatPower(bat.read_power().await?)) });

        let bat = Arc::clone(&self.bat);
        tasks.spawn(async move { Ok(Part::BatSoc(bat.read_soc().await?)) });

        let mut pv = 0;
        let mut bat_power = 0;
        let mut bat_percentage = 0;
        while let Some(joined) = tasks.join_next().await {
            match flatten(joined) {
                Ok(Part::Pv(value)) => pv = value,
                Ok(Part::BatPower(value)) => bat_power = value,
                Ok(Part::BatSoc(value)) => bat_percentage = value,
                Err(err) => {
                    tasks.shutdown().await;
                    return Err(err);
                }
            }
        }

        Ok(PlantSummary {
            grid,
            pv,
            bat: bat_power,
            self_consumption: pv as i32 + bat_power as i32 + grid,
            bat_percentage,
        })
    }
}

/// Sums the instantaneous power of all readers, one worker per reader.
///
/// The first error cancels and drains the remaining workers before
/// returning.
pub async fn fetch_sum(readers: &[Arc<dyn PowerReader>]) -> Result<u32> {
    let mut tasks = JoinSet::new();
    for reader in readers {
        let reader = Arc::clone(reader);
        tasks.spawn(async move { reader.read_power().await });
    }

    let mut sum: u32 = 0;
    while let Some(joined) = tasks.join_next().await {
        match flatten(joined) {
            Ok(power) => sum += power,
            Err(err) => {
                tasks.shutdown().await;
                return Err(err);
            }
        }
    }

    Ok(sum)
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(err.into()),
    }
}
