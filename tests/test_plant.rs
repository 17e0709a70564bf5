mod common;

use sma_energy::plant::fetch_sum;
use sma_energy::prelude::*;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct DummyReader {
    power: u32,
    soc: u8,
    fail: bool,
    power_polls: AtomicUsize,
    soc_polls: AtomicUsize,
}

impl DummyReader {
    fn with_power(power: u32) -> Arc<Self> {
        Arc::new(Self {
            power,
            ..Self::default()
        })
    }
}

#[async_trait]
impl PowerReader for DummyReader {
    async fn read_power(&self) -> Result<u32> {
        self.power_polls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Closed);
        }
        Ok(self.power)
    }
}

#[async_trait]
impl BatteryReader for DummyReader {
    async fn read_soc(&self) -> Result<u8> {
        self.soc_polls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Closed);
        }
        Ok(self.soc)
    }
}

struct DummyMeter {
    grid: i32,
    fail: bool,
}

#[async_trait]
impl MeterReader for DummyMeter {
    async fn read_grid(&self) -> Result<i32> {
        if self.fail {
            return Err(Error::Closed);
        }
        Ok(self.grid)
    }
}

/// A reader that parks until aborted.
struct StuckReader;

#[async_trait]
impl PowerReader for StuckReader {
    async fn read_power(&self) -> Result<u32> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(0)
    }
}

#[tokio::test]
async fn fetch_sum_adds_every_reader() {
    let readers: Vec<Arc<dyn PowerReader>> = vec![
        DummyReader::with_power(100),
        DummyReader::with_power(200),
        DummyReader::with_power(300),
    ];

    assert_eq!(fetch_sum(&readers).await.unwrap(), 600);
}

#[tokio::test]
async fn fetch_sum_fails_on_the_first_error() {
    let failing = Arc::new(DummyReader {
        fail: true,
        ..DummyReader::default()
    });
    let readers: Vec<Arc<dyn PowerReader>> =
        vec![failing, DummyReader::with_power(200), Arc::new(StuckReader)];

    let err = tokio::time::timeout(Duration::from_secs(5), fetch_sum(&readers))
        .await
        .expect("the failing reader must abort the stuck sibling")
        .unwrap_err();
    assert!(matches!(err, Error::Closed));
}

#[tokio::test]
async fn fetch_sum_leaves_no_worker_behind_on_error() {
    let failing = Arc::new(DummyReader {
        fail: true,
        ..DummyReader::default()
    });
    let stuck: Arc<dyn PowerReader> = Arc::new(StuckReader);
    let readers: Vec<Arc<dyn PowerReader>> = vec![failing, Arc::clone(&stuck)];

    fetch_sum(&readers).await.unwrap_err();
    drop(readers);

    // the aborted worker dropped its handle by the time fetch_sum returned
    assert_eq!(Arc::strong_count(&stuck), 1);
}

fn sample_plant(bat: Arc<DummyReader>, meter_fail: bool) -> Plant {
    Plant {
        pv: vec![
            DummyReader::with_power(100),
            DummyReader::with_power(200),
            DummyReader::with_power(300),
        ],
        bat,
        meter: Arc::new(DummyMeter {
            grid: -500,
            fail: meter_fail,
        }),
    }
}

#[tokio::test]
async fn summary_combines_all_readers() {
    let bat = Arc::new(DummyReader {
        power: 200,
        soc: 60,
        ..DummyReader::default()
    });
    let plant = sample_plant(Arc::clone(&bat), false);

    let summary = plant.fetch_summary().await.unwrap();

    assert_eq!(
        summary,
        PlantSummary {
            grid: -500,
            pv: 600,
            bat: 200,
            self_consumption: 300,
            bat_percentage: 60,
        }
    );

    // each battery operation ran exactly once
    assert_eq!(bat.power_polls.load(Ordering::SeqCst), 1);
    assert_eq!(bat.soc_polls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn summary_reads_the_meter_before_fanning_out() {
    let bat = Arc::new(DummyReader::default());
    let plant = sample_plant(Arc::clone(&bat), true);

    plant.fetch_summary().await.unwrap_err();

    // the meter failed first, the sunspec readers were never polled
    assert_eq!(bat.power_polls.load(Ordering::SeqCst), 0);
    assert_eq!(bat.soc_polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn summary_fails_fast_when_the_battery_fails() {
    let bat = Arc::new(DummyReader {
        fail: true,
        ..DummyReader::default()
    });
    let plant = sample_plant(bat, false);

    let err = tokio::time::timeout(Duration::from_secs(5), plant.fetch_summary())
        .await
        .expect("battery failure must abort the summary")
        .unwrap_err();
    assert!(matches!(err, Error::Closed));
}
