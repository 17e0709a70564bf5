use crate::error::Result;

use bytes::{Buf, BufMut, BytesMut};
use std::collections::HashMap;
use thiserror::Error;

const START_IDENTIFIER: &[u8] = b"SMA";
const PROTOCOL_ID: u16 = 0x6069;

const MEAS_TYPE_COUNTER: u8 = 0x08;
const MEAS_TYPE_AVERAGE: u8 = 0x04;
const MEAS_TYPE_VERSION: u8 = 0;
const CHANNEL_INTERNAL: u8 = 0;
const CHANNEL_OTHER: u8 = 144;

/// Largest datagram the meter emits.
pub const MAX_TELEGRAM_SIZE: usize = 8192;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelegramError {
    #[error("couldn't find the start identifier in the datagram")]
    MissingStart,

    #[error("datagram ends in the middle of a field")]
    Truncated,

    #[error("expected protocol identifier 0x6069 but got {0:#06x}")]
    BadProtocolId(u16),

    #[error("unexpected measurement type: {0}")]
    UnknownMeasurementType(u8),

    #[error("unexpected channel: {0}")]
    UnknownChannel(u8),

    #[error("telegram does not contain measurement {0:?}")]
    MissingMeasurement(ObisId),
}

/// IEC 62056 identifier keying one measurement inside a telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObisId {
    pub channel: u8,
    pub meas_val: u8,
    pub meas_type: u8,
    pub tariff: u8,
}

impl ObisId {
    pub const fn new(channel: u8, meas_val: u8, meas_type: u8, tariff: u8) -> Self {
        Self {
            channel,
            meas_val,
            meas_type,
            tariff,
        }
    }
}

/// Grid import power average, in 0.1 W.
pub const GRID_IMPORT: ObisId = obis::ACTIVE_POWER_IMPORT;
/// Grid export power average, in 0.1 W.
pub const GRID_EXPORT: ObisId = obis::ACTIVE_POWER_EXPORT;

/// The measurement profile of the energy meter.
///
/// Instantaneous values carry measurement type 4 and are scaled in 0.1 W,
/// 0.1 var, 0.1 VA, mA, mV and 0.001 for the power factor. Energy counters
/// carry measurement type 8 and count in Ws.
pub mod obis {
    use super::{ObisId, MEAS_TYPE_AVERAGE, MEAS_TYPE_COUNTER};

    /// Total active power drawn from the grid, 0.1 W.
    pub const ACTIVE_POWER_IMPORT: ObisId = ObisId::new(0, 1, MEAS_TYPE_AVERAGE, 0);
    /// Total active power fed into the grid, 0.1 W.
    pub const ACTIVE_POWER_EXPORT: ObisId = ObisId::new(0, 2, MEAS_TYPE_AVERAGE, 0);
    /// Total reactive power drawn, 0.1 var.
    pub const REACTIVE_POWER_IMPORT: ObisId = ObisId::new(0, 3, MEAS_TYPE_AVERAGE, 0);
    /// Total reactive power fed in, 0.1 var.
    pub const REACTIVE_POWER_EXPORT: ObisId = ObisId::new(0, 4, MEAS_TYPE_AVERAGE, 0);
    /// Total apparent power drawn, 0.1 VA.
    pub const APPARENT_POWER_IMPORT: ObisId = ObisId::new(0, 9, MEAS_TYPE_AVERAGE, 0);
    /// Total apparent power fed in, 0.1 VA.
    pub const APPARENT_POWER_EXPORT: ObisId = ObisId::new(0, 10, MEAS_TYPE_AVERAGE, 0);
    /// Displacement power factor, 0.001.
    pub const POWER_FACTOR: ObisId = ObisId::new(0, 13, MEAS_TYPE_AVERAGE, 0);

    /// Active energy drawn from the grid, Ws.
    pub const ACTIVE_ENERGY_IMPORT: ObisId = ObisId::new(0, 1, MEAS_TYPE_COUNTER, 0);
    /// Active energy fed into the grid, Ws.
    pub const ACTIVE_ENERGY_EXPORT: ObisId = ObisId::new(0, 2, MEAS_TYPE_COUNTER, 0);

    /// Phase current, mA.
    pub const CURRENT_L1: ObisId = ObisId::new(0, 31, MEAS_TYPE_AVERAGE, 0);
    /// Phase voltage, mV.
    pub const VOLTAGE_L1: ObisId = ObisId::new(0, 32, MEAS_TYPE_AVERAGE, 0);
    /// Phase power factor, 0.001.
    pub const POWER_FACTOR_L1: ObisId = ObisId::new(0, 33, MEAS_TYPE_AVERAGE, 0);

    /// Shifts a total or L1 measurement to the given phase (1 to 3); each
    /// phase block is offset by 20 measurement ids.
    pub const fn on_phase(id: ObisId, phase: u8) -> ObisId {
        ObisId::new(
            id.channel,
            (id.meas_val % 20) + 20 * phase,
            id.meas_type,
            id.tariff,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoftwareVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub revision: u8,
}

/// One measurement snapshot broadcast by the energy meter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Telegram {
    pub susy_id: u16,
    pub serial_no: u32,
    /// Milliseconds since device reset.
    pub measuring_time: u32,
    pub obis: HashMap<ObisId, u64>,
    pub software_version: SoftwareVersion,
}

impl Telegram {
    /// Decodes one datagram. All fields are big-endian.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self::decode_inner(data)?)
    }

    fn decode_inner(data: &[u8]) -> std::result::Result<Self, TelegramError> {
        let start = data
            .windows(START_IDENTIFIER.len())
            .position(|window| window == START_IDENTIFIER)
            .ok_or(TelegramError::MissingStart)?;

        let mut buf = &data[start..];
        if buf.remaining() < 16 + 2 + 2 + 4 + 4 {
            return Err(TelegramError::Truncated);
        }
        buf.advance(16);

        let id = buf.get_u16();
        if id != PROTOCOL_ID {
            return Err(TelegramError::BadProtocolId(id));
        }

        let mut telegram = Telegram {
            susy_id: buf.get_u16(),
            serial_no: buf.get_u32(),
            measuring_time: buf.get_u32(),
            ..Telegram::default()
        };

        // 4 trailing bytes are the end marker, anything longer starts
        // another record
        while buf.remaining() > 4 {
            let obis = ObisId::new(buf.get_u8(), buf.get_u8(), buf.get_u8(), buf.get_u8());

            match obis.channel {
                CHANNEL_INTERNAL => match obis.meas_type {
                    MEAS_TYPE_COUNTER => {
                        if buf.remaining() < 8 {
                            return Err(TelegramError::Truncated);
                        }
                        telegram.obis.insert(obis, buf.get_u64());
                    }
                    MEAS_TYPE_AVERAGE => {
                        if buf.remaining() < 4 {
                            return Err(TelegramError::Truncated);
                        }
                        telegram.obis.insert(obis, u64::from(buf.get_u32()));
                    }
                    other => return Err(TelegramError::UnknownMeasurementType(other)),
                },
                CHANNEL_OTHER => {
                    if obis.meas_type == MEAS_TYPE_VERSION {
                        if buf.remaining() < 4 {
                            return Err(TelegramError::Truncated);
                        }
                        telegram.software_version = SoftwareVersion {
                            major: buf.get_u8(),
                            minor: buf.get_u8(),
                            build: buf.get_u8(),
                            revision: buf.get_u8(),
                        };
                    }
                }
                other => return Err(TelegramError::UnknownChannel(other)),
            }
        }

        Ok(telegram)
    }

    /// Looks up one measurement.
    pub fn value(&self, id: ObisId) -> Option<u64> {
        self.obis.get(&id).copied()
    }

    /// Signed grid power in W, negative when exporting to the utility.
    pub fn grid_watts(&self) -> Option<i32> {
        let import = self.value(GRID_IMPORT)?;
        let export = self.value(GRID_EXPORT)?;
        Some(((import as i64 - export as i64) / 10) as i32)
    }

    /// Serialises the telegram in the canonical on-wire layout: preamble,
    /// measurement records ordered by OBIS id, the software version record
    /// and the end marker.
    pub fn encode(&self) -> Vec<u8> {
        let mut records: Vec<_> = self.obis.iter().collect();
        records.sort_by_key(|&(id, _)| *id);

        let record_len: usize = records
            .iter()
            .map(|(id, _)| if id.meas_type == MEAS_TYPE_COUNTER { 12 } else { 8 })
            .sum();
        // protocol id through the last record, end marker excluded
        let data_len = 2 + 2 + 4 + 4 + record_len + 8;

        let mut buf = BytesMut::with_capacity(20 + data_len);
        buf.put_slice(b"SMA\0");
        buf.put_slice(&[0x00, 0x04, 0x02, 0xa0, 0x00, 0x00, 0x00, 0x01]);
        buf.put_u16(data_len as u16);
        buf.put_slice(&[0x00, 0x10]);
        buf.put_u16(PROTOCOL_ID);

        buf.put_u16(self.susy_id);
        buf.put_u32(self.serial_no);
        buf.put_u32(self.measuring_time);

        for (id, value) in records {
            buf.put_slice(&[id.channel, id.meas_val, id.meas_type, id.tariff]);
            if id.meas_type == MEAS_TYPE_COUNTER {
                buf.put_u64(*value);
            } else {
                buf.put_u32(*value as u32);
            }
        }

        let version = self.software_version;
        buf.put_slice(&[CHANNEL_OTHER, 0, MEAS_TYPE_VERSION, 0]);
        buf.put_slice(&[version.major, version.minor, version.build, version.revision]);
        buf.put_u32(0);

        buf.to_vec()
    }
}
