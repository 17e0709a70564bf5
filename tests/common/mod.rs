#![allow(dead_code)]

use sma_energy::prelude::*;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Installs a logger for tests run with `RUST_LOG` set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A frame captured from a real energy meter, as used by the device with
/// software version 2.0.16.R.
pub const SAMPLE_TELEGRAM_HEX: &str = concat!(
    "534d4100000402a000000001024400106069015d71551764e5bdd84c0001040000000bf70001080000000002f8910910000204000",
    "0000000000208000000000dcdc5c87800030400000000000003080000000001f123bc00000404000000014e00040800000000016a2919e",
    "80009040000000c09000908000000000397ab5348000a040000000000000a08000000000e84ed5c50000d0400000003e20015040000001",
    "0a90015080000000005378ef3c800160400000000000016080000000003c80e74480017040000000000001708000000000105d38438001",
    "80400000001150018080000000000e27d9960001d0400000010b2001d08000000000578325168001e040000000000001e0800000000042",
    "7f938c0001f0400000008a50020040000038e1200210400000003e600290400000000000029080000000000d60cdf10002a0400000004e",
    "6002a080000000009ce538888002b040000000005002b080000000000aac925c0002c040000000000002c08000000000031f7dab000310",
    "400000000000031080000000000ec5dc47800320400000004e60032080000000009dd81cc70003304000000023c0034040000038fc2003",
    "50400000003e8003d040000000034003d0800000000013ddc2538003e040000000000003e0800000000048a4abc10003f0400000000000",
    "03f0800000000005def5bc0004004000000003d0040080000000000731be2e80045040000000050004508000000000181b137d00046040",
    "000000000004608000000000494ea5428004704000000002300480400000391f80049040000000286900000000200105200000000",
);

pub fn sample_telegram_bytes() -> Vec<u8> {
    hex::decode(SAMPLE_TELEGRAM_HEX).expect("sample frame is valid hex")
}

/// Average (instantaneous) OBIS measurement ids the meter profile defines.
pub const OBIS_MEAS_VAL_AVERAGE: [u8; 34] = [
    1, 2, 3, 4, 9, 10, 13, 21, 22, 23, 24, 29, 30, 31, 32, 33, 41, 42, 43, 44, 49, 50, 51, 52,
    53, 61, 62, 63, 64, 69, 70, 71, 72, 73,
];

/// Counter (energy) OBIS measurement ids the meter profile defines.
pub const OBIS_MEAS_VAL_COUNTER: [u8; 24] = [
    1, 2, 3, 4, 9, 10, 21, 22, 23, 24, 29, 30, 41, 42, 43, 44, 49, 50, 61, 62, 63, 64, 69, 70,
];

/// Builds a register bank mirroring a small SunSpec device: identifier at
/// 40000, common model 1 (length 66), models 11 and 12, terminator.
pub fn sunspec_mockbus() -> Mockbus {
    let mut bus = Mockbus::new(41_000);
    bus.add_entry(40_000, 0x5375_6e53_u32).unwrap();
    bus.add_entry(40_002, 1_u16).unwrap();
    bus.add_entry(40_003, 66_u16).unwrap();
    bus.add_entry(40_070, 11_u16).unwrap();
    bus.add_entry(40_071, 13_u16).unwrap();
    bus.add_entry(40_085, 12_u16).unwrap();
    bus.add_entry(40_086, 98_u16).unwrap();
    bus.add_entry(40_185, 0xffff_u16).unwrap();
    bus
}

/// Serves ReadHoldingRegisters requests with every register set to `value`.
/// Handles any number of connections and requests.
pub fn spawn_modbus_server(listener: TcpListener, value: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(serve(stream, value, usize::MAX));
        }
    })
}

/// Like `spawn_modbus_server`, but drops every connection after a single
/// response to simulate a flaky carrier.
pub fn spawn_flaky_modbus_server(listener: TcpListener, value: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(serve(stream, value, 1));
        }
    })
}

async fn serve(mut stream: TcpStream, value: u16, mut requests: usize) {
    // MBAP header + function code 3 request is always 12 bytes
    let mut request = [0u8; 12];
    while requests > 0 {
        if stream.read_exact(&mut request).await.is_err() {
            return;
        }

        let unit = request[6];
        let function = request[7];
        let quantity = u16::from_be_bytes([request[10], request[11]]);

        let mut response = Vec::with_capacity(9 + quantity as usize * 2);
        response.extend_from_slice(&request[0..2]);
        response.extend_from_slice(&[0, 0]);
        response.extend_from_slice(&(3 + quantity * 2).to_be_bytes());
        response.push(unit);
        response.push(function);
        response.push((quantity * 2) as u8);
        for _ in 0..quantity {
            response.extend_from_slice(&value.to_be_bytes());
        }

        if stream.write_all(&response).await.is_err() {
            return;
        }
        requests -= 1;
    }
}
