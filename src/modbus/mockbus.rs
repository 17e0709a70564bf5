use crate::prelude::*;

use async_trait::async_trait;

/// Values that can be laid out into big-endian holding registers.
pub trait RegisterEncode {
    fn register_bytes(&self) -> Vec<u8>;
}

macro_rules! impl_register_encode {
    ($($t:ty),*) => {$(
        impl RegisterEncode for $t {
            fn register_bytes(&self) -> Vec<u8> {
                self.to_be_bytes().to_vec()
            }
        }
    )*};
}

impl_register_encode!(u16, u32, u64, i16, i32, i64, f32, f64);

impl RegisterEncode for &str {
    fn register_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl RegisterEncode for &[u16] {
    fn register_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len() * 2);
        for word in self.iter() {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        bytes
    }
}

/// An in-memory register bank standing in for a Modbus device in tests.
pub struct Mockbus {
    holding_registers: Vec<u8>,
}

impl Mockbus {
    /// Creates a bank with the given number of 16-bit registers, addressed
    /// from 0.
    pub fn new(registers: usize) -> Self {
        Self {
            holding_registers: vec![0; registers * 2],
        }
    }

    /// Serialises `value` big-endian at register `addr`.
    ///
    /// Fails when any byte in the target range is already non-zero, which
    /// catches overlapping entries in a test setup. A previously written
    /// literal zero is indistinguishable from an unwritten register, so
    /// tests use non-zero sentinels.
    pub fn add_entry<V: RegisterEncode>(&mut self, addr: u16, value: V) -> Result<()> {
        let bytes = value.register_bytes();
        if bytes.len() % 2 != 0 {
            return Err(Error::MockOddLength);
        }

        let start = addr as usize * 2;
        let end = start + bytes.len();
        if end > self.holding_registers.len() {
            return Err(Error::RegisterOutOfRange {
                address: addr,
                quantity: (bytes.len() / 2) as u16,
            });
        }

        for (i, byte) in self.holding_registers[start..end].iter().enumerate() {
            if *byte != 0 {
                return Err(Error::MockOverlap { byte: start + i });
            }
        }

        self.holding_registers[start..end].copy_from_slice(&bytes);
        Ok(())
    }
}

#[async_trait]
impl RegisterRead for Mockbus {
    async fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        let start = address as usize * 2;
        let end = start + quantity as usize * 2;
        if end > self.holding_registers.len() {
            return Err(Error::RegisterOutOfRange { address, quantity });
        }

        Ok(self.holding_registers[start..end]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }
}
