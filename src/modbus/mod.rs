//! Register read primitives on top of Modbus TCP.

mod connection;
mod mockbus;

pub use connection::Connection;
pub use mockbus::{Mockbus, RegisterEncode};
pub use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Reads holding registers of a Modbus device.
///
/// The typed reads interpret consecutive registers as one big-endian value;
/// a value of `n` bytes occupies `n / 2` registers.
#[async_trait]
pub trait RegisterRead: Send {
    /// Reads `quantity` holding registers starting at `address`.
    async fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>>;

    async fn read_exact(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        let words = self.read_registers(address, quantity).await?;
        if words.len() != quantity as usize {
            return Err(Error::ShortResponse {
                address,
                expected: quantity,
                actual: words.len(),
            });
        }
        Ok(words)
    }

    async fn read_u16(&mut self, address: u16) -> Result<u16> {
        let words = self.read_exact(address, 1).await?;
        Ok(words[0])
    }

    async fn read_u32(&mut self, address: u16) -> Result<u32> {
        let words = self.read_exact(address, 2).await?;
        Ok((u32::from(words[0]) << 16) | u32::from(words[1]))
    }

    async fn read_u64(&mut self, address: u16) -> Result<u64> {
        let words = self.read_exact(address, 4).await?;
        Ok((u64::from(words[0]) << 48)
            | (u64::from(words[1]) << 32)
            | (u64::from(words[2]) << 16)
            | u64::from(words[3]))
    }

    async fn read_i16(&mut self, address: u16) -> Result<i16> {
        Ok(self.read_u16(address).await? as i16)
    }

    async fn read_i32(&mut self, address: u16) -> Result<i32> {
        Ok(self.read_u32(address).await? as i32)
    }

    async fn read_i64(&mut self, address: u16) -> Result<i64> {
        Ok(self.read_u64(address).await? as i64)
    }

    async fn read_f32(&mut self, address: u16) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(address).await?))
    }

    async fn read_f64(&mut self, address: u16) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64(address).await?))
    }

    /// Reads `words` registers as a string, dropping trailing NUL padding.
    async fn read_string(&mut self, address: u16, words: u16) -> Result<String> {
        let registers = self.read_exact(address, words).await?;
        let mut bytes = Vec::with_capacity(registers.len() * 2);
        for word in registers {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
