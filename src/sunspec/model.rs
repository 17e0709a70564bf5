use crate::prelude::*;

use std::collections::HashMap;

/// Well-known identifier ("SunS") present at one of the base addresses of a
/// SunSpec compatible device.
const SUNS_IDENTIFIER: u32 = 0x5375_6e53;

/// Base registers probed for the identifier, in order.
const SUNS_BASE_ADDRESSES: [u16; 3] = [40_000, 50_000, 0];

/// Maps SunSpec model ids to the register holding the model header.
#[derive(Debug, Clone, Default)]
pub struct ModelDirectory {
    models: HashMap<u16, u16>,
}

impl ModelDirectory {
    /// Walks the device's model chain and records the address of every
    /// model.
    ///
    /// After the identifier the chain is a sequence of (model id, length)
    /// headers, each followed by `length` payload registers; id 0xFFFF
    /// terminates it. Any read error aborts the scan.
    pub async fn scan<R: RegisterRead>(reader: &mut R) -> Result<Self> {
        let mut anchor = None;
        for address in SUNS_BASE_ADDRESSES {
            if reader.read_u32(address).await? == SUNS_IDENTIFIER {
                anchor = Some(address + 2);
                break;
            }
        }
        let Some(mut offset) = anchor else {
            return Err(Error::NotSunSpec);
        };

        let mut models = HashMap::new();
        loop {
            let model_id = reader.read_u16(offset).await?;
            if model_id == u16::MAX {
                break;
            }
            models.insert(model_id, offset);

            let length = reader.read_u16(offset + 1).await?;
            offset += length + 2;
        }

        debug!("scanned {} sunspec models", models.len());
        Ok(Self { models })
    }

    /// Register address of the given model's header.
    pub fn address_of(&self, model: u16) -> Option<u16> {
        self.models.get(&model).copied()
    }

    pub fn contains(&self, model: u16) -> bool {
        self.models.contains_key(&model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
