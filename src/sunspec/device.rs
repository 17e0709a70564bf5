use crate::prelude::*;
use crate::sunspec::point::RawValue;

/// A SunSpec device on top of any register transport.
///
/// The model directory is scanned lazily on the first model lookup and
/// memoised for the session; [`Device::rescan`] rebuilds it. A `Device` is
/// one logical session and is not meant to be shared between tasks.
pub struct Device<R> {
    reader: R,
    models: Option<ModelDirectory>,
}

/// A SunSpec device behind the reconnecting Modbus TCP transport.
pub type ModbusDevice = Device<Connection>;

impl ModbusDevice {
    /// Connects to a SunSpec Modbus TCP device.
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Connection::connect(addr).await?))
    }

    pub async fn connect_with(addr: impl Into<String>, config: ModbusConfig) -> Result<Self> {
        Ok(Self::new(Connection::connect_with(addr, config).await?))
    }

    /// Sets the device address (slave id) for following requests.
    pub fn set_device_address(&mut self, device_addr: u8) {
        self.reader.set_slave_id(device_addr);
    }

    /// Infers the device address from the SunSpec common model.
    ///
    /// Probes the vendor's factory default address, reads the address point
    /// and retargets the connection to the result.
    pub async fn auto_set_device_address(&mut self) -> Result<()> {
        self.set_device_address(126);

        let addr = self.get_any_point(&[points::DEVICE_ADDRESS]).await?;
        self.set_device_address(addr as u8);
        Ok(())
    }
}

impl<R: RegisterRead> Device<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            models: None,
        }
    }

    /// Gives back the underlying transport.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Drops the cached model directory and scans again.
    pub async fn rescan(&mut self) -> Result<()> {
        self.models = None;
        self.ensure_scanned().await
    }

    async fn ensure_scanned(&mut self) -> Result<()> {
        if self.models.is_none() {
            self.models = Some(ModelDirectory::scan(&mut self.reader).await?);
        }
        Ok(())
    }

    /// Base register of the given model.
    pub async fn model_address(&mut self, model: u16) -> Result<u16> {
        self.ensure_scanned().await?;
        self.models
            .as_ref()
            .and_then(|models| models.address_of(model))
            .ok_or(Error::ModelNotFound(model))
    }

    pub async fn has_model(&mut self, model: u16) -> Result<bool> {
        self.ensure_scanned().await?;
        Ok(self
            .models
            .as_ref()
            .is_some_and(|models| models.contains(model)))
    }

    /// Reads a point and converts it to its physical value.
    ///
    /// A raw value matching the per-type sentinel yields
    /// [`Error::PointNotImplemented`]. For a scaled point the register
    /// following the value holds a signed base-10 exponent and the result
    /// is `raw * 10^exponent`.
    pub async fn get_point(&mut self, point: &Point) -> Result<f64> {
        let base = self.model_address(point.model).await?;
        let address = base + point.offset;

        let raw = match point.kind {
            PointKind::U16 => RawValue::U16(self.reader.read_u16(address).await?),
            PointKind::U32 => RawValue::U32(self.reader.read_u32(address).await?),
            PointKind::U64 => RawValue::U64(self.reader.read_u64(address).await?),
            PointKind::I16 => RawValue::I16(self.reader.read_i16(address).await?),
            PointKind::I32 => RawValue::I32(self.reader.read_i32(address).await?),
            PointKind::I64 => RawValue::I64(self.reader.read_i64(address).await?),
            PointKind::F32 => RawValue::F32(self.reader.read_f32(address).await?),
            PointKind::F64 => RawValue::F64(self.reader.read_f64(address).await?),
            PointKind::Str(_) => {
                return Err(Error::PointNotNumeric {
                    model: point.model,
                    point: point.offset,
                })
            }
        };

        if raw.is_not_implemented() {
            return Err(Error::PointNotImplemented {
                model: point.model,
                point: point.offset,
            });
        }

        let value = raw.widen();
        if !point.scaled {
            return Ok(value);
        }

        let exponent = self.reader.read_u16(address + point.kind.words()).await? as i16;
        Ok(value * 10f64.powi(i32::from(exponent)))
    }

    /// Reads the first of the given points that is present and implemented
    /// on the device.
    ///
    /// A missing model or a not-implemented point advances to the next
    /// candidate; any other error aborts the probe. When every candidate is
    /// absent the returned error lists the attempted points and wraps the
    /// last failure.
    pub async fn get_any_point(&mut self, candidates: &[Point]) -> Result<f64> {
        let mut last = None;
        for point in candidates {
            match self.get_point(point).await {
                Ok(value) => return Ok(value),
                Err(err @ (Error::PointNotImplemented { .. } | Error::ModelNotFound(_))) => {
                    last = Some(err)
                }
                Err(err) => return Err(err),
            }
        }

        let attempted = candidates
            .iter()
            .map(|point| point.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::NoImplementedPoint {
            attempted,
            source: last.map(Box::new),
        })
    }

    /// Returns the first of the given points whose model is present in the
    /// directory, if any.
    pub async fn has_any_point(&mut self, candidates: &[Point]) -> Result<Option<Point>> {
        for point in candidates {
            if self.has_model(point.model).await? {
                return Ok(Some(*point));
            }
        }
        Ok(None)
    }

    /// Reads a string point such as the nameplate fields of the common
    /// model.
    pub async fn get_point_string(&mut self, point: &Point) -> Result<String> {
        let PointKind::Str(words) = point.kind else {
            return Err(Error::PointTypeMismatch {
                model: point.model,
                point: point.offset,
            });
        };
        self.read_point_string(point.model, point.offset, words).await
    }

    /// Reads a fixed-width string point.
    pub async fn read_point_string(&mut self, model: u16, offset: u16, words: u16) -> Result<String> {
        let base = self.model_address(model).await?;
        self.reader.read_string(base + offset, words).await
    }
}
