//! SunSpec model reading on top of a register transport.

mod device;
mod model;
mod point;

pub use device::{Device, ModbusDevice};
pub use model::ModelDirectory;
pub use point::{points, Point, PointKind, UNIT_PERCENTAGE, UNIT_WATTS};
