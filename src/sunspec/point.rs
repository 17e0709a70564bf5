use std::fmt;

pub const UNIT_WATTS: &str = "W";
pub const UNIT_PERCENTAGE: &str = "%";

/// Width and interpretation of the registers backing a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    U16,
    U32,
    U64,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Fixed-width string spanning the given number of registers.
    Str(u16),
}

impl PointKind {
    /// Number of 16-bit registers a value of this kind occupies.
    pub fn words(self) -> u16 {
        match self {
            PointKind::U16 | PointKind::I16 => 1,
            PointKind::U32 | PointKind::I32 | PointKind::F32 => 2,
            PointKind::U64 | PointKind::I64 | PointKind::F64 => 4,
            PointKind::Str(words) => words,
        }
    }
}

/// A pointer to a data point inside a SunSpec model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub model: u16,
    /// Register offset relative to the model base.
    pub offset: u16,
    pub kind: PointKind,
    /// When set, the register following the value holds a signed base-10
    /// scale factor.
    pub scaled: bool,
    pub unit: Option<&'static str>,
}

impl Point {
    pub const fn new(model: u16, offset: u16, kind: PointKind) -> Self {
        Self {
            model,
            offset,
            kind,
            scaled: false,
            unit: None,
        }
    }

    pub const fn scaled(mut self) -> Self {
        self.scaled = true;
        self
    }

    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Point{{model:{},offset:{},scaled:{},unit:{}}}",
            self.model,
            self.offset,
            self.scaled,
            self.unit.unwrap_or("-")
        )
    }
}

/// Raw register value of a numeric point before widening to `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RawValue {
    U16(u16),
    U32(u32),
    U64(u64),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl RawValue {
    /// SunSpec marks absent points with a per-type sentinel: all ones for
    /// unsigned, the minimum for signed, NaN for floats. The comparison
    /// happens on the raw type, never on the widened value.
    pub(crate) fn is_not_implemented(self) -> bool {
        match self {
            RawValue::U16(v) => v == u16::MAX,
            RawValue::U32(v) => v == u32::MAX,
            RawValue::U64(v) => v == u64::MAX,
            RawValue::I16(v) => v == i16::MIN,
            RawValue::I32(v) => v == i32::MIN,
            RawValue::I64(v) => v == i64::MIN,
            RawValue::F32(v) => v.is_nan(),
            RawValue::F64(v) => v.is_nan(),
        }
    }

    pub(crate) fn widen(self) -> f64 {
        match self {
            RawValue::U16(v) => f64::from(v),
            RawValue::U32(v) => f64::from(v),
            RawValue::U64(v) => v as f64,
            RawValue::I16(v) => f64::from(v),
            RawValue::I32(v) => f64::from(v),
            RawValue::I64(v) => v as f64,
            RawValue::F32(v) => f64::from(v),
            RawValue::F64(v) => v,
        }
    }
}

/// Points shared by the vendor's SunSpec devices.
///
/// The inverter points exist once per phase variant of the model (101
/// single phase, 102 split phase, 103 three phase) at the same offset;
/// the `*_ANY_PHASE` arrays are probe lists for plants of unknown phase
/// count. Only points whose scale factor register sits directly behind
/// the value are listed as scaled.
pub mod points {
    use super::{Point, PointKind, UNIT_PERCENTAGE, UNIT_WATTS};

    /// Battery state of charge in percent (battery storage model).
    pub const SOC: Point = Point::new(124, 8, PointKind::U16).unit(UNIT_PERCENTAGE);

    /// Instantaneous AC power of a single phase inverter.
    pub const POWER_1PH: Point = Point::new(101, 14, PointKind::I16).scaled().unit(UNIT_WATTS);
    /// Instantaneous AC power of a split phase inverter.
    pub const POWER_2PH: Point = Point::new(102, 14, PointKind::I16).scaled().unit(UNIT_WATTS);
    /// Instantaneous AC power of a three phase inverter.
    pub const POWER_3PH: Point = Point::new(103, 14, PointKind::I16).scaled().unit(UNIT_WATTS);

    /// Grid frequency.
    pub const FREQUENCY_1PH: Point = Point::new(101, 16, PointKind::U16).scaled().unit("Hz");
    pub const FREQUENCY_2PH: Point = Point::new(102, 16, PointKind::U16).scaled().unit("Hz");
    pub const FREQUENCY_3PH: Point = Point::new(103, 16, PointKind::U16).scaled().unit("Hz");

    /// AC energy produced over the device lifetime.
    pub const ENERGY_1PH: Point = Point::new(101, 24, PointKind::U32).scaled().unit("Wh");
    pub const ENERGY_2PH: Point = Point::new(102, 24, PointKind::U32).scaled().unit("Wh");
    pub const ENERGY_3PH: Point = Point::new(103, 24, PointKind::U32).scaled().unit("Wh");

    /// Instantaneous DC power at the inverter input.
    pub const DC_POWER_1PH: Point = Point::new(101, 31, PointKind::I16).scaled().unit(UNIT_WATTS);
    pub const DC_POWER_2PH: Point = Point::new(102, 31, PointKind::I16).scaled().unit(UNIT_WATTS);
    pub const DC_POWER_3PH: Point = Point::new(103, 31, PointKind::I16).scaled().unit(UNIT_WATTS);

    /// Modbus device address stored in the common model.
    pub const DEVICE_ADDRESS: Point = Point::new(1, 66, PointKind::U16);

    /// Nameplate fields of the common model, read with
    /// `Device::get_point_string`.
    pub const MANUFACTURER: Point = Point::new(1, 2, PointKind::Str(16));
    pub const MODEL: Point = Point::new(1, 18, PointKind::Str(16));
    pub const VERSION: Point = Point::new(1, 42, PointKind::Str(8));
    pub const SERIAL_NUMBER: Point = Point::new(1, 50, PointKind::Str(16));

    pub const POWER_ANY_PHASE: [Point; 3] = [POWER_1PH, POWER_2PH, POWER_3PH];
    pub const FREQUENCY_ANY_PHASE: [Point; 3] = [FREQUENCY_1PH, FREQUENCY_2PH, FREQUENCY_3PH];
    pub const ENERGY_ANY_PHASE: [Point; 3] = [ENERGY_1PH, ENERGY_2PH, ENERGY_3PH];
    pub const DC_POWER_ANY_PHASE: [Point; 3] = [DC_POWER_1PH, DC_POWER_2PH, DC_POWER_3PH];
}
