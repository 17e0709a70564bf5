use thiserror::Error;

pub use crate::meter::TelegramError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("modbus: {0}")]
    Modbus(#[from] tokio_modbus::Error),

    #[error(transparent)]
    Exception(#[from] tokio_modbus::ExceptionCode),

    /// The transport was closed while a read or reconnect was pending.
    #[error("transport is closed")]
    Closed,

    #[error("device does not expose a SunSpec identifier at any known base address")]
    NotSunSpec,

    #[error("the scanned models do not contain model {0}")]
    ModelNotFound(u16),

    /// The raw register value matched the per-type "not implemented"
    /// sentinel. Callers probing several points may swallow this.
    #[error("point {point} in model {model} is not implemented")]
    PointNotImplemented { model: u16, point: u16 },

    #[error("none of the probed points are present: [{attempted}]")]
    NoImplementedPoint {
        attempted: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// A numeric read hit a string-typed point.
    #[error("point {point} in model {model} is not numeric")]
    PointNotNumeric { model: u16, point: u16 },

    /// A string read hit a numeric point.
    #[error("point {point} in model {model} has a different type")]
    PointTypeMismatch { model: u16, point: u16 },

    #[error("short response for register {address}: wanted {expected} registers, got {actual}")]
    ShortResponse {
        address: u16,
        expected: u16,
        actual: usize,
    },

    #[error("telegram: {0}")]
    Telegram(#[from] TelegramError),

    #[error("config: {0}")]
    Config(String),

    #[error("adding this entry would override data at byte {byte}")]
    MockOverlap { byte: usize },

    #[error("invalid data length, bytes must be a multiple of two")]
    MockOddLength,

    #[error("register range {address}+{quantity} does not exist")]
    RegisterOutOfRange { address: u16, quantity: u16 },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// True for a bare "not implemented" point as well as for an exhausted
    /// probe over several points.
    pub fn is_not_implemented(&self) -> bool {
        matches!(
            self,
            Error::PointNotImplemented { .. } | Error::NoImplementedPoint { .. }
        )
    }
}
