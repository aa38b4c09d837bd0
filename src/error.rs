use core::fmt;

use derive_more::{Display, Error};

use crate::bd2802::PatternError;
use crate::config::FadeParam;
use crate::ld::LdError;

/// Errors reported synchronously by the fade engine and its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum FadeError {
    /// A tuning parameter outside of its validated bounds
    #[display("{param} = {value} not in range [{min}, {max}]")]
    ConfigOutOfRange {
        param: FadeParam,
        value: u32,
        min: u32,
        max: u32,
    },
    /// A requested brightness above the channel maximum
    #[display("brightness {value} exceeds maximum {max}")]
    BrightnessOutOfRange { value: u8, max: u8 },
    /// Text input that is not a value of the parameter's type
    #[display("invalid value for {param}")]
    InvalidValue { param: FadeParam },
    /// Text input naming no known parameter
    #[display("unknown fade parameter")]
    UnknownParam,
}

/// Errors of the device layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError<E> {
    /// Register access failed
    Bus(E),
    /// Invalid fade request or configuration
    Fade(FadeError),
    /// Level computation left the log table
    Ld(LdError),
    /// Malformed LED pattern
    Pattern(PatternError),
    /// Argument outside of what the device accepts
    OutOfRange {
        what: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    /// Request refused in the current mode
    WrongMode,
}

impl<E: fmt::Debug> fmt::Display for DeviceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "register access failed: {err:?}"),
            Self::Fade(err) => write!(f, "{err}"),
            Self::Ld(err) => write!(f, "{err}"),
            Self::Pattern(err) => write!(f, "{err}"),
            Self::OutOfRange {
                what,
                value,
                min,
                max,
            } => write!(f, "{what} = {value} not in range [{min}, {max}]"),
            Self::WrongMode => f.write_str("not allowed in the current mode"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for DeviceError<E> {}

impl<E> From<FadeError> for DeviceError<E> {
    fn from(err: FadeError) -> Self {
        Self::Fade(err)
    }
}

impl<E> From<LdError> for DeviceError<E> {
    fn from(err: LdError) -> Self {
        Self::Ld(err)
    }
}

impl<E> From<PatternError> for DeviceError<E> {
    fn from(err: PatternError) -> Self {
        Self::Pattern(err)
    }
}
