#![no_std]

pub mod aat2870;
pub mod bd2802;
pub mod config;
pub mod error;
pub mod fade;
pub mod ld;
pub mod request;
pub mod scheduler;

pub use config::{FadeConfig, FadeParam};
pub use error::{DeviceError, FadeError};
pub use fade::{FadeChannel, FadePhase, FadeState};
pub use ld::LdError;
pub use request::{FadeRequest, RequestChannel};
pub use scheduler::TickResult;

pub use embassy_time::{Duration, Instant};

/// Identifies a faded output towards its [`BrightnessSetter`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u8);

/// Hardware side of a fade channel
///
/// Implement this trait to drive a concrete device.
/// The fade engine is generic over this trait.
pub trait BrightnessSetter {
    type Error: core::fmt::Debug;

    /// Apply `brightness` to the output
    fn set_brightness(&mut self, channel: ChannelId, brightness: u8) -> Result<(), Self::Error>;
}

impl<F, E> BrightnessSetter for F
where
    F: FnMut(ChannelId, u8) -> Result<(), E>,
    E: core::fmt::Debug,
{
    type Error = E;

    fn set_brightness(&mut self, channel: ChannelId, brightness: u8) -> Result<(), E> {
        self(channel, brightness)
    }
}
