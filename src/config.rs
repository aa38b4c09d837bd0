//! Fade tuning parameters
//!
//! Every knob has a validated setter. [`FadeParam`] names the knobs for text
//! based front ends, which hand raw input to [`FadeConfig::set_from_str`].

use core::fmt;

use embassy_time::Duration;

use crate::error::FadeError;
use crate::ld::{LD_INDEX_MAX, LD_OFFSET_DEFAULT, LD_OFFSET_MAX, LD_OFFSET_MIN};

/// Default duration of a full fade (ms)
pub const FULL_INTERVAL_DEFAULT_MS: u32 = 400;
/// Bounds of the full fade duration (ms)
pub const FULL_INTERVAL_MIN_MS: u32 = 50;
pub const FULL_INTERVAL_MAX_MS: u32 = 10_000;

/// Default minimum interval between two fade steps (ms)
pub const MIN_STEP_INTERVAL_DEFAULT_MS: u32 = 10;
/// Bounds of the minimum step interval (ms)
pub const MIN_STEP_INTERVAL_MIN_MS: u32 = 5;
pub const MIN_STEP_INTERVAL_MAX_MS: u32 = 100;

/// Default maximum brightness of a channel
pub const BRIGHTNESS_MAX_DEFAULT: u8 = 127;

const PARAM_NAME_ENABLED: &str = "enabled";
const PARAM_NAME_FULL_INTERVAL: &str = "full_ival";
const PARAM_NAME_MIN_STEP_INTERVAL: &str = "min_step_ival";
const PARAM_NAME_LD_OFFSET: &str = "ld_offset";

/// Tunable fade parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeParam {
    /// Fade at all, or jump straight to the target
    Enabled,
    /// Duration of a full fade in ms
    FullInterval,
    /// Minimum interval between fade steps in ms
    MinStepInterval,
    /// Offset added to brightness values before taking the logarithm
    LdOffset,
}

impl FadeParam {
    pub const ALL: [Self; 4] = [
        Self::Enabled,
        Self::FullInterval,
        Self::MinStepInterval,
        Self::LdOffset,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => PARAM_NAME_ENABLED,
            Self::FullInterval => PARAM_NAME_FULL_INTERVAL,
            Self::MinStepInterval => PARAM_NAME_MIN_STEP_INTERVAL,
            Self::LdOffset => PARAM_NAME_LD_OFFSET,
        }
    }

    pub fn parse_from_str(s: &str) -> Option<Self> {
        match s.trim() {
            PARAM_NAME_ENABLED => Some(Self::Enabled),
            PARAM_NAME_FULL_INTERVAL => Some(Self::FullInterval),
            PARAM_NAME_MIN_STEP_INTERVAL => Some(Self::MinStepInterval),
            PARAM_NAME_LD_OFFSET => Some(Self::LdOffset),
            _ => None,
        }
    }

    /// Static bounds of an integer parameter, `None` for booleans
    ///
    /// The effective upper bound of [`FadeParam::LdOffset`] may be lower, see
    /// [`FadeConfig::ld_offset_max`].
    pub const fn range(self) -> Option<(u32, u32)> {
        match self {
            Self::Enabled => None,
            Self::FullInterval => Some((FULL_INTERVAL_MIN_MS, FULL_INTERVAL_MAX_MS)),
            Self::MinStepInterval => Some((MIN_STEP_INTERVAL_MIN_MS, MIN_STEP_INTERVAL_MAX_MS)),
            Self::LdOffset => Some((LD_OFFSET_MIN, LD_OFFSET_MAX)),
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Enabled => "Fade brightness changes instead of applying them at once",
            Self::FullInterval => "Interval for a full fade in ms",
            Self::MinStepInterval => "Minimum interval for one fade step in ms",
            Self::LdOffset => {
                "Offset used for the fade step time calculations. The lower this value, \
                 the longer a fade step at a low brightness level"
            }
        }
    }
}

impl fmt::Display for FadeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a fade channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeConfig {
    enabled: bool,
    full_interval_ms: u32,
    min_step_interval_ms: u32,
    ld_offset: u32,
    brightness_max: u8,
}

impl FadeConfig {
    /// Default configuration for brightness values in `0..=brightness_max`
    ///
    /// The default offset is lowered if `brightness_max` leaves no room for it
    /// in the log table.
    pub const fn new(brightness_max: u8) -> Self {
        let room = LD_INDEX_MAX - brightness_max as u32;
        let ld_offset = if room < LD_OFFSET_DEFAULT {
            room
        } else {
            LD_OFFSET_DEFAULT
        };
        Self {
            enabled: true,
            full_interval_ms: FULL_INTERVAL_DEFAULT_MS,
            min_step_interval_ms: MIN_STEP_INTERVAL_DEFAULT_MS,
            ld_offset,
            brightness_max,
        }
    }

    /// Same configuration with other fade timing
    ///
    /// Usable in constants, so device defaults are checked at compile time.
    pub const fn with_timing(
        mut self,
        full_interval_ms: u32,
        min_step_interval_ms: u32,
    ) -> Result<Self, FadeError> {
        match check(
            FadeParam::FullInterval,
            full_interval_ms,
            FULL_INTERVAL_MIN_MS,
            FULL_INTERVAL_MAX_MS,
        ) {
            Ok(value) => self.full_interval_ms = value,
            Err(err) => return Err(err),
        }
        match check(
            FadeParam::MinStepInterval,
            min_step_interval_ms,
            MIN_STEP_INTERVAL_MIN_MS,
            MIN_STEP_INTERVAL_MAX_MS,
        ) {
            Ok(value) => self.min_step_interval_ms = value,
            Err(err) => return Err(err),
        }
        Ok(self)
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub const fn full_interval_ms(&self) -> u32 {
        self.full_interval_ms
    }

    pub const fn full_interval(&self) -> Duration {
        Duration::from_millis(self.full_interval_ms as u64)
    }

    pub const fn min_step_interval_ms(&self) -> u32 {
        self.min_step_interval_ms
    }

    pub const fn min_step_interval(&self) -> Duration {
        Duration::from_millis(self.min_step_interval_ms as u64)
    }

    pub const fn ld_offset(&self) -> u32 {
        self.ld_offset
    }

    pub const fn brightness_max(&self) -> u8 {
        self.brightness_max
    }

    /// Largest offset that keeps `brightness_max + offset` inside the table
    pub const fn ld_offset_max(&self) -> u32 {
        let room = LD_INDEX_MAX - self.brightness_max as u32;
        if room < LD_OFFSET_MAX {
            room
        } else {
            LD_OFFSET_MAX
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_full_interval_ms(&mut self, value: u32) -> Result<(), FadeError> {
        self.full_interval_ms = check(
            FadeParam::FullInterval,
            value,
            FULL_INTERVAL_MIN_MS,
            FULL_INTERVAL_MAX_MS,
        )?;
        Ok(())
    }

    pub fn set_min_step_interval_ms(&mut self, value: u32) -> Result<(), FadeError> {
        self.min_step_interval_ms = check(
            FadeParam::MinStepInterval,
            value,
            MIN_STEP_INTERVAL_MIN_MS,
            MIN_STEP_INTERVAL_MAX_MS,
        )?;
        Ok(())
    }

    pub fn set_ld_offset(&mut self, value: u32) -> Result<(), FadeError> {
        self.ld_offset = check(
            FadeParam::LdOffset,
            value,
            LD_OFFSET_MIN,
            self.ld_offset_max(),
        )?;
        Ok(())
    }

    /// Current value of a parameter, booleans as 0 or 1
    pub const fn get(&self, param: FadeParam) -> u32 {
        match param {
            FadeParam::Enabled => self.enabled as u32,
            FadeParam::FullInterval => self.full_interval_ms,
            FadeParam::MinStepInterval => self.min_step_interval_ms,
            FadeParam::LdOffset => self.ld_offset,
        }
    }

    /// Set a parameter, booleans from any integer (non-zero is true)
    pub fn set(&mut self, param: FadeParam, value: u32) -> Result<(), FadeError> {
        match param {
            FadeParam::Enabled => {
                self.set_enabled(value != 0);
                Ok(())
            }
            FadeParam::FullInterval => self.set_full_interval_ms(value),
            FadeParam::MinStepInterval => self.set_min_step_interval_ms(value),
            FadeParam::LdOffset => self.set_ld_offset(value),
        }
    }

    /// Set a parameter from text input
    ///
    /// Accepts decimal integers, and `true`/`false` for [`FadeParam::Enabled`].
    /// Surrounding whitespace, such as a trailing newline, is ignored.
    pub fn set_from_str(&mut self, param: FadeParam, input: &str) -> Result<(), FadeError> {
        let input = input.trim();
        let value = match (param, input) {
            (FadeParam::Enabled, "true") => 1,
            (FadeParam::Enabled, "false") => 0,
            _ => input
                .parse::<u32>()
                .map_err(|_| FadeError::InvalidValue { param })?,
        };
        self.set(param, value)
    }

    /// Set the parameter called `name` from text input
    pub fn set_by_name(&mut self, name: &str, input: &str) -> Result<(), FadeError> {
        let param = FadeParam::parse_from_str(name).ok_or(FadeError::UnknownParam)?;
        self.set_from_str(param, input)
    }
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self::new(BRIGHTNESS_MAX_DEFAULT)
    }
}

const fn check(param: FadeParam, value: u32, min: u32, max: u32) -> Result<u32, FadeError> {
    if value < min || value > max {
        return Err(FadeError::ConfigOutOfRange {
            param,
            value,
            min,
            max,
        });
    }
    Ok(value)
}
