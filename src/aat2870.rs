//! AAT2870 LCD backlight with ambient light sensor
//!
//! The backlight brightness is held in the 16 ALS brightness registers. With
//! the sensor bias on, the chip picks one of them according to the measured
//! ambient level; writing the same value to all of them gives a fixed
//! brightness. Brightness changes run through a [`FadeChannel`].
//!
//! An ambient light measure is split in two stages. [`Aat2870::start_als_measure`]
//! enables the sensor and returns when the result is ready,
//! [`Aat2870::finish_als_measure`] reads it back and, in auto mode, fades to the
//! brightness configured for the new level.

use core::fmt;

use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::config::FadeConfig;
use crate::error::DeviceError;
use crate::fade::FadeChannel;
use crate::ld::fill_exp;
use crate::{BrightnessSetter, ChannelId};

/// Registers
pub mod reg {
    /// Enable backlight channels
    pub const EN_CH: u8 = 0x00;
    /// Gain resistor, ALS enable, logarithmic output
    pub const ALS_CFG0: u8 = 0x0E;
    /// SBIAS voltage and enable
    pub const ALS_CFG1: u8 = 0x0F;
    /// Polling mode, interval and gain
    pub const ALS_CFG2: u8 = 0x10;
    /// Ambient light level
    pub const AMB: u8 = 0x11;
    /// Brightness for ALS level 0
    pub const ALS0: u8 = 0x12;
    /// Brightness for ALS level 15
    pub const ALS15: u8 = 0x21;
    /// LDO A and B output voltage
    pub const LDOAB: u8 = 0x24;
    /// LDO C and D output voltage
    pub const LDOCD: u8 = 0x25;
    /// LDO A to D output enable
    pub const EN_LDO: u8 = 0x26;
}

pub const ALL_CH_ON: u8 = 0xFF;
pub const ALL_CH_OFF: u8 = 0x00;

pub const LDO_EN_ALL: u8 = 0x0F;
pub const LDO_DIS_ALL: u8 = 0x00;
/// 3 V on LDO A and C, 1.8 V on LDO B and D
pub const LDO_3V_1_8V: u8 = 0x4C;

pub const BRIGHTNESS_MAX: u8 = 0x7F;
pub const BRIGHTNESS_DEFAULT: u8 = 0x3F;
/// Number of ALS brightness registers
pub const BRIGHTNESS_REGS: usize = (reg::ALS15 - reg::ALS0 + 1) as usize;

/// Highest ALS level
pub const ALS_LEVEL_MAX: u8 = 15;

/// SBIAS on, powers the sensor and enables the ALS brightness registers
pub const ALS_CFG1_SBIAS_ON: u8 = 0x01;

/// Bounds of the delay before following an ALS level change (ms)
pub const ADAPT_DELAY_MAX_MS: u32 = 10_000;
pub const ADAPT_DELAY_DEFAULT_MS: u32 = 500;

/// Fade defaults of the backlight
pub const FADE_MIN_STEP_INTERVAL_MS: u32 = 20;
pub const FADE_FULL_INTERVAL_MS: u32 = 500;

const FADE_CONFIG: FadeConfig = match FadeConfig::new(BRIGHTNESS_MAX)
    .with_timing(FADE_FULL_INTERVAL_MS, FADE_MIN_STEP_INTERVAL_MS)
{
    Ok(config) => config,
    Err(_) => panic!("backlight fade timing out of range"),
};

/// Default ALS brightness levels are spread between these
pub const ALS_LEVELS_DEFAULT_MIN: u8 = 0x06;
pub const ALS_LEVELS_DEFAULT_MAX: u8 = BRIGHTNESS_MAX;

/// Lower bound of all ALS polling intervals (ms)
pub const POLLING_INTERVAL_MIN_MS: u32 = 250;

/// Sensor amplification mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GainMode {
    Low,
    #[default]
    High,
    /// Switches between the two resistors of a pair
    Auto,
}

impl GainMode {
    pub const fn register_bits(self) -> u8 {
        match self {
            Self::Low => 0x02,
            Self::High => 0x06,
            Self::Auto => 0x00,
        }
    }

    /// Time the sensor needs for one measure
    pub const fn measure_interval(self) -> Duration {
        match self {
            Self::Low | Self::High => Duration::from_millis(200),
            Self::Auto => Duration::from_millis(300),
        }
    }

    /// Accepts any prefix of `low`, `high` or `auto`
    pub fn parse_from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        [Self::Low, Self::High, Self::Auto]
            .into_iter()
            .find(|mode| mode.as_str().starts_with(s))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }
}

/// Sensor gain resistor, 0 to 3
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GainResistor(u8);

impl GainResistor {
    pub const MAX: u8 = 3;

    pub const fn new(index: u8) -> Option<Self> {
        if index <= Self::MAX {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// Resistance for `mode`, both of the pair in auto mode
    pub const fn description(self, mode: GainMode) -> &'static str {
        const LOW: [&str; 4] = ["250 Ohm", "1 kOhm", "4 kOhm", "16 kOhm"];
        const HIGH: [&str; 4] = ["1 kOhm", "4 kOhm", "16 kOhm", "64 kOhm"];
        const AUTO: [&str; 4] = [
            "250 Ohm / 1 kOhm",
            "1 kOhm / 4 kOhm",
            "4 kOhm / 16 kOhm",
            "16 kOhm / 64 kOhm",
        ];
        let idx = self.0 as usize;
        match mode {
            GainMode::Low => LOW[idx],
            GainMode::High => HIGH[idx],
            GainMode::Auto => AUTO[idx],
        }
    }
}

impl Default for GainResistor {
    fn default() -> Self {
        Self(2)
    }
}

/// Sensor gain in steps of 6.25 %, -8 to 7
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gain(i8);

impl Gain {
    pub const MIN: i8 = -8;
    pub const MAX: i8 = 7;
    /// Gain per step in 1/100 %
    pub const STEP_CENTI_PERCENT: i32 = 625;

    pub const fn new(steps: i8) -> Option<Self> {
        if steps >= Self::MIN && steps <= Self::MAX {
            Some(Self(steps))
        } else {
            None
        }
    }

    pub const fn steps(self) -> i8 {
        self.0
    }

    /// Two's complement nibble
    #[allow(clippy::cast_sign_loss)]
    pub const fn register_bits(self) -> u8 {
        (self.0 as u8) & 0x0F
    }

    pub const fn centi_percent(self) -> i32 {
        self.0 as i32 * Self::STEP_CENTI_PERCENT
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.centi_percent();
        let sign = if value < 0 { '-' } else { '+' };
        let value = value.unsigned_abs();
        write!(f, "{sign}{}.{:02} %", value / 100, value % 100)
    }
}

/// `ALS_CFG0`: logarithmic output, gain resistor and mode, sensor enable
pub const fn als_cfg0(resistor: GainResistor, mode: GainMode, enable: bool) -> u8 {
    0x40 | enable as u8 | (resistor.index() & 0x03) << 4 | mode.register_bits()
}

/// `ALS_CFG2`: manual polling with `gain`
pub const fn als_cfg2(gain: Gain) -> u8 {
    0xF0 | gain.register_bits()
}

/// ALS level from the `AMB` register
pub const fn als_level(amb: u8) -> u8 {
    (amb >> 3) & 0x0F
}

/// `EN_LDO` with LDO `num` switched
pub const fn ldo_bits(current: u8, num: u8, enable: bool) -> u8 {
    if enable {
        current | 1 << num
    } else {
        current & !(1 << num)
    }
}

/// Who decides the backlight brightness
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Set by the user
    #[default]
    Fixed,
    /// Follows the ambient light level
    Auto,
    /// Backlight off, entered and left by [`Aat2870::bl_off`] and [`Aat2870::bl_on`]
    ScreenOff,
}

impl Mode {
    /// Parses the user selectable modes, `0`/`fixed` and `1`/`auto`
    pub fn parse_from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "0" | "fixed" => Some(Self::Fixed),
            "1" | "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed-brightness",
            Self::Auto => "auto-brightness",
            Self::ScreenOff => "screen off",
        }
    }

    pub const fn default_polling_interval_ms(self) -> u32 {
        match self {
            Self::Fixed => 10_000,
            Self::Auto => 500,
            Self::ScreenOff => 60_000,
        }
    }

    pub const fn polling_interval_max_ms(self) -> u32 {
        match self {
            Self::Fixed => 60_000,
            Self::Auto => 5_000,
            Self::ScreenOff => 600_000,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Auto => 1,
            Self::ScreenOff => 2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Brightness path of the backlight
///
/// Writes the brightness to all ALS brightness registers while the backlight is
/// awake, and only records it while asleep.
pub struct BacklightOutput<I2C> {
    i2c: I2C,
    address: u8,
    brightness: u8,
    awake: bool,
}

impl<I2C: I2c> BacklightOutput<I2C> {
    pub const fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            brightness: BRIGHTNESS_DEFAULT,
            awake: true,
        }
    }

    /// Last brightness handed to the output
    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    pub const fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        let result = self.i2c.write(self.address, &[reg, value]);
        #[cfg(feature = "esp32-log")]
        if result.is_err() {
            println!(
                "[BacklightOutput.write_reg] failed to write reg {:#04x} = {:#04x}",
                reg, value
            );
        }
        result
    }

    pub fn read_reg(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    /// Write the current brightness to all ALS brightness registers
    ///
    /// Stops at the first failed write.
    fn write_brightness(&mut self) -> Result<(), I2C::Error> {
        if !self.awake {
            return Ok(());
        }
        self.write_levels()
    }

    fn write_levels(&mut self) -> Result<(), I2C::Error> {
        for reg in reg::ALS0..=reg::ALS15 {
            self.write_reg(reg, self.brightness)?;
        }
        Ok(())
    }
}

impl<I2C: I2c> BrightnessSetter for BacklightOutput<I2C> {
    type Error = I2C::Error;

    fn set_brightness(&mut self, _channel: ChannelId, brightness: u8) -> Result<(), I2C::Error> {
        self.brightness = brightness;
        self.write_brightness()
    }
}

/// Ambient light sensor settings and last result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Als {
    pub gain_mode: GainMode,
    pub gain_resistor: GainResistor,
    pub gain: Gain,
    /// Last measured level, 0 to 15
    pub level: u8,
    /// When `level` was measured
    pub level_at: Option<Instant>,
    measure_running: bool,
}

impl Default for Als {
    fn default() -> Self {
        Self {
            gain_mode: GainMode::default(),
            gain_resistor: GainResistor::default(),
            gain: Gain::default(),
            level: 0,
            level_at: None,
            measure_running: false,
        }
    }
}

/// AAT2870 backlight driver
pub struct Aat2870<I2C> {
    fade: FadeChannel<BacklightOutput<I2C>>,
    mode: Mode,
    saved_mode: Mode,
    als: Als,
    brightness_levels: [u8; BRIGHTNESS_REGS],
    adapt_brightness_delay: Duration,
    polling_interval_ms: [u32; 3],
}

type DeviceResult<T, E> = Result<T, DeviceError<E>>;

impl<I2C: I2c> Aat2870<I2C> {
    /// Backlight at `address`, assumed awake in fixed mode
    ///
    /// Does not touch the bus.
    pub fn new(i2c: I2C, address: u8) -> Self {
        let config = FADE_CONFIG;
        let mut brightness_levels = [0; BRIGHTNESS_REGS];
        let filled = fill_exp(
            &mut brightness_levels,
            config.ld_offset(),
            ALS_LEVELS_DEFAULT_MIN,
            ALS_LEVELS_DEFAULT_MAX,
        );
        debug_assert!(filled.is_ok(), "default levels: {filled:?}");

        Self {
            fade: FadeChannel::new(ChannelId(0), BacklightOutput::new(i2c, address), config),
            mode: Mode::Fixed,
            saved_mode: Mode::Fixed,
            als: Als::default(),
            brightness_levels,
            adapt_brightness_delay: Duration::from_millis(u64::from(ADAPT_DELAY_DEFAULT_MS)),
            polling_interval_ms: [
                Mode::Fixed.default_polling_interval_ms(),
                Mode::Auto.default_polling_interval_ms(),
                Mode::ScreenOff.default_polling_interval_ms(),
            ],
        }
    }

    /// The fade channel, to be driven by [`crate::scheduler`]
    pub fn fade(&self) -> &FadeChannel<BacklightOutput<I2C>> {
        &self.fade
    }

    pub fn brightness(&self) -> u8 {
        self.fade.with_setter(|output| output.brightness())
    }

    pub fn is_awake(&self) -> bool {
        self.fade.with_setter(|output| output.is_awake())
    }

    pub const fn mode(&self) -> Mode {
        self.mode
    }

    pub const fn als(&self) -> &Als {
        &self.als
    }

    pub const fn brightness_levels(&self) -> &[u8; BRIGHTNESS_REGS] {
        &self.brightness_levels
    }

    pub const fn adapt_brightness_delay(&self) -> Duration {
        self.adapt_brightness_delay
    }

    pub fn set_adapt_brightness_delay_ms(&mut self, ms: u32) -> DeviceResult<(), I2C::Error> {
        if ms > ADAPT_DELAY_MAX_MS {
            return Err(DeviceError::OutOfRange {
                what: "adapt brightness delay",
                value: ms,
                min: 0,
                max: ADAPT_DELAY_MAX_MS,
            });
        }
        self.adapt_brightness_delay = Duration::from_millis(u64::from(ms));
        Ok(())
    }

    /// Sensor polling interval in the current mode
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms[self.mode.index()] as u64)
    }

    pub fn set_polling_interval_ms(&mut self, mode: Mode, ms: u32) -> DeviceResult<(), I2C::Error> {
        let max = mode.polling_interval_max_ms();
        if !(POLLING_INTERVAL_MIN_MS..=max).contains(&ms) {
            return Err(DeviceError::OutOfRange {
                what: "polling interval",
                value: ms,
                min: POLLING_INTERVAL_MIN_MS,
                max,
            });
        }
        self.polling_interval_ms[mode.index()] = ms;
        Ok(())
    }

    /// Sensor gain used from the next measure on
    pub fn set_gain(&mut self, mode: GainMode, resistor: GainResistor, gain: Gain) {
        self.als.gain_mode = mode;
        self.als.gain_resistor = resistor;
        self.als.gain = gain;
    }

    /// User brightness request, only honoured in fixed mode
    pub fn set_brightness(&mut self, now: Instant, brightness: u8) -> DeviceResult<(), I2C::Error> {
        if self.mode != Mode::Fixed {
            #[cfg(feature = "esp32-log")]
            println!(
                "[Aat2870.set_brightness] skipping brightness {} as mode is {}",
                brightness, self.mode
            );
            return Err(DeviceError::WrongMode);
        }
        self.set_brightness_to(now, brightness)
    }

    /// Follow a new ambient light level, only in auto mode
    pub fn on_als_level(&mut self, now: Instant, level: u8) -> DeviceResult<(), I2C::Error> {
        if level > ALS_LEVEL_MAX {
            return Err(DeviceError::OutOfRange {
                what: "als level",
                value: u32::from(level),
                min: 0,
                max: u32::from(ALS_LEVEL_MAX),
            });
        }
        if self.mode != Mode::Auto {
            return Err(DeviceError::WrongMode);
        }
        let brightness = self.brightness_levels[level as usize];
        self.set_brightness_to(now, brightness)
    }

    fn set_brightness_to(&mut self, now: Instant, brightness: u8) -> DeviceResult<(), I2C::Error> {
        let delay = if self.mode == Mode::Auto {
            self.adapt_brightness_delay
        } else {
            Duration::from_ticks(0)
        };
        if !self.fade.config().enabled() {
            self.fade.stop();
        }
        let current = self.brightness();
        self.fade.start_delayed(now, delay, current, brightness)?;
        Ok(())
    }

    /// Set the ALS brightness levels
    ///
    /// One value spreads the levels exponentially from it to the maximum, two
    /// values spread them between both, sixteen values are taken as they are.
    pub fn set_brightness_levels(&mut self, values: &[u8]) -> DeviceResult<(), I2C::Error> {
        if let Some(&value) = values.iter().find(|&&value| value > BRIGHTNESS_MAX) {
            return Err(DeviceError::OutOfRange {
                what: "brightness level",
                value: u32::from(value),
                min: 0,
                max: u32::from(BRIGHTNESS_MAX),
            });
        }

        let offset = self.fade.config().ld_offset();
        match *values {
            [min] => fill_exp(&mut self.brightness_levels, offset, min, BRIGHTNESS_MAX)?,
            [min, max] => fill_exp(&mut self.brightness_levels, offset, min, max)?,
            _ if values.len() == BRIGHTNESS_REGS => self.brightness_levels.copy_from_slice(values),
            _ => {
                return Err(DeviceError::OutOfRange {
                    what: "number of brightness levels",
                    value: u32::try_from(values.len()).unwrap_or(u32::MAX),
                    min: 1,
                    max: BRIGHTNESS_REGS as u32,
                });
            }
        }
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        #[cfg(feature = "esp32-log")]
        println!("[Aat2870.set_mode] setting mode: {}", mode);
        self.mode = mode;
    }

    /// Switch the backlight channels on, leaving screen-off mode
    pub fn bl_on(&mut self) -> DeviceResult<(), I2C::Error> {
        if self.is_awake() {
            return Ok(());
        }
        self.fade
            .with_setter(|output| {
                output.write_levels()?;
                output.write_reg(reg::EN_CH, ALL_CH_ON)?;
                output.awake = true;
                Ok(())
            })
            .map_err(DeviceError::Bus)?;
        if self.mode == Mode::ScreenOff {
            self.set_mode(self.saved_mode);
        }
        Ok(())
    }

    /// Switch the backlight channels off and enter screen-off mode
    ///
    /// A running fade is stopped, the last written brightness is kept for
    /// [`Aat2870::bl_on`].
    pub fn bl_off(&mut self) -> DeviceResult<(), I2C::Error> {
        if !self.is_awake() {
            return Ok(());
        }
        self.fade.stop();
        self.fade
            .with_setter(|output| {
                output.write_reg(reg::EN_CH, ALL_CH_OFF)?;
                output.awake = false;
                Ok(())
            })
            .map_err(DeviceError::Bus)?;
        self.saved_mode = self.mode;
        self.set_mode(Mode::ScreenOff);
        Ok(())
    }

    /// Set the LDO voltages to their defaults and enable all of them
    pub fn ldo_activate(&mut self) -> DeviceResult<(), I2C::Error> {
        self.fade
            .with_setter(|output| {
                output.write_reg(reg::LDOAB, LDO_3V_1_8V)?;
                output.write_reg(reg::LDOCD, LDO_3V_1_8V)?;
                output.write_reg(reg::EN_LDO, LDO_EN_ALL)
            })
            .map_err(DeviceError::Bus)?;
        Ok(())
    }

    pub fn ldo_deactivate(&mut self) -> DeviceResult<(), I2C::Error> {
        self.fade
            .with_setter(|output| output.write_reg(reg::EN_LDO, LDO_DIS_ALL))
            .map_err(DeviceError::Bus)?;
        Ok(())
    }

    /// Switch a single LDO, `num` in 0 to 3
    pub fn ldo_enable(&mut self, num: u8, enable: bool) -> DeviceResult<(), I2C::Error> {
        if num > 3 {
            return Err(DeviceError::OutOfRange {
                what: "ldo",
                value: u32::from(num),
                min: 0,
                max: 3,
            });
        }
        self.fade
            .with_setter(|output| {
                let current = output.read_reg(reg::EN_LDO)?;
                output.write_reg(reg::EN_LDO, ldo_bits(current, num, enable))
            })
            .map_err(DeviceError::Bus)?;
        Ok(())
    }

    /// Power the sensor and start a measure
    ///
    /// Returns when to call [`Aat2870::finish_als_measure`], or `None` if a
    /// measure is already running.
    pub fn start_als_measure(&mut self, now: Instant) -> DeviceResult<Option<Instant>, I2C::Error> {
        if self.als.measure_running {
            return Ok(None);
        }
        let als = self.als;
        self.fade
            .with_setter(|output| {
                output.write_reg(reg::ALS_CFG1, ALS_CFG1_SBIAS_ON)?;
                output.write_reg(reg::ALS_CFG2, als_cfg2(als.gain))?;
                output.write_reg(
                    reg::ALS_CFG0,
                    als_cfg0(als.gain_resistor, als.gain_mode, true),
                )
            })
            .map_err(DeviceError::Bus)?;
        self.als.measure_running = true;
        Ok(Some(
            now + als.gain_mode.measure_interval() + Duration::from_millis(10),
        ))
    }

    /// Disable the sensor and read the measured level
    ///
    /// In auto mode the brightness then follows the new level.
    pub fn finish_als_measure(&mut self, now: Instant) -> DeviceResult<u8, I2C::Error> {
        self.als.measure_running = false;
        let als = self.als;
        let amb = self
            .fade
            .with_setter(|output| {
                output.write_reg(
                    reg::ALS_CFG0,
                    als_cfg0(als.gain_resistor, als.gain_mode, false),
                )?;
                output.read_reg(reg::AMB)
            })
            .map_err(DeviceError::Bus)?;

        let level = als_level(amb);
        #[cfg(feature = "esp32-log")]
        println!("[Aat2870.finish_als_measure] als level {}", level);
        self.als.level = level;
        self.als.level_at = Some(now);

        if self.mode == Mode::Auto {
            self.on_als_level(now, level)?;
        }
        Ok(level)
    }
}
