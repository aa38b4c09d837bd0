//! BD2802 RGB driver wired to six key LEDs
//!
//! The chip has two RGB drivers. Each key LED sits on one colour channel of
//! one driver and is described by two currents and a wave pattern that
//! alternates between them. A [`Pattern`] holds these settings for all six
//! LEDs plus the timing shared by both drivers.
//!
//! Three inputs compete for the LEDs: touch keys, a button and user patterns.
//! Each input keeps its last pattern. Switching an input off falls back to the
//! pattern of another input that is still on.
//!
//! Brightness changes of static patterns are faded; every fade step rewrites
//! the active pattern with currents scaled to the new brightness.

use core::fmt;

use derive_more::{Display, Error};
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
    pub const CLKSETUP: u8 = 0x00;
    pub const CONTROL: u8 = 0x01;
    /// Timing of driver 1
    pub const HOUR1SETUP: u8 = 0x02;
    /// Timing of driver 2
    pub const HOUR2SETUP: u8 = 0x0C;
    pub const DCDCDRIVER: u8 = 0x40;
    pub const PIN_FUNC_SETUP: u8 = 0x41;
}

pub const BRIGHTNESS_MAX: u8 = 127;
/// Lowest brightness a user may request
pub const BRIGHTNESS_MIN: u8 = 4;
/// 14 mA
pub const BRIGHTNESS_DEFAULT: u8 = 0x46;

pub const ALS_LEVELS: usize = 16;
pub const ALS_LEVEL_MAX: u8 = 15;

pub const ADAPT_DELAY_MAX_MS: u32 = 5_000;
pub const ADAPT_DELAY_DEFAULT_MS: u32 = 600;

/// Default ALS brightness levels are spread between these
pub const ALS_LEVELS_DEFAULT_MIN: u8 = 8;
pub const ALS_LEVELS_DEFAULT_MAX: u8 = BRIGHTNESS_MAX;

/// Delay after a key press until all keys light up
pub const TOUCHKEY_ALL_ON_DELAY: Duration = Duration::from_millis(500);
/// Delay after all keys lit up until they go dark
pub const TOUCHKEY_OFF_DELAY: Duration = Duration::from_millis(5_000);

pub const CONTROL_OFF: u8 = 0x00;
pub const CONTROL_ONCE: u8 = 0x22;
pub const CONTROL_PERIODIC: u8 = 0x11;

pub const CYCLE_MAX: u8 = 15;
/// 16.8 s
pub const CYCLE_16_8_S: u8 = 7;
/// 2.1 s
pub const CYCLE_2_10_S: u8 = 3;

pub const SLOPE_MAX: u8 = 3;
/// A fourth of the cycle
pub const SLOPE_4TH: u8 = 3;

pub const WAVE_MAX: u8 = 15;
/// Current 1 for half the cycle, then current 2
pub const WAVE_44: u8 = 3;
/// Current 1 for the whole cycle
pub const WAVE_8: u8 = 7;

/// Register within an LED's block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedReg {
    Current1 = 0,
    Current2 = 1,
    WavePattern = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    Driver1,
    Driver2,
}

impl Driver {
    pub const fn offset(self) -> u8 {
        match self {
            Self::Driver1 => 0x2,
            Self::Driver2 => 0xC,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Blue,
}

impl Color {
    pub const fn offset(self) -> u8 {
        match self {
            Self::Red => 0x1,
            Self::Green => 0x4,
            Self::Blue => 0x7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyLed {
    Menu,
    Home,
    Back,
    Search,
    BlueLeft,
    BlueRight,
}

impl KeyLed {
    pub const ALL: [Self; 6] = [
        Self::Menu,
        Self::Home,
        Self::Back,
        Self::Search,
        Self::BlueLeft,
        Self::BlueRight,
    ];

    pub const fn driver(self) -> Driver {
        match self {
            Self::Menu | Self::Search | Self::BlueLeft => Driver::Driver1,
            Self::Home | Self::Back | Self::BlueRight => Driver::Driver2,
        }
    }

    pub const fn color(self) -> Color {
        match self {
            Self::Home | Self::Search => Color::Red,
            Self::Menu | Self::Back => Color::Green,
            Self::BlueLeft | Self::BlueRight => Color::Blue,
        }
    }

    pub const fn reg_addr(self, reg: LedReg) -> u8 {
        self.driver().offset() + self.color().offset() + reg as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "MENU",
            Self::Home => "HOME",
            Self::Back => "BACK",
            Self::Search => "SEARCH",
            Self::BlueLeft => "BLUELEFT",
            Self::BlueRight => "BLUERIGHT",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Scale a pattern current to `brightness`
pub const fn scale_current(value: u8, brightness: u8) -> u8 {
    #[allow(clippy::cast_possible_truncation)]
    {
        (value as u32 * (brightness as u32 + 1) / 256) as u8
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Operation {
    Once,
    #[default]
    Periodic,
}

impl Operation {
    pub const fn control_register(self) -> u8 {
        match self {
            Self::Once => CONTROL_ONCE,
            Self::Periodic => CONTROL_PERIODIC,
        }
    }
}

/// Currents and wave pattern of one LED
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedSettings {
    pub value: [u8; 2],
    pub wave: u8,
}

impl LedSettings {
    pub const ON: Self = Self {
        value: [u8::MAX, u8::MAX],
        wave: WAVE_8,
    };
    pub const OFF: Self = Self {
        value: [0, 0],
        wave: WAVE_8,
    };
    pub const BLINK: Self = Self {
        value: [0, u8::MAX],
        wave: WAVE_44,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternKind {
    AllOn,
    AllOff,
    AllBlinking,
    AllOnBut(KeyLed),
    CustomBlinking,
    CustomStatic,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllOn => f.write_str("ALL_ON"),
            Self::AllOff => f.write_str("ALL_OFF"),
            Self::AllBlinking => f.write_str("ALL_BLINKING"),
            Self::AllOnBut(led) => write!(f, "ALL_ON_BUT_{}", led.as_str()),
            Self::CustomBlinking => f.write_str("CUSTOM_BLINKING"),
            Self::CustomStatic => f.write_str("CUSTOM_STATIC"),
        }
    }
}

/// Errors of [`Pattern::parse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PatternError {
    /// Text does not follow the pattern format
    #[display("malformed pattern")]
    Syntax,
    /// A field above its maximum
    #[display("{what} = {value} exceeds maximum {max}")]
    OutOfRange {
        what: &'static str,
        value: u32,
        max: u32,
    },
}

/// LED settings of all keys plus the timing of both drivers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub slope_up: u8,
    pub slope_down: u8,
    pub cycle: u8,
    pub operation: Operation,
    pub leds: [LedSettings; 6],
}

impl Pattern {
    pub const fn all_on() -> Self {
        Self {
            kind: PatternKind::AllOn,
            slope_up: 0,
            slope_down: 0,
            cycle: CYCLE_16_8_S,
            operation: Operation::Periodic,
            leds: [LedSettings::ON; 6],
        }
    }

    pub const fn all_off() -> Self {
        Self {
            kind: PatternKind::AllOff,
            slope_up: 0,
            slope_down: 0,
            cycle: 0,
            operation: Operation::Periodic,
            leds: [LedSettings::OFF; 6],
        }
    }

    pub const fn all_blinking() -> Self {
        Self {
            kind: PatternKind::AllBlinking,
            slope_up: SLOPE_4TH,
            slope_down: SLOPE_4TH,
            cycle: CYCLE_2_10_S,
            operation: Operation::Periodic,
            leds: [LedSettings::BLINK; 6],
        }
    }

    /// All keys lit except `led`
    pub const fn all_on_but(led: KeyLed) -> Self {
        let mut leds = [LedSettings::ON; 6];
        leds[led.index()] = LedSettings::OFF;
        Self {
            kind: PatternKind::AllOnBut(led),
            slope_up: 0,
            slope_down: 0,
            cycle: CYCLE_16_8_S,
            operation: Operation::Periodic,
            leds,
        }
    }

    pub const fn is_off(&self) -> bool {
        matches!(self.kind, PatternKind::AllOff)
    }

    pub const fn is_blinking(&self) -> bool {
        matches!(
            self.kind,
            PatternKind::AllBlinking | PatternKind::CustomBlinking
        )
    }

    pub const fn hour_register(&self) -> u8 {
        self.slope_down << 6 | self.slope_up << 4 | self.cycle
    }

    pub const fn control_register(&self) -> u8 {
        self.operation.control_register()
    }

    /// Parse a user pattern
    ///
    /// Format: `cycle slope_up slope_down - v0 v1 wave, ...` with one
    /// `v0 v1 wave` group per key in the order of [`KeyLed::ALL`]. Currents are
    /// given in percent. A pattern that lights nothing parses to
    /// [`Pattern::all_off`].
    pub fn parse(input: &str) -> Result<Self, PatternError> {
        let (header, groups) = input.split_once('-').ok_or(PatternError::Syntax)?;

        let mut fields = header.split_whitespace();
        let cycle = parse_field(fields.next(), "cycle", CYCLE_MAX)?;
        let slope_up = parse_field(fields.next(), "slope_up", SLOPE_MAX)?;
        let slope_down = parse_field(fields.next(), "slope_down", SLOPE_MAX)?;
        if fields.next().is_some() {
            return Err(PatternError::Syntax);
        }

        let groups = groups.trim();
        let groups = groups.strip_suffix(',').unwrap_or(groups);
        let mut groups = groups.split(',');

        let mut leds = [LedSettings::OFF; 6];
        let mut is_off = true;
        let mut is_blinking = false;

        for led in &mut leds {
            let mut fields = groups.next().ok_or(PatternError::Syntax)?.split_whitespace();
            let value0 = parse_field(fields.next(), "brightness0", 100)?;
            let value1 = parse_field(fields.next(), "brightness1", 100)?;
            let wave = parse_field(fields.next(), "wave", WAVE_MAX)?;
            if fields.next().is_some() {
                return Err(PatternError::Syntax);
            }

            if (wave == WAVE_8 && value0 > 0) || (wave != WAVE_8 && (value0 > 0 || value1 > 0)) {
                is_off = false;
            }
            if wave != WAVE_8 && (value0 > 0 || value1 > 0) {
                is_blinking = true;
            }

            *led = LedSettings {
                value: [percent_to_current(value0), percent_to_current(value1)],
                wave,
            };
        }
        if groups.next().is_some() {
            return Err(PatternError::Syntax);
        }

        if is_off {
            return Ok(Self::all_off());
        }

        Ok(Self {
            kind: if is_blinking {
                PatternKind::CustomBlinking
            } else {
                PatternKind::CustomStatic
            },
            slope_up,
            slope_down,
            cycle,
            operation: Operation::Periodic,
            leds,
        })
    }
}

fn parse_field(field: Option<&str>, what: &'static str, max: u8) -> Result<u8, PatternError> {
    let value: u32 = field
        .ok_or(PatternError::Syntax)?
        .parse()
        .map_err(|_| PatternError::Syntax)?;
    u8::try_from(value)
        .ok()
        .filter(|&value| value <= max)
        .ok_or(PatternError::OutOfRange {
            what,
            value,
            max: u32::from(max),
        })
}

#[allow(clippy::cast_possible_truncation)]
const fn percent_to_current(percent: u8) -> u8 {
    (percent as u32 * u8::MAX as u32 / 100) as u8
}

/// Source of a pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Touchkey,
    Button,
    Pattern,
}

impl Input {
    pub const ALL: [Self; 3] = [Self::Touchkey, Self::Button, Self::Pattern];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Power state of the LEDs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnOff {
    /// Switched off by the user
    #[default]
    Off,
    /// Enabled, but dark as no input has a pattern
    DynOff,
    /// Enabled and lit
    DynOn,
}

impl OnOff {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::DynOff => "on (dyn off)",
            Self::DynOn => "on (dyn on)",
        }
    }
}

/// Brightness source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BrightnessMode {
    #[default]
    User,
    /// Follows the ambient light level
    Sensor,
}

/// Pattern state and register access of the key LEDs
///
/// Serves as the brightness path of [`KeyLeds`]: a new brightness rewrites
/// the active pattern.
pub struct KeyLedOutput<I2C> {
    i2c: I2C,
    address: u8,
    brightness: u8,
    onoff: OnOff,
    active_input: Input,
    saved_patterns: [Pattern; 3],
    touchkey_enabled: bool,
}

impl<I2C: I2c> KeyLedOutput<I2C> {
    pub const fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            brightness: BRIGHTNESS_DEFAULT,
            onoff: OnOff::Off,
            active_input: Input::Touchkey,
            saved_patterns: [Pattern::all_off(); 3],
            touchkey_enabled: true,
        }
    }

    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    pub const fn onoff(&self) -> OnOff {
        self.onoff
    }

    pub const fn active_input(&self) -> Input {
        self.active_input
    }

    pub const fn saved_pattern(&self, input: Input) -> &Pattern {
        &self.saved_patterns[input.index()]
    }

    pub const fn active_pattern(&self) -> &Pattern {
        self.saved_pattern(self.active_input)
    }

    pub const fn touchkey_enabled(&self) -> bool {
        self.touchkey_enabled
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        let result = self.i2c.write(self.address, &[reg, value]);
        #[cfg(feature = "esp32-log")]
        if result.is_err() {
            println!("[KeyLedOutput.write_byte] reg {:#04x}, val {:#04x} failed", reg, value);
        }
        result
    }

    fn led_set(&mut self, led: KeyLed, settings: LedSettings) -> Result<(), I2C::Error> {
        let current1 = scale_current(settings.value[0], self.brightness);
        let current2 = scale_current(settings.value[1], self.brightness);
        self.write_byte(led.reg_addr(LedReg::Current1), current1)?;
        self.write_byte(led.reg_addr(LedReg::Current2), current2)?;
        self.write_byte(led.reg_addr(LedReg::WavePattern), settings.wave)
    }

    const fn is_disabled(&self, input: Input) -> bool {
        matches!(input, Input::Touchkey) && !self.touchkey_enabled
    }

    fn dyn_on(&mut self) -> Result<(), I2C::Error> {
        if self.onoff == OnOff::DynOff {
            self.write_byte(reg::DCDCDRIVER, 0x00)?;
            self.write_byte(reg::PIN_FUNC_SETUP, 0x0F)?;
            self.onoff = OnOff::DynOn;
        }
        Ok(())
    }

    fn dyn_off(&mut self) -> Result<(), I2C::Error> {
        if self.onoff == OnOff::DynOn {
            self.write_byte(reg::CONTROL, CONTROL_OFF)?;
            self.onoff = OnOff::DynOff;
        }
        Ok(())
    }

    /// Write `pattern` to the chip on behalf of `input`
    fn write_pattern(&mut self, pattern: &Pattern, input: Input) -> Result<(), I2C::Error> {
        self.active_input = input;

        if self.onoff == OnOff::Off || self.is_disabled(input) {
            return Ok(());
        }

        self.dyn_on()?;
        for led in KeyLed::ALL {
            self.led_set(led, pattern.leds[led.index()])?;
        }
        let hour = pattern.hour_register();
        self.write_byte(reg::HOUR1SETUP, hour)?;
        self.write_byte(reg::HOUR2SETUP, hour)?;
        self.write_byte(reg::CONTROL, pattern.control_register())
    }

    /// `input` went off or was disabled; fall back to another input or go dark
    fn restore_pattern_or_off(
        &mut self,
        pattern: &Pattern,
        input: Input,
    ) -> Result<(), I2C::Error> {
        if !pattern.is_off() && !self.is_disabled(input) {
            return Ok(());
        }
        if self.active_input != input {
            // another input is active
            return Ok(());
        }

        let restore = Input::ALL.into_iter().find(|&other| {
            other != input && !self.saved_pattern(other).is_off() && !self.is_disabled(other)
        });

        match restore {
            Some(other) => {
                let restore_pattern = *self.saved_pattern(other);
                #[cfg(feature = "esp32-log")]
                println!(
                    "[KeyLedOutput.restore_pattern_or_off] restoring {} for {:?} instead of {} for {:?}",
                    restore_pattern.kind, other, pattern.kind, input
                );
                self.write_pattern(&restore_pattern, other)
            }
            None => {
                self.dyn_off()?;
                self.active_input = input;
                Ok(())
            }
        }
    }

    fn apply(&mut self, pattern: &Pattern, input: Input) -> Result<(), I2C::Error> {
        if pattern.is_off() {
            self.restore_pattern_or_off(pattern, input)
        } else {
            self.write_pattern(pattern, input)
        }
    }

    fn update_active_pattern(&mut self) -> Result<(), I2C::Error> {
        let input = self.active_input;
        let pattern = *self.saved_pattern(input);
        self.apply(&pattern, input)
    }

    fn set_pattern(&mut self, pattern: Pattern, input: Input) -> Result<(), I2C::Error> {
        #[cfg(feature = "esp32-log")]
        println!("[KeyLedOutput.set_pattern] {} for {:?}", pattern.kind, input);
        self.saved_patterns[input.index()] = pattern;
        self.apply(&pattern, input)
    }

    fn off(&mut self) -> Result<(), I2C::Error> {
        if self.onoff != OnOff::Off {
            self.dyn_off()?;
            self.onoff = OnOff::Off;
        }
        Ok(())
    }

    fn on(&mut self) -> Result<(), I2C::Error> {
        if self.onoff == OnOff::Off {
            self.onoff = OnOff::DynOff;
        }
        self.update_active_pattern()
    }
}

impl<I2C: I2c> BrightnessSetter for KeyLedOutput<I2C> {
    type Error = I2C::Error;

    fn set_brightness(&mut self, _channel: ChannelId, brightness: u8) -> Result<(), I2C::Error> {
        self.brightness = brightness;
        self.update_active_pattern()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TouchkeyStage {
    AllOn,
    Off,
}

type DeviceResult<T, E> = Result<T, DeviceError<E>>;

/// BD2802 key LED driver
pub struct KeyLeds<I2C> {
    fade: FadeChannel<KeyLedOutput<I2C>>,
    brightness_mode: BrightnessMode,
    saved_brightness_mode: BrightnessMode,
    suspended: bool,
    brightness_levels: [u8; ALS_LEVELS],
    adapt_brightness_delay: Duration,
    touchkey_timer: Option<(Instant, TouchkeyStage)>,
}

impl<I2C: I2c> KeyLeds<I2C> {
    /// Key LEDs at `address`, switched off
    ///
    /// Does not touch the bus, see [`KeyLeds::init`].
    pub fn new(i2c: I2C, address: u8) -> Self {
        let config = FadeConfig::new(BRIGHTNESS_MAX);
        let mut brightness_levels = [0; ALS_LEVELS];
        let filled = fill_exp(
            &mut brightness_levels,
            config.ld_offset(),
            ALS_LEVELS_DEFAULT_MIN,
            ALS_LEVELS_DEFAULT_MAX,
        );
        debug_assert!(filled.is_ok(), "default levels: {filled:?}");

        Self {
            fade: FadeChannel::new(ChannelId(1), KeyLedOutput::new(i2c, address), config),
            brightness_mode: BrightnessMode::User,
            saved_brightness_mode: BrightnessMode::User,
            suspended: false,
            brightness_levels,
            adapt_brightness_delay: Duration::from_millis(u64::from(ADAPT_DELAY_DEFAULT_MS)),
            touchkey_timer: None,
        }
    }

    /// Reset all inputs, switch on and blink all keys until the next update
    pub fn init(&mut self) -> DeviceResult<(), I2C::Error> {
        self.reset()?;
        self.fade
            .with_setter(|output| output.write_pattern(&Pattern::all_blinking(), Input::Button))
            .map_err(DeviceError::Bus)
    }

    /// The fade channel, to be driven by [`crate::scheduler`]
    pub fn fade(&self) -> &FadeChannel<KeyLedOutput<I2C>> {
        &self.fade
    }

    pub fn brightness(&self) -> u8 {
        self.fade.with_setter(|output| output.brightness())
    }

    pub fn onoff(&self) -> OnOff {
        self.fade.with_setter(|output| output.onoff())
    }

    pub fn active_input(&self) -> Input {
        self.fade.with_setter(|output| output.active_input())
    }

    pub fn active_pattern(&self) -> Pattern {
        self.fade.with_setter(|output| *output.active_pattern())
    }

    pub fn saved_pattern(&self, input: Input) -> Pattern {
        self.fade.with_setter(|output| *output.saved_pattern(input))
    }

    pub fn touchkey_enabled(&self) -> bool {
        self.fade.with_setter(|output| output.touchkey_enabled())
    }

    pub const fn brightness_mode(&self) -> BrightnessMode {
        self.brightness_mode
    }

    pub const fn brightness_levels(&self) -> &[u8; ALS_LEVELS] {
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

    pub fn on(&mut self) -> DeviceResult<(), I2C::Error> {
        self.fade
            .with_setter(KeyLedOutput::on)
            .map_err(DeviceError::Bus)
    }

    pub fn off(&mut self) -> DeviceResult<(), I2C::Error> {
        self.fade
            .with_setter(KeyLedOutput::off)
            .map_err(DeviceError::Bus)
    }

    /// Switch off, forget the patterns of all inputs and switch on again
    pub fn reset(&mut self) -> DeviceResult<(), I2C::Error> {
        self.off()?;
        self.fade.with_setter(|output| {
            output.saved_patterns = [Pattern::all_off(); 3];
        });
        self.on()
    }

    /// Set the pattern of `input`
    ///
    /// Blinking patterns are not faded, so a running fade is finished first.
    pub fn set_pattern(&mut self, pattern: Pattern, input: Input) -> DeviceResult<(), I2C::Error> {
        if self.active_pattern().is_blinking() || pattern.is_blinking() {
            self.fade.finish();
        }
        self.fade
            .with_setter(|output| output.set_pattern(pattern, input))
            .map_err(DeviceError::Bus)
    }

    /// Parse and set a user pattern
    pub fn set_custom_pattern(&mut self, input: &str) -> DeviceResult<(), I2C::Error> {
        let pattern = Pattern::parse(input)?;
        self.set_pattern(pattern, Input::Pattern)
    }

    /// Light all keys, or release the button input
    pub fn set_button(&mut self, on: bool) -> DeviceResult<(), I2C::Error> {
        let pattern = if on {
            Pattern::all_on()
        } else {
            Pattern::all_off()
        };
        self.set_pattern(pattern, Input::Button)
    }

    pub fn set_touchkey_enabled(&mut self, enabled: bool) -> DeviceResult<(), I2C::Error> {
        #[cfg(feature = "esp32-log")]
        println!(
            "[KeyLeds.set_touchkey_enabled] {} touchkey leds",
            if enabled { "activating" } else { "deactivating" }
        );
        let pattern = self.fade.with_setter(|output| {
            output.touchkey_enabled = enabled;
            *output.saved_pattern(Input::Touchkey)
        });
        if enabled {
            self.set_pattern(pattern, Input::Touchkey)
        } else {
            self.fade
                .with_setter(|output| output.restore_pattern_or_off(&pattern, Input::Touchkey))
                .map_err(DeviceError::Bus)
        }
    }

    /// A touch key was pressed
    ///
    /// Lights all other keys now, all keys shortly after, and none once the
    /// keys were left alone for a while. The later stages fire from
    /// [`KeyLeds::poll_touchkey`].
    pub fn touchkey_pressed(&mut self, now: Instant, led: KeyLed) -> DeviceResult<(), I2C::Error> {
        self.set_pattern(Pattern::all_on_but(led), Input::Touchkey)?;
        self.touchkey_timer = Some((now + TOUCHKEY_ALL_ON_DELAY, TouchkeyStage::AllOn));
        Ok(())
    }

    /// Run due touch key stages, returns the next deadline
    pub fn poll_touchkey(&mut self, now: Instant) -> DeviceResult<Option<Instant>, I2C::Error> {
        while let Some((at, stage)) = self.touchkey_timer {
            if at > now {
                break;
            }
            match stage {
                TouchkeyStage::AllOn => {
                    self.touchkey_timer = Some((at + TOUCHKEY_OFF_DELAY, TouchkeyStage::Off));
                    self.set_pattern(Pattern::all_on(), Input::Touchkey)?;
                }
                TouchkeyStage::Off => {
                    self.touchkey_timer = None;
                    self.set_pattern(Pattern::all_off(), Input::Touchkey)?;
                }
            }
        }
        Ok(self.touchkey_timer.map(|(at, _)| at))
    }

    /// User brightness request, only honoured in user mode
    pub fn set_brightness(&mut self, now: Instant, brightness: u8) -> DeviceResult<(), I2C::Error> {
        if !(BRIGHTNESS_MIN..=BRIGHTNESS_MAX).contains(&brightness) {
            return Err(DeviceError::OutOfRange {
                what: "brightness",
                value: u32::from(brightness),
                min: u32::from(BRIGHTNESS_MIN),
                max: u32::from(BRIGHTNESS_MAX),
            });
        }
        if self.brightness_mode != BrightnessMode::User {
            return Err(DeviceError::WrongMode);
        }
        self.set_or_fade_brightness(now, Duration::from_ticks(0), brightness)
    }

    /// Follow a new ambient light level, only in sensor mode while lit
    pub fn on_als_level(&mut self, now: Instant, level: u8) -> DeviceResult<(), I2C::Error> {
        if level > ALS_LEVEL_MAX {
            return Err(DeviceError::OutOfRange {
                what: "als level",
                value: u32::from(level),
                min: 0,
                max: u32::from(ALS_LEVEL_MAX),
            });
        }
        if self.brightness_mode != BrightnessMode::Sensor || self.onoff() != OnOff::DynOn {
            return Err(DeviceError::WrongMode);
        }
        let brightness = self.brightness_levels[level as usize];
        self.set_or_fade_brightness(now, self.adapt_brightness_delay, brightness)
    }

    fn set_or_fade_brightness(
        &mut self,
        now: Instant,
        delay: Duration,
        brightness: u8,
    ) -> DeviceResult<(), I2C::Error> {
        let current = self.brightness();
        if current == brightness {
            return Ok(());
        }

        if self.active_pattern().is_blinking() {
            self.fade.stop();
            self.fade
                .with_setter(|output| {
                    output.brightness = brightness;
                    output.update_active_pattern()
                })
                .map_err(DeviceError::Bus)
        } else {
            self.fade.start_delayed(now, delay, current, brightness)?;
            Ok(())
        }
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
            _ if values.len() == ALS_LEVELS => self.brightness_levels.copy_from_slice(values),
            _ => {
                return Err(DeviceError::OutOfRange {
                    what: "number of brightness levels",
                    value: u32::try_from(values.len()).unwrap_or(u32::MAX),
                    min: 1,
                    max: ALS_LEVELS as u32,
                });
            }
        }
        Ok(())
    }

    /// Takes effect after [`KeyLeds::resume`] while suspended
    pub fn set_brightness_mode(&mut self, mode: BrightnessMode) {
        if self.suspended {
            self.saved_brightness_mode = mode;
        } else {
            self.brightness_mode = mode;
        }
    }

    /// Screen went off: touch keys go dark and brightness follows the sensor
    pub fn suspend(&mut self) -> DeviceResult<(), I2C::Error> {
        self.touchkey_timer = None;
        self.set_pattern(Pattern::all_off(), Input::Touchkey)?;
        self.saved_brightness_mode = self.brightness_mode;
        self.brightness_mode = BrightnessMode::Sensor;
        self.suspended = true;
        Ok(())
    }

    pub fn resume(&mut self) {
        self.suspended = false;
        self.brightness_mode = self.saved_brightness_mode;
    }
}
