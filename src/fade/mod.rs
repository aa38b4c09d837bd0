//! Perceptual brightness fades
//!
//! A [`FadeChannel`] drives one brightness value from a start to a target in
//! log-domain steps, spaced so that the whole fade takes the configured full
//! interval and no step is shorter than the minimum step interval.
//!
//! The channel never sleeps on its own. Every operation takes the current time
//! and [`FadeChannel::poll`] fires whatever is due, returning the next
//! deadline. See [`crate::scheduler`] for ready made drivers.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --start_delayed--> Scheduled --start tick--> InProgress --target reached--> Stopped
//!    ^                           |                          |
//!    +-------- stop / finish ----+--------------------------+
//! ```

pub mod step;

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex as SetterLock, TryLockError};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::config::{FadeConfig, FadeParam};
use crate::error::FadeError;
use crate::{BrightnessSetter, ChannelId};

/// Lag after which ticks are rebased on the current time
///
/// A caller polling this late gets no burst of catch-up steps.
pub const MAX_DRIFT: Duration = Duration::from_millis(50);

/// Delay before retrying a step whose setter was busy
pub const SETTER_RETRY: Duration = Duration::from_millis(1);

/// Lifecycle of a fade
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FadePhase {
    /// Nothing scheduled
    #[default]
    Stopped,
    /// Waiting for the start delay to elapse
    Scheduled,
    /// Stepping towards the target
    InProgress,
}

/// Snapshot of a fade channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FadeState {
    pub brightness_start: u8,
    /// Brightness applied by the next step
    pub brightness_next: u8,
    pub brightness_target: u8,
    pub phase: FadePhase,
    /// Deadline of the next tick
    pub next_deadline: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Work {
    Start,
    Step,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    at: Instant,
    work: Work,
}

#[derive(Debug)]
struct Inner {
    /// Configuration applied to the next fade
    config: FadeConfig,
    /// Configuration of the running fade
    active: FadeConfig,
    start: u8,
    next: u8,
    target: u8,
    phase: FadePhase,
    pending: Option<Pending>,
    /// Bumped whenever a fade is cancelled
    generation: u32,
    write_failures: u32,
}

impl Inner {
    const fn new(config: FadeConfig) -> Self {
        Self {
            config,
            active: config,
            start: 0,
            next: 0,
            target: 0,
            phase: FadePhase::Stopped,
            pending: None,
            generation: 0,
            write_failures: 0,
        }
    }

    fn state(&self) -> FadeState {
        FadeState {
            brightness_start: self.start,
            brightness_next: self.next,
            brightness_target: self.target,
            phase: self.phase,
            next_deadline: self.pending.map(|pending| pending.at),
        }
    }

    fn cancel(&mut self) {
        if self.phase != FadePhase::Stopped || self.pending.is_some() {
            self.pending = None;
            self.generation = self.generation.wrapping_add(1);
            self.phase = FadePhase::Stopped;
        }
    }

    /// Returns whether a fade is scheduled or running afterwards
    fn start_delayed(&mut self, now: Instant, delay: Duration, from: u8, to: u8) -> bool {
        if from == to && self.phase == FadePhase::Stopped {
            return false;
        }

        if self.phase != FadePhase::Stopped {
            let direction = self.next > self.target;
            let new_direction = self.next > to;
            if direction == new_direction {
                // Keep the running schedule, continue from where we are
                self.start = self.next;
                self.target = to;
                self.active = self.config;
                #[cfg(feature = "esp32-log")]
                println!("[FadeChannel.start_delayed] new target {} for running fade", to);
                return true;
            }
            self.cancel();
        }

        #[cfg(feature = "esp32-log")]
        println!(
            "[FadeChannel.start_delayed] {} from {} to {} after {} ms (interval: {} ms)",
            if self.config.enabled() { "fading" } else { "setting" },
            from,
            to,
            delay.as_millis(),
            self.config.full_interval_ms()
        );

        self.active = self.config;
        self.start = from;
        self.next = from;
        self.target = to;
        self.phase = FadePhase::Scheduled;
        self.pending = Some(Pending {
            at: now + delay,
            work: Work::Start,
        });
        true
    }

    /// Compute the next step and schedule it relative to `base`
    fn schedule_step(&mut self, base: Instant) {
        match step::next_step(self.start, self.next, self.target, &self.active) {
            None => {
                self.pending = None;
                self.phase = FadePhase::Stopped;
            }
            Some(step) => {
                self.next = step.brightness;
                self.pending = Some(Pending {
                    at: base + Duration::from_millis(u64::from(step.wait_ms)),
                    work: Work::Step,
                });
            }
        }
    }
}

/// A single faded brightness channel
///
/// All methods take `&self`, so a channel can sit in a `static` and be shared
/// between the task that drives it and the code that requests fades.
///
/// The fade state lives behind a critical-section mutex that is only held for
/// short bookkeeping. The setter has a lock of its own and runs outside the
/// critical section, so a slow bus write never masks interrupts or blocks
/// `start_delayed`, `stop` and state queries.
pub struct FadeChannel<S> {
    id: ChannelId,
    inner: Mutex<RefCell<Inner>>,
    setter: SetterLock<CriticalSectionRawMutex, S>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl<S: BrightnessSetter> FadeChannel<S> {
    pub const fn new(id: ChannelId, setter: S, config: FadeConfig) -> Self {
        Self {
            id,
            inner: Mutex::new(RefCell::new(Inner::new(config))),
            setter: SetterLock::new(setter),
            wake: Signal::new(),
        }
    }

    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Start a fade from `from` to `to` after `delay`
    ///
    /// A fade already running in the same direction is retargeted without a
    /// restart. A fade running the other way is cancelled and restarted from
    /// `from`. Nothing happens if `from == to` and no fade is running.
    pub fn start_delayed(
        &self,
        now: Instant,
        delay: Duration,
        from: u8,
        to: u8,
    ) -> Result<(), FadeError> {
        let scheduled = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let max = inner.config.brightness_max();
            if let Some(value) = [from, to].into_iter().find(|&value| value > max) {
                return Err(FadeError::BrightnessOutOfRange { value, max });
            }
            Ok(inner.start_delayed(now, delay, from, to))
        })?;

        if scheduled {
            self.wake.signal(());
        }
        Ok(())
    }

    /// Cancel any scheduled or running fade
    ///
    /// Brightness stays at the last applied value. No tick scheduled before
    /// this call fires afterwards. A step that is being written right now
    /// completes, but nothing is scheduled after it.
    pub fn stop(&self) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            #[cfg(feature = "esp32-log")]
            if inner.phase != FadePhase::Stopped {
                println!("[FadeChannel.stop] stopping fade on channel {:?}", self.id);
            }
            inner.cancel();
        });
    }

    /// Apply the target of a running fade at once and stop
    ///
    /// If the setter is busy, for instance when called from within the setter,
    /// the target is written by the next [`poll`](Self::poll) instead.
    pub fn finish(&self) {
        let finished = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.phase == FadePhase::Stopped {
                return None;
            }
            inner.cancel();
            inner.next = inner.target;
            Some((inner.target, inner.generation))
        });
        let Some((target, generation)) = finished else {
            return;
        };

        if let Ok(mut setter) = self.setter.try_lock() {
            self.apply(&mut setter, target);
            return;
        }

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if inner.generation == generation {
                // Stopped, with one final write due at once
                inner.pending = Some(Pending {
                    at: Instant::MIN,
                    work: Work::Step,
                });
            }
        });
        self.wake.signal(());
    }

    /// Fire all ticks due at `now`
    ///
    /// Returns the deadline of the next tick, if any.
    pub fn poll(&self, now: Instant) -> Option<Instant> {
        loop {
            let due = critical_section::with(|cs| {
                let mut inner = self.inner.borrow(cs).borrow_mut();
                match inner.pending {
                    Some(pending) if pending.at <= now => {
                        inner.pending = None;
                        Some((pending, inner.generation, inner.next))
                    }
                    _ => None,
                }
            });
            let Some((pending, generation, brightness)) = due else {
                break;
            };

            let base = if now.saturating_duration_since(pending.at) > MAX_DRIFT {
                now
            } else {
                pending.at
            };

            match pending.work {
                Work::Start => critical_section::with(|cs| {
                    let mut inner = self.inner.borrow(cs).borrow_mut();
                    if inner.generation == generation && inner.phase == FadePhase::Scheduled {
                        inner.phase = FadePhase::InProgress;
                        inner.schedule_step(base);
                    }
                }),
                Work::Step => {
                    let Ok(mut setter) = self.setter.try_lock() else {
                        // Setter in use elsewhere, try the same step again later
                        critical_section::with(|cs| {
                            let mut inner = self.inner.borrow(cs).borrow_mut();
                            if inner.generation == generation && inner.pending.is_none() {
                                inner.pending = Some(Pending {
                                    at: now + SETTER_RETRY,
                                    work: Work::Step,
                                });
                            }
                        });
                        break;
                    };
                    self.apply(&mut setter, brightness);
                    drop(setter);

                    // The setter or another context may have stopped or restarted the fade
                    critical_section::with(|cs| {
                        let mut inner = self.inner.borrow(cs).borrow_mut();
                        if inner.generation == generation && inner.phase == FadePhase::InProgress {
                            inner.schedule_step(base);
                        }
                    });
                }
            }
        }

        self.next_deadline()
    }

    /// Deadline of the next tick
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state().next_deadline
    }

    pub fn state(&self) -> FadeState {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().state())
    }

    pub fn is_active(&self) -> bool {
        self.state().phase != FadePhase::Stopped
    }

    /// Configuration for upcoming fades
    pub fn config(&self) -> FadeConfig {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().config)
    }

    /// Modify the configuration
    ///
    /// A running fade keeps the configuration it was started or retargeted
    /// with.
    pub fn update_config<R>(&self, f: impl FnOnce(&mut FadeConfig) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow(cs).borrow_mut().config))
    }

    pub fn set_param(&self, param: FadeParam, value: u32) -> Result<(), FadeError> {
        self.update_config(|config| config.set(param, value))
    }

    pub fn set_param_from_str(&self, param: FadeParam, input: &str) -> Result<(), FadeError> {
        self.update_config(|config| config.set_from_str(param, input))
    }

    /// Number of setter calls that failed
    pub fn write_failures(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().write_failures)
    }

    /// Access the setter, for device state kept next to it
    ///
    /// Runs outside the critical section. Spins while a step is being written
    /// from another context, so it must not be called from within the setter.
    pub fn with_setter<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut setter = loop {
            match self.setter.try_lock() {
                Ok(setter) => break setter,
                Err(TryLockError) => core::hint::spin_loop(),
            }
        };
        f(&mut setter)
    }

    /// Wait until a fade was started, retargeted or finished
    pub async fn woken(&self) {
        self.wake.wait().await;
    }

    fn apply(&self, setter: &mut S, brightness: u8) {
        if let Err(_err) = setter.set_brightness(self.id, brightness) {
            #[cfg(feature = "esp32-log")]
            println!(
                "[FadeChannel.apply] channel {:?}: setting brightness {} failed: {:?}",
                self.id, brightness, _err
            );
            critical_section::with(|cs| {
                let mut inner = self.inner.borrow(cs).borrow_mut();
                inner.write_failures = inner.write_failures.wrapping_add(1);
            });
        }
    }
}
