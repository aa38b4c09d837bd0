//! Driving fade channels
//!
//! [`tick`] is the portable entry point: it fires whatever is due and tells the
//! caller how long to sleep. [`run`] and [`run_with_requests`] do the sleeping
//! themselves on top of `embassy-time`.
//!
//! # Usage
//!
//! ```ignore
//! loop {
//!     let result = scheduler::tick(&CHANNEL, Instant::now());
//!     match result.sleep_duration {
//!         Some(duration) => sleep_ms(duration.as_millis()),
//!         None => wait_for_request(),
//!     }
//! }
//! ```

use core::convert::Infallible;

use embassy_futures::select::{select, select3};
use embassy_time::{Duration, Instant, Timer};

use crate::fade::FadeChannel;
use crate::request::Receiver;
use crate::BrightnessSetter;

/// Result of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    /// Deadline of the next tick, `None` while idle.
    pub next_deadline: Option<Instant>,
    /// How long to wait until the next tick (zero if behind schedule).
    pub sleep_duration: Option<Duration>,
}

/// Fire all ticks of `channel` due at `now`
pub fn tick<S: BrightnessSetter>(channel: &FadeChannel<S>, now: Instant) -> TickResult {
    let next_deadline = channel.poll(now);
    TickResult {
        next_deadline,
        sleep_duration: next_deadline.map(|deadline| deadline.saturating_duration_since(now)),
    }
}

/// Drive `channel` forever
///
/// Sleeps until the next deadline, or until a fade is started from elsewhere.
pub async fn run<S: BrightnessSetter>(channel: &FadeChannel<S>) -> Infallible {
    loop {
        match channel.poll(Instant::now()) {
            Some(deadline) => {
                select(Timer::at(deadline), channel.woken()).await;
            }
            None => channel.woken().await,
        }
    }
}

/// Drive `channel` forever, applying requests queued on `receiver`
pub async fn run_with_requests<S: BrightnessSetter, const SIZE: usize>(
    channel: &FadeChannel<S>,
    receiver: Receiver<'_, SIZE>,
) -> Infallible {
    loop {
        let now = Instant::now();
        channel.drain_requests(now, &receiver);
        match channel.poll(now) {
            Some(deadline) => {
                select3(Timer::at(deadline), channel.woken(), receiver.ready()).await;
            }
            None => {
                select(channel.woken(), receiver.ready()).await;
            }
        }
    }
}
