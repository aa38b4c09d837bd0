//! Fade requests from other contexts
//!
//! A bounded queue built on `critical-section` and `heapless::Deque`. Producers
//! such as an interrupt handler or a console task push [`FadeRequest`]s, the
//! task driving the [`FadeChannel`] drains them.

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};
use heapless::Deque;

use crate::error::FadeError;
use crate::fade::FadeChannel;
use crate::BrightnessSetter;

/// Work requested for a fade channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeRequest {
    /// See [`FadeChannel::start_delayed`]
    Start { delay: Duration, from: u8, to: u8 },
    /// See [`FadeChannel::stop`]
    Stop,
    /// See [`FadeChannel::finish`]
    Finish,
}

impl FadeRequest {
    /// Start right away
    pub const fn start(from: u8, to: u8) -> Self {
        Self::Start {
            delay: Duration::from_ticks(0),
            from,
            to,
        }
    }
}

/// Error returned when trying to send to a full channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrySendError(pub FadeRequest);

/// Error returned when trying to receive from an empty channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryReceiveError;

/// A bounded queue of fade requests.
pub struct RequestChannel<const SIZE: usize> {
    queue: Mutex<RefCell<Deque<FadeRequest, SIZE>>>,
    ready: Signal<CriticalSectionRawMutex, ()>,
}

impl<const SIZE: usize> RequestChannel<SIZE> {
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RefCell::new(Deque::new())),
            ready: Signal::new(),
        }
    }

    /// Multiple senders can coexist; they share access to the same queue.
    pub const fn sender(&self) -> Sender<'_, SIZE> {
        Sender { channel: self }
    }

    pub const fn receiver(&self) -> Receiver<'_, SIZE> {
        Receiver { channel: self }
    }

    /// Returns `Err(TrySendError(request))` if the channel is full.
    pub fn try_send(&self, request: FadeRequest) -> Result<(), TrySendError> {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow(cs).borrow_mut();
            queue.push_back(request).map_err(TrySendError)
        })?;
        self.ready.signal(());
        Ok(())
    }

    pub fn try_receive(&self) -> Result<FadeRequest, TryReceiveError> {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow(cs).borrow_mut();
            queue.pop_front().ok_or(TryReceiveError)
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const SIZE: usize> Default for RequestChannel<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// A sender handle for a [`RequestChannel`].
#[derive(Clone, Copy)]
pub struct Sender<'a, const SIZE: usize> {
    channel: &'a RequestChannel<SIZE>,
}

impl<const SIZE: usize> Sender<'_, SIZE> {
    pub fn try_send(&self, request: FadeRequest) -> Result<(), TrySendError> {
        self.channel.try_send(request)
    }
}

/// A receiver handle for a [`RequestChannel`].
#[derive(Clone, Copy)]
pub struct Receiver<'a, const SIZE: usize> {
    channel: &'a RequestChannel<SIZE>,
}

impl<const SIZE: usize> Receiver<'_, SIZE> {
    pub fn try_receive(&self) -> Result<FadeRequest, TryReceiveError> {
        self.channel.try_receive()
    }

    /// Wait until a request was sent
    ///
    /// May return spuriously; drain with [`Receiver::try_receive`] afterwards.
    pub async fn ready(&self) {
        self.channel.ready.wait().await;
    }
}

impl<S: BrightnessSetter> FadeChannel<S> {
    /// Apply a queued request
    pub fn apply_request(&self, now: Instant, request: FadeRequest) -> Result<(), FadeError> {
        match request {
            FadeRequest::Start { delay, from, to } => self.start_delayed(now, delay, from, to),
            FadeRequest::Stop => {
                self.stop();
                Ok(())
            }
            FadeRequest::Finish => {
                self.finish();
                Ok(())
            }
        }
    }

    /// Apply all queued requests, returning how many were rejected
    pub fn drain_requests<const SIZE: usize>(
        &self,
        now: Instant,
        receiver: &Receiver<'_, SIZE>,
    ) -> usize {
        let mut rejected = 0;
        while let Ok(request) = receiver.try_receive() {
            if let Err(_err) = self.apply_request(now, request) {
                #[cfg(feature = "esp32-log")]
                esp_println::println!(
                    "[FadeChannel.drain_requests] {:?} rejected: {}",
                    request,
                    _err
                );
                rejected += 1;
            }
        }
        rejected
    }
}
