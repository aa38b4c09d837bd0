//! Fade step search and interval math
//!
//! A fade from `start` to `target` moves along the curve `ld(b + o)`. The time
//! spent between two brightness values is proportional to their distance on
//! that curve, so a full fade always takes `full_interval`.

use crate::config::FadeConfig;
use crate::ld::{div_round_closest, log_q16};

/// The next brightness of a fade and when to apply it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Brightness to apply once `wait_ms` has elapsed
    pub brightness: u8,
    /// Delay after the previous step, in ms
    pub wait_ms: u32,
}

#[inline]
fn ld(brightness: u8, offset: u32) -> i64 {
    i64::from(log_q16(u32::from(brightness) + offset))
}

/// Distance between `start` and `target` on the log curve
fn span(start: u8, target: u8, offset: u32) -> u64 {
    ld(target, offset).abs_diff(ld(start, offset))
}

/// Find the next brightness such that its step takes at least
/// `min_step_interval`, or the target if it is closer than that
///
/// Always advances by at least one unit towards `target`.
pub fn find_next_brightness(start: u8, cur: u8, target: u8, config: &FadeConfig) -> u8 {
    if cur == target {
        return target;
    }

    let o = config.ld_offset();
    #[allow(clippy::cast_possible_wrap)]
    let share = (u64::from(config.min_step_interval_ms()) * span(start, target, o)
        / u64::from(config.full_interval_ms())) as i64;
    let ld_cur = ld(cur, o);

    if target > cur {
        let limit = ld_cur + share;
        let mut next = cur + 1;
        while next != target && ld(next, o) < limit {
            next += 1;
        }
        next
    } else {
        let limit = ld_cur - share;
        let mut next = cur - 1;
        while next != target && ld(next, o) > limit {
            next -= 1;
        }
        next
    }
}

/// Rounded time in ms at which a fade from `start` passes `brightness`
fn elapsed_ms(start: u8, brightness: u8, span: u64, config: &FadeConfig) -> u64 {
    let o = config.ld_offset();
    let distance = ld(brightness, o).abs_diff(ld(start, o));
    div_round_closest(u64::from(config.full_interval_ms()) * distance, span)
}

/// Compute the step following `cur`, `None` once the target is reached
///
/// With fading disabled the step jumps straight to the target. The wait is
/// taken between rounded positions relative to `start`, so rounding errors do
/// not add up over the fade.
pub fn next_step(start: u8, cur: u8, target: u8, config: &FadeConfig) -> Option<Step> {
    if cur == target {
        return None;
    }

    let span = span(start, target, config.ld_offset());
    if !config.enabled() || span == 0 {
        return Some(Step {
            brightness: target,
            wait_ms: 0,
        });
    }

    let next = find_next_brightness(start, cur, target, config);
    let wait = elapsed_ms(start, next, span, config)
        .saturating_sub(elapsed_ms(start, cur, span, config));

    #[allow(clippy::cast_possible_truncation)]
    Some(Step {
        brightness: next,
        wait_ms: wait as u32,
    })
}
