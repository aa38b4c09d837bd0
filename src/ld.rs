//! Fixed point binary logarithm table
//!
//! Brightness is faded in the log domain to match the logarithmic response of
//! the human eye. Using a precomputed Q16 table keeps all fade math in integers.

use derive_more::{Display, Error};

/// Smallest offset added to a brightness before taking its logarithm
pub const LD_OFFSET_MIN: u32 = 1;
/// Largest offset added to a brightness before taking its logarithm
pub const LD_OFFSET_MAX: u32 = 128;
/// Default offset
pub const LD_OFFSET_DEFAULT: u32 = 4;

/// Largest argument accepted by [`log_q16`]
pub const LD_INDEX_MAX: u32 = 256;

/// Returned by [`log_q16`] for arguments outside of `[1, 256]`
pub const LD_UNDEFINED: u32 = u32::MAX;

/// Errors of the table lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum LdError {
    /// Log value larger than `log_q16(256)`
    #[display("log value {value:#x} exceeds the table range")]
    OutOfRange { value: u32 },
    /// Table index outside of `[1, 256]`
    #[display("table index {index} outside of [1, 256]")]
    IndexOutOfRange { index: u32 },
    /// Lower bound above upper bound
    #[display("minimum {min} greater than maximum {max}")]
    InvalidRange { min: u32, max: u32 },
}

/// `round(log2(x) * 2^16)` for x in `1..=256`, framed by two sentinels
static LD: [u32; 258] = [
    LD_UNDEFINED,
    0x00000, 0x10000, 0x195c0, 0x20000, 0x2526a, 0x295c0, 0x2ceaf, 0x30000,
    0x32b80, 0x3526a, 0x3759d, 0x395c0, 0x3b350, 0x3ceaf, 0x3e82a, 0x40000,
    0x41664, 0x42b80, 0x43f78, 0x4526a, 0x4646f, 0x4759d, 0x48608, 0x495c0,
    0x4a4d4, 0x4b350, 0x4c140, 0x4ceaf, 0x4dba5, 0x4e82a, 0x4f446, 0x50000,
    0x50b5d, 0x51664, 0x52119, 0x52b80, 0x5359f, 0x53f78, 0x54910, 0x5526a,
    0x55b89, 0x5646f, 0x56d20, 0x5759d, 0x57dea, 0x58608, 0x58dfa, 0x595c0,
    0x59d5e, 0x5a4d4, 0x5ac24, 0x5b350, 0x5ba59, 0x5c140, 0x5c807, 0x5ceaf,
    0x5d538, 0x5dba5, 0x5e1f5, 0x5e82a, 0x5ee45, 0x5f446, 0x5fa2f, 0x60000,
    0x605ba, 0x60b5d, 0x610eb, 0x61664, 0x61bc8, 0x62119, 0x62656, 0x62b80,
    0x63098, 0x6359f, 0x63a94, 0x63f78, 0x6444c, 0x64910, 0x64dc5, 0x6526a,
    0x65700, 0x65b89, 0x66003, 0x6646f, 0x668ce, 0x66d20, 0x67165, 0x6759d,
    0x679ca, 0x67dea, 0x681ff, 0x68608, 0x68a06, 0x68dfa, 0x691e2, 0x695c0,
    0x69994, 0x69d5e, 0x6a11e, 0x6a4d4, 0x6a881, 0x6ac24, 0x6afbe, 0x6b350,
    0x6b6d9, 0x6ba59, 0x6bdd1, 0x6c140, 0x6c4a8, 0x6c807, 0x6cb5f, 0x6ceaf,
    0x6d1f7, 0x6d538, 0x6d872, 0x6dba5, 0x6ded0, 0x6e1f5, 0x6e513, 0x6e82a,
    0x6eb3b, 0x6ee45, 0x6f149, 0x6f446, 0x6f73e, 0x6fa2f, 0x6fd1a, 0x70000,
    0x702e0, 0x705ba, 0x7088e, 0x70b5d, 0x70e27, 0x710eb, 0x713aa, 0x71664,
    0x71919, 0x71bc8, 0x71e73, 0x72119, 0x723ba, 0x72656, 0x728ed, 0x72b80,
    0x72e0f, 0x73098, 0x7331e, 0x7359f, 0x7381b, 0x73a94, 0x73d08, 0x73f78,
    0x741e4, 0x7444c, 0x746b0, 0x74910, 0x74b6c, 0x74dc5, 0x75019, 0x7526a,
    0x754b7, 0x75700, 0x75946, 0x75b89, 0x75dc7, 0x76003, 0x7623a, 0x7646f,
    0x766a0, 0x768ce, 0x76af8, 0x76d20, 0x76f44, 0x77165, 0x77383, 0x7759d,
    0x777b5, 0x779ca, 0x77bdb, 0x77dea, 0x77ff6, 0x781ff, 0x78405, 0x78608,
    0x78809, 0x78a06, 0x78c01, 0x78dfa, 0x78fef, 0x791e2, 0x793d2, 0x795c0,
    0x797ab, 0x79994, 0x79b7a, 0x79d5e, 0x79f3f, 0x7a11e, 0x7a2fa, 0x7a4d4,
    0x7a6ab, 0x7a881, 0x7aa53, 0x7ac24, 0x7adf2, 0x7afbe, 0x7b188, 0x7b350,
    0x7b515, 0x7b6d9, 0x7b89a, 0x7ba59, 0x7bc16, 0x7bdd1, 0x7bf8a, 0x7c140,
    0x7c2f5, 0x7c4a8, 0x7c658, 0x7c807, 0x7c9b4, 0x7cb5f, 0x7cd08, 0x7ceaf,
    0x7d054, 0x7d1f7, 0x7d399, 0x7d538, 0x7d6d6, 0x7d872, 0x7da0c, 0x7dba5,
    0x7dd3b, 0x7ded0, 0x7e063, 0x7e1f5, 0x7e385, 0x7e513, 0x7e69f, 0x7e82a,
    0x7e9b3, 0x7eb3b, 0x7ecc1, 0x7ee45, 0x7efc8, 0x7f149, 0x7f2c8, 0x7f446,
    0x7f5c3, 0x7f73e, 0x7f8b7, 0x7fa2f, 0x7fba5, 0x7fd1a, 0x7fe8e, 0x80000,
    LD_UNDEFINED,
];

/// `round(log2(x) * 2^16)` for `1 <= x <= 256`
///
/// Returns [`LD_UNDEFINED`] for any other `x`. That value is a marker, never a
/// magnitude.
#[inline]
pub fn log_q16(x: u32) -> u32 {
    if x == 0 || x > LD_INDEX_MAX {
        return LD_UNDEFINED;
    }
    LD.get(x as usize).copied().unwrap_or(LD_UNDEFINED)
}

/// Checked variant of [`log_q16`]
#[inline]
pub fn try_log_q16(x: u32) -> Result<u32, LdError> {
    match log_q16(x) {
        LD_UNDEFINED => Err(LdError::IndexOutOfRange { index: x }),
        value => Ok(value),
    }
}

/// `ceil(2^(v / 2^16))`, the smallest `x` in `[1, 256]` with `log_q16(x) >= v`
pub fn ceil_pow2_q16(v: u32) -> Result<u32, LdError> {
    let defined = &LD[1..=LD_INDEX_MAX as usize];
    let idx = defined.partition_point(|&ld| ld < v);
    if idx == defined.len() {
        return Err(LdError::OutOfRange { value: v });
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(idx as u32 + 1)
}

/// Unsigned integer division rounding to the closest integer
#[inline]
pub const fn div_round_closest(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}

/// Fill `levels` exponentially from `min` to `max`, respecting `offset`
///
/// `levels[i] = (min + o) * ((max + o) / (min + o)) ^ (i / (n - 1)) - o`,
/// evaluated in the log domain and rounded up to the next table index.
pub fn fill_exp(levels: &mut [u8], offset: u32, min: u8, max: u8) -> Result<(), LdError> {
    if min > max {
        return Err(LdError::InvalidRange {
            min: u32::from(min),
            max: u32::from(max),
        });
    }

    let lower = try_log_q16(u32::from(min) + offset)?;
    let upper = try_log_q16(u32::from(max) + offset)?;
    let span = u64::from(upper - lower);
    let steps = levels.len().saturating_sub(1).max(1) as u64;

    for (i, level) in levels.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let ld = lower + div_round_closest(i as u64 * span, steps) as u32;
        let value = ceil_pow2_q16(ld)? - offset;
        #[allow(clippy::cast_possible_truncation)]
        {
            *level = value.min(u32::from(max)) as u8;
        }
    }

    Ok(())
}
