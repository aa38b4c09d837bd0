mod tests {
    use ld_fade::ld::{
        LD_UNDEFINED, LdError, ceil_pow2_q16, div_round_closest, fill_exp, log_q16, try_log_q16,
    };

    #[test]
    fn test_log_known_values() {
        assert_eq!(log_q16(1), 0);
        assert_eq!(log_q16(2), 0x10000);
        assert_eq!(log_q16(3), 0x195c0);
        assert_eq!(log_q16(4), 0x20000);
        assert_eq!(log_q16(128), 0x70000);
        assert_eq!(log_q16(256), 0x80000);
    }

    #[test]
    fn test_log_outside_table() {
        assert_eq!(log_q16(0), LD_UNDEFINED);
        assert_eq!(log_q16(257), LD_UNDEFINED);
        assert_eq!(log_q16(u32::MAX), LD_UNDEFINED);
        assert_eq!(try_log_q16(0), Err(LdError::IndexOutOfRange { index: 0 }));
        assert_eq!(try_log_q16(16), Ok(0x40000));
    }

    #[test]
    fn test_log_strictly_increasing() {
        for x in 1..256 {
            assert!(log_q16(x) < log_q16(x + 1), "x = {x}");
        }
    }

    #[test]
    fn test_ceil_pow2_inverts_log() {
        for x in 1..=256 {
            assert_eq!(ceil_pow2_q16(log_q16(x)), Ok(x));
        }
    }

    #[test]
    fn test_ceil_pow2_rounds_up() {
        assert_eq!(ceil_pow2_q16(0), Ok(1));
        assert_eq!(ceil_pow2_q16(1), Ok(2));
        assert_eq!(ceil_pow2_q16(0x10001), Ok(3));
        assert_eq!(ceil_pow2_q16(0x7fe8f), Ok(256));
        assert_eq!(
            ceil_pow2_q16(0x80001),
            Err(LdError::OutOfRange { value: 0x80001 })
        );
    }

    #[test]
    fn test_div_round_closest() {
        assert_eq!(div_round_closest(10, 4), 3);
        assert_eq!(div_round_closest(9, 4), 2);
        assert_eq!(div_round_closest(0, 7), 0);
    }

    #[test]
    fn test_fill_exp_default_backlight_levels() {
        let mut levels = [0u8; 16];
        fill_exp(&mut levels, 4, 6, 127).unwrap();
        assert_eq!(
            levels,
            [6, 8, 11, 13, 16, 20, 24, 30, 36, 43, 52, 62, 75, 89, 107, 127]
        );
    }

    #[test]
    fn test_fill_exp_hits_both_ends() {
        let mut levels = [0u8; 16];
        fill_exp(&mut levels, 4, 10, 100).unwrap();
        assert_eq!(levels[0], 10);
        assert_eq!(levels[15], 100);
        assert!(levels.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_fill_exp_flat() {
        let mut levels = [0u8; 16];
        fill_exp(&mut levels, 4, 50, 50).unwrap();
        assert_eq!(levels, [50; 16]);
    }

    #[test]
    fn test_fill_exp_rejects_bad_input() {
        let mut levels = [0u8; 16];
        assert_eq!(
            fill_exp(&mut levels, 4, 100, 10),
            Err(LdError::InvalidRange { min: 100, max: 10 })
        );
        assert_eq!(
            fill_exp(&mut levels, 200, 0, 127),
            Err(LdError::IndexOutOfRange { index: 327 })
        );
    }
}
