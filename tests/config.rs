mod tests {
    use embassy_time::Duration;
    use ld_fade::{FadeConfig, FadeError, FadeParam};

    #[test]
    fn test_defaults() {
        let config = FadeConfig::default();
        assert!(config.enabled());
        assert_eq!(config.full_interval_ms(), 400);
        assert_eq!(config.full_interval(), Duration::from_millis(400));
        assert_eq!(config.min_step_interval_ms(), 10);
        assert_eq!(config.min_step_interval(), Duration::from_millis(10));
        assert_eq!(config.ld_offset(), 4);
        assert_eq!(config.brightness_max(), 127);
        assert_eq!(config.ld_offset_max(), 128);
    }

    #[test]
    fn test_offset_limited_by_brightness_max() {
        let config = FadeConfig::new(200);
        assert_eq!(config.ld_offset_max(), 56);
        assert_eq!(config.ld_offset(), 4);

        let mut config = FadeConfig::new(255);
        assert_eq!(config.ld_offset(), 1);
        assert_eq!(config.ld_offset_max(), 1);
        assert_eq!(
            config.set_ld_offset(2),
            Err(FadeError::ConfigOutOfRange {
                param: FadeParam::LdOffset,
                value: 2,
                min: 1,
                max: 1,
            })
        );
    }

    #[test]
    fn test_setters_validate() {
        let mut config = FadeConfig::default();
        assert!(config.set_full_interval_ms(50).is_ok());
        assert!(config.set_full_interval_ms(10_000).is_ok());
        assert!(config.set_full_interval_ms(49).is_err());
        assert!(config.set_full_interval_ms(10_001).is_err());
        assert_eq!(config.full_interval_ms(), 10_000);

        assert!(config.set_min_step_interval_ms(4).is_err());
        assert!(config.set_min_step_interval_ms(101).is_err());
        assert!(config.set_min_step_interval_ms(5).is_ok());
        assert_eq!(config.min_step_interval_ms(), 5);

        assert!(config.set_ld_offset(0).is_err());
        assert!(config.set_ld_offset(129).is_err());
        assert!(config.set_ld_offset(128).is_ok());
        assert_eq!(config.ld_offset(), 128);
    }

    #[test]
    fn test_set_by_param() {
        let mut config = FadeConfig::default();
        config.set(FadeParam::Enabled, 0).unwrap();
        assert!(!config.enabled());
        assert_eq!(config.get(FadeParam::Enabled), 0);

        config.set(FadeParam::FullInterval, 1000).unwrap();
        assert_eq!(config.get(FadeParam::FullInterval), 1000);
        assert_eq!(config.get(FadeParam::MinStepInterval), 10);
        assert_eq!(config.get(FadeParam::LdOffset), 4);
    }

    #[test]
    fn test_with_timing() {
        let config = FadeConfig::default().with_timing(500, 20).unwrap();
        assert_eq!(config.full_interval_ms(), 500);
        assert_eq!(config.min_step_interval_ms(), 20);
        assert_eq!(config.ld_offset(), 4);

        assert_eq!(
            FadeConfig::default().with_timing(500, 200),
            Err(FadeError::ConfigOutOfRange {
                param: FadeParam::MinStepInterval,
                value: 200,
                min: 5,
                max: 100,
            })
        );
        assert!(FadeConfig::default().with_timing(20, 10).is_err());
    }

    #[test]
    fn test_set_from_str() {
        let mut config = FadeConfig::default();
        config.set_from_str(FadeParam::Enabled, "false\n").unwrap();
        assert!(!config.enabled());
        config.set_from_str(FadeParam::Enabled, " 1 ").unwrap();
        assert!(config.enabled());

        config.set_from_str(FadeParam::FullInterval, "750\n").unwrap();
        assert_eq!(config.full_interval_ms(), 750);

        assert_eq!(
            config.set_from_str(FadeParam::FullInterval, "fast"),
            Err(FadeError::InvalidValue {
                param: FadeParam::FullInterval
            })
        );
        assert_eq!(
            config.set_from_str(FadeParam::MinStepInterval, "-5"),
            Err(FadeError::InvalidValue {
                param: FadeParam::MinStepInterval
            })
        );
        assert_eq!(config.full_interval_ms(), 750);
    }

    #[test]
    fn test_set_by_name() {
        let mut config = FadeConfig::default();
        config.set_by_name("min_step_ival", "20\n").unwrap();
        assert_eq!(config.min_step_interval_ms(), 20);
        assert_eq!(
            config.set_by_name("step", "20"),
            Err(FadeError::UnknownParam)
        );
    }

    #[test]
    fn test_param_names() {
        for param in FadeParam::ALL {
            assert_eq!(FadeParam::parse_from_str(param.as_str()), Some(param));
            assert!(param.description().len() > 0);
        }
        assert_eq!(
            FadeParam::parse_from_str("full_ival\n"),
            Some(FadeParam::FullInterval)
        );
        assert_eq!(FadeParam::parse_from_str("speed"), None);
        assert_eq!(FadeParam::Enabled.range(), None);
        assert_eq!(FadeParam::FullInterval.range(), Some((50, 10_000)));
    }

    #[test]
    fn test_error_display() {
        let mut config = FadeConfig::default();
        let err = config.set_full_interval_ms(49).unwrap_err();
        assert_eq!(err.to_string(), "full_ival = 49 not in range [50, 10000]");
        assert_eq!(
            FadeError::BrightnessOutOfRange { value: 200, max: 127 }.to_string(),
            "brightness 200 exceeds maximum 127"
        );
    }
}
