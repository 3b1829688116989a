//! Resolution pipeline: per-field constraint validation against the model
//! table, cross-field reconciliation, and construction of the final
//! configuration.
//!
//! Each stage collects every violation it can see before failing, but a stage
//! never runs on the output of a failed predecessor: parse errors stop
//! validation, validation errors stop reconciliation, and the builder only
//! ever assembles a fully validated set.

use crate::config::{
    AcquisitionSettings, ChannelSettings, ResolvedConfiguration, TriggerSettings,
};
use crate::model::HardwareModel;
use crate::settings::{
    ParsedAcquisition, ParsedChannel, ParsedTrigger, ParsedValues,
    AcquisitionSection, ChannelSection, SettingValue, Settings, TriggerSection,
};
use crate::{Error, Result, SettingError};

impl ResolvedConfiguration {
    /// Resolves raw settings into a configuration for `model`.
    ///
    /// On failure, returns [`Error::Invalid`] carrying every violated field
    /// found in the stage that failed, so a settings file can be fixed in one
    /// editing pass instead of one error at a time.
    pub fn derive(settings: &Settings, model: &HardwareModel) -> Result<ResolvedConfiguration> {
        let values = settings.parse().map_err(Error::Invalid)?;
        validate(&values, model).map_err(Error::Invalid)?;
        reconcile(&values).map_err(Error::Invalid)?;
        let config = build(&values, model);
        log::debug!("resolved configuration for {}: {} segments of {} samples, \
                     {:.3e} s window", model.id, config.acquisition.segment_count,
            config.acquisition.samples_per_segment, config.acquisition_window_secs);
        Ok(config)
    }

    /// Re-serializes the configuration as a normalized settings source.
    ///
    /// Resolving the result reproduces this configuration exactly, which is
    /// how a committed settings file gets rewritten in canonical form.
    pub fn to_settings(&self) -> Settings {
        Settings {
            trigger: TriggerSection {
                condition: SettingValue::Text(self.trigger.polarity.token().into()),
                level: SettingValue::Integer(self.trigger.level_percent.into()),
                source: SettingValue::Text(self.trigger.source.token().into()),
                range: Some(SettingValue::Integer(self.trigger.range_mv.into())),
            },
            acquisition: AcquisitionSection {
                mode: SettingValue::Text(self.acquisition.mode.token().into()),
                sample_rate: SettingValue::Float(self.acquisition.sample_rate_hz),
                n_samples: SettingValue::Integer(self.acquisition.samples_per_segment as i64),
                trigger_delay: SettingValue::Integer(self.acquisition.trigger_delay_samples as i64),
                segment_count: SettingValue::Integer(self.acquisition.segment_count as i64),
                depth: None,
            },
            channel: ChannelSection {
                channel: SettingValue::Integer(self.channel.channel_index.into()),
                range: SettingValue::Integer(self.channel.range_mv.into()),
                dc_offset: SettingValue::Integer(self.channel.dc_offset_mv.into()),
                coupling: None,
                impedance: None,
            },
        }
    }
}

fn validate(values: &ParsedValues, model: &HardwareModel)
        -> core::result::Result<(), Vec<SettingError>> {
    let mut errors = Vec::new();
    validate_trigger(&values.trigger, model, &mut errors);
    validate_acquisition(&values.acquisition, model, &mut errors);
    validate_channel(&values.channel, model, &mut errors);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_trigger(trigger: &ParsedTrigger, model: &HardwareModel,
        errors: &mut Vec<SettingError>) {
    if !(0..=100).contains(&trigger.level_percent) {
        errors.push(SettingError::OutOfRange {
            field: "trigger.level",
            value: trigger.level_percent.to_string(),
            limits: "0 to 100 percent of the trigger range".into(),
        });
    }
    if let Some(range_mv) = trigger.range_mv {
        let supported = model.supported_ext_trigger_ranges_mv.iter()
            .any(|&supported_mv| i64::from(supported_mv) == range_mv);
        if !supported {
            errors.push(SettingError::UnsupportedHardwareConfiguration {
                field: "trigger.range",
                value: format!("{} mV", range_mv),
                model: model.id,
            });
        }
    }
}

fn validate_acquisition(acquisition: &ParsedAcquisition, model: &HardwareModel,
        errors: &mut Vec<SettingError>) {
    if !model.supported_modes.contains(&acquisition.mode) {
        errors.push(SettingError::UnsupportedHardwareConfiguration {
            field: "acquisition.mode",
            value: acquisition.mode.token().into(),
            model: model.id,
        });
    }
    if !(acquisition.sample_rate_hz > 0.0
            && acquisition.sample_rate_hz <= model.max_sample_rate_hz) {
        errors.push(SettingError::OutOfRange {
            field: "acquisition.sample_rate",
            value: format!("{} Hz", acquisition.sample_rate_hz),
            limits: format!("(0, {}] Hz", model.max_sample_rate_hz),
        });
    }
    // Firmware support for non-power-of-two depths is not guaranteed, so an
    // odd depth is rejected instead of rounded.
    let samples = acquisition.samples_per_segment;
    if samples <= 0 || !(samples as u64).is_power_of_two() {
        errors.push(SettingError::InvalidDepth {
            field: "acquisition.n_samples",
            value: samples,
        });
    }
    if acquisition.trigger_delay_samples < 0 {
        errors.push(SettingError::OutOfRange {
            field: "acquisition.trigger_delay",
            value: acquisition.trigger_delay_samples.to_string(),
            limits: "non-negative sample counts".into(),
        });
    }
    if acquisition.segment_count < 1 {
        errors.push(SettingError::OutOfRange {
            field: "acquisition.segment_count",
            value: acquisition.segment_count.to_string(),
            limits: "1 or more segments".into(),
        });
    } else if samples > 0 {
        let required_bytes = (acquisition.segment_count as u64)
            .saturating_mul(samples as u64)
            .saturating_mul(model.bytes_per_sample.into());
        if required_bytes > model.onboard_memory_bytes {
            errors.push(SettingError::InsufficientMemory {
                required_bytes,
                available_bytes: model.onboard_memory_bytes,
                model: model.id,
            });
        }
    }
}

fn validate_channel(channel: &ParsedChannel, model: &HardwareModel,
        errors: &mut Vec<SettingError>) {
    let index_supported = u32::try_from(channel.index).ok()
        .is_some_and(|index| model.supported_channels.contains(&index));
    if !index_supported {
        errors.push(SettingError::UnsupportedHardwareConfiguration {
            field: "channel.channel",
            value: channel.index.to_string(),
            model: model.id,
        });
    }
    let range_supported = u32::try_from(channel.range_mv).ok()
        .is_some_and(|range| model.supported_ranges_mv.contains(&range));
    if !range_supported {
        errors.push(SettingError::UnsupportedHardwareConfiguration {
            field: "channel.range",
            value: format!("{} mV", channel.range_mv),
            model: model.id,
        });
    }
    let half_range = channel.range_mv / 2;
    if channel.dc_offset_mv.abs() > half_range {
        errors.push(SettingError::OutOfRange {
            field: "channel.dc_offset",
            value: format!("{} mV", channel.dc_offset_mv),
            limits: format!("±{} mV", half_range),
        });
    }
}

fn reconcile(values: &ParsedValues) -> core::result::Result<(), Vec<SettingError>> {
    let mut errors = Vec::new();
    let acquisition = &values.acquisition;
    if let Some(depth) = acquisition.depth {
        if depth != acquisition.samples_per_segment {
            errors.push(SettingError::InconsistentDepthSegmentSize {
                depth,
                segment_size: acquisition.samples_per_segment,
            });
        }
    }
    // With no pre-trigger capture, a delay longer than one segment would
    // start the capture after the return pulse has already passed.
    if acquisition.trigger_delay_samples > acquisition.samples_per_segment {
        errors.push(SettingError::DelayExceedsWindow {
            delay_samples: acquisition.trigger_delay_samples,
            window_samples: acquisition.samples_per_segment,
        });
    }
    reconcile_offset_polarity(&values.trigger, &values.channel, &mut errors);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Extension point for asymmetric input constraints: a negative-going PMT
/// pulse leaves less headroom below the DC offset than above it. Nothing is
/// enforced beyond the per-field range check yet.
fn reconcile_offset_polarity(_trigger: &ParsedTrigger, _channel: &ParsedChannel,
        _errors: &mut Vec<SettingError>) {
}

fn build(values: &ParsedValues, model: &HardwareModel) -> ResolvedConfiguration {
    let trigger = TriggerSettings {
        polarity: values.trigger.polarity,
        level_percent: values.trigger.level_percent as u8,
        source: values.trigger.source,
        range_mv: match values.trigger.range_mv {
            Some(range_mv) => range_mv as u32,
            None => model.default_ext_trigger_range_mv(),
        },
    };
    let acquisition = AcquisitionSettings {
        mode: values.acquisition.mode,
        sample_rate_hz: values.acquisition.sample_rate_hz,
        samples_per_segment: values.acquisition.samples_per_segment as u64,
        trigger_delay_samples: values.acquisition.trigger_delay_samples as u64,
        segment_count: values.acquisition.segment_count as u64,
    };
    let channel = ChannelSettings {
        channel_index: values.channel.index as u32,
        range_mv: values.channel.range_mv as u32,
        dc_offset_mv: values.channel.dc_offset_mv as i32,
    };
    ResolvedConfiguration {
        trigger,
        acquisition,
        channel,
        acquisition_window_secs:
            acquisition.samples_per_segment as f64 / acquisition.sample_rate_hz,
        memory_required_bytes: acquisition.segment_count
            * acquisition.samples_per_segment
            * u64::from(model.bytes_per_sample),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{AcquisitionMode, EdgePolarity, TriggerSource};
    use crate::model::{CSE161G, CSE16500};

    const SCENARIO: &str = "\
        [trigger]\n\
        condition = \"n\"\n\
        level = 30\n\
        source = 1\n\
        [acquisition]\n\
        mode = 1\n\
        sample_rate = 500e6\n\
        n_samples = 1024\n\
        trigger_delay = 256\n\
        segment_count = 32\n\
        [channel]\n\
        channel = 1\n\
        range = 2000\n\
        dc_offset = 500\n";

    fn scenario(overrides: &[(&str, &str)]) -> Settings {
        let text = SCENARIO.lines()
            .map(|line| {
                let key = line.split(" =").next().unwrap_or("");
                match overrides.iter().find(|(name, _)| *name == key) {
                    Some((name, value)) => format!("{} = {}", name, value),
                    None => line.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        text.parse().unwrap()
    }

    fn setting_errors(result: Result<ResolvedConfiguration>) -> Vec<SettingError> {
        match result {
            Err(Error::Invalid(errors)) => errors,
            other => panic!("expected Error::Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_scenario_resolves() {
        let config = ResolvedConfiguration::derive(&scenario(&[]), &CSE161G).unwrap();
        assert_eq!(config.trigger.polarity, EdgePolarity::Falling);
        assert_eq!(config.trigger.level_percent, 30);
        assert_eq!(config.trigger.source, TriggerSource::External);
        assert_eq!(config.trigger.range_mv, 3000);
        assert_eq!(config.acquisition.mode, AcquisitionMode::Single);
        assert_eq!(config.acquisition.sample_rate_hz, 500e6);
        assert_eq!(config.acquisition.samples_per_segment, 1024);
        assert_eq!(config.acquisition.trigger_delay_samples, 256);
        assert_eq!(config.acquisition.segment_count, 32);
        assert_eq!(config.channel.channel_index, 1);
        assert_eq!(config.channel.range_mv, 2000);
        assert_eq!(config.channel.dc_offset_mv, 500);
        assert_eq!(config.acquisition_window_secs, 1024.0 / 500e6);
        assert_eq!(config.memory_required_bytes, 32 * 1024 * 2);
    }

    #[test]
    fn test_depth_not_power_of_two() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("n_samples", "1000")]), &CSE161G));
        assert_eq!(errors, vec![SettingError::InvalidDepth {
            field: "acquisition.n_samples",
            value: 1000,
        }]);
    }

    #[test]
    fn test_power_of_two_depths_resolve() {
        for exponent in 0..20 {
            let samples = 1i64 << exponent;
            let settings = scenario(&[
                ("n_samples", &samples.to_string()),
                ("trigger_delay", "0"),
            ]);
            let config = ResolvedConfiguration::derive(&settings, &CSE161G).unwrap();
            assert_eq!(config.acquisition.samples_per_segment, samples as u64);
        }
    }

    #[test]
    fn test_unsupported_range() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("range", "1500")]), &CSE161G));
        assert_eq!(errors, vec![SettingError::UnsupportedHardwareConfiguration {
            field: "channel.range",
            value: "1500 mV".into(),
            model: "CSE161G",
        }]);
    }

    #[test]
    fn test_offset_beyond_half_range() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("dc_offset", "1500")]), &CSE161G));
        assert_eq!(errors, vec![SettingError::OutOfRange {
            field: "channel.dc_offset",
            value: "1500 mV".into(),
            limits: "±1000 mV".into(),
        }]);
    }

    #[test]
    fn test_sample_rate_boundary() {
        let at_max = scenario(&[("sample_rate", "1e9")]);
        let config = ResolvedConfiguration::derive(&at_max, &CSE161G).unwrap();
        assert_eq!(config.acquisition.sample_rate_hz, 1e9);

        let above_max = scenario(&[("sample_rate", "1000000001")]);
        let errors = setting_errors(ResolvedConfiguration::derive(&above_max, &CSE161G));
        assert!(matches!(errors[..],
            [SettingError::OutOfRange { field: "acquisition.sample_rate", .. }]));
    }

    #[test]
    fn test_model_table_is_injected() {
        // the same settings that max out the CSE161G overrun the slower card
        let settings = scenario(&[("sample_rate", "1e9")]);
        assert!(ResolvedConfiguration::derive(&settings, &CSE161G).is_ok());
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE16500));
        assert!(matches!(errors[..],
            [SettingError::OutOfRange { field: "acquisition.sample_rate", .. }]));
    }

    #[test]
    fn test_unsupported_channel_and_mode() {
        let settings = scenario(&[("channel", "2"), ("mode", "\"dual\"")]);
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE161G));
        assert_eq!(errors, vec![
            SettingError::UnsupportedHardwareConfiguration {
                field: "acquisition.mode",
                value: "dual".into(),
                model: "CSE161G",
            },
            SettingError::UnsupportedHardwareConfiguration {
                field: "channel.channel",
                value: "2".into(),
                model: "CSE161G",
            },
        ]);
    }

    #[test]
    fn test_unsupported_ext_trigger_range() {
        let settings: Settings = SCENARIO.replace("source = 1", "source = 1\nrange = 4000")
            .parse().unwrap();
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE161G));
        assert_eq!(errors, vec![SettingError::UnsupportedHardwareConfiguration {
            field: "trigger.range",
            value: "4000 mV".into(),
            model: "CSE161G",
        }]);
    }

    #[test]
    fn test_level_out_of_range() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("level", "101")]), &CSE161G));
        assert!(matches!(errors[..],
            [SettingError::OutOfRange { field: "trigger.level", .. }]));
    }

    #[test]
    fn test_negative_delay() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("trigger_delay", "-5")]), &CSE161G));
        assert!(matches!(errors[..],
            [SettingError::OutOfRange { field: "acquisition.trigger_delay", .. }]));
    }

    #[test]
    fn test_zero_segments() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("segment_count", "0")]), &CSE161G));
        assert!(matches!(errors[..],
            [SettingError::OutOfRange { field: "acquisition.segment_count", .. }]));
    }

    #[test]
    fn test_insufficient_memory() {
        // 2^16 segments of 2^16 samples at 2 bytes each is 8 GiB
        let settings = scenario(&[
            ("n_samples", "65536"),
            ("segment_count", "65536"),
            ("trigger_delay", "0"),
        ]);
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE161G));
        assert_eq!(errors, vec![SettingError::InsufficientMemory {
            required_bytes: 65536 * 65536 * 2,
            available_bytes: 2 * 1024 * 1024 * 1024,
            model: "CSE161G",
        }]);
    }

    #[test]
    fn test_delay_exceeds_window() {
        let errors = setting_errors(
            ResolvedConfiguration::derive(&scenario(&[("trigger_delay", "2048")]), &CSE161G));
        assert_eq!(errors, vec![SettingError::DelayExceedsWindow {
            delay_samples: 2048,
            window_samples: 1024,
        }]);
    }

    #[test]
    fn test_explicit_depth_must_match_segment_size() {
        let settings: Settings = SCENARIO.replace("n_samples = 1024", "n_samples = 1024\ndepth = 512")
            .parse().unwrap();
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE161G));
        assert_eq!(errors, vec![SettingError::InconsistentDepthSegmentSize {
            depth: 512,
            segment_size: 1024,
        }]);

        let settings: Settings = SCENARIO.replace("n_samples = 1024", "n_samples = 1024\ndepth = 1024")
            .parse().unwrap();
        assert!(ResolvedConfiguration::derive(&settings, &CSE161G).is_ok());
    }

    #[test]
    fn test_all_violations_reported_at_once() {
        let settings = scenario(&[
            ("level", "150"),
            ("n_samples", "1000"),
            ("dc_offset", "1500"),
        ]);
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE161G));
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|error| matches!(error,
            SettingError::OutOfRange { field: "trigger.level", .. })));
        assert!(errors.iter().any(|error| matches!(error,
            SettingError::InvalidDepth { field: "acquisition.n_samples", .. })));
        assert!(errors.iter().any(|error| matches!(error,
            SettingError::OutOfRange { field: "channel.dc_offset", .. })));
    }

    #[test]
    fn test_reconciler_requires_valid_fields() {
        // 1000 samples is rejected by validation; the delay check never runs
        // on the unvalidated depth
        let settings = scenario(&[("n_samples", "1000"), ("trigger_delay", "2048")]);
        let errors = setting_errors(ResolvedConfiguration::derive(&settings, &CSE161G));
        assert_eq!(errors, vec![SettingError::InvalidDepth {
            field: "acquisition.n_samples",
            value: 1000,
        }]);
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let first = ResolvedConfiguration::derive(&scenario(&[]), &CSE161G).unwrap();
        let reserialized = toml::to_string(&first.to_settings()).unwrap();
        let second = ResolvedConfiguration::derive(
            &reserialized.parse().unwrap(), &CSE161G).unwrap();
        assert_eq!(first, second);
    }
}
