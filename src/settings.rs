//! Settings file schema and per-field value parsing.
//!
//! The settings source is a TOML file with `[trigger]`, `[acquisition]` and
//! `[channel]` sections. Values arrive either as quoted tokens or as bare
//! numbers (including scientific notation, e.g. `500e6`); this module turns
//! them into typed domain values without consulting the hardware model.
//! Unknown sections or keys fail deserialization outright, and keys that name
//! hardware options the card cannot actually vary are rejected one by one.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{AcquisitionMode, EdgePolarity, TriggerSource};
use crate::{Error, Result, SettingError};

/// A raw setting as it appears in the file: a bare number or a quoted token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSection {
    pub condition: SettingValue,
    pub level: SettingValue,
    pub source: SettingValue,
    /// Full-scale range of the external trigger input, in millivolts.
    /// Defaults to the first range the model table lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SettingValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionSection {
    pub mode: SettingValue,
    pub sample_rate: SettingValue,
    pub n_samples: SettingValue,
    pub trigger_delay: SettingValue,
    pub segment_count: SettingValue,
    /// The driver-level depth parameter. When present it must equal
    /// `n_samples`; the card captures no pre-trigger samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<SettingValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    pub channel: SettingValue,
    pub range: SettingValue,
    pub dc_offset: SettingValue,
    // Fixed by the analog front end. Declared so a stale key fails loudly
    // instead of being silently ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupling: Option<SettingValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impedance: Option<SettingValue>,
}

/// The raw settings source, read once and parsed in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub trigger: TriggerSection,
    pub acquisition: AcquisitionSection,
    pub channel: ChannelSection,
}

impl FromStr for Settings {
    type Err = Error;

    fn from_str(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    pub(crate) fn parse(&self) -> core::result::Result<ParsedValues, Vec<SettingError>> {
        let trigger = self.trigger.parse();
        let acquisition = self.acquisition.parse();
        let channel = self.channel.parse();
        match (trigger, acquisition, channel) {
            (Ok(trigger), Ok(acquisition), Ok(channel)) =>
                Ok(ParsedValues { trigger, acquisition, channel }),
            (trigger, acquisition, channel) =>
                Err(trigger.err().into_iter()
                    .chain(acquisition.err())
                    .chain(channel.err())
                    .flatten()
                    .collect()),
        }
    }
}

/// Typed values straight out of the parser. Counts stay signed here; sign
/// and limit checks belong to the validation stage, which reports them
/// alongside every other violation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedValues {
    pub trigger: ParsedTrigger,
    pub acquisition: ParsedAcquisition,
    pub channel: ParsedChannel,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedTrigger {
    pub polarity: EdgePolarity,
    pub level_percent: i64,
    pub source: TriggerSource,
    pub range_mv: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedAcquisition {
    pub mode: AcquisitionMode,
    pub sample_rate_hz: f64,
    pub samples_per_segment: i64,
    pub trigger_delay_samples: i64,
    pub segment_count: i64,
    pub depth: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedChannel {
    pub index: i64,
    pub range_mv: i64,
    pub dc_offset_mv: i64,
}

impl TriggerSection {
    fn parse(&self) -> core::result::Result<ParsedTrigger, Vec<SettingError>> {
        let polarity = parse_edge("trigger.condition", &self.condition);
        let level = parse_integer("trigger.level", &self.level);
        let source = parse_source("trigger.source", &self.source);
        let range = self.range.as_ref()
            .map(|value| parse_integer("trigger.range", value))
            .transpose();
        match (polarity, level, source, range) {
            (Ok(polarity), Ok(level_percent), Ok(source), Ok(range_mv)) =>
                Ok(ParsedTrigger { polarity, level_percent, source, range_mv }),
            (polarity, level, source, range) =>
                Err([polarity.err(), level.err(), source.err(), range.err()]
                    .into_iter().flatten().collect()),
        }
    }
}

impl AcquisitionSection {
    fn parse(&self) -> core::result::Result<ParsedAcquisition, Vec<SettingError>> {
        let mode = parse_mode("acquisition.mode", &self.mode);
        let rate = parse_frequency("acquisition.sample_rate", &self.sample_rate);
        let samples = parse_integer("acquisition.n_samples", &self.n_samples);
        let delay = parse_integer("acquisition.trigger_delay", &self.trigger_delay);
        let segments = parse_integer("acquisition.segment_count", &self.segment_count);
        let depth = self.depth.as_ref()
            .map(|value| parse_integer("acquisition.depth", value))
            .transpose();
        match (mode, rate, samples, delay, segments, depth) {
            (Ok(mode), Ok(sample_rate_hz), Ok(samples_per_segment),
                    Ok(trigger_delay_samples), Ok(segment_count), Ok(depth)) =>
                Ok(ParsedAcquisition {
                    mode,
                    sample_rate_hz,
                    samples_per_segment,
                    trigger_delay_samples,
                    segment_count,
                    depth,
                }),
            (mode, rate, samples, delay, segments, depth) =>
                Err([mode.err(), rate.err(), samples.err(),
                     delay.err(), segments.err(), depth.err()]
                    .into_iter().flatten().collect()),
        }
    }
}

impl ChannelSection {
    fn parse(&self) -> core::result::Result<ParsedChannel, Vec<SettingError>> {
        let mut errors = Vec::new();
        if self.coupling.is_some() {
            errors.push(SettingError::UnsupportedOption { field: "channel.coupling" });
        }
        if self.impedance.is_some() {
            errors.push(SettingError::UnsupportedOption { field: "channel.impedance" });
        }
        let index = parse_integer("channel.channel", &self.channel);
        let range = parse_integer("channel.range", &self.range);
        let offset = parse_integer("channel.dc_offset", &self.dc_offset);
        match (index, range, offset) {
            (Ok(index), Ok(range_mv), Ok(dc_offset_mv)) if errors.is_empty() =>
                Ok(ParsedChannel { index, range_mv, dc_offset_mv }),
            (index, range, offset) => {
                errors.extend([index.err(), range.err(), offset.err()]
                    .into_iter().flatten());
                Err(errors)
            }
        }
    }
}

fn parse_edge(field: &'static str, value: &SettingValue)
        -> core::result::Result<EdgePolarity, SettingError> {
    const EXPECTED: &str =
        r#""rising", "r", "positive", "p", 1, "falling", "f", "negative", "n", 0"#;
    match value {
        SettingValue::Text(token) => match token.to_lowercase().as_str() {
            "rising" | "r" | "positive" | "p" => Ok(EdgePolarity::Rising),
            "falling" | "f" | "negative" | "n" => Ok(EdgePolarity::Falling),
            _ => Err(SettingError::InvalidEnumValue {
                field, value: token.clone(), expected: EXPECTED,
            }),
        },
        SettingValue::Integer(1) => Ok(EdgePolarity::Rising),
        SettingValue::Integer(0) => Ok(EdgePolarity::Falling),
        other => Err(SettingError::InvalidEnumValue {
            field, value: other.to_string(), expected: EXPECTED,
        }),
    }
}

fn parse_source(field: &'static str, value: &SettingValue)
        -> core::result::Result<TriggerSource, SettingError> {
    const EXPECTED: &str = r#""external", "ext", 1"#;
    match value {
        SettingValue::Text(token) => match token.to_lowercase().as_str() {
            "external" | "ext" => Ok(TriggerSource::External),
            _ => Err(SettingError::InvalidEnumValue {
                field, value: token.clone(), expected: EXPECTED,
            }),
        },
        SettingValue::Integer(1) => Ok(TriggerSource::External),
        other => Err(SettingError::InvalidEnumValue {
            field, value: other.to_string(), expected: EXPECTED,
        }),
    }
}

fn parse_mode(field: &'static str, value: &SettingValue)
        -> core::result::Result<AcquisitionMode, SettingError> {
    const EXPECTED: &str = r#""single", 1, "dual", 2, "quad", 4, "oct", 8"#;
    match value {
        SettingValue::Text(token) => match token.to_lowercase().as_str() {
            "single" => Ok(AcquisitionMode::Single),
            "dual" => Ok(AcquisitionMode::Dual),
            "quad" => Ok(AcquisitionMode::Quad),
            "oct" => Ok(AcquisitionMode::Oct),
            _ => Err(SettingError::InvalidEnumValue {
                field, value: token.clone(), expected: EXPECTED,
            }),
        },
        SettingValue::Integer(1) => Ok(AcquisitionMode::Single),
        SettingValue::Integer(2) => Ok(AcquisitionMode::Dual),
        SettingValue::Integer(4) => Ok(AcquisitionMode::Quad),
        SettingValue::Integer(8) => Ok(AcquisitionMode::Oct),
        other => Err(SettingError::InvalidEnumValue {
            field, value: other.to_string(), expected: EXPECTED,
        }),
    }
}

/// Parses an integer-valued field. Scientific-notation floats are accepted
/// as long as they are integral, so `1.024e3` reads as `1024`.
fn parse_integer(field: &'static str, value: &SettingValue)
        -> core::result::Result<i64, SettingError> {
    match value {
        SettingValue::Integer(value) => Ok(*value),
        SettingValue::Float(value)
                if value.fract() == 0.0
                    && *value >= i64::MIN as f64
                    && *value <= i64::MAX as f64 =>
            Ok(*value as i64),
        other => Err(SettingError::InvalidNumericValue {
            field, value: other.to_string(),
        }),
    }
}

fn parse_frequency(field: &'static str, value: &SettingValue)
        -> core::result::Result<f64, SettingError> {
    match value {
        SettingValue::Integer(value) => Ok(*value as f64),
        SettingValue::Float(value) => Ok(*value),
        other => Err(SettingError::InvalidNumericValue {
            field, value: other.to_string(),
        }),
    }
}
