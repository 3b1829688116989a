mod config;
mod model;
mod resolve;
mod settings;

use thiserror::Error as ThisError;

/// A single rejected setting, attributed to the `section.key` that caused it.
///
/// Every stage of resolution collects all of these it can find before giving
/// up, so a settings file with several mistakes reports them in one pass.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SettingError {
    #[error("{field}: {value:?} is not a recognized value (expected one of {expected})")]
    InvalidEnumValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field}: {value:?} is not a valid number")]
    InvalidNumericValue {
        field: &'static str,
        value: String,
    },
    #[error("{field}: {value} is outside {limits}")]
    OutOfRange {
        field: &'static str,
        value: String,
        limits: String,
    },
    #[error("{field}: {value} is not a positive power of two")]
    InvalidDepth {
        field: &'static str,
        value: i64,
    },
    #[error("{field}: fixed by the analog front end and cannot be configured")]
    UnsupportedOption {
        field: &'static str,
    },
    #[error("{field}: {value} is not supported by the {model}")]
    UnsupportedHardwareConfiguration {
        field: &'static str,
        value: String,
        model: &'static str,
    },
    #[error("acquisition needs {required_bytes} bytes but the {model} has \
             {available_bytes} bytes of capture memory")]
    InsufficientMemory {
        required_bytes: u64,
        available_bytes: u64,
        model: &'static str,
    },
    #[error("acquisition.depth: {depth} does not match segment size {segment_size} \
             (pre-trigger capture is not supported)")]
    InconsistentDepthSegmentSize {
        depth: i64,
        segment_size: i64,
    },
    #[error("acquisition.trigger_delay: a delay of {delay_samples} samples exceeds the \
             {window_samples} sample acquisition window")]
    DelayExceedsWindow {
        delay_samples: i64,
        window_samples: i64,
    },
}

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid settings:\n{}", bulleted(.0))]
    Invalid(Vec<SettingError>),
}

fn bulleted(errors: &[SettingError]) -> String {
    errors.iter()
        .map(|error| format!("  - {}", error))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use config::{
    EdgePolarity,
    TriggerSource,
    AcquisitionMode,
    TriggerSettings,
    AcquisitionSettings,
    ChannelSettings,
    ResolvedConfiguration,
};

pub use model::{
    HardwareModel,
    CSE161G,
    CSE16500,
    BUILTIN_MODELS,
};

pub use settings::{
    SettingValue,
    TriggerSection,
    AcquisitionSection,
    ChannelSection,
    Settings,
};
