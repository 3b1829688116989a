//! Validated digitizer settings in terms of physical qualities, and the
//! resolved configuration handed to the hardware driver layer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolarity {
    Rising,
    Falling,
}

impl EdgePolarity {
    pub fn token(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
        }
    }
}

/// Trigger source. The card is always triggered from the external trigger
/// input (the laser sync output); channel-sourced triggering is not wired up
/// in this instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    External,
}

impl TriggerSource {
    pub fn token(self) -> &'static str {
        match self {
            Self::External => "external",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    Single,
    Dual,
    Quad,
    Oct,
}

impl AcquisitionMode {
    pub fn token(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Dual => "dual",
            Self::Quad => "quad",
            Self::Oct => "oct",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub polarity: EdgePolarity,
    /// Trigger level as a percentage of the trigger input range, in [0, 100].
    pub level_percent: u8,
    pub source: TriggerSource,
    /// Full-scale range of the external trigger input, in millivolts.
    pub range_mv: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionSettings {
    pub mode: AcquisitionMode,
    pub sample_rate_hz: f64,
    /// Samples captured per trigger event. Equal to the acquisition depth;
    /// the card never captures pre-trigger samples.
    pub samples_per_segment: u64,
    /// Samples between the trigger event and the start of capture.
    pub trigger_delay_samples: u64,
    /// Number of trigger events recorded per acquisition session.
    pub segment_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    pub channel_index: u32,
    /// Full-scale input range, in millivolts.
    pub range_mv: u32,
    /// DC offset, in millivolts, within ±`range_mv / 2`.
    pub dc_offset_mv: i32,
}

/// The immutable union of the validated sections, plus derived quantities.
///
/// Constructed once per acquisition session by [`ResolvedConfiguration::derive`]
/// and handed to the hardware driver layer by value; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedConfiguration {
    pub trigger: TriggerSettings,
    pub acquisition: AcquisitionSettings,
    pub channel: ChannelSettings,
    /// Duration of one captured segment, `samples_per_segment / sample_rate_hz`.
    pub acquisition_window_secs: f64,
    /// Capture memory consumed by the whole session.
    pub memory_required_bytes: u64,
}
