//! Static capability tables for the supported digitizer variants.

use crate::config::AcquisitionMode;

/// Physical and firmware limits of one digitizer model.
///
/// Resolution takes the model as an explicit argument rather than consulting
/// process-wide state, so tests (and a future multi-card setup) can substitute
/// an alternate profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareModel {
    pub id: &'static str,
    pub max_sample_rate_hz: f64,
    pub supported_ranges_mv: &'static [u32],
    pub supported_channels: &'static [u32],
    pub supported_modes: &'static [AcquisitionMode],
    /// Selectable full-scale ranges of the external trigger input. The first
    /// entry is applied when the settings file does not pick one.
    pub supported_ext_trigger_ranges_mv: &'static [u32],
    pub onboard_memory_bytes: u64,
    pub bytes_per_sample: u32,
}

impl HardwareModel {
    /// Looks up a model in the built-in table by identifier.
    pub fn builtin(id: &str) -> Option<&'static HardwareModel> {
        BUILTIN_MODELS.iter().find(|model| model.id.eq_ignore_ascii_case(id))
    }

    pub fn default_ext_trigger_range_mv(&self) -> u32 {
        self.supported_ext_trigger_ranges_mv.first().copied().unwrap_or(0)
    }
}

/// The 1 GS/s card fitted in the lidar instrument rack. Single-channel
/// capture only, with a fixed 50 Ω / DC-coupled ±1 V front end.
pub const CSE161G: HardwareModel = HardwareModel {
    id: "CSE161G",
    max_sample_rate_hz: 1e9,
    supported_ranges_mv: &[2000],
    supported_channels: &[1],
    supported_modes: &[AcquisitionMode::Single],
    supported_ext_trigger_ranges_mv: &[3000, 2000],
    onboard_memory_bytes: 2 * 1024 * 1024 * 1024,
    bytes_per_sample: 2,
};

/// Reduced 500 MS/s variant of the same family.
pub const CSE16500: HardwareModel = HardwareModel {
    id: "CSE16500",
    max_sample_rate_hz: 500e6,
    supported_ranges_mv: &[2000],
    supported_channels: &[1],
    supported_modes: &[AcquisitionMode::Single],
    supported_ext_trigger_ranges_mv: &[3000, 2000],
    onboard_memory_bytes: 1024 * 1024 * 1024,
    bytes_per_sample: 2,
};

pub const BUILTIN_MODELS: &[HardwareModel] = &[CSE161G, CSE16500];
