/// Configuration for device bring-up and the frame loop

use crate::graphics_device::{CapabilityTier, Format};

/// Which validation messages a backend debug layer reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Counters collected from a backend validation layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    /// Total number of messages of any severity
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// quadframe configuration
///
/// `Default` gives the values the quad renderer was designed around:
/// a double-buffered `R8G8B8A8_UNORM` swap chain presented at vsync 1,
/// cleared to opaque black, with capability tiers tried from 1.3 down to 1.0.
#[derive(Debug, Clone)]
pub struct Config {
    /// Install the backend's debug validation layer and use the debug factory
    pub enable_debug_layer: bool,

    /// Application name reported to the backend
    pub app_name: String,

    /// Ordered capability tiers, highest first
    pub capability_tiers: Vec<CapabilityTier>,

    /// Requested number of swap-chain buffers
    pub back_buffer_count: u32,

    /// Requested swap-chain format
    pub back_buffer_format: Format,

    /// Render-target clear color (RGBA)
    pub clear_color: [f32; 4],

    /// Present sync interval
    pub sync_interval: u32,

    /// Validation message filter
    pub debug_severity: DebugSeverity,

    /// Panic as soon as the validation layer reports an error
    pub panic_on_validation_error: bool,

    /// Count validation messages (see ValidationStats)
    pub enable_validation_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_debug_layer: cfg!(debug_assertions),
            app_name: "Quadframe Application".to_string(),
            capability_tiers: CapabilityTier::DEFAULT_FALLBACK.to_vec(),
            back_buffer_count: 2,
            back_buffer_format: Format::R8G8B8A8_UNORM,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            sync_interval: 1,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            panic_on_validation_error: false,
            enable_validation_stats: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
