/// DeviceContext - device and adapter factory with capability fallback.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphics_device::{CapabilityTier, GraphicsBackend, GraphicsDevice, GraphicsFactory};
use crate::{qf_debug, qf_error, qf_info, qf_warn};

const SOURCE: &str = "quadframe::DeviceContext";

/// Owns the GPU device and the factory that creates swap chains
pub struct DeviceContext {
    // Declared first: dropped before the device it was created alongside
    factory: Box<dyn GraphicsFactory>,
    device: Box<dyn GraphicsDevice>,
    tier: CapabilityTier,
    debug_layer: bool,
}

impl DeviceContext {
    /// Create the device at the highest tier the backend accepts
    ///
    /// # Arguments
    ///
    /// * `backend` - Graphics backend to drive
    /// * `config` - Debug layer switch and ordered capability tiers
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when every tier is rejected or the
    /// factory cannot be created.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn run(backend: &mut dyn quadframe::graphics_device::GraphicsBackend) -> quadframe::Result<()> {
    /// use quadframe::config::Config;
    /// use quadframe::frame::DeviceContext;
    ///
    /// let context = DeviceContext::init(backend, &Config::default())?;
    /// println!("running at tier {}", context.capability_tier());
    /// # Ok(())
    /// # }
    /// ```
    pub fn init(backend: &mut dyn GraphicsBackend, config: &Config) -> Result<Self> {
        let mut debug_layer = false;
        if config.enable_debug_layer {
            match backend.enable_debug_layer() {
                Ok(()) => {
                    debug_layer = true;
                    qf_info!(SOURCE, "{} debug layer enabled", backend.name());
                }
                Err(e) => qf_warn!(SOURCE, "Debug layer unavailable, continuing without it: {}", e),
            }
        }

        let (device, tier) = Self::create_device(backend, &config.capability_tiers)?;

        let factory = backend.create_factory(debug_layer).map_err(|e| {
            qf_error!(SOURCE, "Factory creation failed: {}", e);
            Error::InitializationFailed(format!("factory creation failed: {}", e))
        })?;

        qf_info!(SOURCE, "{} device created at tier {}", backend.name(), tier);
        Ok(Self { factory, device, tier, debug_layer })
    }

    fn create_device(
        backend: &mut dyn GraphicsBackend,
        tiers: &[CapabilityTier],
    ) -> Result<(Box<dyn GraphicsDevice>, CapabilityTier)> {
        for &tier in tiers {
            match backend.create_device(tier) {
                Ok(device) => return Ok((device, tier)),
                Err(e) => qf_debug!(SOURCE, "Tier {} rejected: {}", tier, e),
            }
        }

        let tried = tiers.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
        qf_error!(SOURCE, "No capability tier supported (tried {})", tried);
        Err(Error::InitializationFailed(format!("no supported capability tier (tried [{}])", tried)))
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        &*self.device
    }

    pub fn factory(&self) -> &dyn GraphicsFactory {
        &*self.factory
    }

    /// Tier the device was created at
    pub fn capability_tier(&self) -> CapabilityTier {
        self.tier
    }

    /// True when the debug layer was installed
    pub fn debug_layer_enabled(&self) -> bool {
        self.debug_layer
    }
}

#[cfg(test)]
#[path = "device_context_tests.rs"]
mod tests;
