/// GpuFence trait - CPU/GPU synchronization primitive

use std::any::Any;

use crate::error::Result;

/// A 64-bit counter set by a command queue when submitted work completes
pub trait GpuFence: Send + Sync {
    /// Highest value the GPU has reached so far
    fn completed_value(&self) -> u64;

    /// Block the calling thread until `completed_value() >= value`
    ///
    /// There is no timeout: a value that is never signaled blocks forever.
    fn wait_for_value(&self, value: u64) -> Result<()>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}
