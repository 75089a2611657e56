/// Fence - the CPU/GPU synchronization counter.
///
/// Wraps a backend fence with the CPU-side value last signaled. The value
/// only ever grows, by exactly one per `signal`.

use crate::error::Result;
use crate::graphics_device::{CommandQueue, GpuFence, GraphicsDevice};
use crate::qf_trace;

const SOURCE: &str = "quadframe::Fence";

pub struct Fence {
    gpu_fence: Box<dyn GpuFence>,
    value: u64,
}

impl Fence {
    /// Create a fence at value 0
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self> {
        let gpu_fence = device.create_fence(0)?;
        Ok(Self { gpu_fence, value: 0 })
    }

    /// Ask `queue` to set the fence to the next value once prior work completes
    ///
    /// Returns the value signaled.
    pub fn signal(&mut self, queue: &dyn CommandQueue) -> Result<u64> {
        self.value += 1;
        queue.signal(&*self.gpu_fence, self.value)?;
        qf_trace!(SOURCE, "Signaled {}", self.value);
        Ok(self.value)
    }

    /// Block until the GPU reaches the last signaled value
    ///
    /// Returns immediately when it already has. There is no timeout.
    pub fn wait_for_gpu(&self) -> Result<()> {
        let completed = self.completed_value();
        if completed < self.value {
            qf_trace!(SOURCE, "Waiting for {} (completed {})", self.value, completed);
            self.gpu_fence.wait_for_value(self.value)?;
        }
        Ok(())
    }

    /// Value the GPU has reached
    pub fn completed_value(&self) -> u64 {
        let completed = self.gpu_fence.completed_value();
        assert!(
            completed <= self.value,
            "fence completed value {} ahead of signaled value {}",
            completed,
            self.value
        );
        completed
    }

    /// Value most recently signaled
    pub fn signaled_value(&self) -> u64 {
        self.value
    }

    /// True when nothing signaled is still pending
    pub fn is_idle(&self) -> bool {
        self.completed_value() >= self.value
    }
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
