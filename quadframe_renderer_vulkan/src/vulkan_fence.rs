/// 64-bit fence counter built from binary VkFences
///
/// Each queue signal takes a VkFence from a free list and submits it with
/// an empty batch; the fence fires once all earlier work on the queue has
/// finished. The counter advances as those fences are observed.

use ash::vk;
use quadframe::graphics_device::GpuFence;
use quadframe::{qf_bail, qf_err, qf_error, Result};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::GpuContext;

const SOURCE: &str = "quadframe::vulkan";

struct FenceState {
    completed: u64,
    /// Signals in submission order
    pending: VecDeque<(u64, vk::Fence)>,
    free: Vec<vk::Fence>,
}

pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    state: Mutex<FenceState>,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Self {
        Self {
            ctx,
            state: Mutex::new(FenceState {
                completed: initial_value,
                pending: VecDeque::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Submit an empty batch on `queue` that signals `value` when reached
    pub(crate) fn signal_on(&self, queue: vk::Queue, value: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let fence = match state.free.pop() {
            Some(fence) => fence,
            None => unsafe {
                self.ctx
                    .device
                    .create_fence(&vk::FenceCreateInfo::default(), None)
                    .map_err(|e| qf_err!(SOURCE, "Failed to create fence: {:?}", e))?
            },
        };

        if let Err(e) = unsafe { self.ctx.device.queue_submit(queue, &[], fence) } {
            state.free.push(fence);
            qf_bail!(SOURCE, "Failed to submit fence signal {}: {:?}", value, e);
        }
        state.pending.push_back((value, fence));
        Ok(())
    }

    /// Retire the oldest pending signal, waiting for it when `block`
    fn retire_front(&self, state: &mut FenceState, block: bool) -> Result<bool> {
        let Some(&(value, fence)) = state.pending.front() else {
            return Ok(false);
        };

        let done = unsafe {
            if block {
                self.ctx
                    .device
                    .wait_for_fences(&[fence], true, u64::MAX)
                    .map_err(|e| qf_err!(SOURCE, "Failed to wait for fence value {}: {:?}", value, e))?;
                true
            } else {
                self.ctx
                    .device
                    .get_fence_status(fence)
                    .map_err(|e| qf_err!(SOURCE, "Failed to query fence value {}: {:?}", value, e))?
            }
        };
        if !done {
            return Ok(false);
        }

        unsafe {
            self.ctx
                .device
                .reset_fences(&[fence])
                .map_err(|e| qf_err!(SOURCE, "Failed to reset fence: {:?}", e))?;
        }
        state.pending.pop_front();
        state.free.push(fence);
        state.completed = state.completed.max(value);
        Ok(true)
    }
}

/// Call `retire` until it reports nothing left to retire or fails
fn retire_all(mut retire: impl FnMut() -> Result<bool>) -> Result<()> {
    while retire()? {}
    Ok(())
}

impl GpuFence for VulkanFence {
    /// A failed status query (device loss) is logged and leaves the value
    /// where it was.
    fn completed_value(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        if let Err(e) = retire_all(|| self.retire_front(&mut state, false)) {
            qf_error!(SOURCE, "Fence stuck at {}: {}", state.completed, e);
        }
        state.completed
    }

    /// Waits on the queued signals in order. A value with no signal queued
    /// can never be reached and fails instead of blocking forever.
    fn wait_for_value(&self, value: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        while state.completed < value {
            if !self.retire_front(&mut state, true)? {
                qf_bail!(
                    SOURCE,
                    "Waiting for fence value {} but nothing beyond {} was signaled",
                    value,
                    state.completed
                );
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        unsafe {
            if !state.pending.is_empty() {
                let fences: Vec<vk::Fence> = state.pending.iter().map(|&(_, fence)| fence).collect();
                let _ = self.ctx.device.wait_for_fences(&fences, true, u64::MAX);
            }
            for (_, fence) in state.pending.drain(..) {
                self.ctx.device.destroy_fence(fence, None);
            }
            for fence in state.free.drain(..) {
                self.ctx.device.destroy_fence(fence, None);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_fence_tests.rs"]
mod tests;
