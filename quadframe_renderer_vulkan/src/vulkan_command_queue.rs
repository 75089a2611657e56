/// Direct command queue - the device's graphics queue

use ash::vk;
use quadframe::graphics_device::{CommandList, CommandListKind, CommandQueue, CommandQueueDesc, GpuFence};
use quadframe::{qf_bail, qf_err, Error, Result};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_fence::VulkanFence;

const SOURCE: &str = "quadframe::vulkan";

pub struct VulkanCommandQueue {
    ctx: Arc<GpuContext>,
    desc: CommandQueueDesc,
    pub(crate) queue: vk::Queue,
}

impl VulkanCommandQueue {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &CommandQueueDesc) -> Result<Self> {
        if desc.kind != CommandListKind::Direct {
            return Err(Error::UnsupportedCapability(format!(
                "{:?} command queues are not supported by the Vulkan backend",
                desc.kind
            )));
        }
        let queue = ctx.graphics_queue;
        Ok(Self { ctx, desc: *desc, queue })
    }

    pub(crate) fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }
}

impl CommandQueue for VulkanCommandQueue {
    fn desc(&self) -> &CommandQueueDesc {
        &self.desc
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<()> {
        let mut command_buffers = Vec::with_capacity(lists.len());
        for list in lists {
            let list = list
                .as_any()
                .downcast_ref::<VulkanCommandList>()
                .ok_or_else(|| Error::InvalidResource("command list is not a Vulkan command list".to_string()))?;
            if list.is_recording() {
                qf_bail!(SOURCE, "Executing a command list that is still recording");
            }
            command_buffers.push(list.command_buffer);
        }

        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.ctx
                .device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(|e| qf_err!(SOURCE, "Failed to submit {} command lists: {:?}", lists.len(), e))
        }
    }

    fn signal(&self, fence: &dyn GpuFence, value: u64) -> Result<()> {
        let fence = fence
            .as_any()
            .downcast_ref::<VulkanFence>()
            .ok_or_else(|| Error::InvalidResource("fence is not a Vulkan fence".to_string()))?;
        fence.signal_on(self.queue, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
