/// Vulkan implementation of buffer resources

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use quadframe::graphics_device::{GpuVirtualAddress, HeapProperties, Resource, ResourceDesc};
use quadframe::{qf_bail, qf_err, Error, Result};
use std::any::Any;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::memory_location;

const SOURCE: &str = "quadframe::vulkan";

/// Buffer with its own allocation and a slot in the emulated address space
///
/// CPU-visible buffers stay persistently mapped; `map` just hands out the
/// pointer.
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    desc: ResourceDesc,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    address: GpuVirtualAddress,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, heap: &HeapProperties, desc: &ResourceDesc) -> Result<Self> {
        if desc.width == 0 {
            return Err(Error::InvalidResource("buffer size is zero".to_string()));
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.width)
                .usage(
                    vk::BufferUsageFlags::VERTEX_BUFFER
                        | vk::BufferUsageFlags::INDEX_BUFFER
                        | vk::BufferUsageFlags::UNIFORM_BUFFER
                        | vk::BufferUsageFlags::TRANSFER_SRC
                        | vk::BufferUsageFlags::TRANSFER_DST,
                )
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| qf_err!(SOURCE, "Failed to create buffer: {:?}", e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate("buffer", requirements, memory_location(heap), true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.device.destroy_buffer(buffer, None);
                ctx.free(allocation);
                qf_bail!(SOURCE, "Failed to bind buffer memory: {:?}", e);
            }

            let address = ctx.address_space.lock().unwrap().reserve(buffer, desc.width);

            Ok(Self {
                ctx,
                desc: *desc,
                buffer,
                allocation: Some(allocation),
                address,
            })
        }
    }
}

impl Resource for VulkanBuffer {
    fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    fn gpu_virtual_address(&self) -> GpuVirtualAddress {
        self.address
    }

    fn map(&self, _subresource: u32) -> Result<NonNull<u8>> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.cast::<u8>())
            .ok_or_else(|| Error::InvalidResource("buffer is not in a CPU-visible heap".to_string()))
    }

    fn unmap(&self, _subresource: u32) {}

    fn write_to_subresource(&self, _subresource: u32, data: &[u8], _row_pitch: u32, _depth_pitch: u32) -> Result<()> {
        quadframe::graphics_device::write_mapped(self, data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        self.ctx.address_space.lock().unwrap().release(self.address);
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
    }
}
