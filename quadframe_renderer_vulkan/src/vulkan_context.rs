/// Shared Vulkan state
///
/// `InstanceContext` owns the instance and debug messenger. `GpuContext`
/// owns the logical device, the allocator and the device-wide caches;
/// every GPU object holds an `Arc<GpuContext>` so the device outlives them.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use quadframe::{qf_err, qf_error, Error, Result};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::vulkan_descriptor_heap::HeapSlots;

const SOURCE: &str = "quadframe::vulkan";

/// First emulated GPU virtual address; 0 stays invalid
const ADDRESS_SPACE_BASE: u64 = 0x1_0000_0000;

/// Every buffer starts on a 64 KiB boundary of the emulated address space
const ADDRESS_ALIGNMENT: u64 = 0x1_0000;

/// Vulkan instance plus the optional validation messenger
pub struct InstanceContext {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub surface_loader: ash::khr::surface::Instance,
    /// API version the instance was created with
    pub api_version: u32,
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if let (Some(loader), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
                crate::debug::cleanup_debug_config();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Maps emulated GPU virtual addresses to the buffers behind them
///
/// Vulkan 1.0 has no buffer device address, so buffer views carry
/// addresses handed out here and command lists resolve them back.
pub(crate) struct AddressSpace {
    next: u64,
    ranges: BTreeMap<u64, (vk::Buffer, u64)>,
}

impl AddressSpace {
    pub(crate) fn new() -> Self {
        Self { next: ADDRESS_SPACE_BASE, ranges: BTreeMap::new() }
    }

    /// Reserve `size` bytes for `buffer` and return the base address
    pub(crate) fn reserve(&mut self, buffer: vk::Buffer, size: u64) -> u64 {
        let base = self.next;
        let span = size.max(1).div_ceil(ADDRESS_ALIGNMENT) * ADDRESS_ALIGNMENT;
        self.next += span;
        self.ranges.insert(base, (buffer, size));
        base
    }

    pub(crate) fn release(&mut self, base: u64) {
        self.ranges.remove(&base);
    }

    /// Buffer and byte offset containing `address`
    pub(crate) fn resolve(&self, address: u64) -> Option<(vk::Buffer, u64)> {
        let (&base, &(buffer, size)) = self.ranges.range(..=address).next_back()?;
        let offset = address - base;
        (offset < size).then_some((buffer, offset))
    }
}

/// Logical device and everything shared by the objects created on it
pub struct GpuContext {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,

    /// Dropped by hand before the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// `samplerAnisotropy` was enabled at device creation
    pub sampler_anisotropy: bool,

    /// Pool for one-shot upload command buffers
    pub upload_command_pool: Mutex<vk::CommandPool>,

    pub(crate) address_space: Mutex<AddressSpace>,
    descriptor_heaps: Mutex<FxHashMap<u32, Arc<Mutex<HeapSlots>>>>,
    next_heap_id: AtomicU32,
    render_passes: Mutex<FxHashMap<vk::Format, vk::RenderPass>>,
    table_layouts: Mutex<FxHashMap<vk::DescriptorType, vk::DescriptorSetLayout>>,

    /// Kept alive until the device is gone
    pub instance: Arc<InstanceContext>,
}

impl GpuContext {
    pub fn new(
        instance: Arc<InstanceContext>,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        sampler_anisotropy: bool,
        upload_command_pool: vk::CommandPool,
    ) -> Self {
        Self {
            device,
            physical_device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            sampler_anisotropy,
            upload_command_pool: Mutex::new(upload_command_pool),
            address_space: Mutex::new(AddressSpace::new()),
            descriptor_heaps: Mutex::new(FxHashMap::default()),
            next_heap_id: AtomicU32::new(1),
            render_passes: Mutex::new(FxHashMap::default()),
            table_layouts: Mutex::new(FxHashMap::default()),
            instance,
        }
    }

    /// Allocate device memory, logging the size on exhaustion
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.allocator
            .lock()
            .unwrap()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                qf_error!(SOURCE, "Out of GPU memory for {} ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    pub(crate) fn free(&self, allocation: Allocation) {
        if let Err(e) = self.allocator.lock().unwrap().free(allocation) {
            qf_error!(SOURCE, "Failed to free GPU allocation: {:?}", e);
        }
    }

    /// Record commands into a throwaway command buffer, submit and wait
    pub(crate) fn submit_one_time<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self.upload_command_pool.lock().unwrap();
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| qf_err!(SOURCE, "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device
                    .begin_command_buffer(command_buffer, &begin_info)
                    .map_err(|e| qf_err!(SOURCE, "Failed to begin upload command buffer: {:?}", e))?;

                record(command_buffer);

                self.device
                    .end_command_buffer(command_buffer)
                    .map_err(|e| qf_err!(SOURCE, "Failed to end upload command buffer: {:?}", e))?;

                let command_buffers = [command_buffer];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                self.device
                    .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                    .map_err(|e| qf_err!(SOURCE, "Failed to submit upload commands: {:?}", e))?;
                self.device
                    .queue_wait_idle(self.graphics_queue)
                    .map_err(|e| qf_err!(SOURCE, "Failed to wait for upload: {:?}", e))
            })();

            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    /// Single-attachment render pass for `format`, created on first use
    ///
    /// The attachment is loaded and stored in `COLOR_ATTACHMENT_OPTIMAL`;
    /// layout changes are left to explicit barriers.
    pub(crate) fn render_pass(&self, format: vk::Format) -> Result<vk::RenderPass> {
        let mut cache = self.render_passes.lock().unwrap();
        if let Some(&render_pass) = cache.get(&format) {
            return Ok(render_pass);
        }

        let attachments = [vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let render_pass = unsafe { self.device.create_render_pass(&create_info, None) }
            .map_err(|e| qf_err!(SOURCE, "Failed to create render pass for {:?}: {:?}", format, e))?;
        cache.insert(format, render_pass);
        Ok(render_pass)
    }

    /// One-descriptor set layout shared by heaps and root signatures
    ///
    /// Descriptor sets are only compatible with identically defined
    /// layouts, so every table of a given type uses this one.
    pub(crate) fn table_layout(&self, descriptor_type: vk::DescriptorType) -> Result<vk::DescriptorSetLayout> {
        let mut cache = self.table_layouts.lock().unwrap();
        if let Some(&layout) = cache.get(&descriptor_type) {
            return Ok(layout);
        }

        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(descriptor_type)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS)];
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| qf_err!(SOURCE, "Failed to create {:?} set layout: {:?}", descriptor_type, e))?;
        cache.insert(descriptor_type, layout);
        Ok(layout)
    }

    pub(crate) fn register_heap(&self, slots: Arc<Mutex<HeapSlots>>) -> u32 {
        let id = self.next_heap_id.fetch_add(1, Ordering::Relaxed);
        self.descriptor_heaps.lock().unwrap().insert(id, slots);
        id
    }

    pub(crate) fn unregister_heap(&self, id: u32) {
        self.descriptor_heaps.lock().unwrap().remove(&id);
    }

    pub(crate) fn heap(&self, id: u32) -> Option<Arc<Mutex<HeapSlots>>> {
        self.descriptor_heaps.lock().unwrap().get(&id).cloned()
    }

    /// Buffer and offset behind an emulated GPU virtual address
    pub(crate) fn resolve_address(&self, address: u64) -> Result<(vk::Buffer, u64)> {
        self.address_space
            .lock()
            .unwrap()
            .resolve(address)
            .ok_or_else(|| Error::InvalidResource(format!("GPU address {:#x} maps to no buffer", address)))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            for (_, render_pass) in self.render_passes.get_mut().unwrap().drain() {
                self.device.destroy_render_pass(render_pass, None);
            }
            for (_, layout) in self.table_layouts.get_mut().unwrap().drain() {
                self.device.destroy_descriptor_set_layout(layout, None);
            }
            self.device.destroy_command_pool(*self.upload_command_pool.get_mut().unwrap(), None);

            // The allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;
