/// Vulkan implementation of 2D texture resources
///
/// Textures always live in device-local memory with optimal tiling. CPU
/// writes go through `write_to_subresource`, which copies from a staging
/// buffer; a texture cannot be mapped.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use quadframe::graphics_device::{
    GpuVirtualAddress, Resource, ResourceDesc, ResourceState,
};
use quadframe::{qf_bail, qf_err, Error, Result};
use std::any::Any;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_to_vk, state_layout};

const SOURCE: &str = "quadframe::vulkan";

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    desc: ResourceDesc,
    pub(crate) image: vk::Image,
    /// None for swap-chain images, which the swap chain owns
    allocation: Option<Allocation>,
    /// Layout outside of recorded command lists
    layout: Mutex<vk::ImageLayout>,
    /// Set until the first barrier is recorded; shared by every handle to
    /// the same swap-chain image
    undefined: Arc<AtomicBool>,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ResourceDesc, initial_state: ResourceState) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            qf_bail!(SOURCE, "Texture size {}x{} is empty", desc.width, desc.height);
        }

        let format = format_to_vk(desc.format);
        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST;
        if desc.format.is_color_target() {
            usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }

        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width as u32,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(desc.mip_levels.max(1) as u32)
                .array_layers(desc.depth_or_array_size.max(1) as u32)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&create_info, None)
                .map_err(|e| qf_err!(SOURCE, "Failed to create texture image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.device.destroy_image(image, None);
                ctx.free(allocation);
                qf_bail!(SOURCE, "Failed to bind texture image memory: {:?}", e);
            }

            let texture = Self {
                ctx,
                desc: *desc,
                image,
                allocation: Some(allocation),
                layout: Mutex::new(vk::ImageLayout::UNDEFINED),
                undefined: Arc::new(AtomicBool::new(false)),
            };
            texture.transition_now(state_layout(initial_state))?;
            Ok(texture)
        }
    }

    /// Wrap an image owned by a swap chain
    pub(crate) fn from_swap_chain(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        desc: ResourceDesc,
        undefined: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ctx,
            desc,
            image,
            allocation: None,
            layout: Mutex::new(vk::ImageLayout::PRESENT_SRC_KHR),
            undefined,
        }
    }

    /// Old layout to record for a barrier leaving `state_before`
    ///
    /// Swap-chain images start out undefined, whatever state the caller
    /// believes they are in.
    pub(crate) fn barrier_old_layout(&self, state_before: ResourceState) -> vk::ImageLayout {
        if self.undefined.swap(false, Ordering::AcqRel) {
            vk::ImageLayout::UNDEFINED
        } else {
            state_layout(state_before)
        }
    }

    pub(crate) fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        }
    }

    fn layout_barrier(&self, old: vk::ImageLayout, new: vk::ImageLayout) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(self.subresource_range())
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
    }

    /// Move the whole image to `new_layout` with a one-shot submission
    fn transition_now(&self, new_layout: vk::ImageLayout) -> Result<()> {
        let mut layout = self.layout.lock().unwrap();
        let barrier = self.layout_barrier(*layout, new_layout);
        self.ctx.submit_one_time(|command_buffer| unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })?;
        *layout = new_layout;
        Ok(())
    }
}

impl Resource for VulkanTexture {
    fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    fn gpu_virtual_address(&self) -> GpuVirtualAddress {
        0
    }

    fn map(&self, _subresource: u32) -> Result<NonNull<u8>> {
        Err(Error::InvalidResource(
            "textures cannot be mapped; use write_to_subresource".to_string(),
        ))
    }

    fn unmap(&self, _subresource: u32) {}

    fn write_to_subresource(&self, subresource: u32, data: &[u8], row_pitch: u32, _depth_pitch: u32) -> Result<()> {
        if self.allocation.is_none() {
            qf_bail!(SOURCE, "Swap-chain images cannot be written from the CPU");
        }

        let mip_levels = self.desc.mip_levels.max(1) as u32;
        let mip = subresource % mip_levels;
        let layer = subresource / mip_levels;
        if layer >= self.desc.depth_or_array_size.max(1) as u32 {
            return Err(Error::InvalidResource(format!("subresource {} out of range", subresource)));
        }

        let width = ((self.desc.width as u32) >> mip).max(1);
        let height = (self.desc.height >> mip).max(1);
        let texel_size = self.desc.format.size_bytes();
        if texel_size == 0 || row_pitch % texel_size != 0 || row_pitch < width * texel_size {
            return Err(Error::InvalidResource(format!(
                "row pitch {} does not hold {} texels of {} bytes",
                row_pitch, width, texel_size
            )));
        }
        let required = row_pitch as usize * (height as usize - 1) + (width * texel_size) as usize;
        if data.len() < required {
            return Err(Error::InvalidResource(format!(
                "{} bytes given for a {}x{} subresource needing {}",
                data.len(),
                width,
                height,
                required
            )));
        }

        let device = &self.ctx.device;
        unsafe {
            // Staging buffer (CPU-visible)
            let staging_info = vk::BufferCreateInfo::default()
                .size(data.len() as u64)
                .usage(vk::BufferUsageFlags::TRANSFER_SRC)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let staging = device
                .create_buffer(&staging_info, None)
                .map_err(|e| qf_err!(SOURCE, "Failed to create texture staging buffer: {:?}", e))?;

            let requirements = device.get_buffer_memory_requirements(staging);
            let allocation = match self.ctx.allocate("texture staging", requirements, MemoryLocation::CpuToGpu, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(staging, None);
                    return Err(e);
                }
            };

            let result = (|| {
                device
                    .bind_buffer_memory(staging, allocation.memory(), allocation.offset())
                    .map_err(|e| qf_err!(SOURCE, "Failed to bind staging memory: {:?}", e))?;
                let ptr = allocation
                    .mapped_ptr()
                    .ok_or_else(|| qf_err!(SOURCE, "Staging buffer is not mapped"))?;
                std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>().as_ptr(), data.len());

                let layout = self.layout.lock().unwrap();
                let to_transfer = self.layout_barrier(*layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
                let back = self.layout_barrier(vk::ImageLayout::TRANSFER_DST_OPTIMAL, *layout);
                let region = vk::BufferImageCopy::default()
                    .buffer_offset(0)
                    .buffer_row_length(row_pitch / texel_size)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: mip,
                        base_array_layer: layer,
                        layer_count: 1,
                    })
                    .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                    .image_extent(vk::Extent3D { width, height, depth: 1 });

                self.ctx.submit_one_time(|command_buffer| {
                    device.cmd_pipeline_barrier(
                        command_buffer,
                        vk::PipelineStageFlags::TOP_OF_PIPE,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[to_transfer],
                    );
                    device.cmd_copy_buffer_to_image(
                        command_buffer,
                        staging,
                        self.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[region],
                    );
                    device.cmd_pipeline_barrier(
                        command_buffer,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::ALL_COMMANDS,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[back],
                    );
                })
            })();

            device.destroy_buffer(staging, None);
            self.ctx.free(allocation);
            result
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            unsafe {
                self.ctx.device.destroy_image(self.image, None);
            }
            self.ctx.free(allocation);
        }
    }
}
