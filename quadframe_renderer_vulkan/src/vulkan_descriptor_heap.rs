/// Descriptor heaps emulated on top of Vulkan objects
///
/// A handle encodes `heap id << 32 | slot * HANDLE_STRIDE`. Render-target
/// slots hold an image view plus a framebuffer; CBV/SRV slots hold a
/// one-descriptor set allocated from the heap's pool, bound later as a
/// descriptor table.

use ash::vk;
use quadframe::graphics_device::{
    ConstantBufferViewDesc, CpuDescriptorHandle, DescriptorHeap, DescriptorHeapDesc,
    DescriptorHeapKind, Format, GpuDescriptorHandle, RenderTargetViewDesc, Resource,
    ShaderResourceViewDesc,
};
use quadframe::{qf_bail, qf_err, qf_warn, Error, Result};
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::format_to_vk;
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "quadframe::vulkan";

/// Distance between two descriptor handles, for every heap kind
pub(crate) const HANDLE_STRIDE: u32 = 32;

pub(crate) fn encode_handle(heap_id: u32, slot: u32) -> u64 {
    ((heap_id as u64) << 32) | (slot as u64 * HANDLE_STRIDE as u64)
}

/// Heap id and slot index addressed by a handle
pub(crate) fn decode_handle(ptr: u64) -> Option<(u32, u32)> {
    let heap_id = (ptr >> 32) as u32;
    let offset = (ptr & 0xFFFF_FFFF) as u32;
    (heap_id != 0 && offset % HANDLE_STRIDE == 0).then_some((heap_id, offset / HANDLE_STRIDE))
}

/// Everything needed to render into a back buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RenderTargetSlot {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
}

pub(crate) enum Slot {
    Empty,
    RenderTarget(RenderTargetSlot),
    ShaderResource { set: vk::DescriptorSet, view: vk::ImageView },
    ConstantBuffer { set: vk::DescriptorSet },
}

/// Slot storage of one heap, shared with the device-wide registry
pub(crate) struct HeapSlots {
    kind: DescriptorHeapKind,
    pool: vk::DescriptorPool,
    slots: Vec<Slot>,
}

impl HeapSlots {
    fn check_index(&self, index: u32) -> Result<usize> {
        if index as usize >= self.slots.len() {
            qf_bail!(SOURCE, "Descriptor slot {} out of range (heap holds {})", index, self.slots.len());
        }
        Ok(index as usize)
    }

    fn expect_kind(&self, kind: DescriptorHeapKind) -> Result<()> {
        if self.kind != kind {
            qf_bail!(SOURCE, "{:?} descriptor written into a {:?} heap", kind, self.kind);
        }
        Ok(())
    }

    /// Put `slot` at `index`, destroying what was there
    fn replace(&mut self, device: &ash::Device, index: usize, slot: Slot) {
        let old = std::mem::replace(&mut self.slots[index], slot);
        Self::release(device, self.pool, old);
    }

    fn release(device: &ash::Device, pool: vk::DescriptorPool, slot: Slot) {
        unsafe {
            match slot {
                Slot::Empty => {}
                Slot::RenderTarget(target) => {
                    device.destroy_framebuffer(target.framebuffer, None);
                    device.destroy_image_view(target.view, None);
                }
                Slot::ShaderResource { set, view } => {
                    let _ = device.free_descriptor_sets(pool, &[set]);
                    device.destroy_image_view(view, None);
                }
                Slot::ConstantBuffer { set } => {
                    let _ = device.free_descriptor_sets(pool, &[set]);
                }
            }
        }
    }

    fn allocate_set(&self, ctx: &GpuContext, descriptor_type: vk::DescriptorType) -> Result<vk::DescriptorSet> {
        let layouts = [ctx.table_layout(descriptor_type)?];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = unsafe { ctx.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(|e| qf_err!(SOURCE, "Failed to allocate descriptor set: {:?}", e))?;
        Ok(sets[0])
    }

    pub(crate) fn write_render_target(
        &mut self,
        ctx: &GpuContext,
        index: u32,
        texture: &VulkanTexture,
        desc: &RenderTargetViewDesc,
    ) -> Result<()> {
        self.expect_kind(DescriptorHeapKind::Rtv)?;
        let index = self.check_index(index)?;

        let format = view_format(desc.format, texture);
        let extent = vk::Extent2D {
            width: texture.desc().width as u32,
            height: texture.desc().height,
        };
        let render_pass = ctx.render_pass(format)?;

        unsafe {
            let view = create_view(ctx, texture, format, 0, 1)?;
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = match ctx.device.create_framebuffer(&framebuffer_info, None) {
                Ok(framebuffer) => framebuffer,
                Err(e) => {
                    ctx.device.destroy_image_view(view, None);
                    qf_bail!(SOURCE, "Failed to create framebuffer: {:?}", e);
                }
            };

            let slot = RenderTargetSlot { image: texture.image, view, framebuffer, render_pass, extent };
            self.replace(&ctx.device, index, Slot::RenderTarget(slot));
        }
        Ok(())
    }

    pub(crate) fn write_shader_resource(
        &mut self,
        ctx: &GpuContext,
        index: u32,
        texture: &VulkanTexture,
        desc: &ShaderResourceViewDesc,
    ) -> Result<()> {
        self.expect_kind(DescriptorHeapKind::CbvSrvUav)?;
        let index = self.check_index(index)?;

        let level_count = if desc.mip_levels == u32::MAX { vk::REMAINING_MIP_LEVELS } else { desc.mip_levels };
        let view = create_view(ctx, texture, view_format(desc.format, texture), desc.most_detailed_mip, level_count)?;
        let set = match self.allocate_set(ctx, vk::DescriptorType::SAMPLED_IMAGE) {
            Ok(set) => set,
            Err(e) => {
                unsafe { ctx.device.destroy_image_view(view, None) };
                return Err(e);
            }
        };

        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .image_info(&image_info);
        unsafe {
            ctx.device.update_descriptor_sets(&[write], &[]);
        }

        self.replace(&ctx.device, index, Slot::ShaderResource { set, view });
        Ok(())
    }

    pub(crate) fn write_constant_buffer(
        &mut self,
        ctx: &GpuContext,
        index: u32,
        desc: &ConstantBufferViewDesc,
    ) -> Result<()> {
        self.expect_kind(DescriptorHeapKind::CbvSrvUav)?;
        let index = self.check_index(index)?;

        let (buffer, offset) = ctx.resolve_address(desc.buffer_location)?;
        let set = self.allocate_set(ctx, vk::DescriptorType::UNIFORM_BUFFER)?;

        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(offset)
            .range(desc.size_in_bytes as u64)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);
        unsafe {
            ctx.device.update_descriptor_sets(&[write], &[]);
        }

        self.replace(&ctx.device, index, Slot::ConstantBuffer { set });
        Ok(())
    }

    pub(crate) fn render_target(&self, index: u32) -> Result<RenderTargetSlot> {
        match self.slots.get(index as usize) {
            Some(Slot::RenderTarget(target)) => Ok(*target),
            _ => Err(Error::InvalidResource(format!("descriptor slot {} holds no render-target view", index))),
        }
    }

    pub(crate) fn descriptor_set(&self, index: u32) -> Result<vk::DescriptorSet> {
        match self.slots.get(index as usize) {
            Some(Slot::ShaderResource { set, .. }) | Some(Slot::ConstantBuffer { set }) => Ok(*set),
            _ => Err(Error::InvalidResource(format!("descriptor slot {} holds no shader-visible view", index))),
        }
    }
}

fn view_format(requested: Format, texture: &VulkanTexture) -> vk::Format {
    match requested {
        Format::UNKNOWN => format_to_vk(texture.desc().format),
        format => format_to_vk(format),
    }
}

fn create_view(
    ctx: &GpuContext,
    texture: &VulkanTexture,
    format: vk::Format,
    base_mip_level: u32,
    level_count: u32,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(texture.image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe { ctx.device.create_image_view(&create_info, None) }
        .map_err(|e| qf_err!(SOURCE, "Failed to create image view: {:?}", e))
}

/// Run `f` on the slot storage addressed by a CPU handle
pub(crate) fn with_slot<T>(
    ctx: &GpuContext,
    handle: u64,
    f: impl FnOnce(&mut HeapSlots, u32) -> Result<T>,
) -> Result<T> {
    let (heap_id, index) = decode_handle(handle)
        .ok_or_else(|| Error::InvalidResource(format!("malformed descriptor handle {:#x}", handle)))?;
    let heap = ctx
        .heap(heap_id)
        .ok_or_else(|| Error::InvalidResource(format!("descriptor handle {:#x} names no live heap", handle)))?;
    let mut slots = heap.lock().unwrap();
    f(&mut slots, index)
}

pub struct VulkanDescriptorHeap {
    ctx: Arc<GpuContext>,
    desc: DescriptorHeapDesc,
    id: u32,
    slots: Arc<Mutex<HeapSlots>>,
}

impl VulkanDescriptorHeap {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &DescriptorHeapDesc) -> Result<Self> {
        if desc.num_descriptors == 0 {
            return Err(Error::InvalidResource("descriptor heap with no descriptors".to_string()));
        }

        let pool = match desc.kind {
            DescriptorHeapKind::Rtv => vk::DescriptorPool::null(),
            DescriptorHeapKind::CbvSrvUav => {
                let pool_sizes = [
                    vk::DescriptorPoolSize {
                        ty: vk::DescriptorType::SAMPLED_IMAGE,
                        descriptor_count: desc.num_descriptors,
                    },
                    vk::DescriptorPoolSize {
                        ty: vk::DescriptorType::UNIFORM_BUFFER,
                        descriptor_count: desc.num_descriptors,
                    },
                ];
                let create_info = vk::DescriptorPoolCreateInfo::default()
                    .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
                    .max_sets(desc.num_descriptors)
                    .pool_sizes(&pool_sizes);
                unsafe { ctx.device.create_descriptor_pool(&create_info, None) }
                    .map_err(|e| qf_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))?
            }
            kind => {
                return Err(Error::UnsupportedCapability(format!(
                    "{:?} descriptor heaps are not supported by the Vulkan backend",
                    kind
                )));
            }
        };

        if desc.kind == DescriptorHeapKind::CbvSrvUav && !desc.is_shader_visible() {
            qf_warn!(SOURCE, "CBV/SRV heap created without SHADER_VISIBLE; its views can still be bound");
        }

        let slots = Arc::new(Mutex::new(HeapSlots {
            kind: desc.kind,
            pool,
            slots: (0..desc.num_descriptors).map(|_| Slot::Empty).collect(),
        }));
        let id = ctx.register_heap(slots.clone());

        Ok(Self { ctx, desc: *desc, id, slots })
    }
}

impl DescriptorHeap for VulkanDescriptorHeap {
    fn desc(&self) -> &DescriptorHeapDesc {
        &self.desc
    }

    fn cpu_descriptor_handle_for_heap_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle { ptr: encode_handle(self.id, 0) }
    }

    fn gpu_descriptor_handle_for_heap_start(&self) -> Option<GpuDescriptorHandle> {
        self.desc
            .is_shader_visible()
            .then(|| GpuDescriptorHandle { ptr: encode_handle(self.id, 0) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorHeap {
    fn drop(&mut self) {
        self.ctx.unregister_heap(self.id);
        let mut slots = self.slots.lock().unwrap();
        let pool = slots.pool;
        for slot in slots.slots.drain(..) {
            HeapSlots::release(&self.ctx.device, pool, slot);
        }
        if pool != vk::DescriptorPool::null() {
            unsafe {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_heap_tests.rs"]
mod tests;
