/// VulkanDevice - GraphicsDevice on top of a shared GpuContext

use quadframe::graphics_device::{
    CapabilityTier, CommandAllocator, CommandList, CommandListKind, CommandQueue,
    CommandQueueDesc, ConstantBufferViewDesc, CpuDescriptorHandle, DescriptorHeap,
    DescriptorHeapDesc, DescriptorHeapKind, GpuFence, GraphicsDevice, GraphicsPipelineStateDesc,
    HeapProperties, PipelineState, RenderTargetViewDesc, Resource, ResourceDesc, ResourceState,
    RootSignature, SerializedRootSignature, ShaderResourceViewDesc,
};
use quadframe::{qf_debug, Error, Result};
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{VulkanCommandAllocator, VulkanCommandList};
use crate::vulkan_command_queue::VulkanCommandQueue;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_heap::{with_slot, VulkanDescriptorHeap, HANDLE_STRIDE};
use crate::vulkan_fence::VulkanFence;
use crate::vulkan_pipeline::{VulkanPipelineState, VulkanRootSignature};
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "quadframe::vulkan";

pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    tier: CapabilityTier,
}

impl VulkanDevice {
    pub(crate) fn new(ctx: Arc<GpuContext>, tier: CapabilityTier) -> Self {
        Self { ctx, tier }
    }
}

fn texture_of(resource: &dyn Resource) -> Result<&VulkanTexture> {
    resource
        .as_any()
        .downcast_ref::<VulkanTexture>()
        .ok_or_else(|| Error::InvalidResource("view target is not a Vulkan texture".to_string()))
}

impl GraphicsDevice for VulkanDevice {
    fn capability_tier(&self) -> CapabilityTier {
        self.tier
    }

    fn create_command_allocator(&self, kind: CommandListKind) -> Result<Box<dyn CommandAllocator>> {
        Ok(Box::new(VulkanCommandAllocator::new(self.ctx.clone(), kind)?))
    }

    fn create_command_list(
        &self,
        kind: CommandListKind,
        allocator: &dyn CommandAllocator,
        initial_state: Option<&dyn PipelineState>,
    ) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(self.ctx.clone(), kind, allocator, initial_state)?))
    }

    fn create_command_queue(&self, desc: &CommandQueueDesc) -> Result<Box<dyn CommandQueue>> {
        Ok(Box::new(VulkanCommandQueue::new(self.ctx.clone(), desc)?))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>> {
        Ok(Box::new(VulkanDescriptorHeap::new(self.ctx.clone(), desc)?))
    }

    /// Handles are opaque slot indices; every heap kind uses the same stride
    fn descriptor_handle_increment_size(&self, _kind: DescriptorHeapKind) -> u32 {
        HANDLE_STRIDE
    }

    fn create_render_target_view(
        &self,
        resource: &dyn Resource,
        desc: &RenderTargetViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()> {
        let texture = texture_of(resource)?;
        with_slot(&self.ctx, dest.ptr, |slots, index| {
            slots.write_render_target(&self.ctx, index, texture, desc)
        })
    }

    fn create_shader_resource_view(
        &self,
        resource: &dyn Resource,
        desc: &ShaderResourceViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()> {
        let texture = texture_of(resource)?;
        with_slot(&self.ctx, dest.ptr, |slots, index| {
            slots.write_shader_resource(&self.ctx, index, texture, desc)
        })
    }

    fn create_constant_buffer_view(
        &self,
        desc: &ConstantBufferViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()> {
        with_slot(&self.ctx, dest.ptr, |slots, index| {
            slots.write_constant_buffer(&self.ctx, index, desc)
        })
    }

    fn create_committed_resource(
        &self,
        heap: &HeapProperties,
        desc: &ResourceDesc,
        initial_state: ResourceState,
    ) -> Result<Box<dyn Resource>> {
        if desc.is_buffer() {
            return Ok(Box::new(VulkanBuffer::new(self.ctx.clone(), heap, desc)?));
        }
        if heap.is_cpu_visible() {
            qf_debug!(SOURCE, "Texture requested in a CPU-visible heap, placing it in device memory");
        }
        Ok(Box::new(VulkanTexture::new(self.ctx.clone(), desc, initial_state)?))
    }

    fn create_root_signature(&self, serialized: &SerializedRootSignature) -> Result<Box<dyn RootSignature>> {
        Ok(Box::new(VulkanRootSignature::new(self.ctx.clone(), serialized)?))
    }

    fn create_graphics_pipeline_state(
        &self,
        desc: &GraphicsPipelineStateDesc<'_>,
    ) -> Result<Box<dyn PipelineState>> {
        Ok(Box::new(VulkanPipelineState::new(self.ctx.clone(), desc)?))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn GpuFence>> {
        Ok(Box::new(VulkanFence::new(self.ctx.clone(), initial_value)))
    }
}
