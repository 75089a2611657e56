/// Command allocators and command lists on Vulkan
///
/// An allocator is a VkCommandPool; a command list is one primary command
/// buffer allocated from it. The render pass of the bound render target
/// is begun lazily by the first clear or draw and ended by the next
/// barrier, render-target change or `close`.

use ash::vk;
use quadframe::graphics_device::{
    CommandAllocator, CommandList, CommandListKind, CpuDescriptorHandle, DescriptorHeap,
    GpuDescriptorHandle, IndexBufferView, PipelineState, PrimitiveTopology,
    PrimitiveTopologyType, Rect, ResourceBarrier, RootSignature, VertexBufferView, Viewport,
};
use quadframe::{qf_bail, qf_err, Error, Result};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_heap::{with_slot, RenderTargetSlot, VulkanDescriptorHeap};
use crate::vulkan_format::{
    index_type, state_access, state_layout, state_stage, topology, topology_for_type,
};
use crate::vulkan_pipeline::{VulkanPipelineState, VulkanRootSignature};
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "quadframe::vulkan";

fn check_direct(kind: CommandListKind) -> Result<()> {
    if kind != CommandListKind::Direct {
        return Err(Error::UnsupportedCapability(format!(
            "{:?} command lists are not supported by the Vulkan backend",
            kind
        )));
    }
    Ok(())
}

// ===== ALLOCATOR =====

pub struct VulkanCommandAllocator {
    ctx: Arc<GpuContext>,
    kind: CommandListKind,
    pub(crate) pool: vk::CommandPool,
}

impl VulkanCommandAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>, kind: CommandListKind) -> Result<Self> {
        check_direct(kind)?;
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { ctx.device.create_command_pool(&create_info, None) }
            .map_err(|e| qf_err!(SOURCE, "Failed to create command pool: {:?}", e))?;
        Ok(Self { ctx, kind, pool })
    }
}

impl CommandAllocator for VulkanCommandAllocator {
    fn kind(&self) -> CommandListKind {
        self.kind
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| qf_err!(SOURCE, "Failed to reset command pool: {:?}", e))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCommandAllocator {
    fn drop(&mut self) {
        unsafe {
            // Frees every command buffer allocated from the pool
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

fn vulkan_allocator(allocator: &dyn CommandAllocator) -> Result<&VulkanCommandAllocator> {
    allocator
        .as_any()
        .downcast_ref::<VulkanCommandAllocator>()
        .ok_or_else(|| Error::InvalidResource("allocator is not a Vulkan command allocator".to_string()))
}

// ===== COMMAND LIST =====

/// What `CommandList::reset` does with the current command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferReuse {
    /// Same pool: its reset already returned the buffer to the initial state
    Reuse,
    /// Another pool: allocate from it, then free the old buffer
    Replace,
}

fn buffer_reuse(current_pool: vk::CommandPool, requested_pool: vk::CommandPool) -> BufferReuse {
    if current_pool == requested_pool {
        BufferReuse::Reuse
    } else {
        BufferReuse::Replace
    }
}

/// Tables bound through the current root signature
struct BoundRootSignature {
    layout: vk::PipelineLayout,
    table_count: u32,
}

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    kind: CommandListKind,
    /// Pool of the allocator the buffer came from
    pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    recording: bool,
    render_target: Option<RenderTargetSlot>,
    in_render_pass: bool,
    root_signature: Option<BoundRootSignature>,
    pipeline_topology: Option<PrimitiveTopologyType>,
    topology: Option<PrimitiveTopology>,
}

impl VulkanCommandList {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        kind: CommandListKind,
        allocator: &dyn CommandAllocator,
        initial_state: Option<&dyn PipelineState>,
    ) -> Result<Self> {
        check_direct(kind)?;
        let pool = vulkan_allocator(allocator)?.pool;
        let command_buffer = Self::allocate_buffer(&ctx, pool)?;

        let mut list = Self {
            ctx,
            kind,
            pool,
            command_buffer,
            recording: false,
            render_target: None,
            in_render_pass: false,
            root_signature: None,
            pipeline_topology: None,
            topology: None,
        };
        list.begin(initial_state)?;
        Ok(list)
    }

    fn allocate_buffer(ctx: &GpuContext, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { ctx.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| qf_err!(SOURCE, "Failed to allocate command buffer: {:?}", e))?;
        Ok(buffers[0])
    }

    fn begin(&mut self, initial_state: Option<&dyn PipelineState>) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(|e| qf_err!(SOURCE, "Failed to begin command buffer: {:?}", e))?;

        self.recording = true;
        self.render_target = None;
        self.in_render_pass = false;
        self.root_signature = None;
        self.pipeline_topology = None;
        self.topology = None;

        if let Some(pipeline_state) = initial_state {
            self.set_pipeline_state(pipeline_state)?;
        }
        Ok(())
    }

    fn expect_recording(&self, command: &str) -> Result<()> {
        if !self.recording {
            qf_bail!(SOURCE, "{} recorded into a closed command list", command);
        }
        Ok(())
    }

    fn begin_render_pass_if_needed(&mut self) -> Result<()> {
        if self.in_render_pass {
            return Ok(());
        }
        let Some(target) = self.render_target else {
            qf_bail!(SOURCE, "No render target bound");
        };

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(target.render_pass)
            .framebuffer(target.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            });
        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass_if_active(&mut self) {
        if self.in_render_pass {
            unsafe {
                self.ctx.device.cmd_end_render_pass(self.command_buffer);
            }
            self.in_render_pass = false;
        }
    }
}

impl CommandList for VulkanCommandList {
    fn kind(&self) -> CommandListKind {
        self.kind
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn close(&mut self) -> Result<()> {
        self.expect_recording("close")?;
        self.end_render_pass_if_active();
        unsafe { self.ctx.device.end_command_buffer(self.command_buffer) }
            .map_err(|e| qf_err!(SOURCE, "Failed to end command buffer: {:?}", e))?;
        self.recording = false;
        Ok(())
    }

    fn reset(&mut self, allocator: &dyn CommandAllocator, initial_state: Option<&dyn PipelineState>) -> Result<()> {
        if self.recording {
            qf_bail!(SOURCE, "Command list reset while still recording");
        }
        let pool = vulkan_allocator(allocator)?.pool;
        if buffer_reuse(self.pool, pool) == BufferReuse::Replace {
            let command_buffer = Self::allocate_buffer(&self.ctx, pool)?;
            // The previous allocator must still be alive, as for any reset
            unsafe {
                self.ctx.device.free_command_buffers(self.pool, &[self.command_buffer]);
            }
            self.command_buffer = command_buffer;
            self.pool = pool;
        }
        self.begin(initial_state)
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        self.expect_recording("resource_barrier")?;
        self.end_render_pass_if_active();

        let mut src_stages = vk::PipelineStageFlags::empty();
        let mut dst_stages = vk::PipelineStageFlags::empty();
        let mut image_barriers = Vec::with_capacity(barriers.len());
        let mut buffer_barriers = Vec::new();

        for barrier in barriers {
            let ResourceBarrier::Transition { resource, state_before, state_after, .. } = *barrier;
            src_stages |= state_stage(state_before);
            dst_stages |= state_stage(state_after);

            if let Some(texture) = resource.as_any().downcast_ref::<VulkanTexture>() {
                image_barriers.push(
                    vk::ImageMemoryBarrier::default()
                        .old_layout(texture.barrier_old_layout(state_before))
                        .new_layout(state_layout(state_after))
                        .src_access_mask(state_access(state_before))
                        .dst_access_mask(state_access(state_after))
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(texture.image)
                        .subresource_range(texture.subresource_range()),
                );
            } else if let Some(buffer) = resource.as_any().downcast_ref::<VulkanBuffer>() {
                buffer_barriers.push(
                    vk::BufferMemoryBarrier::default()
                        .src_access_mask(state_access(state_before))
                        .dst_access_mask(state_access(state_after))
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .buffer(buffer.buffer)
                        .offset(0)
                        .size(vk::WHOLE_SIZE),
                );
            } else {
                qf_bail!(SOURCE, "Barrier on a resource that is not a Vulkan resource");
            }
        }

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &buffer_barriers,
                &image_barriers,
            );
        }
        Ok(())
    }

    fn set_render_targets(&mut self, render_targets: &[CpuDescriptorHandle]) -> Result<()> {
        self.expect_recording("set_render_targets")?;
        let [handle] = render_targets else {
            return Err(Error::UnsupportedCapability(format!(
                "the Vulkan backend binds exactly one render target, got {}",
                render_targets.len()
            )));
        };
        let target = with_slot(&self.ctx, handle.ptr, |slots, index| slots.render_target(index))?;

        if self.render_target != Some(target) {
            self.end_render_pass_if_active();
            self.render_target = Some(target);
        }
        Ok(())
    }

    fn clear_render_target_view(&mut self, render_target: CpuDescriptorHandle, color: [f32; 4]) -> Result<()> {
        self.expect_recording("clear_render_target_view")?;
        let target = with_slot(&self.ctx, render_target.ptr, |slots, index| slots.render_target(index))?;
        if self.render_target != Some(target) {
            qf_bail!(SOURCE, "Clearing a render target that is not bound");
        }
        self.begin_render_pass_if_needed()?;

        let attachments = [vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
        }];
        let rects = [vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            },
            base_array_layer: 0,
            layer_count: 1,
        }];
        unsafe {
            self.ctx.device.cmd_clear_attachments(self.command_buffer, &attachments, &rects);
        }
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<()> {
        self.expect_recording("set_viewports")?;
        let viewports: Vec<vk::Viewport> = viewports
            .iter()
            .map(|v| vk::Viewport {
                x: v.top_left_x,
                y: v.top_left_y,
                width: v.width,
                height: v.height,
                min_depth: v.min_depth,
                max_depth: v.max_depth,
            })
            .collect();
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &viewports);
        }
        Ok(())
    }

    fn set_scissor_rects(&mut self, rects: &[Rect]) -> Result<()> {
        self.expect_recording("set_scissor_rects")?;
        let scissors: Vec<vk::Rect2D> = rects
            .iter()
            .map(|r| vk::Rect2D {
                offset: vk::Offset2D { x: r.left, y: r.top },
                extent: vk::Extent2D {
                    width: (r.right - r.left).max(0) as u32,
                    height: (r.bottom - r.top).max(0) as u32,
                },
            })
            .collect();
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &scissors);
        }
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline_state: &dyn PipelineState) -> Result<()> {
        self.expect_recording("set_pipeline_state")?;
        let pipeline = pipeline_state
            .as_any()
            .downcast_ref::<VulkanPipelineState>()
            .ok_or_else(|| Error::InvalidResource("pipeline state is not a Vulkan pipeline".to_string()))?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        }
        self.pipeline_topology = Some(pipeline.primitive_topology_type());
        Ok(())
    }

    fn set_graphics_root_signature(&mut self, root_signature: &dyn RootSignature) -> Result<()> {
        self.expect_recording("set_graphics_root_signature")?;
        let signature = root_signature
            .as_any()
            .downcast_ref::<VulkanRootSignature>()
            .ok_or_else(|| Error::InvalidResource("root signature is not a Vulkan root signature".to_string()))?;

        let table_count = signature.parameter_count();
        if let Some(sampler_set) = signature.sampler_set {
            unsafe {
                self.ctx.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    signature.layout,
                    table_count,
                    &[sampler_set],
                    &[],
                );
            }
        }
        self.root_signature = Some(BoundRootSignature { layout: signature.layout, table_count });
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.expect_recording("set_primitive_topology")?;
        self.topology = Some(topology);
        Ok(())
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) -> Result<()> {
        self.expect_recording("set_vertex_buffers")?;
        let mut buffers = Vec::with_capacity(views.len());
        let mut offsets = Vec::with_capacity(views.len());
        for view in views {
            let (buffer, offset) = self.ctx.resolve_address(view.buffer_location)?;
            buffers.push(buffer);
            offsets.push(offset);
        }
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, start_slot, &buffers, &offsets);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<()> {
        self.expect_recording("set_index_buffer")?;
        let index_type = index_type(view.format)
            .ok_or_else(|| Error::InvalidResource(format!("{:?} is not an index format", view.format)))?;
        let (buffer, offset) = self.ctx.resolve_address(view.buffer_location)?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type);
        }
        Ok(())
    }

    fn set_descriptor_heaps(&mut self, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
        self.expect_recording("set_descriptor_heaps")?;
        // Vulkan binds sets, not heaps; only check what the tables will use
        for heap in heaps {
            if heap.as_any().downcast_ref::<VulkanDescriptorHeap>().is_none() {
                qf_bail!(SOURCE, "Descriptor heap is not a Vulkan descriptor heap");
            }
            if !heap.desc().is_shader_visible() {
                qf_bail!(SOURCE, "Descriptor heap bound for shaders is not shader visible");
            }
        }
        Ok(())
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) -> Result<()> {
        self.expect_recording("set_graphics_root_descriptor_table")?;
        let Some(bound) = &self.root_signature else {
            qf_bail!(SOURCE, "Descriptor table {} set before any root signature", root_index);
        };
        if root_index >= bound.table_count {
            qf_bail!(
                SOURCE,
                "Root parameter {} out of range ({} tables)",
                root_index,
                bound.table_count
            );
        }
        let layout = bound.layout;

        let set = with_slot(&self.ctx, base.ptr, |slots, index| slots.descriptor_set(index))?;
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                root_index,
                &[set],
                &[],
            );
        }
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index_location: u32,
        base_vertex_location: i32,
        start_instance_location: u32,
    ) -> Result<()> {
        self.expect_recording("draw_indexed_instanced")?;
        let Some(pipeline_topology) = self.pipeline_topology else {
            qf_bail!(SOURCE, "Draw without a pipeline state");
        };
        if self.root_signature.is_none() {
            qf_bail!(SOURCE, "Draw without a root signature");
        }
        if let Some(requested) = self.topology {
            if topology(requested) != topology_for_type(pipeline_topology) {
                return Err(Error::UnsupportedCapability(format!(
                    "{:?} differs from the topology baked into the pipeline",
                    requested
                )));
            }
        }

        self.begin_render_pass_if_needed()?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count_per_instance,
                instance_count,
                start_index_location,
                base_vertex_location,
                start_instance_location,
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
