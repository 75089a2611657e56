/// Command allocators, command lists and command queues

use std::any::Any;

use bitflags::bitflags;

use crate::error::Result;
use crate::graphics_device::{
    CpuDescriptorHandle, DescriptorHeap, GpuDescriptorHandle, GpuFence, IndexBufferView,
    PipelineState, ResourceBarrier, RootSignature, VertexBufferView,
};

/// Kind of command list / queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListKind {
    /// Graphics, compute and copy
    Direct,
    Bundle,
    Compute,
    Copy,
}

bitflags! {
    /// Command queue creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandQueueFlags: u32 {
        const DISABLE_GPU_TIMEOUT = 0x1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandQueuePriority {
    Normal,
    High,
    GlobalRealtime,
}

/// Command queue description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandQueueDesc {
    pub kind: CommandListKind,
    pub priority: CommandQueuePriority,
    pub flags: CommandQueueFlags,
    /// Adapter node (0 on single-adapter systems)
    pub node_mask: u32,
}

impl Default for CommandQueueDesc {
    /// Direct queue, normal priority, no flags, node 0
    fn default() -> Self {
        Self {
            kind: CommandListKind::Direct,
            priority: CommandQueuePriority::Normal,
            flags: CommandQueueFlags::empty(),
            node_mask: 0,
        }
    }
}

/// Viewport (pixels, depth in [0, 1])
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport with depth range [0, 1]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Integer rectangle (right/bottom exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { left: 0, top: 0, right: width as i32, bottom: height as i32 }
    }
}

/// Primitive topology bound at draw time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
}

/// Backing memory for command lists
pub trait CommandAllocator: Send + Sync {
    fn kind(&self) -> CommandListKind;

    /// Reclaim all command memory
    ///
    /// Must only be called once the GPU has finished every command list
    /// recorded from this allocator.
    fn reset(&mut self) -> Result<()>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}

/// Command recorder
///
/// Created in the recording state. `close` ends recording; `reset` starts
/// a new recording against an allocator.
pub trait CommandList: Send + Sync {
    fn kind(&self) -> CommandListKind;

    /// True between creation/reset and close
    fn is_recording(&self) -> bool;

    fn close(&mut self) -> Result<()>;

    fn reset(&mut self, allocator: &dyn CommandAllocator, initial_state: Option<&dyn PipelineState>) -> Result<()>;

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()>;

    fn set_render_targets(&mut self, render_targets: &[CpuDescriptorHandle]) -> Result<()>;

    fn clear_render_target_view(&mut self, render_target: CpuDescriptorHandle, color: [f32; 4]) -> Result<()>;

    fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<()>;

    fn set_scissor_rects(&mut self, rects: &[Rect]) -> Result<()>;

    fn set_pipeline_state(&mut self, pipeline_state: &dyn PipelineState) -> Result<()>;

    fn set_graphics_root_signature(&mut self, root_signature: &dyn RootSignature) -> Result<()>;

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()>;

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) -> Result<()>;

    fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<()>;

    fn set_descriptor_heaps(&mut self, heaps: &[&dyn DescriptorHeap]) -> Result<()>;

    /// Bind the descriptor table starting at `base` to root parameter `root_index`
    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) -> Result<()>;

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index_location: u32,
        base_vertex_location: i32,
        start_instance_location: u32,
    ) -> Result<()>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}

/// Hardware execution queue
pub trait CommandQueue: Send + Sync {
    fn desc(&self) -> &CommandQueueDesc;

    /// Submit closed command lists; they execute in order
    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<()>;

    /// Set `fence` to `value` once all previously submitted work completes
    fn signal(&self, fence: &dyn GpuFence, value: u64) -> Result<()>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}
