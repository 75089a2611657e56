/// FrameExecutor - the per-frame record, submit, wait and present cycle.
///
/// One frame moves through `Idle -> Recording -> Submitted -> Presented -> Idle`.
/// Every step checks the current state; calling a step out of order panics.
/// Only one frame is ever in flight: `wait_for_gpu` stalls the CPU until the
/// GPU has retired the frame just submitted.

use crate::asset::QUAD_INDEX_COUNT;
use crate::error::Result;
use crate::frame::{
    CommandSubmissionUnit, Fence, GraphicsPipeline, IndexBuffer, PresentationSurface,
    ResourceUploader, VertexBuffer, CONSTANT_ROOT_INDEX, CONSTANT_SLOT, TEXTURE_ROOT_INDEX,
};
use crate::graphics_device::{
    DescriptorHeapKind, GraphicsDevice, PrimitiveTopology, Rect, ResourceState, Viewport,
};
use crate::qf_trace;

const SOURCE: &str = "quadframe::FrameExecutor";

/// Position of the executor in the frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Recording,
    Submitted,
    Presented,
}

/// What one completed frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Back buffer drawn into
    pub back_buffer_index: u32,
    /// Fence value signaled after the frame's submission
    pub fence_value: u64,
}

/// Everything the draw binds, uploaded once at startup
pub struct FrameResources<'a> {
    pub pipeline: &'a GraphicsPipeline,
    pub uploader: &'a ResourceUploader,
    pub vertex_buffer: &'a VertexBuffer,
    pub index_buffer: &'a IndexBuffer,
}

pub struct FrameExecutor {
    fence: Fence,
    state: FrameState,
    back_buffer_index: u32,
    viewport: Viewport,
    scissor_rect: Rect,
    clear_color: [f32; 4],
    cbv_srv_increment: u32,
}

impl FrameExecutor {
    /// Create the executor and its fence for a `width` x `height` client area
    pub fn new(device: &dyn GraphicsDevice, width: u32, height: u32, clear_color: [f32; 4]) -> Result<Self> {
        let fence = Fence::new(device)?;
        Ok(Self {
            fence,
            state: FrameState::Idle,
            back_buffer_index: 0,
            viewport: Viewport::full(width, height),
            scissor_rect: Rect::from_size(width, height),
            clear_color,
            cbv_srv_increment: device.descriptor_handle_increment_size(DescriptorHeapKind::CbvSrvUav),
        })
    }

    /// Record the frame: transition in, clear, bind and draw the quad
    ///
    /// Returns the back-buffer index being drawn.
    ///
    /// # Panics
    ///
    /// Panics unless the executor is `Idle` and the recorder is open.
    pub fn begin_frame(
        &mut self,
        submission: &mut CommandSubmissionUnit,
        surface: &mut PresentationSurface,
        resources: &FrameResources<'_>,
    ) -> Result<u32> {
        self.expect_state(FrameState::Idle, "begin_frame");
        assert!(submission.recorder().is_recording(), "begin_frame with a closed recorder");

        let index = surface.current_index()?;
        let rtv = surface.rtv_handle(index);
        let list = submission.recorder_mut();

        surface.transition(list, index, ResourceState::Present, ResourceState::RenderTarget)?;
        list.set_render_targets(&[rtv])?;
        list.clear_render_target_view(rtv, self.clear_color)?;
        list.set_viewports(&[self.viewport])?;
        list.set_scissor_rects(&[self.scissor_rect])?;

        list.set_pipeline_state(&*resources.pipeline.pipeline_state)?;
        list.set_graphics_root_signature(&*resources.pipeline.root_signature)?;
        list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        list.set_vertex_buffers(0, &[resources.vertex_buffer.view])?;
        list.set_index_buffer(&resources.index_buffer.view)?;

        let heap_start = resources.uploader.texture_table();
        list.set_descriptor_heaps(&[resources.uploader.heap()])?;
        list.set_graphics_root_descriptor_table(TEXTURE_ROOT_INDEX, heap_start)?;
        list.set_graphics_root_descriptor_table(
            CONSTANT_ROOT_INDEX,
            heap_start.offset(CONSTANT_SLOT, self.cbv_srv_increment),
        )?;

        list.draw_indexed_instanced(QUAD_INDEX_COUNT, 1, 0, 0, 0)?;

        qf_trace!(SOURCE, "Recorded frame into back buffer {}", index);
        self.back_buffer_index = index;
        self.state = FrameState::Recording;
        Ok(index)
    }

    /// Transition the back buffer out, submit and signal the fence
    ///
    /// Returns the signaled fence value.
    pub fn end_frame(&mut self, submission: &mut CommandSubmissionUnit, surface: &mut PresentationSurface) -> Result<u64> {
        self.expect_state(FrameState::Recording, "end_frame");

        surface.transition(
            submission.recorder_mut(),
            self.back_buffer_index,
            ResourceState::RenderTarget,
            ResourceState::Present,
        )?;
        submission.close_and_execute()?;
        let value = self.fence.signal(submission.queue())?;

        self.state = FrameState::Submitted;
        Ok(value)
    }

    /// Block until the GPU has finished the submitted frame
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        self.expect_state(FrameState::Submitted, "wait_for_gpu");
        self.fence.wait_for_gpu()?;
        self.state = FrameState::Presented;
        Ok(())
    }

    /// Reset the allocator and recorder, then present
    pub fn present(
        &mut self,
        submission: &mut CommandSubmissionUnit,
        surface: &mut PresentationSurface,
        sync_interval: u32,
    ) -> Result<()> {
        self.expect_state(FrameState::Presented, "present");
        assert!(self.fence.is_idle(), "allocator reset while the GPU is still busy");

        submission.reset()?;
        surface.present(sync_interval)?;

        self.state = FrameState::Idle;
        Ok(())
    }

    /// Run one full cycle from `Idle` back to `Idle`
    pub fn run_frame(
        &mut self,
        submission: &mut CommandSubmissionUnit,
        surface: &mut PresentationSurface,
        resources: &FrameResources<'_>,
        sync_interval: u32,
    ) -> Result<FrameReport> {
        let back_buffer_index = self.begin_frame(submission, surface, resources)?;
        let fence_value = self.end_frame(submission, surface)?;
        self.wait_for_gpu()?;
        self.present(submission, surface, sync_interval)?;
        Ok(FrameReport { back_buffer_index, fence_value })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    pub(crate) fn fence_mut(&mut self) -> &mut Fence {
        &mut self.fence
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scissor_rect(&self) -> Rect {
        self.scissor_rect
    }

    fn expect_state(&self, expected: FrameState, step: &str) {
        assert_eq!(self.state, expected, "{} called in state {:?}", step, self.state);
    }
}

#[cfg(test)]
#[path = "frame_executor_tests.rs"]
mod tests;
