/// PresentationSurface - swap chain, back buffers and their render-target views.
///
/// Tracks the usage state of every back buffer. Transitions are checked
/// against the tracked state; a mismatch is a programmer error and panics.

use crate::error::Result;
use crate::graphics_device::{
    CommandList, CommandQueue, CpuDescriptorHandle, DescriptorHeap, DescriptorHeapDesc,
    DescriptorHeapKind, Format, GraphicsDevice, GraphicsFactory, PresentFlags,
    RenderTargetViewDesc, Resource, ResourceBarrier, ResourceState, SwapChain, SwapChainDesc,
    ViewDimension, WindowSurface,
};
use crate::{qf_bail, qf_debug, qf_info};

const SOURCE: &str = "quadframe::PresentationSurface";

/// Requested back-buffer count
pub const DEFAULT_BACK_BUFFER_COUNT: u32 = 2;

struct BackBuffer {
    resource: Box<dyn Resource>,
    state: ResourceState,
}

pub struct PresentationSurface {
    // Drop order: views and buffers before the swap chain that owns them
    rtv_heap: Option<Box<dyn DescriptorHeap>>,
    back_buffers: Vec<BackBuffer>,
    rtv_increment: u32,
    swap_chain: Box<dyn SwapChain>,
    width: u32,
    height: u32,
    format: Format,
}

impl PresentationSurface {
    /// Create a flip-model swap chain sized to the window's client area
    ///
    /// # Arguments
    ///
    /// * `factory` - Adapter factory from the device context
    /// * `queue` - Queue whose output is presented
    /// * `window` - Native window; not retained
    /// * `width`, `height` - Client-area size in pixels
    /// * `format` - Requested back-buffer format
    /// * `buffer_count` - Requested back-buffer count
    pub fn create_swap_chain(
        factory: &dyn GraphicsFactory,
        queue: &dyn CommandQueue,
        window: &dyn WindowSurface,
        width: u32,
        height: u32,
        format: Format,
        buffer_count: u32,
    ) -> Result<Self> {
        let desc = SwapChainDesc::flip_model(width, height, format, buffer_count);
        let swap_chain = factory.create_swap_chain_for_window(queue, window, &desc)?;
        let actual = swap_chain.desc()?;

        qf_info!(
            SOURCE,
            "Swap chain {}x{} {:?}, {} buffers",
            actual.width,
            actual.height,
            actual.format,
            actual.buffer_count
        );
        Ok(Self {
            rtv_heap: None,
            back_buffers: Vec::new(),
            rtv_increment: 0,
            swap_chain,
            width: actual.width,
            height: actual.height,
            format: actual.format,
        })
    }

    /// Create one render-target view per back buffer
    ///
    /// The buffer count is queried from the swap chain, not assumed. Every
    /// back buffer starts in `ResourceState::Present`.
    pub fn build_render_targets(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        let buffer_count = self.swap_chain.desc()?.buffer_count;
        if buffer_count == 0 {
            qf_bail!(SOURCE, "Swap chain reports no back buffers");
        }

        let heap = device.create_descriptor_heap(&DescriptorHeapDesc::render_targets(buffer_count))?;
        let increment = device.descriptor_handle_increment_size(DescriptorHeapKind::Rtv);
        let start = heap.cpu_descriptor_handle_for_heap_start();
        let view = RenderTargetViewDesc { format: self.format, dimension: ViewDimension::Texture2D };

        let mut back_buffers = Vec::with_capacity(buffer_count as usize);
        for index in 0..buffer_count {
            let resource = self.swap_chain.buffer(index)?;
            device.create_render_target_view(&*resource, &view, start.offset(index, increment))?;
            back_buffers.push(BackBuffer { resource, state: ResourceState::Present });
        }

        qf_debug!(SOURCE, "{} render-target views created (increment {})", buffer_count, increment);
        self.rtv_heap = Some(heap);
        self.back_buffers = back_buffers;
        self.rtv_increment = increment;
        Ok(())
    }

    /// Index of the back buffer writable now, as reported by the swap chain
    pub fn current_index(&self) -> Result<u32> {
        self.swap_chain.current_back_buffer_index()
    }

    /// Render-target view of back buffer `index`
    ///
    /// # Panics
    ///
    /// Panics before `build_render_targets` or when `index` is out of range.
    pub fn rtv_handle(&self, index: u32) -> CpuDescriptorHandle {
        let heap = self.rtv_heap.as_ref().expect("render targets not built");
        assert!((index as usize) < self.back_buffers.len(), "back buffer {} out of range", index);
        heap.cpu_descriptor_handle_for_heap_start().offset(index, self.rtv_increment)
    }

    /// Record a transition of back buffer `index` and track its new state
    ///
    /// # Panics
    ///
    /// Panics when `before` is not the tracked state of the buffer.
    pub fn transition(
        &mut self,
        list: &mut dyn CommandList,
        index: u32,
        before: ResourceState,
        after: ResourceState,
    ) -> Result<()> {
        let buffer = &mut self.back_buffers[index as usize];
        assert_eq!(
            buffer.state, before,
            "back buffer {} is in {:?}, transition expects {:?}",
            index, buffer.state, before
        );
        list.resource_barrier(&[ResourceBarrier::transition(&*buffer.resource, before, after)])?;
        buffer.state = after;
        Ok(())
    }

    /// Tracked state of back buffer `index`
    pub fn back_buffer_state(&self, index: u32) -> ResourceState {
        self.back_buffers[index as usize].state
    }

    /// Present the current back buffer
    ///
    /// # Panics
    ///
    /// Panics when a back buffer is not in `ResourceState::Present`.
    pub fn present(&mut self, sync_interval: u32) -> Result<()> {
        for (index, buffer) in self.back_buffers.iter().enumerate() {
            assert_eq!(
                buffer.state,
                ResourceState::Present,
                "back buffer {} presented while in {:?}",
                index,
                buffer.state
            );
        }
        self.swap_chain.present(sync_interval, PresentFlags::empty())
    }

    pub fn buffer_count(&self) -> u32 {
        self.back_buffers.len() as u32
    }

    /// Back-buffer format, also the render-target view and pipeline format
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
#[path = "presentation_surface_tests.rs"]
mod tests;
