/// QuadRenderer - the explicit context object owning the whole pipeline.
///
/// Constructed once from a backend, a config and the startup inputs. It
/// owns every component and hands them to the frame executor by `&mut`.
/// Dropping it flushes the GPU before any object is released.

use crate::asset::{DecodedImage, QUAD_INDICES, QUAD_VERTICES};
use crate::camera::QuadCamera;
use crate::config::Config;
use crate::error::Result;
use crate::frame::{
    CommandSubmissionUnit, DeviceContext, FrameExecutor, FrameReport, FrameResources,
    GraphicsPipeline, IndexBuffer, PipelineBuilder, PresentationSurface, ResourceUploader,
    VertexBuffer,
};
use crate::graphics_device::{CapabilityTier, GraphicsBackend, ShaderBytecode, WindowSurface};
use crate::{qf_info, qf_warn};

const SOURCE: &str = "quadframe::QuadRenderer";

/// Startup inputs handed in by the windowing and asset collaborators
pub struct QuadRendererDesc<'a> {
    /// Native window; only used to create the swap chain
    pub window: &'a dyn WindowSurface,
    /// Client-area size in pixels
    pub width: u32,
    pub height: u32,
    pub vertex_shader: ShaderBytecode,
    pub pixel_shader: ShaderBytecode,
    pub texture: &'a DecodedImage,
}

pub struct QuadRenderer {
    // Drop order: frame objects, then resources, then the surface, the
    // submission unit and finally the device they were created on
    executor: FrameExecutor,
    pipeline: GraphicsPipeline,
    uploader: ResourceUploader,
    index_buffer: IndexBuffer,
    vertex_buffer: VertexBuffer,
    surface: PresentationSurface,
    submission: CommandSubmissionUnit,
    context: DeviceContext,
    camera: QuadCamera,
    sync_interval: u32,
}

impl QuadRenderer {
    /// Bring up the device, the swap chain and every startup resource
    ///
    /// # Errors
    ///
    /// Any creation failure; startup is all-or-nothing.
    pub fn new(backend: &mut dyn GraphicsBackend, config: &Config, desc: QuadRendererDesc<'_>) -> Result<Self> {
        let context = DeviceContext::init(backend, config)?;
        let device = context.device();

        let submission = CommandSubmissionUnit::new(device)?;

        let mut surface = PresentationSurface::create_swap_chain(
            context.factory(),
            submission.queue(),
            desc.window,
            desc.width,
            desc.height,
            config.back_buffer_format,
            config.back_buffer_count,
        )?;
        surface.build_render_targets(device)?;

        let vertex_buffer = ResourceUploader::upload_vertex_buffer(device, &QUAD_VERTICES)?;
        let index_buffer = ResourceUploader::upload_index_buffer(device, &QUAD_INDICES)?;

        let camera = QuadCamera::new(surface.width(), surface.height());
        let mut uploader = ResourceUploader::new(device)?;
        uploader.upload_texture(device, desc.texture)?;
        uploader.upload_constant_matrix(device, camera.world_view_projection())?;

        let pipeline = PipelineBuilder::new(&desc.vertex_shader, &desc.pixel_shader, surface.format()).build(device)?;

        let executor = FrameExecutor::new(device, surface.width(), surface.height(), config.clear_color)?;

        qf_info!(
            SOURCE,
            "Ready: tier {}, {}x{}, {} back buffers",
            context.capability_tier(),
            surface.width(),
            surface.height(),
            surface.buffer_count()
        );

        Ok(Self {
            executor,
            pipeline,
            uploader,
            index_buffer,
            vertex_buffer,
            surface,
            submission,
            context,
            camera,
            sync_interval: config.sync_interval,
        })
    }

    /// Record, submit, wait for and present one frame
    pub fn render_frame(&mut self) -> Result<FrameReport> {
        let resources = FrameResources {
            pipeline: &self.pipeline,
            uploader: &self.uploader,
            vertex_buffer: &self.vertex_buffer,
            index_buffer: &self.index_buffer,
        };
        self.executor.run_frame(&mut self.submission, &mut self.surface, &resources, self.sync_interval)
    }

    pub fn capability_tier(&self) -> CapabilityTier {
        self.context.capability_tier()
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    pub fn uploader(&self) -> &ResourceUploader {
        &self.uploader
    }

    pub fn executor(&self) -> &FrameExecutor {
        &self.executor
    }

    pub fn camera(&self) -> &QuadCamera {
        &self.camera
    }

    fn flush(&mut self) -> Result<()> {
        let fence = self.executor.fence_mut();
        fence.signal(self.submission.queue())?;
        fence.wait_for_gpu()
    }
}

impl Drop for QuadRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            qf_warn!(SOURCE, "GPU flush on shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "quad_renderer_tests.rs"]
mod tests;
