/// Frame module - the seven pipeline components and their owner

pub mod device_context;
pub mod command_submission;
pub mod presentation_surface;
pub mod resource_uploader;
pub mod pipeline_builder;
pub mod fence;
pub mod frame_executor;
pub mod quad_renderer;

pub use device_context::DeviceContext;
pub use command_submission::CommandSubmissionUnit;
pub use presentation_surface::{PresentationSurface, DEFAULT_BACK_BUFFER_COUNT};
pub use resource_uploader::{
    align_constant_buffer_size, IndexBuffer, ResourceUploader, VertexBuffer,
    CONSTANT_BUFFER_ALIGNMENT, CONSTANT_SLOT, TEXTURE_SLOT,
};
pub use pipeline_builder::{GraphicsPipeline, PipelineBuilder, CONSTANT_ROOT_INDEX, TEXTURE_ROOT_INDEX};
pub use fence::Fence;
pub use frame_executor::{FrameExecutor, FrameReport, FrameResources, FrameState};
pub use quad_renderer::{QuadRenderer, QuadRendererDesc};
