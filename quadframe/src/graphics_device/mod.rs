//! Backend-facing device traits and the plain descriptions passed through them

pub mod command_list;
pub mod descriptor_heap;
pub mod fence;
pub mod format;
pub mod graphics_device;
pub mod pipeline;
pub mod resource;
pub mod swapchain;

pub use command_list::*;
pub use descriptor_heap::*;
pub use fence::*;
pub use format::*;
pub use graphics_device::*;
pub use pipeline::*;
pub use resource::*;
pub use swapchain::*;

/// In-memory backend used by the unit tests
#[cfg(test)]
pub mod mock_graphics_device;
