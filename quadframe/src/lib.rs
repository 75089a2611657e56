/*!
# quadframe

Core of a single textured-quad GPU frame pipeline.

The crate drives one GPU device through a frame: device bring-up with
capability-tier fallback, a double-buffered swap chain, descriptor-heap
bindings, one-time uploads, pipeline construction and the per-frame
record, submit, wait and present cycle fenced against the GPU.

## Architecture

- **graphics_device**: hardware abstraction traits (device, queues, command
  lists, descriptor heaps, resources, pipeline state, fences, swap chains)
- **frame**: the pipeline components written against those traits, owned
  by `QuadRenderer`
- **asset**: quad geometry, shader byte code and decoded image records
- **camera**: the view/projection constant uploaded for the quad

Backends (`quadframe_renderer_vulkan`) implement `GraphicsBackend` and the
traits behind it.
*/

mod error;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod frame;
pub mod asset;
pub mod camera;

pub use error::{Error, Result};

// Re-export math library at crate root
pub use glam;
