/*!
# quadframe - Vulkan backend

Vulkan implementation of the quadframe graphics-device traits, using Ash
for the Vulkan bindings and gpu-allocator for memory management.

## Binding model

Root signatures become pipeline layouts:

- descriptor table `i` is descriptor set `i`, binding 0 (one descriptor per table)
- static samplers live in the set after the last table, at binding
  `shader_register`, as immutable samplers

Shaders must be SPIR-V compiled against that layout. For the quad pipeline
(table 0 = `t0`, table 1 = `b0`, static sampler `s0`) with DXC:

```text
dxc -spirv -fvk-bind-register t0 0 0 0 -fvk-bind-register b0 0 0 1 -fvk-bind-register s0 0 0 2 ...
```

## Emulated descriptor handles and addresses

Descriptor handles and GPU virtual addresses are opaque values resolved by
the backend; only offsets computed with
`descriptor_handle_increment_size` and buffer-relative address arithmetic
are meaningful.
*/

mod debug;
mod vulkan_backend;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_command_queue;
mod vulkan_context;
mod vulkan_descriptor_heap;
mod vulkan_device;
mod vulkan_fence;
mod vulkan_format;
mod vulkan_pipeline;
mod vulkan_sampler;
mod vulkan_swapchain;
mod vulkan_texture;

pub use vulkan_backend::{VulkanBackend, VulkanFactory};
pub use vulkan_device::VulkanDevice;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report};
