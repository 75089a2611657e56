/// Descriptor heaps and the handles that address their slots

use std::any::Any;

use bitflags::bitflags;

/// Kind of descriptors a heap holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant-buffer, shader-resource and unordered-access views
    CbvSrvUav,
    Sampler,
    /// Render-target views
    Rtv,
    /// Depth-stencil views
    Dsv,
}

bitflags! {
    /// Descriptor heap creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescriptorHeapFlags: u32 {
        /// Descriptors can be referenced by shaders through descriptor tables
        const SHADER_VISIBLE = 0x1;
    }
}

/// Descriptor heap description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapDesc {
    pub kind: DescriptorHeapKind,
    pub num_descriptors: u32,
    pub flags: DescriptorHeapFlags,
    pub node_mask: u32,
}

impl DescriptorHeapDesc {
    /// Non-shader-visible render-target heap
    pub fn render_targets(num_descriptors: u32) -> Self {
        Self {
            kind: DescriptorHeapKind::Rtv,
            num_descriptors,
            flags: DescriptorHeapFlags::empty(),
            node_mask: 0,
        }
    }

    /// Shader-visible CBV/SRV/UAV heap
    pub fn shader_visible(num_descriptors: u32) -> Self {
        Self {
            kind: DescriptorHeapKind::CbvSrvUav,
            num_descriptors,
            flags: DescriptorHeapFlags::SHADER_VISIBLE,
            node_mask: 0,
        }
    }

    pub fn is_shader_visible(&self) -> bool {
        self.flags.contains(DescriptorHeapFlags::SHADER_VISIBLE)
    }
}

/// CPU-side address of a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuDescriptorHandle {
    pub ptr: u64,
}

impl CpuDescriptorHandle {
    /// Handle of the descriptor `index` slots after this one
    ///
    /// `increment` is the device-reported increment for the heap kind.
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self { ptr: self.ptr + index as u64 * increment as u64 }
    }
}

/// GPU-side address of a descriptor slot (shader-visible heaps only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpuDescriptorHandle {
    pub ptr: u64,
}

impl GpuDescriptorHandle {
    /// Handle of the descriptor `index` slots after this one
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self { ptr: self.ptr + index as u64 * increment as u64 }
    }
}

/// Fixed-capacity array of descriptors
pub trait DescriptorHeap: Send + Sync {
    fn desc(&self) -> &DescriptorHeapDesc;

    fn cpu_descriptor_handle_for_heap_start(&self) -> CpuDescriptorHandle;

    /// `None` unless the heap is shader visible
    fn gpu_descriptor_handle_for_heap_start(&self) -> Option<GpuDescriptorHandle>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}
