/// GPU resources: heap properties, descriptions, usage states, barriers
/// and the views used to bind buffers

use std::any::Any;
use std::fmt;
use std::ptr::NonNull;

use crate::error::Result;
use crate::graphics_device::Format;

/// GPU virtual address of a buffer (0 for textures)
pub type GpuVirtualAddress = u64;

/// Barrier subresource value meaning "every subresource"
pub const ALL_SUBRESOURCES: u32 = u32::MAX;

/// Kind of memory heap backing a committed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapType {
    /// GPU-local, not CPU-visible
    Default,
    /// CPU-writable, GPU-readable
    Upload,
    /// GPU-writable, CPU-readable
    Readback,
    /// Page property and memory pool given explicitly
    Custom,
}

/// CPU page property of a custom heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuPageProperty {
    Unknown,
    NotAvailable,
    WriteCombine,
    WriteBack,
}

/// Preferred memory pool of a custom heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPool {
    Unknown,
    /// System memory
    L0,
    /// Video memory
    L1,
}

/// Heap properties passed to `create_committed_resource`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapProperties {
    pub heap_type: HeapType,
    pub cpu_page_property: CpuPageProperty,
    pub memory_pool_preference: MemoryPool,
    pub creation_node_mask: u32,
    pub visible_node_mask: u32,
}

impl HeapProperties {
    fn of_type(heap_type: HeapType) -> Self {
        Self {
            heap_type,
            cpu_page_property: CpuPageProperty::Unknown,
            memory_pool_preference: MemoryPool::Unknown,
            creation_node_mask: 0,
            visible_node_mask: 0,
        }
    }

    /// GPU-local heap
    pub fn default_heap() -> Self {
        Self::of_type(HeapType::Default)
    }

    /// CPU-writable upload heap
    pub fn upload() -> Self {
        Self::of_type(HeapType::Upload)
    }

    /// Custom heap with CPU write-back pages in system memory
    ///
    /// Used for textures whose decoded rows are written by the CPU directly.
    pub fn custom_write_back() -> Self {
        Self {
            cpu_page_property: CpuPageProperty::WriteBack,
            memory_pool_preference: MemoryPool::L0,
            ..Self::of_type(HeapType::Custom)
        }
    }

    /// True when the CPU may map resources in this heap
    pub fn is_cpu_visible(&self) -> bool {
        match self.heap_type {
            HeapType::Upload | HeapType::Readback => true,
            HeapType::Default => false,
            HeapType::Custom => !matches!(
                self.cpu_page_property,
                CpuPageProperty::NotAvailable | CpuPageProperty::Unknown
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDimension {
    Buffer,
    Texture2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureLayout {
    /// Driver-chosen layout
    Unknown,
    /// Linear rows (required for buffers)
    RowMajor,
}

/// Resource description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    pub alignment: u64,
    /// Byte size for buffers, texel width for textures
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub format: Format,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub layout: TextureLayout,
}

impl ResourceDesc {
    /// Row-major buffer of `size` bytes
    pub fn buffer(size: u64) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            alignment: 0,
            width: size,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: Format::UNKNOWN,
            sample_count: 1,
            sample_quality: 0,
            layout: TextureLayout::RowMajor,
        }
    }

    /// Single-sampled 2D texture
    pub fn texture_2d(width: u32, height: u32, format: Format, array_size: u16, mip_levels: u16) -> Self {
        Self {
            dimension: ResourceDimension::Texture2D,
            alignment: 0,
            width: width as u64,
            height,
            depth_or_array_size: array_size,
            mip_levels,
            format,
            sample_count: 1,
            sample_quality: 0,
            layout: TextureLayout::Unknown,
        }
    }

    pub fn is_buffer(&self) -> bool {
        self.dimension == ResourceDimension::Buffer
    }
}

/// Usage state of a resource
///
/// A resource must be in the state an operation expects before the GPU
/// executes that operation; transitions are recorded with `ResourceBarrier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Common,
    /// Ready to be presented (swap-chain buffers between frames)
    Present,
    /// Bound as a color render target
    RenderTarget,
    /// Readable by every stage (upload heap resources)
    GenericRead,
    /// Sampled by the pixel stage
    PixelShaderResource,
    /// Destination of a copy
    CopyDest,
}

/// A resource barrier recorded into a command list
#[derive(Clone, Copy)]
pub enum ResourceBarrier<'a> {
    Transition {
        resource: &'a dyn Resource,
        subresource: u32,
        state_before: ResourceState,
        state_after: ResourceState,
    },
}

impl<'a> ResourceBarrier<'a> {
    /// Transition every subresource of `resource` from `before` to `after`
    pub fn transition(resource: &'a dyn Resource, before: ResourceState, after: ResourceState) -> Self {
        ResourceBarrier::Transition {
            resource,
            subresource: ALL_SUBRESOURCES,
            state_before: before,
            state_after: after,
        }
    }
}

impl fmt::Debug for ResourceBarrier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceBarrier::Transition { subresource, state_before, state_after, .. } => f
                .debug_struct("Transition")
                .field("subresource", subresource)
                .field("state_before", state_before)
                .field("state_after", state_after)
                .finish(),
        }
    }
}

/// Vertex buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    pub buffer_location: GpuVirtualAddress,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

/// Index buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer_location: GpuVirtualAddress,
    pub size_in_bytes: u32,
    pub format: Format,
}

impl IndexBufferView {
    /// Number of indices covered by the view
    pub fn index_count(&self) -> u32 {
        match self.format.size_bytes() {
            0 => 0,
            stride => self.size_in_bytes / stride,
        }
    }
}

/// Constant-buffer view (size must be a multiple of 256)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferViewDesc {
    pub buffer_location: GpuVirtualAddress,
    pub size_in_bytes: u32,
}

/// Channel swizzle of a shader-resource view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentMapping {
    /// r, g, b, a read as stored
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDimension {
    Texture2D,
}

/// Shader-resource view of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderResourceViewDesc {
    pub format: Format,
    pub dimension: ViewDimension,
    pub component_mapping: ComponentMapping,
    pub most_detailed_mip: u32,
    pub mip_levels: u32,
}

impl ShaderResourceViewDesc {
    /// 2D view of the first `mip_levels` mips with identity swizzle
    pub fn texture_2d(format: Format, mip_levels: u32) -> Self {
        Self {
            format,
            dimension: ViewDimension::Texture2D,
            component_mapping: ComponentMapping::Identity,
            most_detailed_mip: 0,
            mip_levels,
        }
    }
}

/// Render-target view of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetViewDesc {
    pub format: Format,
    pub dimension: ViewDimension,
}

/// GPU resource (buffer or texture)
pub trait Resource: Send + Sync {
    fn desc(&self) -> &ResourceDesc;

    /// GPU virtual address (buffers only; 0 for textures)
    fn gpu_virtual_address(&self) -> GpuVirtualAddress;

    /// Map a CPU-visible subresource and return a pointer to its first byte
    ///
    /// The pointer stays valid until the matching `unmap`. The mapped range
    /// covers `desc().width` bytes for buffers.
    ///
    /// # Errors
    ///
    /// Fails when the resource lives in a heap the CPU cannot see.
    fn map(&self, subresource: u32) -> Result<NonNull<u8>>;

    fn unmap(&self, subresource: u32);

    /// Copy tightly described rows into a texture subresource
    ///
    /// # Arguments
    ///
    /// * `subresource` - Subresource index (mip 0 / layer 0 is 0)
    /// * `data` - Source rows
    /// * `row_pitch` - Bytes between two rows in `data`
    /// * `depth_pitch` - Bytes between two slices in `data`
    fn write_to_subresource(&self, subresource: u32, data: &[u8], row_pitch: u32, depth_pitch: u32) -> Result<()>;

    /// For backend downcasts
    fn as_any(&self) -> &dyn Any;
}

/// Map `resource`, copy `data` to its start, unmap
///
/// # Errors
///
/// `Error::InvalidResource` when `data` does not fit in the resource; map
/// failures are propagated.
pub fn write_mapped(resource: &dyn Resource, data: &[u8]) -> Result<()> {
    let capacity = resource.desc().width;
    if data.len() as u64 > capacity {
        return Err(crate::Error::InvalidResource(format!(
            "{} bytes do not fit in a {} byte resource",
            data.len(),
            capacity
        )));
    }

    let ptr = resource.map(0)?;
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len());
    }
    resource.unmap(0);
    Ok(())
}
