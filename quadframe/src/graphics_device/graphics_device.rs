/// Backend entry points: the backend itself, the device it creates and
/// the adapter factory that builds swap chains

use std::fmt;

use crate::error::Result;
use crate::graphics_device::{
    CommandAllocator, CommandList, CommandListKind, CommandQueue, CommandQueueDesc,
    ConstantBufferViewDesc, CpuDescriptorHandle, DescriptorHeap, DescriptorHeapDesc,
    DescriptorHeapKind, GpuFence, GraphicsPipelineStateDesc, HeapProperties, PipelineState,
    RenderTargetViewDesc, Resource, ResourceDesc, ResourceState, RootSignature,
    SerializedRootSignature, ShaderResourceViewDesc, SwapChain, SwapChainDesc, WindowSurface,
};

/// A hardware capability tier a device can be created against
///
/// Tiers are totally ordered; higher tiers expose more functionality. On the
/// Vulkan backend a tier is the requested API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityTier {
    pub major: u32,
    pub minor: u32,
}

impl CapabilityTier {
    /// Default fallback list, highest first
    pub const DEFAULT_FALLBACK: [CapabilityTier; 4] = [
        CapabilityTier::new(1, 3),
        CapabilityTier::new(1, 2),
        CapabilityTier::new(1, 1),
        CapabilityTier::new(1, 0),
    ];

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A graphics backend (Vulkan, mock, ...)
///
/// The device context drives a backend in a fixed order:
/// `enable_debug_layer` (optional), `create_device` once per capability
/// tier until one succeeds, then `create_factory`.
pub trait GraphicsBackend: Send {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Install the debug validation layer; must precede device creation
    fn enable_debug_layer(&mut self) -> Result<()>;

    /// Try to create a device at exactly `tier`
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedCapability` when the hardware or driver cannot
    /// provide the tier; any other error is a genuine creation failure.
    fn create_device(&mut self, tier: CapabilityTier) -> Result<Box<dyn GraphicsDevice>>;

    /// Create the adapter factory used for swap-chain creation
    ///
    /// # Arguments
    ///
    /// * `debug` - Create the debug-instrumented variant
    fn create_factory(&mut self, debug: bool) -> Result<Box<dyn GraphicsFactory>>;
}

/// A logical GPU device
///
/// All creation entry points for GPU objects. Descriptor views are written
/// into heap slots addressed by `CpuDescriptorHandle`; the distance between
/// two slots is `descriptor_handle_increment_size` and must never be assumed.
pub trait GraphicsDevice: Send + Sync {
    /// Tier this device was created at
    fn capability_tier(&self) -> CapabilityTier;

    fn create_command_allocator(&self, kind: CommandListKind) -> Result<Box<dyn CommandAllocator>>;

    /// Create a command list bound to `allocator`, already in the recording state
    fn create_command_list(
        &self,
        kind: CommandListKind,
        allocator: &dyn CommandAllocator,
        initial_state: Option<&dyn PipelineState>,
    ) -> Result<Box<dyn CommandList>>;

    fn create_command_queue(&self, desc: &CommandQueueDesc) -> Result<Box<dyn CommandQueue>>;

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>>;

    /// Distance in handle units between two consecutive descriptors of `kind`
    fn descriptor_handle_increment_size(&self, kind: DescriptorHeapKind) -> u32;

    /// Write a render-target view of `resource` into the RTV heap slot `dest`
    fn create_render_target_view(
        &self,
        resource: &dyn Resource,
        desc: &RenderTargetViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()>;

    /// Write a shader-resource view of `resource` into the CBV/SRV heap slot `dest`
    fn create_shader_resource_view(
        &self,
        resource: &dyn Resource,
        desc: &ShaderResourceViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()>;

    /// Write a constant-buffer view into the CBV/SRV heap slot `dest`
    fn create_constant_buffer_view(
        &self,
        desc: &ConstantBufferViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()>;

    /// Create a resource with its own implicit heap
    fn create_committed_resource(
        &self,
        heap: &HeapProperties,
        desc: &ResourceDesc,
        initial_state: ResourceState,
    ) -> Result<Box<dyn Resource>>;

    fn create_root_signature(&self, serialized: &SerializedRootSignature) -> Result<Box<dyn RootSignature>>;

    fn create_graphics_pipeline_state(
        &self,
        desc: &GraphicsPipelineStateDesc<'_>,
    ) -> Result<Box<dyn PipelineState>>;

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn GpuFence>>;
}

/// Adapter factory (swap-chain creation)
pub trait GraphicsFactory: Send + Sync {
    /// True for the debug-instrumented variant
    fn is_debug(&self) -> bool;

    /// Create a swap chain presenting `queue`'s output into `window`
    ///
    /// The window handle is only used during this call.
    fn create_swap_chain_for_window(
        &self,
        queue: &dyn CommandQueue,
        window: &dyn WindowSurface,
        desc: &SwapChainDesc,
    ) -> Result<Box<dyn SwapChain>>;
}
