/// Mock graphics backend for unit tests (no GPU required)
///
/// Every mock object shares one `MockGpuState`, so tests can inspect what
/// the code under test created, recorded, submitted and presented. The mock
/// enforces the rules a debug layer would: closed lists only, valid
/// descriptor slots, no allocator reset while its work is in flight.

use std::any::Any;
use std::collections::VecDeque;
use std::num::NonZeroIsize;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle,
    RawWindowHandle, Win32WindowHandle, WindowHandle, WindowsDisplayHandle,
};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{
    CapabilityTier, CommandAllocator, CommandList, CommandListKind, CommandQueue,
    CommandQueueDesc, ConstantBufferViewDesc, CpuDescriptorHandle, DescriptorHeap,
    DescriptorHeapDesc, DescriptorHeapKind, GpuDescriptorHandle, GpuFence, GpuVirtualAddress,
    GraphicsBackend, GraphicsDevice, GraphicsFactory, GraphicsPipelineStateDesc, HeapProperties,
    IndexBufferView, InputElementDesc, PipelineState, PresentFlags, PrimitiveTopology,
    PrimitiveTopologyType, RasterizerDesc, Rect, RenderTargetViewDesc, Resource,
    ResourceBarrier, ResourceDesc, ResourceState, RootSignature, RootSignatureDesc,
    SerializedRootSignature, ShaderResourceViewDesc, SwapChain, SwapChainDesc, VertexBufferView,
    Viewport, WindowSurface, BlendDesc, Format,
};
use crate::qf_bail;

const SOURCE: &str = "quadframe::mock";

/// First buffer address handed out by the mock
pub const MOCK_BASE_ADDRESS: GpuVirtualAddress = 0x1000_0000;
const MOCK_ADDRESS_ALIGNMENT: u64 = 0x1_0000;

// ============================================================================
// Shared State
// ============================================================================

/// A command as recorded by `MockCommandList`
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Barrier { resource_id: u64, before: ResourceState, after: ResourceState },
    SetRenderTargets(Vec<CpuDescriptorHandle>),
    ClearRenderTarget { handle: CpuDescriptorHandle, color: [f32; 4] },
    SetViewports(Vec<Viewport>),
    SetScissorRects(Vec<Rect>),
    SetPipelineState(u64),
    SetRootSignature(u64),
    SetPrimitiveTopology(PrimitiveTopology),
    SetVertexBuffers { start_slot: u32, views: Vec<VertexBufferView> },
    SetIndexBuffer(IndexBufferView),
    SetDescriptorHeaps(Vec<u64>),
    SetRootDescriptorTable { root_index: u32, base: GpuDescriptorHandle },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
}

/// A view written into a descriptor slot
#[derive(Debug, Clone, PartialEq)]
pub enum MockDescriptor {
    RenderTarget { resource_id: u64, desc: RenderTargetViewDesc },
    ShaderResource { resource_id: u64, desc: ShaderResourceViewDesc },
    ConstantBuffer(ConstantBufferViewDesc),
}

/// A `write_to_subresource` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSubresourceWrite {
    pub subresource: u32,
    pub row_pitch: u32,
    pub depth_pitch: u32,
    pub len: usize,
}

/// A committed resource as the mock GPU sees it
#[derive(Debug)]
pub struct MockResourceRecord {
    pub desc: ResourceDesc,
    pub heap: HeapProperties,
    pub initial_state: ResourceState,
    pub address: GpuVirtualAddress,
    pub memory: Arc<Mutex<Vec<u8>>>,
    pub writes: Vec<MockSubresourceWrite>,
}

/// A created pipeline state, kept for inspection
#[derive(Debug, Clone)]
pub struct MockPipelineRecord {
    pub id: u64,
    pub root_signature_id: u64,
    pub vertex_entry_point: String,
    pub pixel_entry_point: String,
    pub input_layout: Vec<InputElementDesc>,
    pub rasterizer: RasterizerDesc,
    pub blend: BlendDesc,
    pub sample_mask: u32,
    pub sample_count: u32,
    pub topology_type: PrimitiveTopologyType,
    pub render_target_formats: Vec<Format>,
}

#[derive(Debug, Clone, Copy)]
struct PendingSignal {
    fence_id: u64,
    value: u64,
    /// Number of submissions completed once this signal is reached
    covers: usize,
}

/// Everything the mock GPU knows
#[derive(Debug)]
pub struct MockGpuState {
    next_id: u64,
    next_address: GpuVirtualAddress,

    // Backend behavior
    pub supported_tiers: Vec<CapabilityTier>,
    pub attempted_tiers: Vec<CapabilityTier>,
    pub debug_layer_available: bool,
    pub debug_layer_enabled: bool,
    pub fail_factory: bool,
    pub fail_resource_creation: bool,
    /// Signals complete immediately instead of on wait
    pub auto_complete: bool,
    /// Buffer count the swap chain reports instead of the requested one
    pub swap_chain_buffer_count: Option<u32>,

    // Objects
    pub resources: FxHashMap<u64, MockResourceRecord>,
    pub heaps: FxHashMap<u64, DescriptorHeapDesc>,
    pub descriptors: FxHashMap<u64, MockDescriptor>,
    pub root_signatures: FxHashMap<u64, RootSignatureDesc>,
    pub pipelines: Vec<MockPipelineRecord>,
    pub swap_chain_desc: Option<SwapChainDesc>,

    // Execution
    pub executed_lists: Vec<Vec<MockCommand>>,
    submissions: Vec<u64>,
    completed_submissions: usize,
    pending_signals: VecDeque<PendingSignal>,
    pub fence_values: FxHashMap<u64, u64>,
    pub fence_signals: Vec<(u64, u64)>,
    pub fence_waits: u32,
    pub allocator_resets: u32,
    pub back_buffer_index: u32,
    pub presents: Vec<(u32, u32)>,
}

impl Default for MockGpuState {
    fn default() -> Self {
        Self {
            next_id: 1,
            next_address: MOCK_BASE_ADDRESS,
            supported_tiers: CapabilityTier::DEFAULT_FALLBACK.to_vec(),
            attempted_tiers: Vec::new(),
            debug_layer_available: true,
            debug_layer_enabled: false,
            fail_factory: false,
            fail_resource_creation: false,
            auto_complete: false,
            swap_chain_buffer_count: None,
            resources: FxHashMap::default(),
            heaps: FxHashMap::default(),
            descriptors: FxHashMap::default(),
            root_signatures: FxHashMap::default(),
            pipelines: Vec::new(),
            swap_chain_desc: None,
            executed_lists: Vec::new(),
            submissions: Vec::new(),
            completed_submissions: 0,
            pending_signals: VecDeque::new(),
            fence_values: FxHashMap::default(),
            fence_signals: Vec::new(),
            fence_waits: 0,
            allocator_resets: 0,
            back_buffer_index: 0,
            presents: Vec::new(),
        }
    }
}

impl MockGpuState {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn allocate_address(&mut self, size: u64) -> GpuVirtualAddress {
        let address = self.next_address;
        let span = size.max(1).div_ceil(MOCK_ADDRESS_ALIGNMENT) * MOCK_ADDRESS_ALIGNMENT;
        self.next_address += span;
        address
    }

    /// Bytes of GPU memory at `address` (buffers only)
    pub fn read_gpu_memory(&self, address: GpuVirtualAddress, len: usize) -> Option<Vec<u8>> {
        self.resources.values().find_map(|record| {
            if !record.desc.is_buffer() || address < record.address {
                return None;
            }
            let offset = (address - record.address) as usize;
            let memory = record.memory.lock().unwrap();
            if offset + len <= memory.len() {
                Some(memory[offset..offset + len].to_vec())
            } else {
                None
            }
        })
    }

    /// Descriptor written at a CPU or GPU handle value
    pub fn descriptor_at(&self, ptr: u64) -> Option<&MockDescriptor> {
        self.descriptors.get(&ptr)
    }

    /// Submissions the GPU has not finished yet
    pub fn in_flight_submissions(&self) -> usize {
        self.submissions.len() - self.completed_submissions
    }

    /// Signaled fence values not reached yet
    pub fn pending_signal_count(&self) -> usize {
        self.pending_signals.len()
    }

    fn complete_signal(&mut self, signal: PendingSignal) {
        self.fence_values.insert(signal.fence_id, signal.value);
        self.completed_submissions = self.completed_submissions.max(signal.covers);
    }

    /// Check that `ptr` addresses a valid slot of a `kind` heap
    fn check_slot(&self, ptr: u64, kind: DescriptorHeapKind) -> Result<()> {
        let heap_id = ptr >> 32;
        let offset = ptr & 0xFFFF_FFFF;
        let Some(desc) = self.heaps.get(&heap_id) else {
            qf_bail!(SOURCE, "Descriptor handle {:#x} does not belong to any heap", ptr);
        };
        if desc.kind != kind {
            qf_bail!(SOURCE, "Descriptor handle {:#x} is in a {:?} heap, expected {:?}", ptr, desc.kind, kind);
        }
        let increment = increment_for(kind) as u64;
        if offset % increment != 0 {
            qf_bail!(SOURCE, "Descriptor handle {:#x} is not slot aligned", ptr);
        }
        let slot = offset / increment;
        if slot >= desc.num_descriptors as u64 {
            qf_bail!(
                SOURCE,
                "Descriptor slot {} out of range for a heap of {} descriptors",
                slot,
                desc.num_descriptors
            );
        }
        Ok(())
    }
}

fn increment_for(kind: DescriptorHeapKind) -> u32 {
    match kind {
        DescriptorHeapKind::Rtv => 32,
        DescriptorHeapKind::CbvSrvUav => 64,
        DescriptorHeapKind::Sampler => 16,
        DescriptorHeapKind::Dsv => 8,
    }
}

type SharedState = Arc<Mutex<MockGpuState>>;

// ============================================================================
// Mock Window
// ============================================================================

/// Window stand-in exposing a fake Win32 handle
pub struct MockWindow {
    hwnd: NonZeroIsize,
}

impl MockWindow {
    pub fn new() -> Self {
        Self { hwnd: NonZeroIsize::new(0x1234).unwrap() }
    }
}

impl HasWindowHandle for MockWindow {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        let raw = RawWindowHandle::Win32(Win32WindowHandle::new(self.hwnd));
        // The handle is never dereferenced by the mock
        Ok(unsafe { WindowHandle::borrow_raw(raw) })
    }
}

impl HasDisplayHandle for MockWindow {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        let raw = RawDisplayHandle::Windows(WindowsDisplayHandle::new());
        Ok(unsafe { DisplayHandle::borrow_raw(raw) })
    }
}

// ============================================================================
// Mock Backend
// ============================================================================

pub struct MockGraphicsBackend {
    pub state: SharedState,
}

impl MockGraphicsBackend {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockGpuState::default())) }
    }

    /// Backend that only supports `tiers`
    pub fn with_tiers(tiers: &[CapabilityTier]) -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().supported_tiers = tiers.to_vec();
        backend
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }
}

impl GraphicsBackend for MockGraphicsBackend {
    fn name(&self) -> &str {
        "Mock"
    }

    fn enable_debug_layer(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.debug_layer_available {
            qf_bail!(SOURCE, "Debug layer not installed");
        }
        state.debug_layer_enabled = true;
        Ok(())
    }

    fn create_device(&mut self, tier: CapabilityTier) -> Result<Box<dyn GraphicsDevice>> {
        let mut state = self.state.lock().unwrap();
        state.attempted_tiers.push(tier);
        if !state.supported_tiers.contains(&tier) {
            return Err(crate::Error::UnsupportedCapability(format!("tier {} not supported", tier)));
        }
        Ok(Box::new(MockGraphicsDevice { tier, state: Arc::clone(&self.state) }))
    }

    fn create_factory(&mut self, debug: bool) -> Result<Box<dyn GraphicsFactory>> {
        if self.state.lock().unwrap().fail_factory {
            qf_bail!(SOURCE, "Factory creation failed");
        }
        Ok(Box::new(MockFactory { debug, state: Arc::clone(&self.state) }))
    }
}

/// Mock device with its shared state, for component tests
pub fn mock_device() -> (Box<dyn GraphicsDevice>, SharedState) {
    let mut backend = MockGraphicsBackend::new();
    let state = backend.state();
    let device = backend.create_device(CapabilityTier::new(1, 3)).unwrap();
    (device, state)
}

// ============================================================================
// Mock Device
// ============================================================================

pub struct MockGraphicsDevice {
    tier: CapabilityTier,
    state: SharedState,
}

impl MockGraphicsDevice {
    fn resource_id(resource: &dyn Resource) -> Result<u64> {
        match resource.as_any().downcast_ref::<MockResource>() {
            Some(mock) => Ok(mock.id),
            None => qf_bail!(SOURCE, "Resource was not created by the mock device"),
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn capability_tier(&self) -> CapabilityTier {
        self.tier
    }

    fn create_command_allocator(&self, kind: CommandListKind) -> Result<Box<dyn CommandAllocator>> {
        let id = self.state.lock().unwrap().allocate_id();
        Ok(Box::new(MockCommandAllocator { id, kind, state: Arc::clone(&self.state) }))
    }

    fn create_command_list(
        &self,
        kind: CommandListKind,
        allocator: &dyn CommandAllocator,
        _initial_state: Option<&dyn PipelineState>,
    ) -> Result<Box<dyn CommandList>> {
        let Some(allocator) = allocator.as_any().downcast_ref::<MockCommandAllocator>() else {
            qf_bail!(SOURCE, "Allocator was not created by the mock device");
        };
        if allocator.kind != kind {
            qf_bail!(SOURCE, "{:?} list cannot use a {:?} allocator", kind, allocator.kind);
        }
        Ok(Box::new(MockCommandList {
            kind,
            allocator_id: allocator.id,
            recording: true,
            commands: Vec::new(),
            pipeline_bound: false,
            root_signature_bound: false,
            state: Arc::clone(&self.state),
        }))
    }

    fn create_command_queue(&self, desc: &CommandQueueDesc) -> Result<Box<dyn CommandQueue>> {
        Ok(Box::new(MockCommandQueue { desc: *desc, state: Arc::clone(&self.state) }))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>> {
        if desc.num_descriptors == 0 {
            qf_bail!(SOURCE, "Descriptor heap needs at least one descriptor");
        }
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.heaps.insert(id, *desc);
        Ok(Box::new(MockDescriptorHeap { id, desc: *desc }))
    }

    fn descriptor_handle_increment_size(&self, kind: DescriptorHeapKind) -> u32 {
        increment_for(kind)
    }

    fn create_render_target_view(
        &self,
        resource: &dyn Resource,
        desc: &RenderTargetViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()> {
        let resource_id = Self::resource_id(resource)?;
        let mut state = self.state.lock().unwrap();
        state.check_slot(dest.ptr, DescriptorHeapKind::Rtv)?;
        state.descriptors.insert(dest.ptr, MockDescriptor::RenderTarget { resource_id, desc: *desc });
        Ok(())
    }

    fn create_shader_resource_view(
        &self,
        resource: &dyn Resource,
        desc: &ShaderResourceViewDesc,
        dest: CpuDescriptorHandle,
    ) -> Result<()> {
        let resource_id = Self::resource_id(resource)?;
        let mut state = self.state.lock().unwrap();
        state.check_slot(dest.ptr, DescriptorHeapKind::CbvSrvUav)?;
        state.descriptors.insert(dest.ptr, MockDescriptor::ShaderResource { resource_id, desc: *desc });
        Ok(())
    }

    fn create_constant_buffer_view(&self, desc: &ConstantBufferViewDesc, dest: CpuDescriptorHandle) -> Result<()> {
        if desc.size_in_bytes % 256 != 0 {
            qf_bail!(SOURCE, "Constant buffer view size {} is not a multiple of 256", desc.size_in_bytes);
        }
        let mut state = self.state.lock().unwrap();
        if state.read_gpu_memory(desc.buffer_location, desc.size_in_bytes as usize).is_none() {
            qf_bail!(SOURCE, "Constant buffer view at {:#x} is outside any buffer", desc.buffer_location);
        }
        state.check_slot(dest.ptr, DescriptorHeapKind::CbvSrvUav)?;
        state.descriptors.insert(dest.ptr, MockDescriptor::ConstantBuffer(*desc));
        Ok(())
    }

    fn create_committed_resource(
        &self,
        heap: &HeapProperties,
        desc: &ResourceDesc,
        initial_state: ResourceState,
    ) -> Result<Box<dyn Resource>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_resource_creation {
            return Err(crate::Error::OutOfMemory);
        }
        let id = state.allocate_id();
        let (address, memory) = if desc.is_buffer() {
            (state.allocate_address(desc.width), vec![0u8; desc.width as usize])
        } else {
            (0, Vec::new())
        };
        let memory = Arc::new(Mutex::new(memory));
        state.resources.insert(
            id,
            MockResourceRecord {
                desc: *desc,
                heap: *heap,
                initial_state,
                address,
                memory: Arc::clone(&memory),
                writes: Vec::new(),
            },
        );
        Ok(Box::new(MockResource { id, desc: *desc, heap: *heap, address, memory, state: Arc::clone(&self.state) }))
    }

    fn create_root_signature(&self, serialized: &SerializedRootSignature) -> Result<Box<dyn RootSignature>> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.root_signatures.insert(id, serialized.desc().clone());
        Ok(Box::new(MockRootSignature { id, parameter_count: serialized.desc().parameters.len() as u32 }))
    }

    fn create_graphics_pipeline_state(&self, desc: &GraphicsPipelineStateDesc<'_>) -> Result<Box<dyn PipelineState>> {
        if desc.vertex_shader.is_empty() || desc.pixel_shader.is_empty() {
            qf_bail!(SOURCE, "Pipeline state needs vertex and pixel shader byte code");
        }
        let Some(root_signature) = desc.root_signature.as_any().downcast_ref::<MockRootSignature>() else {
            qf_bail!(SOURCE, "Root signature was not created by the mock device");
        };
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.pipelines.push(MockPipelineRecord {
            id,
            root_signature_id: root_signature.id,
            vertex_entry_point: desc.vertex_shader.entry_point.clone(),
            pixel_entry_point: desc.pixel_shader.entry_point.clone(),
            input_layout: desc.input_layout.to_vec(),
            rasterizer: desc.rasterizer_state,
            blend: desc.blend_state,
            sample_mask: desc.sample_mask,
            sample_count: desc.sample_desc.count,
            topology_type: desc.primitive_topology_type,
            render_target_formats: desc.render_target_formats.clone(),
        });
        Ok(Box::new(MockPipelineState { id, topology_type: desc.primitive_topology_type }))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Box<dyn GpuFence>> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.fence_values.insert(id, initial_value);
        Ok(Box::new(MockFence { id, state: Arc::clone(&self.state) }))
    }
}

// ============================================================================
// Mock Resource
// ============================================================================

pub struct MockResource {
    pub id: u64,
    desc: ResourceDesc,
    heap: HeapProperties,
    address: GpuVirtualAddress,
    memory: Arc<Mutex<Vec<u8>>>,
    state: SharedState,
}

impl Resource for MockResource {
    fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    fn gpu_virtual_address(&self) -> GpuVirtualAddress {
        self.address
    }

    fn map(&self, _subresource: u32) -> Result<NonNull<u8>> {
        if !self.heap.is_cpu_visible() || !self.desc.is_buffer() {
            qf_bail!(SOURCE, "Resource {} cannot be mapped", self.id);
        }
        let mut memory = self.memory.lock().unwrap();
        match NonNull::new(memory.as_mut_ptr()) {
            Some(ptr) => Ok(ptr),
            None => qf_bail!(SOURCE, "Resource {} has no memory", self.id),
        }
    }

    fn unmap(&self, _subresource: u32) {}

    fn write_to_subresource(&self, subresource: u32, data: &[u8], row_pitch: u32, depth_pitch: u32) -> Result<()> {
        if !self.heap.is_cpu_visible() {
            qf_bail!(SOURCE, "Resource {} is not in a CPU-visible heap", self.id);
        }
        let min_row = self.desc.width as u32 * self.desc.format.size_bytes();
        if row_pitch < min_row {
            qf_bail!(SOURCE, "Row pitch {} smaller than a {} byte row", row_pitch, min_row);
        }
        let needed = row_pitch as usize * self.desc.height as usize;
        if data.len() < needed {
            qf_bail!(SOURCE, "{} bytes given, {} needed", data.len(), needed);
        }

        *self.memory.lock().unwrap() = data.to_vec();
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.resources.get_mut(&self.id) {
            record.writes.push(MockSubresourceWrite { subresource, row_pitch, depth_pitch, len: data.len() });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Descriptor Heap
// ============================================================================

pub struct MockDescriptorHeap {
    pub id: u64,
    desc: DescriptorHeapDesc,
}

impl DescriptorHeap for MockDescriptorHeap {
    fn desc(&self) -> &DescriptorHeapDesc {
        &self.desc
    }

    fn cpu_descriptor_handle_for_heap_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle { ptr: self.id << 32 }
    }

    fn gpu_descriptor_handle_for_heap_start(&self) -> Option<GpuDescriptorHandle> {
        self.desc.is_shader_visible().then(|| GpuDescriptorHandle { ptr: self.id << 32 })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Commands
// ============================================================================

pub struct MockCommandAllocator {
    pub id: u64,
    kind: CommandListKind,
    state: SharedState,
}

impl CommandAllocator for MockCommandAllocator {
    fn kind(&self) -> CommandListKind {
        self.kind
    }

    fn reset(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let in_flight = state.submissions[state.completed_submissions..]
            .iter()
            .any(|&allocator| allocator == self.id);
        if in_flight {
            qf_bail!(SOURCE, "Allocator {} reset while the GPU still executes its commands", self.id);
        }
        state.allocator_resets += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockCommandList {
    kind: CommandListKind,
    allocator_id: u64,
    recording: bool,
    pipeline_bound: bool,
    root_signature_bound: bool,
    pub commands: Vec<MockCommand>,
    state: SharedState,
}

impl MockCommandList {
    fn record(&mut self, command: MockCommand) -> Result<()> {
        if !self.recording {
            qf_bail!(SOURCE, "Command {:?} recorded into a closed list", command);
        }
        self.commands.push(command);
        Ok(())
    }

    fn check_render_target(&self, handle: CpuDescriptorHandle) -> Result<()> {
        let state = self.state.lock().unwrap();
        match state.descriptor_at(handle.ptr) {
            Some(MockDescriptor::RenderTarget { .. }) => Ok(()),
            _ => qf_bail!(SOURCE, "Handle {:#x} holds no render-target view", handle.ptr),
        }
    }
}

impl CommandList for MockCommandList {
    fn kind(&self) -> CommandListKind {
        self.kind
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn close(&mut self) -> Result<()> {
        if !self.recording {
            qf_bail!(SOURCE, "Command list closed twice");
        }
        self.recording = false;
        Ok(())
    }

    fn reset(&mut self, allocator: &dyn CommandAllocator, _initial_state: Option<&dyn PipelineState>) -> Result<()> {
        if self.recording {
            qf_bail!(SOURCE, "Command list reset while recording");
        }
        let Some(allocator) = allocator.as_any().downcast_ref::<MockCommandAllocator>() else {
            qf_bail!(SOURCE, "Allocator was not created by the mock device");
        };
        self.allocator_id = allocator.id;
        self.recording = true;
        self.pipeline_bound = false;
        self.root_signature_bound = false;
        self.commands.clear();
        Ok(())
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        for barrier in barriers {
            let ResourceBarrier::Transition { resource, state_before, state_after, .. } = barrier;
            let resource_id = MockGraphicsDevice::resource_id(*resource)?;
            self.record(MockCommand::Barrier { resource_id, before: *state_before, after: *state_after })?;
        }
        Ok(())
    }

    fn set_render_targets(&mut self, render_targets: &[CpuDescriptorHandle]) -> Result<()> {
        for handle in render_targets {
            self.check_render_target(*handle)?;
        }
        self.record(MockCommand::SetRenderTargets(render_targets.to_vec()))
    }

    fn clear_render_target_view(&mut self, render_target: CpuDescriptorHandle, color: [f32; 4]) -> Result<()> {
        self.check_render_target(render_target)?;
        self.record(MockCommand::ClearRenderTarget { handle: render_target, color })
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<()> {
        self.record(MockCommand::SetViewports(viewports.to_vec()))
    }

    fn set_scissor_rects(&mut self, rects: &[Rect]) -> Result<()> {
        self.record(MockCommand::SetScissorRects(rects.to_vec()))
    }

    fn set_pipeline_state(&mut self, pipeline_state: &dyn PipelineState) -> Result<()> {
        let Some(pipeline) = pipeline_state.as_any().downcast_ref::<MockPipelineState>() else {
            qf_bail!(SOURCE, "Pipeline state was not created by the mock device");
        };
        self.record(MockCommand::SetPipelineState(pipeline.id))?;
        self.pipeline_bound = true;
        Ok(())
    }

    fn set_graphics_root_signature(&mut self, root_signature: &dyn RootSignature) -> Result<()> {
        let Some(root_signature) = root_signature.as_any().downcast_ref::<MockRootSignature>() else {
            qf_bail!(SOURCE, "Root signature was not created by the mock device");
        };
        self.record(MockCommand::SetRootSignature(root_signature.id))?;
        self.root_signature_bound = true;
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.record(MockCommand::SetPrimitiveTopology(topology))
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) -> Result<()> {
        self.record(MockCommand::SetVertexBuffers { start_slot, views: views.to_vec() })
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<()> {
        if !view.format.is_index_format() {
            qf_bail!(SOURCE, "{:?} is not an index format", view.format);
        }
        self.record(MockCommand::SetIndexBuffer(*view))
    }

    fn set_descriptor_heaps(&mut self, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
        let mut ids = Vec::with_capacity(heaps.len());
        for heap in heaps {
            if !heap.desc().is_shader_visible() {
                qf_bail!(SOURCE, "Only shader-visible heaps can be bound");
            }
            match heap.as_any().downcast_ref::<MockDescriptorHeap>() {
                Some(heap) => ids.push(heap.id),
                None => qf_bail!(SOURCE, "Descriptor heap was not created by the mock device"),
            }
        }
        self.record(MockCommand::SetDescriptorHeaps(ids))
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, base: GpuDescriptorHandle) -> Result<()> {
        if !self.root_signature_bound {
            qf_bail!(SOURCE, "Descriptor table set before the root signature");
        }
        self.record(MockCommand::SetRootDescriptorTable { root_index, base })
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index_location: u32,
        base_vertex_location: i32,
        start_instance_location: u32,
    ) -> Result<()> {
        if !self.pipeline_bound || !self.root_signature_bound {
            qf_bail!(SOURCE, "Draw without a pipeline state and root signature");
        }
        self.record(MockCommand::DrawIndexedInstanced {
            index_count: index_count_per_instance,
            instance_count,
            start_index: start_index_location,
            base_vertex: base_vertex_location,
            start_instance: start_instance_location,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockCommandQueue {
    desc: CommandQueueDesc,
    state: SharedState,
}

impl CommandQueue for MockCommandQueue {
    fn desc(&self) -> &CommandQueueDesc {
        &self.desc
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for list in lists {
            let Some(list) = list.as_any().downcast_ref::<MockCommandList>() else {
                qf_bail!(SOURCE, "Command list was not created by the mock device");
            };
            if list.recording {
                qf_bail!(SOURCE, "Command list executed before close");
            }
            state.executed_lists.push(list.commands.clone());
            state.submissions.push(list.allocator_id);
        }
        Ok(())
    }

    fn signal(&self, fence: &dyn GpuFence, value: u64) -> Result<()> {
        let Some(fence) = fence.as_any().downcast_ref::<MockFence>() else {
            qf_bail!(SOURCE, "Fence was not created by the mock device");
        };
        let mut state = self.state.lock().unwrap();
        state.fence_signals.push((fence.id, value));
        let signal = PendingSignal { fence_id: fence.id, value, covers: state.submissions.len() };
        if state.auto_complete {
            state.complete_signal(signal);
        } else {
            state.pending_signals.push_back(signal);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Fence
// ============================================================================

pub struct MockFence {
    pub id: u64,
    state: SharedState,
}

impl GpuFence for MockFence {
    fn completed_value(&self) -> u64 {
        self.state.lock().unwrap().fence_values.get(&self.id).copied().unwrap_or(0)
    }

    fn wait_for_value(&self, value: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.fence_waits += 1;
        // The GPU retires signals in submission order
        while state.fence_values.get(&self.id).copied().unwrap_or(0) < value {
            match state.pending_signals.pop_front() {
                Some(signal) => state.complete_signal(signal),
                None => qf_bail!(SOURCE, "Fence {} waits for {} which is never signaled", self.id, value),
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Pipeline Objects
// ============================================================================

pub struct MockRootSignature {
    pub id: u64,
    parameter_count: u32,
}

impl RootSignature for MockRootSignature {
    fn parameter_count(&self) -> u32 {
        self.parameter_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipelineState {
    pub id: u64,
    topology_type: PrimitiveTopologyType,
}

impl PipelineState for MockPipelineState {
    fn primitive_topology_type(&self) -> PrimitiveTopologyType {
        self.topology_type
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Factory and Swap Chain
// ============================================================================

pub struct MockFactory {
    debug: bool,
    state: SharedState,
}

impl GraphicsFactory for MockFactory {
    fn is_debug(&self) -> bool {
        self.debug
    }

    fn create_swap_chain_for_window(
        &self,
        queue: &dyn CommandQueue,
        window: &dyn WindowSurface,
        desc: &SwapChainDesc,
    ) -> Result<Box<dyn SwapChain>> {
        if queue.as_any().downcast_ref::<MockCommandQueue>().is_none() {
            qf_bail!(SOURCE, "Queue was not created by the mock device");
        }
        if window.window_handle().is_err() {
            qf_bail!(SOURCE, "Window handle unavailable");
        }
        if !desc.format.is_color_target() {
            qf_bail!(SOURCE, "{:?} cannot be a back-buffer format", desc.format);
        }

        let mut state = self.state.lock().unwrap();
        let mut actual = *desc;
        actual.buffer_count = state.swap_chain_buffer_count.unwrap_or(desc.buffer_count);

        let mut buffers = Vec::with_capacity(actual.buffer_count as usize);
        for _ in 0..actual.buffer_count {
            let id = state.allocate_id();
            let desc = ResourceDesc::texture_2d(actual.width, actual.height, actual.format, 1, 1);
            let memory = Arc::new(Mutex::new(Vec::new()));
            state.resources.insert(
                id,
                MockResourceRecord {
                    desc,
                    heap: HeapProperties::default_heap(),
                    initial_state: ResourceState::Present,
                    address: 0,
                    memory: Arc::clone(&memory),
                    writes: Vec::new(),
                },
            );
            buffers.push((id, desc, memory));
        }
        state.back_buffer_index = 0;
        state.swap_chain_desc = Some(actual);

        Ok(Box::new(MockSwapChain { desc: actual, buffers, state: Arc::clone(&self.state) }))
    }
}

pub struct MockSwapChain {
    desc: SwapChainDesc,
    buffers: Vec<(u64, ResourceDesc, Arc<Mutex<Vec<u8>>>)>,
    state: SharedState,
}

impl SwapChain for MockSwapChain {
    fn desc(&self) -> Result<SwapChainDesc> {
        Ok(self.desc)
    }

    fn buffer(&self, index: u32) -> Result<Box<dyn Resource>> {
        let Some((id, desc, memory)) = self.buffers.get(index as usize) else {
            qf_bail!(SOURCE, "Back buffer {} out of range ({})", index, self.buffers.len());
        };
        Ok(Box::new(MockResource {
            id: *id,
            desc: *desc,
            heap: HeapProperties::default_heap(),
            address: 0,
            memory: Arc::clone(memory),
            state: Arc::clone(&self.state),
        }))
    }

    fn current_back_buffer_index(&self) -> Result<u32> {
        Ok(self.state.lock().unwrap().back_buffer_index)
    }

    fn present(&mut self, sync_interval: u32, _flags: PresentFlags) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state.back_buffer_index;
        state.presents.push((index, sync_interval));
        state.back_buffer_index = (index + 1) % self.desc.buffer_count;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
