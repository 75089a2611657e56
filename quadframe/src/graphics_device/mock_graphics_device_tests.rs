/// Unit tests for MockGraphicsDevice and associated mock types.
///
/// The frame components rely on the mock enforcing the same rules as a
/// real debug layer, so those rules are checked here.

use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    CapabilityTier, CommandListKind, CommandQueueDesc, ConstantBufferViewDesc, DescriptorHeapDesc,
    DescriptorHeapKind, Format, GraphicsBackend, HeapProperties, PresentFlags, RenderTargetViewDesc,
    ResourceBarrier, ResourceDesc, ResourceState, SwapChainDesc, ViewDimension, write_mapped,
};
use crate::Error;

// ============================================================================
// Backend Tests
// ============================================================================

#[test]
fn test_backend_records_attempted_tiers() {
    let mut backend = MockGraphicsBackend::with_tiers(&[CapabilityTier::new(1, 1)]);

    assert!(matches!(
        backend.create_device(CapabilityTier::new(1, 3)),
        Err(Error::UnsupportedCapability(_))
    ));
    let device = backend.create_device(CapabilityTier::new(1, 1)).unwrap();

    assert_eq!(device.capability_tier(), CapabilityTier::new(1, 1));
    assert_eq!(
        backend.state.lock().unwrap().attempted_tiers,
        vec![CapabilityTier::new(1, 3), CapabilityTier::new(1, 1)]
    );
}

#[test]
fn test_backend_debug_layer() {
    let mut backend = MockGraphicsBackend::new();
    backend.enable_debug_layer().unwrap();
    assert!(backend.state.lock().unwrap().debug_layer_enabled);

    let mut missing = MockGraphicsBackend::new();
    missing.state.lock().unwrap().debug_layer_available = false;
    assert!(missing.enable_debug_layer().is_err());
}

#[test]
fn test_backend_factory_failure() {
    let mut backend = MockGraphicsBackend::new();
    assert!(backend.create_factory(true).unwrap().is_debug());

    backend.state.lock().unwrap().fail_factory = true;
    assert!(backend.create_factory(false).is_err());
}

// ============================================================================
// Resource Tests
// ============================================================================

#[test]
fn test_upload_buffer_memory_is_readable() {
    let (device, state) = mock_device();
    let buffer = device
        .create_committed_resource(&HeapProperties::upload(), &ResourceDesc::buffer(16), ResourceState::GenericRead)
        .unwrap();

    write_mapped(&*buffer, &[1, 2, 3, 4]).unwrap();

    let address = buffer.gpu_virtual_address();
    assert_eq!(address, MOCK_BASE_ADDRESS);
    assert_eq!(state.lock().unwrap().read_gpu_memory(address, 4), Some(vec![1, 2, 3, 4]));
    assert_eq!(state.lock().unwrap().read_gpu_memory(address + 2, 2), Some(vec![3, 4]));
}

#[test]
fn test_buffer_addresses_do_not_overlap() {
    let (device, _state) = mock_device();
    let a = device
        .create_committed_resource(&HeapProperties::upload(), &ResourceDesc::buffer(100), ResourceState::GenericRead)
        .unwrap();
    let b = device
        .create_committed_resource(&HeapProperties::upload(), &ResourceDesc::buffer(100), ResourceState::GenericRead)
        .unwrap();

    assert!(b.gpu_virtual_address() >= a.gpu_virtual_address() + 100);
}

#[test]
fn test_write_mapped_rejects_oversized_data() {
    let (device, _state) = mock_device();
    let buffer = device
        .create_committed_resource(&HeapProperties::upload(), &ResourceDesc::buffer(4), ResourceState::GenericRead)
        .unwrap();

    assert!(matches!(write_mapped(&*buffer, &[0; 8]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_default_heap_cannot_be_mapped() {
    let (device, _state) = mock_device();
    let buffer = device
        .create_committed_resource(&HeapProperties::default_heap(), &ResourceDesc::buffer(4), ResourceState::Common)
        .unwrap();

    assert!(buffer.map(0).is_err());
}

#[test]
fn test_texture_write_to_subresource() {
    let (device, state) = mock_device();
    let texture = device
        .create_committed_resource(
            &HeapProperties::custom_write_back(),
            &ResourceDesc::texture_2d(2, 2, Format::R8G8B8A8_UNORM, 1, 1),
            ResourceState::PixelShaderResource,
        )
        .unwrap();

    assert!(texture.write_to_subresource(0, &[0; 8], 4, 8).is_err());
    texture.write_to_subresource(0, &[7; 16], 8, 16).unwrap();

    let state = state.lock().unwrap();
    let id = texture.as_any().downcast_ref::<MockResource>().unwrap().id;
    let record = &state.resources[&id];
    assert_eq!(record.writes.len(), 1);
    assert_eq!(record.writes[0].row_pitch, 8);
    assert_eq!(record.memory.lock().unwrap().len(), 16);
}

#[test]
fn test_resource_creation_failure() {
    let (device, state) = mock_device();
    state.lock().unwrap().fail_resource_creation = true;

    let result = device.create_committed_resource(
        &HeapProperties::upload(),
        &ResourceDesc::buffer(4),
        ResourceState::GenericRead,
    );
    assert!(matches!(result, Err(Error::OutOfMemory)));
}

// ============================================================================
// Descriptor Tests
// ============================================================================

#[test]
fn test_descriptor_slot_out_of_range() {
    let (device, state) = mock_device();
    let heap = device.create_descriptor_heap(&DescriptorHeapDesc::shader_visible(1)).unwrap();
    let buffer = device
        .create_committed_resource(&HeapProperties::upload(), &ResourceDesc::buffer(256), ResourceState::GenericRead)
        .unwrap();
    let increment = device.descriptor_handle_increment_size(DescriptorHeapKind::CbvSrvUav);
    let cbv = ConstantBufferViewDesc { buffer_location: buffer.gpu_virtual_address(), size_in_bytes: 256 };

    let start = heap.cpu_descriptor_handle_for_heap_start();
    device.create_constant_buffer_view(&cbv, start).unwrap();
    assert!(device.create_constant_buffer_view(&cbv, start.offset(1, increment)).is_err());

    assert!(matches!(
        state.lock().unwrap().descriptor_at(start.ptr),
        Some(MockDescriptor::ConstantBuffer(_))
    ));
}

#[test]
fn test_constant_buffer_view_size_alignment() {
    let (device, _state) = mock_device();
    let heap = device.create_descriptor_heap(&DescriptorHeapDesc::shader_visible(1)).unwrap();
    let buffer = device
        .create_committed_resource(&HeapProperties::upload(), &ResourceDesc::buffer(256), ResourceState::GenericRead)
        .unwrap();
    let cbv = ConstantBufferViewDesc { buffer_location: buffer.gpu_virtual_address(), size_in_bytes: 64 };

    assert!(device.create_constant_buffer_view(&cbv, heap.cpu_descriptor_handle_for_heap_start()).is_err());
}

#[test]
fn test_view_kind_must_match_heap() {
    let (device, _state) = mock_device();
    let heap = device.create_descriptor_heap(&DescriptorHeapDesc::shader_visible(2)).unwrap();
    let texture = device
        .create_committed_resource(
            &HeapProperties::default_heap(),
            &ResourceDesc::texture_2d(4, 4, Format::R8G8B8A8_UNORM, 1, 1),
            ResourceState::RenderTarget,
        )
        .unwrap();
    let rtv = RenderTargetViewDesc { format: Format::R8G8B8A8_UNORM, dimension: ViewDimension::Texture2D };

    assert!(device.create_render_target_view(&*texture, &rtv, heap.cpu_descriptor_handle_for_heap_start()).is_err());
}

#[test]
fn test_gpu_handle_only_for_shader_visible_heaps() {
    let (device, _state) = mock_device();
    let rtv_heap = device.create_descriptor_heap(&DescriptorHeapDesc::render_targets(2)).unwrap();
    let srv_heap = device.create_descriptor_heap(&DescriptorHeapDesc::shader_visible(2)).unwrap();

    assert!(rtv_heap.gpu_descriptor_handle_for_heap_start().is_none());
    assert!(srv_heap.gpu_descriptor_handle_for_heap_start().is_some());
    assert_eq!(device.descriptor_handle_increment_size(DescriptorHeapKind::Rtv), 32);
}

// ============================================================================
// Command Tests
// ============================================================================

#[test]
fn test_closed_list_rejects_commands() {
    let (device, _state) = mock_device();
    let allocator = device.create_command_allocator(CommandListKind::Direct).unwrap();
    let mut list = device.create_command_list(CommandListKind::Direct, &*allocator, None).unwrap();

    assert!(list.is_recording());
    list.close().unwrap();
    assert!(list.set_viewports(&[]).is_err());
    assert!(list.close().is_err());

    list.reset(&*allocator, None).unwrap();
    assert!(list.set_viewports(&[]).is_ok());
}

#[test]
fn test_draw_requires_pipeline() {
    let (device, _state) = mock_device();
    let allocator = device.create_command_allocator(CommandListKind::Direct).unwrap();
    let mut list = device.create_command_list(CommandListKind::Direct, &*allocator, None).unwrap();

    assert!(list.draw_indexed_instanced(6, 1, 0, 0, 0).is_err());
}

#[test]
fn test_execute_requires_closed_list() {
    let (device, state) = mock_device();
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();
    let allocator = device.create_command_allocator(CommandListKind::Direct).unwrap();
    let mut list = device.create_command_list(CommandListKind::Direct, &*allocator, None).unwrap();

    assert!(queue.execute_command_lists(&[&*list]).is_err());
    list.close().unwrap();
    queue.execute_command_lists(&[&*list]).unwrap();
    assert_eq!(state.lock().unwrap().executed_lists.len(), 1);
}

#[test]
fn test_allocator_reset_waits_for_gpu() {
    let (device, state) = mock_device();
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();
    let mut allocator = device.create_command_allocator(CommandListKind::Direct).unwrap();
    let mut list = device.create_command_list(CommandListKind::Direct, &*allocator, None).unwrap();
    let fence = device.create_fence(0).unwrap();

    list.close().unwrap();
    queue.execute_command_lists(&[&*list]).unwrap();
    queue.signal(&*fence, 1).unwrap();

    assert_eq!(state.lock().unwrap().in_flight_submissions(), 1);
    assert!(allocator.reset().is_err());

    fence.wait_for_value(1).unwrap();
    assert_eq!(state.lock().unwrap().in_flight_submissions(), 0);
    allocator.reset().unwrap();
    assert_eq!(state.lock().unwrap().allocator_resets, 1);
}

#[test]
fn test_barrier_records_resource() {
    let (device, state) = mock_device();
    let allocator = device.create_command_allocator(CommandListKind::Direct).unwrap();
    let mut list = device.create_command_list(CommandListKind::Direct, &*allocator, None).unwrap();
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();
    let texture = device
        .create_committed_resource(
            &HeapProperties::default_heap(),
            &ResourceDesc::texture_2d(4, 4, Format::R8G8B8A8_UNORM, 1, 1),
            ResourceState::Present,
        )
        .unwrap();
    let id = texture.as_any().downcast_ref::<MockResource>().unwrap().id;

    list.resource_barrier(&[ResourceBarrier::transition(&*texture, ResourceState::Present, ResourceState::RenderTarget)])
        .unwrap();
    list.close().unwrap();
    queue.execute_command_lists(&[&*list]).unwrap();

    assert_eq!(
        state.lock().unwrap().executed_lists[0],
        vec![MockCommand::Barrier { resource_id: id, before: ResourceState::Present, after: ResourceState::RenderTarget }]
    );
}

// ============================================================================
// Fence Tests
// ============================================================================

#[test]
fn test_fence_completes_on_wait() {
    let (device, state) = mock_device();
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();
    let fence = device.create_fence(0).unwrap();

    queue.signal(&*fence, 1).unwrap();
    queue.signal(&*fence, 2).unwrap();
    assert_eq!(fence.completed_value(), 0);

    fence.wait_for_value(1).unwrap();
    assert_eq!(fence.completed_value(), 1);
    assert_eq!(state.lock().unwrap().pending_signal_count(), 1);
    assert_eq!(state.lock().unwrap().fence_waits, 1);
}

#[test]
fn test_fence_auto_complete() {
    let (device, state) = mock_device();
    state.lock().unwrap().auto_complete = true;
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();
    let fence = device.create_fence(0).unwrap();

    queue.signal(&*fence, 5).unwrap();
    assert_eq!(fence.completed_value(), 5);
}

#[test]
fn test_fence_wait_for_unsignaled_value_fails() {
    let (device, _state) = mock_device();
    let fence = device.create_fence(0).unwrap();

    assert!(fence.wait_for_value(0).is_ok());
    assert!(fence.wait_for_value(1).is_err());
}

// ============================================================================
// Swap Chain Tests
// ============================================================================

#[test]
fn test_swap_chain_cycles_back_buffers() {
    let mut backend = MockGraphicsBackend::new();
    let state = backend.state();
    let device = backend.create_device(CapabilityTier::new(1, 0)).unwrap();
    let factory = backend.create_factory(false).unwrap();
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();
    let window = MockWindow::new();

    let mut swap_chain = factory
        .create_swap_chain_for_window(&*queue, &window, &SwapChainDesc::flip_model(64, 32, Format::R8G8B8A8_UNORM, 2))
        .unwrap();

    assert_eq!(swap_chain.current_back_buffer_index().unwrap(), 0);
    swap_chain.present(1, PresentFlags::empty()).unwrap();
    assert_eq!(swap_chain.current_back_buffer_index().unwrap(), 1);
    swap_chain.present(1, PresentFlags::empty()).unwrap();
    assert_eq!(swap_chain.current_back_buffer_index().unwrap(), 0);
    assert_eq!(state.lock().unwrap().presents, vec![(0, 1), (1, 1)]);

    let buffer = swap_chain.buffer(1).unwrap();
    assert_eq!(buffer.desc().width, 64);
    assert!(swap_chain.buffer(2).is_err());
}

#[test]
fn test_swap_chain_buffer_count_override() {
    let mut backend = MockGraphicsBackend::new();
    backend.state.lock().unwrap().swap_chain_buffer_count = Some(3);
    let device = backend.create_device(CapabilityTier::new(1, 0)).unwrap();
    let factory = backend.create_factory(false).unwrap();
    let queue = device.create_command_queue(&CommandQueueDesc::default()).unwrap();

    let swap_chain = factory
        .create_swap_chain_for_window(
            &*queue,
            &MockWindow::new(),
            &SwapChainDesc::flip_model(8, 8, Format::B8G8R8A8_UNORM, 2),
        )
        .unwrap();

    assert_eq!(swap_chain.desc().unwrap().buffer_count, 3);
}
