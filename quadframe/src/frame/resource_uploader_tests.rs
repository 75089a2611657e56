use super::*;
use crate::asset::{DecodedImage, QUAD_INDICES, QUAD_VERTICES};
use crate::camera::QuadCamera;
use crate::graphics_device::mock_graphics_device::{mock_device, MockDescriptor, MockResource};
use crate::graphics_device::HeapType;

// ============================================================================
// Alignment
// ============================================================================

#[test]
fn test_align_constant_buffer_size() {
    assert_eq!(align_constant_buffer_size(1), 256);
    assert_eq!(align_constant_buffer_size(64), 256);
    assert_eq!(align_constant_buffer_size(256), 256);
    assert_eq!(align_constant_buffer_size(257), 512);
    for size in [3u64, 100, 300, 1000, 4097] {
        assert_eq!(align_constant_buffer_size(size) % CONSTANT_BUFFER_ALIGNMENT, 0);
        assert!(align_constant_buffer_size(size) >= size);
    }
}

#[test]
fn test_view_size_rejects_sizes_past_u32() {
    assert_eq!(view_size(64, "constant buffer"), Ok(64));
    assert_eq!(view_size(u32::MAX as u64, "vertex buffer"), Ok(u32::MAX));

    let too_big = u32::MAX as u64 + 1;
    match view_size(too_big, "index buffer") {
        Err(Error::InvalidResource(message)) => {
            assert!(message.contains("index buffer"));
            assert!(message.contains(&too_big.to_string()));
        }
        other => panic!("expected InvalidResource, got {:?}", other),
    }
    // A 5 GiB constant buffer would wrap to 1 GiB with a plain cast
    assert!(view_size(align_constant_buffer_size(5 << 30), "constant buffer").is_err());
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn test_vertex_buffer_round_trip() {
    let (device, state) = mock_device();
    let vertices = ResourceUploader::upload_vertex_buffer(&*device, &QUAD_VERTICES).unwrap();

    assert_eq!(vertices.view.stride_in_bytes, 20);
    assert_eq!(vertices.view.size_in_bytes, 80);

    let bytes = state
        .lock()
        .unwrap()
        .read_gpu_memory(vertices.view.buffer_location, vertices.view.size_in_bytes as usize)
        .unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<_, u8>(&QUAD_VERTICES));
}

#[test]
fn test_index_buffer_round_trip() {
    let (device, state) = mock_device();
    let indices = ResourceUploader::upload_index_buffer(&*device, &QUAD_INDICES).unwrap();

    assert_eq!(indices.view.format, Format::R16_UINT);
    assert_eq!(indices.view.size_in_bytes, 12);
    assert_eq!(indices.view.index_count(), 6);

    let bytes = state.lock().unwrap().read_gpu_memory(indices.view.buffer_location, 12).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<u16, u8>(&QUAD_INDICES));
}

#[test]
fn test_upload_buffer_uses_upload_heap_in_generic_read() {
    let (device, state) = mock_device();
    let resource = ResourceUploader::upload_buffer(&*device, &[9, 8, 7]).unwrap();
    let id = resource.as_any().downcast_ref::<MockResource>().unwrap().id;

    let state = state.lock().unwrap();
    let record = &state.resources[&id];
    assert_eq!(record.heap.heap_type, HeapType::Upload);
    assert_eq!(record.initial_state, ResourceState::GenericRead);
    assert_eq!(record.desc.width, 3);
}

#[test]
fn test_upload_empty_buffer_fails() {
    let (device, _state) = mock_device();
    assert!(ResourceUploader::upload_buffer(&*device, &[]).is_err());
}

#[test]
fn test_upload_failure_propagates() {
    let (device, state) = mock_device();
    state.lock().unwrap().fail_resource_creation = true;
    assert!(ResourceUploader::upload_index_buffer(&*device, &QUAD_INDICES).is_err());
}

// ============================================================================
// Texture
// ============================================================================

#[test]
fn test_upload_texture_writes_rows_and_srv() {
    let (device, state) = mock_device();
    let mut uploader = ResourceUploader::new(&*device).unwrap();
    let image = DecodedImage::from_rgba8(4, 2, (0..32).collect()).unwrap();

    uploader.upload_texture(&*device, &image).unwrap();

    let id = uploader.texture().unwrap().as_any().downcast_ref::<MockResource>().unwrap().id;
    let state = state.lock().unwrap();
    let record = &state.resources[&id];
    assert_eq!(record.heap, HeapProperties::custom_write_back());
    assert_eq!(record.initial_state, ResourceState::PixelShaderResource);
    assert_eq!(record.desc.width, 4);
    assert_eq!(record.desc.height, 2);
    assert_eq!(record.writes[0].subresource, 0);
    assert_eq!(record.writes[0].row_pitch, 16);
    assert_eq!(record.writes[0].depth_pitch, 32);
    assert_eq!(*record.memory.lock().unwrap(), (0..32).collect::<Vec<u8>>());

    let slot0 = uploader.heap().cpu_descriptor_handle_for_heap_start();
    match state.descriptor_at(slot0.ptr) {
        Some(MockDescriptor::ShaderResource { resource_id, desc }) => {
            assert_eq!(*resource_id, id);
            assert_eq!(desc.mip_levels, 1);
            assert_eq!(desc.format, Format::R8G8B8A8_UNORM);
        }
        other => panic!("expected SRV in slot 0, got {:?}", other),
    }
}

// ============================================================================
// Constant buffer
// ============================================================================

#[test]
fn test_constant_matrix_aligned_and_in_slot_one() {
    let (device, state) = mock_device();
    let mut uploader = ResourceUploader::new(&*device).unwrap();
    let matrix = QuadCamera::new(1600, 800).world_view_projection();

    uploader.upload_constant_matrix(&*device, matrix).unwrap();

    let increment = device.descriptor_handle_increment_size(DescriptorHeapKind::CbvSrvUav);
    let slot1 = uploader.heap().cpu_descriptor_handle_for_heap_start().offset(1, increment);
    let state = state.lock().unwrap();
    let view = match state.descriptor_at(slot1.ptr) {
        Some(MockDescriptor::ConstantBuffer(view)) => *view,
        other => panic!("expected CBV in slot 1, got {:?}", other),
    };
    assert_eq!(view.size_in_bytes, 256);
    assert_eq!(uploader.constant_buffer().unwrap().desc().width, 256);

    let bytes = state.read_gpu_memory(view.buffer_location, 64).unwrap();
    assert_eq!(bytes, bytemuck::bytes_of(&matrix));
}

#[test]
fn test_descriptor_tables_offset_by_queried_increment() {
    let (device, _state) = mock_device();
    let uploader = ResourceUploader::new(&*device).unwrap();
    let increment = device.descriptor_handle_increment_size(DescriptorHeapKind::CbvSrvUav);

    assert_eq!(uploader.descriptor_increment(), increment);
    let start = uploader.heap().gpu_descriptor_handle_for_heap_start().unwrap();
    assert_eq!(uploader.texture_table(), start);
    assert_eq!(uploader.constant_table(), start.offset(1, increment));
}

#[test]
fn test_heap_has_room_for_both_views() {
    let (device, state) = mock_device();
    let mut uploader = ResourceUploader::new(&*device).unwrap();
    let image = DecodedImage::from_rgba8(1, 1, vec![255; 4]).unwrap();

    uploader.upload_texture(&*device, &image).unwrap();
    uploader.upload_constant_buffer(&*device, &[1; 16]).unwrap();

    assert_eq!(uploader.heap().desc().num_descriptors, 2);
    assert_eq!(state.lock().unwrap().descriptors.len(), 2);
}
