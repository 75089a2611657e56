use super::*;

// ============================================================================
// Handle encoding
// ============================================================================

#[test]
fn test_handles_step_by_stride() {
    let start = CpuDescriptorHandle { ptr: encode_handle(3, 0) };
    let third = start.offset(2, HANDLE_STRIDE);

    assert_eq!(decode_handle(start.ptr), Some((3, 0)));
    assert_eq!(decode_handle(third.ptr), Some((3, 2)));
}

#[test]
fn test_gpu_and_cpu_handles_share_encoding() {
    let gpu = GpuDescriptorHandle { ptr: encode_handle(7, 0) }.offset(1, HANDLE_STRIDE);
    assert_eq!(decode_handle(gpu.ptr), Some((7, 1)));
}

#[test]
fn test_null_handle_rejected() {
    assert_eq!(decode_handle(0), None);
    assert_eq!(decode_handle(HANDLE_STRIDE as u64), None);
}

#[test]
fn test_misaligned_handle_rejected() {
    assert_eq!(decode_handle(encode_handle(1, 1) + 4), None);
}
