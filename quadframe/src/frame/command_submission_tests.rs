use super::*;
use crate::frame::Fence;
use crate::graphics_device::mock_graphics_device::mock_device;
use crate::graphics_device::{CommandQueueFlags, CommandQueuePriority, Viewport};

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_starts_recording_on_direct_queue() {
    let (device, _state) = mock_device();
    let unit = CommandSubmissionUnit::new(&*device).unwrap();

    assert!(unit.recorder().is_recording());
    assert_eq!(unit.recorder().kind(), CommandListKind::Direct);

    let desc = unit.queue().desc();
    assert_eq!(desc.kind, CommandListKind::Direct);
    assert_eq!(desc.priority, CommandQueuePriority::Normal);
    assert_eq!(desc.flags, CommandQueueFlags::empty());
    assert_eq!(desc.node_mask, 0);
}

// ============================================================================
// Submission cycle
// ============================================================================

#[test]
fn test_close_and_execute_submits_recorded_commands() {
    let (device, state) = mock_device();
    let mut unit = CommandSubmissionUnit::new(&*device).unwrap();

    unit.recorder_mut().set_viewports(&[Viewport::full(4, 4)]).unwrap();
    unit.close_and_execute().unwrap();

    assert!(!unit.recorder().is_recording());
    let state = state.lock().unwrap();
    assert_eq!(state.executed_lists.len(), 1);
    assert_eq!(state.executed_lists[0].len(), 1);
}

#[test]
fn test_reset_after_fence_wait() {
    let (device, state) = mock_device();
    let mut unit = CommandSubmissionUnit::new(&*device).unwrap();
    let mut fence = Fence::new(&*device).unwrap();

    unit.close_and_execute().unwrap();
    fence.signal(unit.queue()).unwrap();
    fence.wait_for_gpu().unwrap();
    unit.reset().unwrap();

    assert!(unit.recorder().is_recording());
    assert_eq!(state.lock().unwrap().allocator_resets, 1);
}

#[test]
fn test_reset_before_gpu_finishes_fails() {
    let (device, _state) = mock_device();
    let mut unit = CommandSubmissionUnit::new(&*device).unwrap();
    let mut fence = Fence::new(&*device).unwrap();

    unit.close_and_execute().unwrap();
    fence.signal(unit.queue()).unwrap();

    assert!(unit.reset().is_err());
}
