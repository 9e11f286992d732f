use std::time::Duration;

use super::*;
use crate::graphics_device::mock_graphics_device::{MockFence, MockGraphicsDevice};

fn mock_fence(pacer: &FramePacer) -> &MockFence {
    pacer.fence().as_any().downcast_ref::<MockFence>().unwrap()
}

// ============================================================================
// Signal
// ============================================================================

#[test]
fn test_signal_records_increasing_values() {
    let device = MockGraphicsDevice::new();
    let mut pacer = FramePacer::new(&device, 2).unwrap();

    assert_eq!(pacer.signal(&device, 0).unwrap(), 1);
    assert_eq!(pacer.signal(&device, 1).unwrap(), 2);
    assert_eq!(pacer.signal(&device, 0).unwrap(), 3);
    assert_eq!(pacer.last_submitted(0).unwrap(), 3);
    assert_eq!(pacer.last_submitted(1).unwrap(), 2);
    assert_eq!(device.count_calls("signal"), 3);
}

#[test]
fn test_bad_slot_rejected() {
    let device = MockGraphicsDevice::new();
    let mut pacer = FramePacer::new(&device, 2).unwrap();
    assert!(pacer.signal(&device, 2).is_err());
    assert!(pacer.wait(5).is_err());
    assert_eq!(pacer.counter(), 0);
}

#[test]
fn test_zero_slots_rejected() {
    let device = MockGraphicsDevice::new();
    assert!(matches!(
        FramePacer::new(&device, 0),
        Err(Error::InitializationFailed(_))
    ));
}

// ============================================================================
// Wait
// ============================================================================

#[test]
fn test_unused_slot_is_ready() {
    let device = MockGraphicsDevice::new();
    device.set_auto_complete(false);
    let pacer = FramePacer::new(&device, 3).unwrap();
    for slot in 0..3 {
        assert_eq!(pacer.wait(slot).unwrap(), WaitOutcome::Ready);
    }
    assert!(mock_fence(&pacer).blocked_waits().is_empty());
}

#[test]
fn test_wait_is_idempotent_once_signaled() {
    let device = MockGraphicsDevice::new();
    let mut pacer = FramePacer::new(&device, 1).unwrap();
    pacer.signal(&device, 0).unwrap();

    assert_eq!(pacer.wait(0).unwrap(), WaitOutcome::Ready);
    assert_eq!(pacer.wait(0).unwrap(), WaitOutcome::Ready);
    assert!(pacer.is_complete(0).unwrap());
}

#[test]
fn test_wait_blocks_until_gpu_reaches_value() {
    let device = MockGraphicsDevice::new();
    device.set_auto_complete(false);
    let mut pacer = FramePacer::new(&device, 2).unwrap();
    pacer.signal(&device, 0).unwrap();
    assert!(!pacer.is_complete(0).unwrap());

    let fence = pacer.fence().clone();
    let gpu = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        fence.as_any().downcast_ref::<MockFence>().unwrap().complete(1);
    });

    assert_eq!(pacer.wait(0).unwrap(), WaitOutcome::Blocked);
    gpu.join().unwrap();
    assert_eq!(mock_fence(&pacer).blocked_waits(), vec![1]);
    // The other slot never waited
    assert_eq!(pacer.wait(1).unwrap(), WaitOutcome::Ready);
}

#[test]
fn test_completed_ahead_of_slot_does_not_block() {
    let device = MockGraphicsDevice::new();
    device.set_auto_complete(false);
    let mut pacer = FramePacer::new(&device, 2).unwrap();
    pacer.signal(&device, 0).unwrap();
    pacer.signal(&device, 1).unwrap();
    mock_fence(&pacer).complete(2);

    assert_eq!(pacer.wait(0).unwrap(), WaitOutcome::Ready);
    assert_eq!(pacer.wait(1).unwrap(), WaitOutcome::Ready);
}

// ============================================================================
// Drain
// ============================================================================

#[test]
fn test_drain_signals_and_waits() {
    let device = MockGraphicsDevice::new();
    let mut pacer = FramePacer::new(&device, 2).unwrap();
    pacer.signal(&device, 0).unwrap();
    pacer.drain(&device).unwrap();

    assert_eq!(pacer.counter(), 2);
    assert_eq!(pacer.fence().completed_value().unwrap(), 2);
    assert!(pacer.is_complete(0).unwrap() && pacer.is_complete(1).unwrap());
}
