//! Unit tests for error.rs
//!
//! Display text, classification helpers and propagation through `?`.

use crate::error::{Error, Result};
use crate::shader::ShaderStage;

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_device_lost_display() {
    let err = Error::DeviceLost("queue submit returned DEVICE_LOST".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Device lost"));
    assert!(display.contains("DEVICE_LOST"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_shader_compilation_keeps_diagnostic() {
    let err = Error::ShaderCompilation("line 3: unknown identifier 'colr'".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Shader compilation failed"));
    assert!(display.contains("unknown identifier 'colr'"));
}

#[test]
fn test_binding_not_found_display() {
    let err = Error::BindingNotFound {
        name: "frameData".to_string(),
        stage: ShaderStage::Pixel,
    };
    let display = format!("{}", err);
    assert!(display.contains("'frameData'"));
    assert!(display.contains("Pixel"));
}

#[test]
fn test_frame_order_display() {
    let err = Error::FrameOrder("present called before end_frame".to_string());
    assert!(format!("{}", err).contains("present called before end_frame"));
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_only_binding_miss_is_recoverable() {
    let miss = Error::BindingNotFound {
        name: "color".to_string(),
        stage: ShaderStage::Vertex,
    };
    assert!(miss.is_recoverable());

    assert!(!Error::OutOfMemory.is_recoverable());
    assert!(!Error::InvalidStage("All".to_string()).is_recoverable());
    assert!(!Error::ShaderReflection("bad magic".to_string()).is_recoverable());
    assert!(!Error::DeviceLost("gone".to_string()).is_recoverable());
}

#[test]
fn test_device_fatal_classification() {
    assert!(Error::DeviceLost("gone".to_string()).is_device_fatal());
    assert!(Error::BackendError("submit".to_string()).is_device_fatal());
    assert!(!Error::OutOfMemory.is_device_fatal());
    assert!(!Error::FrameOrder("draw".to_string()).is_device_fatal());
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::InvalidStage("Hull".to_string());
    assert_eq!(err.clone(), err);
}

#[test]
fn test_result_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::InvalidResource("zero-sized buffer".to_string()))
    }

    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    match outer() {
        Err(Error::InvalidResource(msg)) => assert_eq!(msg, "zero-sized buffer"),
        other => panic!("unexpected result: {:?}", other),
    }
}
