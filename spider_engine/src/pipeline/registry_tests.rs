use std::sync::Arc;

use super::*;
use crate::descriptor::{ArenaAllocator, SlotRef};
use crate::graphics_device::mock_graphics_device::{
    mock_buffer, mock_table, MockBuffer, MockDescriptor, MockGraphicsDevice,
};
use crate::graphics_device::{
    BufferDesc, BufferUsage, DescriptorCategory, DescriptorWrite, SamplerDesc,
};
use crate::log::Console;
use crate::pipeline::binding::ViewResource;
use crate::pipeline::resource_factory::ArenaResourceFactory;
use crate::shader::ResourceViewKind;

fn constant_slot(name: &str, stage: ShaderStage, size: u64) -> (BindingSlot, Arc<MockBuffer>) {
    let buffer = Arc::new(MockBuffer::new(BufferDesc { size, usage: BufferUsage::Constant }));
    let slot = BindingSlot {
        name: name.to_string(),
        stage,
        size,
        table_index: 0,
        slot: SlotRef { arena: crate::descriptor::ArenaId(0), index: 0 },
        resource: BindingResource::ConstantBuffer { buffer: buffer.clone() },
    };
    (slot, buffer)
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_lookup_is_exact_name_and_stage() {
    let mut registry = BindingRegistry::new();
    let (slot, _) = constant_slot("frameData", ShaderStage::Vertex, 256);
    registry.insert(slot).unwrap();

    assert!(registry.get("frameData", ShaderStage::Vertex).is_ok());
    assert!(registry.contains("frameData", ShaderStage::Vertex));
    assert!(!registry.contains("frameData", ShaderStage::Pixel));
    assert!(!registry.contains("FrameData", ShaderStage::Vertex));
}

#[test]
fn test_duplicate_insert_rejected() {
    let mut registry = BindingRegistry::new();
    registry.insert(constant_slot("color", ShaderStage::Pixel, 256).0).unwrap();
    assert!(registry.insert(constant_slot("color", ShaderStage::Pixel, 256).0).is_err());
    registry.insert(constant_slot("color", ShaderStage::Vertex, 256).0).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_iter_keeps_insertion_order() {
    let mut registry = BindingRegistry::new();
    for name in ["c", "a", "b"] {
        registry.insert(constant_slot(name, ShaderStage::Pixel, 256).0).unwrap();
    }
    let names: Vec<&str> = registry.iter().map(|slot| slot.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

// ============================================================================
// bind_constant
// ============================================================================

#[test]
fn test_bind_constant_roundtrip() {
    let mut registry = BindingRegistry::new();
    let (slot, buffer) = constant_slot("frameData", ShaderStage::Vertex, 256);
    registry.insert(slot).unwrap();

    let data: Vec<u8> = (0..192).map(|i| i as u8).collect();
    registry.bind_constant("frameData", ShaderStage::Vertex, &data).unwrap();
    assert_eq!(&buffer.contents()[..192], &data[..]);
}

#[test]
fn test_bind_constant_at_offset() {
    let mut registry = BindingRegistry::new();
    let (slot, buffer) = constant_slot("color", ShaderStage::Pixel, 256);
    registry.insert(slot).unwrap();

    registry.bind_constant_at("color", ShaderStage::Pixel, 16, &[9; 4]).unwrap();
    assert_eq!(&buffer.contents()[16..20], &[9; 4]);
    assert!(registry.bind_constant_at("color", ShaderStage::Pixel, 254, &[0; 4]).is_err());
}

#[test]
fn test_bind_constant_miss_leaves_registry_unchanged() {
    let mut registry = BindingRegistry::new();
    let (slot, buffer) = constant_slot("frameData", ShaderStage::Vertex, 256);
    registry.insert(slot).unwrap();

    let result = registry.bind_constant("frameData", ShaderStage::Pixel, &[1; 16]);
    match result {
        Err(Error::BindingNotFound { name, stage }) => {
            assert_eq!(name, "frameData");
            assert_eq!(stage, ShaderStage::Pixel);
        }
        other => panic!("expected BindingNotFound, got {:?}", other),
    }
    assert_eq!(registry.len(), 1);
    assert!(buffer.contents().iter().all(|b| *b == 0));
}

#[test]
fn test_bind_constant_too_large() {
    let mut registry = BindingRegistry::new();
    registry.insert(constant_slot("color", ShaderStage::Pixel, 16).0).unwrap();
    assert!(matches!(
        registry.bind_constant("color", ShaderStage::Pixel, &[0; 32]),
        Err(Error::InvalidResource(_))
    ));
}

#[test]
fn test_bind_constant_on_sampler_rejected() {
    let mut registry = BindingRegistry::new();
    registry
        .insert(BindingSlot {
            name: "mySampler".to_string(),
            stage: ShaderStage::Pixel,
            size: 0,
            table_index: 0,
            slot: SlotRef { arena: crate::descriptor::ArenaId(1), index: 0 },
            resource: BindingResource::Sampler { desc: SamplerDesc::default() },
        })
        .unwrap();
    assert!(matches!(
        registry.bind_constant("mySampler", ShaderStage::Pixel, &[0; 4]),
        Err(Error::InvalidResource(_))
    ));
}

// ============================================================================
// bind_resource_view
// ============================================================================

#[test]
fn test_bind_resource_view_rewrites_same_slot() {
    let device = Arc::new(MockGraphicsDevice::new());
    let allocator = Arc::new(ArenaAllocator::new(device.clone(), Console::new()));
    let views = allocator
        .create_arena("resource_views", DescriptorCategory::ResourceView, 4, true)
        .unwrap();
    let range = allocator.allocate_with(views, 1, &DescriptorWrite::Null).unwrap();
    let factory = ArenaResourceFactory::new(device.clone(), allocator.clone());

    let slot = range.slot(0).unwrap();
    let mut registry = BindingRegistry::new();
    registry
        .insert(BindingSlot {
            name: "lights".to_string(),
            stage: ShaderStage::Pixel,
            size: 0,
            table_index: 0,
            slot,
            resource: BindingResource::ResourceView {
                kind: ResourceViewKind::Structured,
                view: ViewResource::Unbound,
            },
        })
        .unwrap();

    let source = ViewSource::Buffer { data: vec![3u8; 32], stride: 8 };
    let replaced = registry
        .bind_resource_view("lights", ShaderStage::Pixel, &source, &factory)
        .unwrap();
    assert!(matches!(replaced, BindingResource::ResourceView { view: ViewResource::Unbound, .. }));

    let entry = registry.get("lights", ShaderStage::Pixel).unwrap();
    assert_eq!(entry.slot, slot);
    assert_eq!(entry.size, 32);
    match &entry.resource {
        BindingResource::ResourceView { view: ViewResource::Buffer { buffer, count, .. }, .. } => {
            assert_eq!(*count, 4);
            assert_eq!(mock_buffer(buffer.as_ref()).contents(), vec![3u8; 32]);
        }
        other => panic!("unexpected resource {:?}", other),
    }
    let table = allocator.table(views).unwrap();
    assert!(matches!(
        mock_table(table.as_ref()).slot(0),
        MockDescriptor::StructuredBuffer { stride: 8, element_count: 4, .. }
    ));

    let miss = registry.bind_resource_view("lights", ShaderStage::Vertex, &source, &factory);
    assert!(matches!(miss, Err(Error::BindingNotFound { .. })));
}
