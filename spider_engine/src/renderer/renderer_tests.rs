use super::*;
use crate::graphics_device::mock_graphics_device::{
    mock_buffer, CaptureLogger, MockFence, MockGraphicsDevice, MockShaderCompiler, MockShaderReflector,
};
use crate::graphics_device::{Buffer, TextureFormat};
use crate::log::LogSeverity;
use crate::pipeline::{BindingResource, ViewResource};
use crate::shader::{ShaderSource, ShaderVisibility};
use std::sync::Weak;

const FRAME_DATA_VS: &str = "cbuffer frameData b0 192";
const TEXTURED_PS: &str = "texture myTexture t0\nsampler mySampler s0";

fn tools() -> ShaderTools {
    ShaderTools {
        compiler: Arc::new(MockShaderCompiler),
        reflector: Arc::new(MockShaderReflector),
    }
}

fn renderer_with(config: RendererConfig) -> (Arc<MockGraphicsDevice>, Renderer) {
    let device = Arc::new(MockGraphicsDevice::new());
    let (logger, _) = CaptureLogger::new();
    let renderer = Renderer::new(device.clone(), tools(), Console::with_logger(logger), config).unwrap();
    (device, renderer)
}

fn renderer() -> (Arc<MockGraphicsDevice>, Renderer) {
    renderer_with(RendererConfig::default())
}

fn shaders() -> Vec<ShaderDesc> {
    vec![
        ShaderDesc::new(ShaderSource::Text(FRAME_DATA_VS.to_string()), ShaderVisibility::Vertex),
        ShaderDesc::new(ShaderSource::Text(TEXTURED_PS.to_string()), ShaderVisibility::Pixel),
    ]
}

fn triangle() -> (Vec<Vertex>, Vec<u32>) {
    let vertex = |x: f32, y: f32| Vertex {
        position: [x, y, 0.0],
        normal: [0.0, 0.0, -1.0],
        uv: [x, y],
    };
    (vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)], vec![0, 1, 2])
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_new_creates_named_arenas() {
    let (_, renderer) = renderer_with(RendererConfig {
        descriptor_arena_capacity: 64,
        ..Default::default()
    });

    let allocator = renderer.allocator();
    assert_eq!(allocator.arena_id(RESOURCE_VIEW_ARENA), Some(renderer.view_arena()));
    assert_eq!(allocator.arena_id(SAMPLER_ARENA), Some(renderer.sampler_arena()));
    assert_eq!(allocator.capacity(renderer.view_arena()).unwrap(), 64);
    assert_eq!(
        allocator.category(renderer.sampler_arena()).unwrap(),
        DescriptorCategory::Sampler
    );
}

#[test]
fn test_new_rejects_invalid_config() {
    let device = Arc::new(MockGraphicsDevice::new());
    let config = RendererConfig { buffer_count: 0, ..Default::default() };
    assert!(matches!(
        Renderer::new(device.clone(), tools(), Console::new(), config),
        Err(Error::InitializationFailed(_))
    ));
    assert!(device.calls().is_empty());
}

#[test]
fn test_new_attaches_default_logger_to_empty_console() {
    let device = Arc::new(MockGraphicsDevice::new());
    let console = Console::new();
    let mut renderer = Renderer::new(device, tools(), console.clone(), RendererConfig::default()).unwrap();
    assert!(console.is_active());
    renderer.shutdown().unwrap();
}

#[test]
fn test_new_applies_fullscreen() {
    let (device, renderer) = renderer_with(RendererConfig { fullscreen: true, ..Default::default() });
    assert!(device.is_fullscreen());
    assert!(renderer.is_fullscreen());
}

#[test]
fn test_thread_count_sets_upload_contexts() {
    let (device, _renderer) = renderer_with(RendererConfig {
        buffer_count: 3,
        thread_count: 2,
        ..Default::default()
    });
    // One command list per frame in flight plus one per upload context
    assert_eq!(device.count_calls("create_command_list"), 5);
}

// ============================================================================
// Pipelines and frames
// ============================================================================

#[test]
fn test_full_frame_through_facade() {
    let (device, mut renderer) = renderer();
    let pipeline = renderer.create_render_pipeline(&shaders()).unwrap();
    let (vertices, indices) = triangle();
    let drawable = Drawable::new(renderer.create_mesh(&vertices, &indices).unwrap());
    let camera = Camera::new(800, 600);

    let info = renderer.begin_frame().unwrap();
    renderer.draw(&pipeline, &drawable, &camera).unwrap();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    assert_eq!(info.index, 0);
    assert_eq!(renderer.frame_stats().draws, 1);
    assert_eq!(renderer.frame_stats().skipped_frame_data, 0);
    assert_eq!(device.presents(), vec![true]);
}

#[test]
fn test_bind_resource_view_through_facade() {
    let (_, mut renderer) = renderer();
    let mut pipeline = renderer.create_render_pipeline(&shaders()).unwrap();
    let texture = renderer
        .upload_texture(
            &TextureDesc { width: 2, height: 2, format: TextureFormat::R8G8B8A8_UNORM },
            &[0u8; 16],
        )
        .unwrap();

    renderer
        .bind_resource_view(&mut pipeline, "myTexture", ShaderStage::Pixel, &ViewSource::Texture(texture))
        .unwrap();

    assert!(matches!(
        renderer.bind_resource_view(
            &mut pipeline,
            "missing",
            ShaderStage::Pixel,
            &ViewSource::Buffer { data: vec![0; 4], stride: 4 },
        ),
        Err(Error::BindingNotFound { .. })
    ));
}

fn lights_pipeline(renderer: &Renderer) -> RenderPipeline {
    renderer
        .create_render_pipeline(&[
            ShaderDesc::new(ShaderSource::Text(FRAME_DATA_VS.to_string()), ShaderVisibility::Vertex),
            ShaderDesc::new(ShaderSource::Text("structured lights t0 16".to_string()), ShaderVisibility::Pixel)
                .with_view(ViewSource::Buffer { data: vec![1u8; 32], stride: 16 }),
        ])
        .unwrap()
}

fn lights_buffer(pipeline: &RenderPipeline) -> Weak<dyn Buffer> {
    match &pipeline.registry().get("lights", ShaderStage::Pixel).unwrap().resource {
        BindingResource::ResourceView { view: ViewResource::Buffer { buffer, .. }, .. } => Arc::downgrade(buffer),
        other => panic!("expected a bound buffer view, got {:?}", other),
    }
}

fn complete_gpu(renderer: &Renderer, value: u64) {
    renderer
        .sequencer()
        .pacer()
        .fence()
        .as_any()
        .downcast_ref::<MockFence>()
        .unwrap()
        .complete(value);
}

fn new_lights() -> ViewSource {
    ViewSource::Buffer { data: vec![2u8; 48], stride: 16 }
}

#[test]
fn test_rebound_view_outlives_frames_in_flight() {
    let (device, mut renderer) = renderer_with(RendererConfig { buffer_count: 2, ..Default::default() });
    device.set_auto_complete(false);
    let mut pipeline = lights_pipeline(&renderer);
    let old = lights_buffer(&pipeline);
    let (vertices, indices) = triangle();
    let drawable = Drawable::new(renderer.create_mesh(&vertices, &indices).unwrap());
    let camera = Camera::new(800, 600);

    renderer.begin_frame().unwrap();
    renderer.draw(&pipeline, &drawable, &camera).unwrap();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    renderer
        .bind_resource_view(&mut pipeline, "lights", ShaderStage::Pixel, &new_lights())
        .unwrap();
    assert!(old.upgrade().is_some(), "frame 1 may still read the old buffer");
    assert_eq!(renderer.sequencer().retired_count(), 1);

    renderer.begin_frame().unwrap();
    assert!(old.upgrade().is_some());
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    complete_gpu(&renderer, 1);
    renderer.begin_frame().unwrap();
    assert!(old.upgrade().is_none());
    assert_eq!(renderer.sequencer().retired_count(), 0);
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    device.set_auto_complete(true);
}

#[test]
fn test_rebind_while_recording_waits_for_that_frame() {
    let (device, mut renderer) = renderer_with(RendererConfig { buffer_count: 2, ..Default::default() });
    device.set_auto_complete(false);
    let mut pipeline = lights_pipeline(&renderer);
    let old = lights_buffer(&pipeline);

    renderer.begin_frame().unwrap();
    renderer
        .bind_resource_view(&mut pipeline, "lights", ShaderStage::Pixel, &new_lights())
        .unwrap();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    renderer.begin_frame().unwrap();
    assert!(old.upgrade().is_some());
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    complete_gpu(&renderer, 1);
    renderer.begin_frame().unwrap();
    assert!(old.upgrade().is_none());
    renderer.end_frame().unwrap();
    renderer.present().unwrap();

    device.set_auto_complete(true);
}

#[test]
fn test_rebind_before_first_frame_releases_immediately() {
    let (_, mut renderer) = renderer();
    let mut pipeline = lights_pipeline(&renderer);
    let old = lights_buffer(&pipeline);

    renderer
        .bind_resource_view(&mut pipeline, "lights", ShaderStage::Pixel, &new_lights())
        .unwrap();

    assert!(old.upgrade().is_none());
    assert_eq!(renderer.sequencer().retired_count(), 0);
}

#[test]
fn test_shutdown_releases_retired_views() {
    let (device, mut renderer) = renderer();
    device.set_auto_complete(false);
    let mut pipeline = lights_pipeline(&renderer);
    let old = lights_buffer(&pipeline);

    renderer.begin_frame().unwrap();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();
    renderer
        .bind_resource_view(&mut pipeline, "lights", ShaderStage::Pixel, &new_lights())
        .unwrap();
    assert!(old.upgrade().is_some());

    // Shutdown signals one more value and waits for it
    device.set_auto_complete(true);
    renderer.shutdown().unwrap();
    assert!(old.upgrade().is_none());
    assert_eq!(renderer.sequencer().retired_count(), 0);
}

#[test]
fn test_set_vsync_applies_to_next_present() {
    let (device, mut renderer) = renderer();
    renderer.set_vsync(false);
    renderer.begin_frame().unwrap();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();
    assert_eq!(device.presents(), vec![false]);
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_create_mesh_uploads_vertices_and_indices() {
    let (_, renderer) = renderer();
    let (vertices, indices) = triangle();
    let mesh = renderer.create_mesh(&vertices, &indices).unwrap();

    assert_eq!(mesh.vertex_stride, 32);
    assert_eq!(mesh.index_count, 3);
    assert_eq!(mesh.index_format, IndexFormat::U32);
    assert_eq!(mesh.vertex_buffer.usage(), BufferUsage::Vertex);
    assert_eq!(mesh.index_buffer.usage(), BufferUsage::Index);
    assert_eq!(
        mock_buffer(mesh.vertex_buffer.as_ref()).contents(),
        bytemuck::cast_slice::<Vertex, u8>(&vertices)
    );
    assert_eq!(
        mock_buffer(mesh.index_buffer.as_ref()).contents(),
        bytemuck::cast_slice::<u32, u8>(&indices)
    );
}

#[test]
fn test_create_mesh_rejects_empty_input() {
    let (_, renderer) = renderer();
    let (vertices, _) = triangle();
    assert!(matches!(renderer.create_mesh(&vertices, &[]), Err(Error::InvalidResource(_))));
    assert!(matches!(renderer.create_mesh(&[], &[0]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_upload_texture_failure_is_logged() {
    let device = Arc::new(MockGraphicsDevice::new());
    let (logger, entries) = CaptureLogger::new();
    let renderer =
        Renderer::new(device, tools(), Console::with_logger(logger), RendererConfig::default()).unwrap();

    let desc = TextureDesc { width: 4, height: 4, format: TextureFormat::R8G8B8A8_UNORM };
    assert!(renderer.upload_texture(&desc, &[0u8; 3]).is_err());

    let entries = entries.lock().unwrap();
    assert!(entries
        .iter()
        .any(|e| e.severity == LogSeverity::Error && e.message.starts_with("Texture upload failed")));
}

// ============================================================================
// Surface
// ============================================================================

#[test]
fn test_toggle_fullscreen() {
    let (device, mut renderer) = renderer();
    renderer.toggle_fullscreen().unwrap();
    assert!(device.is_fullscreen());
    renderer.toggle_fullscreen().unwrap();
    assert!(!device.is_fullscreen());

    // Setting the current state does not reach the device
    renderer.set_fullscreen(false).unwrap();
    assert_eq!(device.count_calls("set_fullscreen"), 2);
}

#[test]
fn test_resize_updates_surface() {
    let (device, mut renderer) = renderer();
    renderer.resize(1024, 768).unwrap();
    assert_eq!(renderer.surface_extent(), (1024, 768));
    assert_eq!(device.count_calls("resize"), 1);
}

#[test]
fn test_resize_to_zero_is_ignored() {
    let (device, mut renderer) = renderer();
    renderer.resize(0, 600).unwrap();
    assert_eq!(renderer.surface_extent(), (800, 600));
    assert_eq!(device.count_calls("resize"), 0);
}

#[test]
fn test_resize_while_recording_rejected() {
    let (_, mut renderer) = renderer();
    renderer.begin_frame().unwrap();
    assert!(matches!(renderer.resize(640, 480), Err(Error::FrameOrder(_))));
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn test_shutdown_tears_down_console_last() {
    let device = Arc::new(MockGraphicsDevice::new());
    let (logger, entries) = CaptureLogger::new();
    let console = Console::with_logger(logger);
    let mut renderer = Renderer::new(device.clone(), tools(), console.clone(), RendererConfig::default()).unwrap();

    renderer.begin_frame().unwrap();
    renderer.end_frame().unwrap();
    renderer.present().unwrap();
    renderer.shutdown().unwrap();

    assert!(!console.is_active());
    assert!(renderer.is_shut_down());
    let entries = entries.lock().unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.source, "spider::renderer");
    assert!(last.message.starts_with("Renderer shut down"));
    assert!(device.count_calls("wait_idle") >= 2);
}

#[test]
fn test_shutdown_is_idempotent() {
    let (device, mut renderer) = renderer();
    renderer.shutdown().unwrap();
    let calls = device.calls().len();
    renderer.shutdown().unwrap();
    drop(renderer);
    assert_eq!(device.calls().len(), calls);
}

#[test]
fn test_operations_after_shutdown_rejected() {
    let (_, mut renderer) = renderer();
    renderer.shutdown().unwrap();
    assert!(renderer.create_render_pipeline(&shaders()).is_err());
    assert!(renderer.begin_frame().is_err());
    let (vertices, indices) = triangle();
    assert!(renderer.create_mesh(&vertices, &indices).is_err());
}

#[test]
fn test_drop_drains_gpu() {
    let (device, mut renderer) = renderer();
    renderer.begin_frame().unwrap();
    renderer.end_frame().unwrap();
    drop(renderer);
    assert!(device.count_calls("wait_idle") >= 1);
}
