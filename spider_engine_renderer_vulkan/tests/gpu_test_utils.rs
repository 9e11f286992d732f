#![allow(dead_code)]
//! GPU test utilities - one Vulkan device shared by every GPU test
//!
//! ash-window refuses a second surface on the same window on some
//! platforms, and winit only hands out one event loop per process, so all
//! tests run against a single lazily created device. Tests using it are
//! `#[serial]`: the device has a single surface and frames on it must not
//! interleave.

use spider_engine::spider::log::{Console, LogEntry, Logger};
use spider_engine::spider::render::GraphicsDevice;
use spider_engine::spider::{Renderer, RendererConfig};
use spider_engine_renderer_vulkan::VulkanDevice;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::{EventLoop, EventLoopBuilder};
use winit::window::Window;

#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;

static GPU_DEVICE: OnceLock<Arc<VulkanDevice>> = OnceLock::new();

/// Shared Vulkan device, created on first use
///
/// The event loop is leaked so the window outlives every test; it cannot
/// live in a static.
pub fn get_test_device() -> Arc<VulkanDevice> {
    GPU_DEVICE
        .get_or_init(|| {
            let (window, event_loop) = create_test_window();
            let config = RendererConfig {
                enable_validation: true,
                ..Default::default()
            };
            let device = VulkanDevice::new(Arc::new(window), &config, Console::new())
                .expect("Failed to create VulkanDevice for tests");
            std::mem::forget(event_loop);
            Arc::new(device)
        })
        .clone()
}

/// Renderer on the shared device with its own console
///
/// Shutting the renderer down tears down only that console; the device
/// keeps logging to the one it was created with.
pub fn create_test_renderer(config: RendererConfig, console: Console) -> Renderer {
    let device = get_test_device() as Arc<dyn GraphicsDevice>;
    Renderer::new(device, VulkanDevice::shader_tools(), console, config)
        .expect("Failed to create Renderer for tests")
}

/// Hidden 800x600 window
#[allow(deprecated)]
pub fn create_test_window() -> (Window, EventLoop<()>) {
    // cargo test runs tests off the main thread
    let event_loop = {
        #[cfg(target_os = "windows")]
        {
            EventLoopBuilder::new().with_any_thread(true).build().unwrap()
        }
        #[cfg(not(target_os = "windows"))]
        {
            EventLoopBuilder::new().build().unwrap()
        }
    };

    let window_attrs = Window::default_attributes()
        .with_title("Spider GPU Test Window")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);

    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

/// Logger keeping every entry for inspection
pub struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    pub fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}
