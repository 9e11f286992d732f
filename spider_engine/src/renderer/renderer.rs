/// Renderer - owns a device and everything the core builds on top of it
///
/// The renderer wires the descriptor arenas, the resource factory, the
/// pipeline builder, the frame sequencer and the upload pool to one
/// `GraphicsDevice` and one `Console`. It is the only type applications
/// need to hold on to:
///
/// ```no_run
/// use std::sync::Arc;
/// use spider_engine::spider::{Renderer, RendererConfig};
/// use spider_engine::spider::log::Console;
/// use spider_engine::spider::pipeline::ShaderTools;
/// use spider_engine::spider::scene::{Camera, Drawable};
/// # fn demo(
/// #     device: Arc<dyn spider_engine::spider::render::GraphicsDevice>,
/// #     tools: ShaderTools,
/// #     shaders: &[spider_engine::spider::shader::ShaderDesc],
/// #     vertices: &[spider_engine::spider::scene::Vertex],
/// #     indices: &[u32],
/// # ) -> spider_engine::spider::Result<()> {
/// let mut renderer = Renderer::new(device, tools, Console::new(), RendererConfig::default())?;
/// let pipeline = renderer.create_render_pipeline(shaders)?;
/// let cube = Drawable::new(renderer.create_mesh(vertices, indices)?);
/// let camera = Camera::new(800, 600);
///
/// renderer.begin_frame()?;
/// renderer.draw(&pipeline, &cube, &camera)?;
/// renderer.end_frame()?;
/// renderer.present()?;
///
/// renderer.shutdown()?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use crate::config::RendererConfig;
use crate::descriptor::{ArenaAllocator, ArenaId};
use crate::error::{Error, Result};
use crate::frame::{FrameInfo, FramePhase, FrameSequencer, FrameStats, UploadPool};
use crate::graphics_device::{
    BufferDesc, BufferUsage, DescriptorCategory, GraphicsDevice, IndexFormat, Texture, TextureDesc,
};
use crate::log::{Console, DefaultLogger};
use crate::pipeline::{
    ArenaResourceFactory, PipelineLayoutBuilder, PipelinePolicy, RenderPipeline, ResourceFactory,
    ShaderTools, ViewSource,
};
use crate::scene::{Camera, Drawable, MeshBuffers, Vertex};
use crate::shader::{ShaderDesc, ShaderStage};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

const SOURCE: &str = "spider::renderer";

/// Arena holding constant buffer and resource view descriptors
pub const RESOURCE_VIEW_ARENA: &str = "resource_views";
/// Arena holding sampler descriptors
pub const SAMPLER_ARENA: &str = "samplers";

pub struct Renderer {
    device: Arc<dyn GraphicsDevice>,
    console: Console,
    config: RendererConfig,
    allocator: Arc<ArenaAllocator>,
    factory: Arc<dyn ResourceFactory>,
    builder: PipelineLayoutBuilder,
    sequencer: FrameSequencer,
    uploads: UploadPool,
    view_arena: ArenaId,
    sampler_arena: ArenaId,
    fullscreen: bool,
    shut_down: bool,
}

impl Renderer {
    /// Create a renderer on `device`
    ///
    /// A console without a logger gets a `DefaultLogger` attached.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        tools: ShaderTools,
        console: Console,
        config: RendererConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !console.is_active() {
            console.init(DefaultLogger);
        }

        let allocator = Arc::new(ArenaAllocator::new(device.clone(), console.clone()));
        let view_arena = allocator.create_arena(
            RESOURCE_VIEW_ARENA,
            DescriptorCategory::ResourceView,
            config.descriptor_arena_capacity,
            true,
        )?;
        let sampler_arena = allocator.create_arena(
            SAMPLER_ARENA,
            DescriptorCategory::Sampler,
            config.descriptor_arena_capacity,
            true,
        )?;

        let factory: Arc<dyn ResourceFactory> =
            Arc::new(ArenaResourceFactory::new(device.clone(), allocator.clone()));
        let builder = PipelineLayoutBuilder::new(
            device.clone(),
            allocator.clone(),
            factory.clone(),
            tools,
            console.clone(),
            view_arena,
            sampler_arena,
        );
        let sequencer = FrameSequencer::new(device.clone(), allocator.clone(), console.clone(), &config)?;
        let uploads = UploadPool::new(device.clone(), console.clone(), config.thread_count)?;

        if config.fullscreen {
            device.set_fullscreen(true)?;
        }

        let (width, height) = device.surface_extent();
        engine_info!(
            console,
            SOURCE,
            "Renderer ready: {}x{}, {} frame(s) in flight, {} upload context(s), vsync {}",
            width,
            height,
            config.buffer_count,
            uploads.context_count(),
            config.vsync
        );

        Ok(Self {
            device,
            console,
            fullscreen: config.fullscreen,
            config,
            allocator,
            factory,
            builder,
            sequencer,
            uploads,
            view_arena,
            sampler_arena,
            shut_down: false,
        })
    }

    // ===== Accessors =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn allocator(&self) -> &Arc<ArenaAllocator> {
        &self.allocator
    }

    pub fn resource_factory(&self) -> &Arc<dyn ResourceFactory> {
        &self.factory
    }

    pub fn view_arena(&self) -> ArenaId {
        self.view_arena
    }

    pub fn sampler_arena(&self) -> ArenaId {
        self.sampler_arena
    }

    pub fn sequencer(&self) -> &FrameSequencer {
        &self.sequencer
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.sequencer.stats()
    }

    pub fn surface_extent(&self) -> (u32, u32) {
        self.device.surface_extent()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ===== Pipelines =====

    /// Build a pipeline with the default vertex layout, raster state and sampler
    pub fn create_render_pipeline(&self, shaders: &[ShaderDesc]) -> Result<RenderPipeline> {
        self.create_render_pipeline_with(shaders, &PipelinePolicy::default())
    }

    pub fn create_render_pipeline_with(
        &self,
        shaders: &[ShaderDesc],
        policy: &PipelinePolicy,
    ) -> Result<RenderPipeline> {
        self.ensure_running()?;
        self.builder.build(shaders, policy)
    }

    /// Replace the resource view `name` of `stage` in `pipeline`
    ///
    /// The previous view is released once the frames that read it retired.
    pub fn bind_resource_view(
        &mut self,
        pipeline: &mut RenderPipeline,
        name: &str,
        stage: ShaderStage,
        source: &ViewSource,
    ) -> Result<()> {
        self.ensure_running()?;
        let replaced = pipeline.bind_resource_view(name, stage, source, self.factory.as_ref())?;
        self.sequencer.retire(replaced);
        Ok(())
    }

    // ===== Frame loop =====

    pub fn begin_frame(&mut self) -> Result<FrameInfo> {
        self.ensure_running()?;
        self.sequencer.begin_frame()
    }

    pub fn draw(&mut self, pipeline: &RenderPipeline, drawable: &Drawable, camera: &Camera) -> Result<()> {
        self.sequencer.draw(pipeline, drawable, camera)
    }

    pub fn end_frame(&mut self) -> Result<()> {
        self.sequencer.end_frame()
    }

    pub fn present(&mut self) -> Result<()> {
        self.sequencer.present()
    }

    // ===== Resources =====

    /// Upload an indexed triangle mesh
    pub fn create_mesh(&self, vertices: &[Vertex], indices: &[u32]) -> Result<MeshBuffers> {
        self.ensure_running()?;
        if vertices.is_empty() || indices.is_empty() {
            return Err(Error::InvalidResource(format!(
                "mesh needs vertices and indices (got {} and {})",
                vertices.len(),
                indices.len()
            )));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        let vertex_buffer = self.device.create_buffer(&BufferDesc {
            size: vertex_bytes.len() as u64,
            usage: BufferUsage::Vertex,
        })?;
        vertex_buffer.update(0, vertex_bytes)?;

        let index_buffer = self.device.create_buffer(&BufferDesc {
            size: index_bytes.len() as u64,
            usage: BufferUsage::Index,
        })?;
        index_buffer.update(0, index_bytes)?;

        engine_debug!(
            self.console,
            SOURCE,
            "Created mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(MeshBuffers {
            vertex_buffer,
            index_buffer,
            vertex_stride: std::mem::size_of::<Vertex>() as u32,
            index_format: IndexFormat::U32,
            index_count: indices.len() as u32,
        })
    }

    /// Create a texture and fill it on an upload context, waiting for the copy
    pub fn upload_texture(&self, desc: &TextureDesc, pixels: &[u8]) -> Result<Arc<dyn Texture>> {
        self.ensure_running()?;
        self.uploads
            .upload_texture(desc, pixels)
            .inspect_err(|e| engine_error!(self.console, SOURCE, "Texture upload failed: {}", e))
    }

    // ===== Surface =====

    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        if self.fullscreen == fullscreen {
            return Ok(());
        }
        self.device.set_fullscreen(fullscreen)?;
        self.fullscreen = fullscreen;
        engine_debug!(self.console, SOURCE, "Fullscreen {}", fullscreen);
        Ok(())
    }

    pub fn toggle_fullscreen(&mut self) -> Result<()> {
        self.set_fullscreen(!self.fullscreen)
    }

    /// Takes effect at the next `present`
    pub fn set_vsync(&mut self, vsync: bool) {
        self.sequencer.set_vsync(vsync);
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.sequencer.set_clear_color(color);
    }

    /// Recreate the surface for a new window size
    ///
    /// Not allowed while a frame is recording. A zero-sized window (minimized)
    /// is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.sequencer.phase() == FramePhase::Recording {
            return Err(Error::FrameOrder("resize while a frame is recording".to_string()));
        }
        if width == 0 || height == 0 {
            engine_warn!(self.console, SOURCE, "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        self.device.wait_idle()?;
        self.device.resize(width, height)?;
        engine_debug!(self.console, SOURCE, "Resized surface to {}x{}", width, height);
        Ok(())
    }

    // ===== Shutdown =====

    /// Retire all GPU work and detach the console
    ///
    /// Frames are drained before uploads, and the console is torn down last
    /// so failures along the way are still logged. Calling it again is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let result = self
            .sequencer
            .shutdown()
            .and_then(|()| self.uploads.wait_all())
            .and_then(|()| self.device.wait_idle());
        match &result {
            Ok(()) => engine_info!(
                self.console,
                SOURCE,
                "Renderer shut down after {} frame(s)",
                self.sequencer.frame_number()
            ),
            Err(e) => engine_error!(self.console, SOURCE, "Shutdown failed: {}", e),
        }
        self.console.teardown();
        result
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down {
            return Err(Error::InvalidResource("renderer is shut down".to_string()));
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
