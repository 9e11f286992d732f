/// Mock graphics device for unit tests (no GPU required)
///
/// Descriptor tables keep their slots in memory, buffers keep their bytes,
/// command lists keep the names of recorded commands and fences complete
/// either on signal (default) or when a test calls `MockFence::complete`.
/// The shader toolchain mocks read a one-declaration-per-line text format:
///
/// ```text
/// cbuffer frameData b0 192 projection:0:64 view:64:64 model:128:64
/// texture myTexture t0
/// structured lights t1 32
/// raw bytes t2
/// sampler mySampler s0
/// rwtexture output u0
/// ```

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingLayout, BindingLayoutDesc, Buffer, BufferDesc, BufferUsage, CommandList,
    DescriptorCategory, DescriptorTable, DescriptorWrite, Fence, GraphicsDevice, IndexFormat,
    PipelineState, PipelineStateDesc, SamplerDesc, Texture, TextureDesc, check_buffer_range,
};
use crate::log::{LogEntry, Logger};
use crate::shader::{
    NativeResourceKind, ReflectionBuilder, ReflectionResult, RegisterConvention, ShaderCompiler,
    ShaderDesc, ShaderReflector, ShaderSource, ShaderStage, VariableInfo,
};

fn address<T: ?Sized>(value: &T) -> usize {
    value as *const T as *const () as usize
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub desc: BufferDesc,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(desc: BufferDesc) -> Self {
        let data = Mutex::new(vec![0u8; desc.size as usize]);
        Self { desc, data }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn usage(&self) -> BufferUsage {
        self.desc.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_buffer_range(self.desc.size, offset, data)?;
        let mut bytes = self.data.lock().unwrap();
        let start = offset as usize;
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcast a buffer created by `MockGraphicsDevice`
pub fn mock_buffer(buffer: &dyn Buffer) -> &MockBuffer {
    buffer.as_any().downcast_ref::<MockBuffer>().unwrap()
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub desc: TextureDesc,
}

impl Texture for MockTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Descriptor Table
// ============================================================================

/// Content of one mock descriptor slot
#[derive(Debug, Clone, PartialEq)]
pub enum MockDescriptor {
    Empty,
    Null,
    ConstantBuffer { buffer: usize, size: u64 },
    StructuredBuffer { buffer: usize, stride: u32, element_count: u32 },
    RawBuffer { buffer: usize },
    Texture { texture: usize, width: u32, height: u32 },
    Sampler(SamplerDesc),
}

impl MockDescriptor {
    fn from_write(write: &DescriptorWrite<'_>) -> Self {
        match *write {
            DescriptorWrite::Null => MockDescriptor::Null,
            DescriptorWrite::ConstantBuffer { buffer } => MockDescriptor::ConstantBuffer {
                buffer: address(buffer),
                size: buffer.size(),
            },
            DescriptorWrite::StructuredBuffer { buffer, stride, element_count } => {
                MockDescriptor::StructuredBuffer {
                    buffer: address(buffer),
                    stride,
                    element_count,
                }
            }
            DescriptorWrite::RawBuffer { buffer } => MockDescriptor::RawBuffer {
                buffer: address(buffer),
            },
            DescriptorWrite::Texture { texture } => MockDescriptor::Texture {
                texture: address(texture),
                width: texture.desc().width,
                height: texture.desc().height,
            },
            DescriptorWrite::Sampler(desc) => MockDescriptor::Sampler(*desc),
        }
    }
}

pub struct MockDescriptorTable {
    pub id: u64,
    pub category: DescriptorCategory,
    pub capacity: u32,
    pub shader_visible: bool,
    slots: Mutex<Vec<MockDescriptor>>,
}

impl MockDescriptorTable {
    pub fn slot(&self, index: u32) -> MockDescriptor {
        self.slots.lock().unwrap()[index as usize].clone()
    }

    pub fn slots(&self) -> Vec<MockDescriptor> {
        self.slots.lock().unwrap().clone()
    }
}

impl DescriptorTable for MockDescriptorTable {
    fn category(&self) -> DescriptorCategory {
        self.category
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn shader_visible(&self) -> bool {
        self.shader_visible
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcast a table created by `MockGraphicsDevice`
pub fn mock_table(table: &dyn DescriptorTable) -> &MockDescriptorTable {
    table.as_any().downcast_ref::<MockDescriptorTable>().unwrap()
}

// ============================================================================
// Mock Fence
// ============================================================================

pub struct MockFence {
    completed: Mutex<u64>,
    condvar: Condvar,
    blocked_waits: Mutex<Vec<u64>>,
}

impl MockFence {
    pub fn new(initial_value: u64) -> Self {
        Self {
            completed: Mutex::new(initial_value),
            condvar: Condvar::new(),
            blocked_waits: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the GPU reaching `value`
    pub fn complete(&self, value: u64) {
        let mut completed = self.completed.lock().unwrap();
        if value > *completed {
            *completed = value;
        }
        self.condvar.notify_all();
    }

    /// Values `wait_for` actually had to block on
    pub fn blocked_waits(&self) -> Vec<u64> {
        self.blocked_waits.lock().unwrap().clone()
    }
}

impl Fence for MockFence {
    fn completed_value(&self) -> Result<u64> {
        Ok(*self.completed.lock().unwrap())
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        let mut completed = self.completed.lock().unwrap();
        if *completed >= value {
            return Ok(());
        }
        self.blocked_waits.lock().unwrap().push(value);
        while *completed < value {
            completed = self.condvar.wait(completed).unwrap();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Command List
// ============================================================================

#[derive(Default)]
pub struct MockCommandList {
    pub commands: Vec<String>,
    pub recording: bool,
}

impl CommandList for MockCommandList {
    fn reset(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }
        self.commands.clear();
        self.recording = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        self.recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn set_pipeline_state(&mut self, _pipeline: &dyn PipelineState) -> Result<()> {
        self.commands.push("set_pipeline_state".to_string());
        Ok(())
    }

    fn set_descriptor_table(
        &mut self,
        table_index: u32,
        table: &dyn DescriptorTable,
        base_slot: u32,
    ) -> Result<()> {
        self.commands.push(format!(
            "set_descriptor_table {} {:?} {}",
            table_index,
            table.category(),
            base_slot
        ));
        Ok(())
    }

    fn set_vertex_buffer(&mut self, _buffer: &dyn Buffer, stride: u32) -> Result<()> {
        self.commands.push(format!("set_vertex_buffer {}", stride));
        Ok(())
    }

    fn set_index_buffer(&mut self, _buffer: &dyn Buffer, format: IndexFormat) -> Result<()> {
        self.commands.push(format!("set_index_buffer {:?}", format));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.commands
            .push(format!("draw_indexed {} {} {}", index_count, first_index, base_vertex));
        Ok(())
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, dst: &dyn Texture) -> Result<()> {
        self.commands.push(format!(
            "copy_buffer_to_texture {} {}x{}",
            src.size(),
            dst.desc().width,
            dst.desc().height
        ));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Mock Pipeline objects
// ============================================================================

pub struct MockBindingLayout {
    pub desc: BindingLayoutDesc,
}

impl BindingLayout for MockBindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipelineState {
    pub binding_layout: Arc<dyn BindingLayout>,
    pub stages: Vec<ShaderStage>,
}

impl PipelineState for MockPipelineState {
    fn binding_layout(&self) -> &Arc<dyn BindingLayout> {
        &self.binding_layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<Vec<String>>>,
    presents: Mutex<Vec<bool>>,
    extent: Mutex<(u32, u32)>,
    next_id: AtomicU64,
    auto_complete: AtomicBool,
    fail_descriptor_tables: AtomicBool,
    fail_pipeline_states: AtomicBool,
    fullscreen: AtomicBool,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            presents: Mutex::new(Vec::new()),
            extent: Mutex::new((800, 600)),
            next_id: AtomicU64::new(1),
            auto_complete: AtomicBool::new(true),
            fail_descriptor_tables: AtomicBool::new(false),
            fail_pipeline_states: AtomicBool::new(false),
            fullscreen: AtomicBool::new(false),
        }
    }

    /// When false, signaled values stay pending until `MockFence::complete`
    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_descriptor_tables(&self, fail: bool) {
        self.fail_descriptor_tables.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pipeline_states(&self, fail: bool) {
        self.fail_pipeline_states.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose name starts with `prefix`
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Commands of every submitted command list, in submission order
    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    /// vsync flag of every present
    pub fn presents(&self) -> Vec<bool> {
        self.presents.lock().unwrap().clone()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn mock_command_list(command_list: &mut dyn CommandList) -> Result<&mut MockCommandList> {
        command_list
            .as_any_mut()
            .downcast_mut::<MockCommandList>()
            .ok_or_else(|| Error::InvalidResource("foreign command list".to_string()))
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_descriptor_table(
        &self,
        category: DescriptorCategory,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Arc<dyn DescriptorTable>> {
        self.record(format!("create_descriptor_table {:?} {}", category, capacity));
        if self.fail_descriptor_tables.load(Ordering::SeqCst) {
            return Err(Error::BackendError(format!(
                "descriptor table of {} slots not supported",
                capacity
            )));
        }
        Ok(Arc::new(MockDescriptorTable {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            category,
            capacity,
            shader_visible,
            slots: Mutex::new(vec![MockDescriptor::Empty; capacity as usize]),
        }))
    }

    fn copy_descriptors(
        &self,
        src: &dyn DescriptorTable,
        dst: &dyn DescriptorTable,
        count: u32,
    ) -> Result<()> {
        self.record(format!("copy_descriptors {}", count));
        let src_slots = mock_table(src).slots();
        let dst = mock_table(dst);
        if count > src.capacity() || count > dst.capacity() {
            return Err(Error::InvalidResource("copy out of table bounds".to_string()));
        }
        let mut dst_slots = dst.slots.lock().unwrap();
        dst_slots[..count as usize].clone_from_slice(&src_slots[..count as usize]);
        Ok(())
    }

    fn write_descriptor(
        &self,
        table: &dyn DescriptorTable,
        slot: u32,
        write: &DescriptorWrite<'_>,
    ) -> Result<()> {
        self.record(format!("write_descriptor {} {}", slot, write.kind_name()));
        if slot >= table.capacity() {
            return Err(Error::InvalidResource(format!(
                "slot {} out of table capacity {}",
                slot,
                table.capacity()
            )));
        }
        if let Some(category) = write.category() {
            if category != table.category() {
                return Err(Error::InvalidResource(format!(
                    "{} written into a {:?} table",
                    write.kind_name(),
                    table.category()
                )));
            }
        }
        mock_table(table).slots.lock().unwrap()[slot as usize] = MockDescriptor::from_write(write);
        Ok(())
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.record(format!("create_buffer {:?} {}", desc.usage, desc.size));
        if desc.size == 0 {
            return Err(Error::InvalidResource("zero-sized buffer".to_string()));
        }
        Ok(Arc::new(MockBuffer::new(desc.clone())))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        self.record(format!("create_texture {}x{}", desc.width, desc.height));
        Ok(Arc::new(MockTexture { desc: desc.clone() }))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        self.record(format!("create_binding_layout {}", desc.tables.len()));
        Ok(Arc::new(MockBindingLayout { desc: desc.clone() }))
    }

    fn create_pipeline_state(&self, desc: &PipelineStateDesc) -> Result<Arc<dyn PipelineState>> {
        self.record(format!("create_pipeline_state {}", desc.stages.len()));
        if self.fail_pipeline_states.load(Ordering::SeqCst) {
            return Err(Error::BackendError("pipeline state rejected".to_string()));
        }
        Ok(Arc::new(MockPipelineState {
            binding_layout: desc.binding_layout.clone(),
            stages: desc.stages.iter().map(|s| s.stage).collect(),
        }))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        self.record("create_fence".to_string());
        Ok(Arc::new(MockFence::new(initial_value)))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        self.record("create_command_list".to_string());
        Ok(Box::new(MockCommandList::default()))
    }

    fn submit(&self, command_list: &dyn CommandList) -> Result<()> {
        self.record("submit".to_string());
        if command_list.is_recording() {
            return Err(Error::BackendError("submitting an open command list".to_string()));
        }
        let commands = command_list
            .as_any()
            .downcast_ref::<MockCommandList>()
            .map(|list| list.commands.clone())
            .unwrap_or_default();
        self.submitted.lock().unwrap().push(commands);
        Ok(())
    }

    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()> {
        self.record(format!("signal {}", value));
        if self.auto_complete.load(Ordering::SeqCst) {
            if let Some(fence) = fence.as_any().downcast_ref::<MockFence>() {
                fence.complete(value);
            }
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.record("wait_idle".to_string());
        Ok(())
    }

    fn begin_surface_pass(
        &self,
        command_list: &mut dyn CommandList,
        _clear_color: [f32; 4],
    ) -> Result<()> {
        self.record("begin_surface_pass".to_string());
        Self::mock_command_list(command_list)?
            .commands
            .push("begin_surface_pass".to_string());
        Ok(())
    }

    fn end_surface_pass(&self, command_list: &mut dyn CommandList) -> Result<()> {
        self.record("end_surface_pass".to_string());
        Self::mock_command_list(command_list)?
            .commands
            .push("end_surface_pass".to_string());
        Ok(())
    }

    fn present(&self, vsync: bool) -> Result<()> {
        self.record("present".to_string());
        self.presents.lock().unwrap().push(vsync);
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.record(format!("resize {}x{}", width, height));
        *self.extent.lock().unwrap() = (width, height);
        Ok(())
    }

    fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        self.record(format!("set_fullscreen {}", fullscreen));
        self.fullscreen.store(fullscreen, Ordering::SeqCst);
        Ok(())
    }

    fn surface_extent(&self) -> (u32, u32) {
        *self.extent.lock().unwrap()
    }
}

// ============================================================================
// Mock shader toolchain
// ============================================================================

/// Compiles text sources to their UTF-8 bytes; `#error` in a source fails
#[derive(Default)]
pub struct MockShaderCompiler;

impl ShaderCompiler for MockShaderCompiler {
    fn compile(&self, desc: &ShaderDesc, stage: ShaderStage) -> Result<Vec<u8>> {
        match &desc.source {
            ShaderSource::Text(text) => {
                if let Some(line) = text.lines().position(|l| l.trim_start().starts_with("#error")) {
                    return Err(Error::ShaderCompilation(format!(
                        "{}:{}: error in {} entry point '{}'",
                        stage.profile_prefix(),
                        line + 1,
                        stage.profile_prefix(),
                        desc.entry_point
                    )));
                }
                Ok(text.clone().into_bytes())
            }
            ShaderSource::Bytecode(bytes) => Ok(bytes.clone()),
            ShaderSource::File(path) => Err(Error::ShaderCompilation(format!(
                "{}: file sources are not available in tests",
                path.display()
            ))),
        }
    }
}

/// Reflects the declaration format described in the module docs
#[derive(Default)]
pub struct MockShaderReflector;

fn parse_register(token: Option<&str>, line: &str) -> Result<u32> {
    token
        .and_then(|t| t.get(1..))
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::ShaderReflection(format!("bad register in '{}'", line)))
}

fn parse_number(token: Option<&str>, line: &str) -> Result<u32> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::ShaderReflection(format!("bad number in '{}'", line)))
}

impl ShaderReflector for MockShaderReflector {
    fn reflect(&self, bytecode: &[u8], stage: ShaderStage) -> Result<ReflectionResult> {
        let text = std::str::from_utf8(bytecode)
            .map_err(|e| Error::ShaderReflection(format!("malformed bytecode: {}", e)))?;
        let mut builder = ReflectionBuilder::new(stage);

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let directive = tokens.next().unwrap_or_default();
            let name = tokens
                .next()
                .ok_or_else(|| Error::ShaderReflection(format!("missing name in '{}'", line)))?;
            let register = parse_register(tokens.next(), line)?;

            match directive {
                "cbuffer" => {
                    let size = parse_number(tokens.next(), line)?;
                    let mut variables = Vec::new();
                    for member in tokens {
                        let parts: Vec<&str> = member.split(':').collect();
                        if parts.len() != 3 {
                            return Err(Error::ShaderReflection(format!("bad member '{}'", member)));
                        }
                        variables.push(VariableInfo {
                            name: parts[0].to_string(),
                            offset: parse_number(Some(parts[1]), line)?,
                            size: parse_number(Some(parts[2]), line)?,
                        });
                    }
                    builder.constant_buffer(name, register, 0, size, variables);
                }
                "texture" => {
                    builder.resource(name, NativeResourceKind::Texture, register, 0, 0);
                }
                "structured" => {
                    let stride = parse_number(tokens.next(), line)?;
                    builder.resource(name, NativeResourceKind::StructuredBuffer, register, 0, stride);
                }
                "raw" => {
                    builder.resource(name, NativeResourceKind::ByteAddressBuffer, register, 0, 0);
                }
                "sampler" => {
                    builder.resource(name, NativeResourceKind::Sampler, register, 0, 0);
                }
                "rwtexture" => {
                    builder.resource(name, NativeResourceKind::Storage, register, 0, 0);
                }
                other => {
                    return Err(Error::ShaderReflection(format!("unknown declaration '{}'", other)));
                }
            }
        }

        Ok(builder.finish())
    }
}

/// `MockShaderReflector` whose registers are absolute table slots, the way
/// SPIR-V binding numbers are
pub struct MockTableSlotReflector;

impl ShaderReflector for MockTableSlotReflector {
    fn reflect(&self, bytecode: &[u8], stage: ShaderStage) -> Result<ReflectionResult> {
        MockShaderReflector.reflect(bytecode, stage)
    }

    fn register_convention(&self) -> RegisterConvention {
        RegisterConvention::TableSlot
    }
}

// ============================================================================
// Capture logger
// ============================================================================

/// Logger that keeps every entry for assertions
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

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
