/// FrameSequencer - drives begin / draw / end / present over a ring of frames
///
/// Each in-flight index owns a command list and a slot of the frame pacer.
/// `begin_frame` waits for the index's previous submission before reusing
/// its command list, so frame N's GPU work on index i is retired before
/// frame N + buffer_count records into i again.

use std::sync::Arc;

use crate::config::RendererConfig;
use crate::descriptor::{ArenaAllocator, SlotRange};
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, DescriptorTable, GraphicsDevice};
use crate::log::Console;
use crate::pipeline::{BindingResource, RenderPipeline, SAMPLER_TABLE_INDEX, VIEW_TABLE_INDEX};
use crate::scene::{Camera, Drawable, FrameData};
use crate::shader::ShaderStage;
use crate::{engine_debug, engine_trace};
use super::pacer::{FramePacer, WaitOutcome};

const SOURCE: &str = "spider::frame";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No frame started yet, or shut down
    Idle,
    /// Between `begin_frame` and `end_frame`
    Recording,
    /// Submitted, not presented
    Submitted,
    Presented,
}

/// What `begin_frame` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// In-flight index recording this frame
    pub index: u32,
    /// Frames begun so far, this one included
    pub number: u64,
    /// Whether the CPU blocked on the GPU before reusing the index
    pub waited: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub draws: u64,
    /// `begin_frame` calls that had to wait for the GPU
    pub blocked_waits: u64,
    /// Draws whose pipeline had no `frameData` binding
    pub skipped_frame_data: u64,
}

pub struct FrameSequencer {
    device: Arc<dyn GraphicsDevice>,
    allocator: Arc<ArenaAllocator>,
    console: Console,
    pacer: FramePacer,
    command_lists: Vec<Box<dyn CommandList>>,
    index: u32,
    phase: FramePhase,
    frame_number: u64,
    clear_color: [f32; 4],
    vsync: bool,
    stats: FrameStats,
    /// Replaced resources and the fence value after which no frame reads them
    retired: Vec<(u64, BindingResource)>,
}

impl FrameSequencer {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        allocator: Arc<ArenaAllocator>,
        console: Console,
        config: &RendererConfig,
    ) -> Result<Self> {
        config.validate()?;
        let pacer = FramePacer::new(device.as_ref(), config.buffer_count)?;
        let command_lists = (0..config.buffer_count)
            .map(|_| device.create_command_list())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            device,
            allocator,
            console,
            pacer,
            command_lists,
            index: 0,
            phase: FramePhase::Idle,
            frame_number: 0,
            clear_color: config.clear_color,
            vsync: config.vsync,
            stats: FrameStats::default(),
            retired: Vec::new(),
        })
    }

    // ===== State =====

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// In-flight index of the current (or last) frame
    pub fn current_index(&self) -> u32 {
        self.index
    }

    pub fn buffer_count(&self) -> u32 {
        self.pacer.slot_count()
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.vsync = vsync;
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Resources waiting for the GPU before they are released
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    // ===== Resource lifetime =====

    /// Keep `resource` alive until every frame that may read it has retired
    ///
    /// A frame still recording retires at the value `end_frame` will signal.
    pub fn retire(&mut self, resource: BindingResource) {
        let value = match self.phase {
            FramePhase::Recording => self.pacer.counter() + 1,
            _ => self.pacer.counter(),
        };
        if value == 0 {
            return;
        }
        self.retired.push((value, resource));
    }

    fn release_retired(&mut self) -> Result<()> {
        if self.retired.is_empty() {
            return Ok(());
        }
        let completed = self.pacer.fence().completed_value()?;
        let before = self.retired.len();
        self.retired.retain(|(value, _)| *value > completed);
        let released = before - self.retired.len();
        if released > 0 {
            engine_trace!(self.console, SOURCE, "Released {} retired resource(s)", released);
        }
        Ok(())
    }

    // ===== Frame loop =====

    /// Start recording the next frame
    pub fn begin_frame(&mut self) -> Result<FrameInfo> {
        match self.phase {
            FramePhase::Recording => {
                return Err(Error::FrameOrder("begin_frame while a frame is recording".to_string()))
            }
            FramePhase::Submitted => {
                return Err(Error::FrameOrder(
                    "begin_frame before the previous frame was presented".to_string(),
                ))
            }
            FramePhase::Idle | FramePhase::Presented => {}
        }

        let index = if self.frame_number == 0 {
            0
        } else {
            (self.index + 1) % self.buffer_count()
        };

        let outcome = self.pacer.wait(index)?;
        if outcome == WaitOutcome::Blocked {
            self.stats.blocked_waits += 1;
            engine_trace!(self.console, SOURCE, "Waited for the GPU before reusing frame index {}", index);
        }

        self.release_retired()?;

        let command_list = &mut self.command_lists[index as usize];
        command_list.reset()?;
        self.device
            .begin_surface_pass(command_list.as_mut(), self.clear_color)?;

        self.index = index;
        self.phase = FramePhase::Recording;
        self.frame_number += 1;
        self.stats.frames += 1;

        Ok(FrameInfo {
            index,
            number: self.frame_number,
            waited: outcome == WaitOutcome::Blocked,
        })
    }

    /// Record an indexed draw of `drawable` through `pipeline`
    ///
    /// The camera and the drawable's transform are written into the
    /// pipeline's `frameData` vertex binding first; pipelines without one
    /// draw anyway.
    ///
    /// `frameData` is a single mapped buffer per pipeline, read by the GPU
    /// when the frame executes. Draw a pipeline at most once per frame; the
    /// GPU sees only the last transform written. Objects drawn in the same
    /// frame each need their own pipeline.
    pub fn draw(&mut self, pipeline: &RenderPipeline, drawable: &Drawable, camera: &Camera) -> Result<()> {
        self.expect_recording("draw")?;

        let frame_data = FrameData {
            projection: camera.projection(),
            view: camera.view(),
            model: drawable.transform.matrix(),
        };
        match pipeline.bind_value(FrameData::BINDING_NAME, ShaderStage::Vertex, &frame_data) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                self.stats.skipped_frame_data += 1;
                engine_trace!(self.console, SOURCE, "Pipeline has no frameData binding, skipped");
            }
            Err(e) => return Err(e),
        }

        let view_table = self.resolve_table(pipeline.view_table())?;
        let sampler_table = self.resolve_table(pipeline.sampler_table())?;

        let command_list = &mut self.command_lists[self.index as usize];
        command_list.set_pipeline_state(pipeline.layout().pipeline_state().as_ref())?;
        if let Some((table, start)) = &view_table {
            command_list.set_descriptor_table(VIEW_TABLE_INDEX, table.as_ref(), *start)?;
        }
        if let Some((table, start)) = &sampler_table {
            command_list.set_descriptor_table(SAMPLER_TABLE_INDEX, table.as_ref(), *start)?;
        }

        let mesh = &drawable.mesh;
        command_list.set_vertex_buffer(mesh.vertex_buffer.as_ref(), mesh.vertex_stride)?;
        command_list.set_index_buffer(mesh.index_buffer.as_ref(), mesh.index_format)?;
        command_list.draw_indexed(mesh.index_count, 0, 0)?;

        self.stats.draws += 1;
        Ok(())
    }

    /// Close the frame, submit it and signal its fence slot
    pub fn end_frame(&mut self) -> Result<()> {
        self.expect_recording("end_frame")?;

        let command_list = &mut self.command_lists[self.index as usize];
        self.device.end_surface_pass(command_list.as_mut())?;
        command_list.close()?;
        self.device.submit(command_list.as_ref())?;
        let value = self.pacer.signal(self.device.as_ref(), self.index)?;

        engine_trace!(
            self.console,
            SOURCE,
            "Submitted frame {} on index {} (fence {})",
            self.frame_number,
            self.index,
            value
        );
        self.phase = FramePhase::Submitted;
        Ok(())
    }

    /// Present the submitted frame with the current vsync setting
    pub fn present(&mut self) -> Result<()> {
        if self.phase != FramePhase::Submitted {
            return Err(Error::FrameOrder(format!(
                "present in phase {:?}, expected a submitted frame",
                self.phase
            )));
        }
        self.device.present(self.vsync)?;
        self.phase = FramePhase::Presented;
        Ok(())
    }

    /// Retire every submitted frame
    ///
    /// A frame still recording is closed without being submitted.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.phase == FramePhase::Recording {
            let command_list = &mut self.command_lists[self.index as usize];
            self.device.end_surface_pass(command_list.as_mut())?;
            command_list.close()?;
        }
        self.pacer.drain(self.device.as_ref())?;
        self.device.wait_idle()?;
        self.retired.clear();
        self.phase = FramePhase::Idle;
        engine_debug!(
            self.console,
            SOURCE,
            "Frame sequencer drained after {} frame(s)",
            self.frame_number
        );
        Ok(())
    }

    fn expect_recording(&self, operation: &str) -> Result<()> {
        if self.phase != FramePhase::Recording {
            return Err(Error::FrameOrder(format!(
                "{} outside begin_frame/end_frame (phase {:?})",
                operation, self.phase
            )));
        }
        Ok(())
    }

    fn resolve_table(
        &self,
        range: Option<SlotRange>,
    ) -> Result<Option<(Arc<dyn DescriptorTable>, u32)>> {
        range
            .map(|range| Ok((self.allocator.table(range.arena)?, range.start)))
            .transpose()
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
