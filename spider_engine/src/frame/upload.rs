/// UploadPool - background contexts that copy staged data into GPU resources
///
/// Each context owns a command list and a one-slot frame pacer and sits
/// behind its own mutex. Callers on any thread take the next context
/// round-robin; two uploads only contend when they land on the same one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferDesc, BufferUsage, CommandList, GraphicsDevice, Texture, TextureDesc,
};
use crate::log::Console;
use crate::engine_debug;
use super::pacer::FramePacer;

const SOURCE: &str = "spider::upload";

struct UploadContext {
    command_list: Box<dyn CommandList>,
    pacer: FramePacer,
}

pub struct UploadPool {
    device: Arc<dyn GraphicsDevice>,
    console: Console,
    contexts: Vec<Mutex<UploadContext>>,
    next: AtomicUsize,
}

impl UploadPool {
    /// Create `context_count` contexts (at least one)
    pub fn new(device: Arc<dyn GraphicsDevice>, console: Console, context_count: u32) -> Result<Self> {
        let contexts = (0..context_count.max(1))
            .map(|_| {
                Ok(Mutex::new(UploadContext {
                    command_list: device.create_command_list()?,
                    pacer: FramePacer::new(device.as_ref(), 1)?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        engine_debug!(console, SOURCE, "Created {} upload context(s)", contexts.len());
        Ok(Self {
            device,
            console,
            contexts,
            next: AtomicUsize::new(0),
        })
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Record commands on the next context, submit them and wait for the GPU
    ///
    /// The command list is closed even when `record` fails.
    pub fn submit<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&mut dyn CommandList) -> Result<()>,
    {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.contexts.len();
        let mut context = self.contexts[index]
            .lock()
            .map_err(|_| Error::BackendError("upload context poisoned".to_string()))?;
        let UploadContext { command_list, pacer } = &mut *context;

        pacer.wait(0)?;
        command_list.reset()?;
        let recorded = record(command_list.as_mut());
        command_list.close()?;
        recorded?;

        self.device.submit(command_list.as_ref())?;
        pacer.signal(self.device.as_ref(), 0)?;
        pacer.wait(0)?;
        Ok(())
    }

    /// Create a texture and fill it with `pixels` through a staging buffer
    pub fn upload_texture(&self, desc: &TextureDesc, pixels: &[u8]) -> Result<Arc<dyn Texture>> {
        if pixels.len() as u64 != desc.byte_size() {
            return Err(Error::InvalidResource(format!(
                "{} bytes of pixels for a {}x{} {:?} texture ({} bytes)",
                pixels.len(),
                desc.width,
                desc.height,
                desc.format,
                desc.byte_size()
            )));
        }

        let staging = self.device.create_buffer(&BufferDesc {
            size: desc.byte_size(),
            usage: BufferUsage::Staging,
        })?;
        staging.update(0, pixels)?;
        let texture = self.device.create_texture(desc)?;

        self.submit(|command_list| command_list.copy_buffer_to_texture(staging.as_ref(), texture.as_ref()))?;
        engine_debug!(
            self.console,
            SOURCE,
            "Uploaded {}x{} {:?} texture",
            desc.width,
            desc.height,
            desc.format
        );
        Ok(texture)
    }

    /// Block until every context is idle
    pub fn wait_all(&self) -> Result<()> {
        for context in &self.contexts {
            let context = context
                .lock()
                .map_err(|_| Error::BackendError("upload context poisoned".to_string()))?;
            context.pacer.wait(0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
