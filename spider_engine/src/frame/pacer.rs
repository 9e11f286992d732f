/// FramePacer - one GPU fence shared by a ring of in-flight slots
///
/// Every slot remembers the fence value signaled after its last submission.
/// Waiting on a slot blocks until the GPU has reached that value, which is
/// what keeps the CPU at most `slot_count` submissions ahead of the GPU.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{Fence, GraphicsDevice};

/// Whether `FramePacer::wait` had to block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The slot's work had already retired
    Ready,
    /// The caller blocked until the GPU caught up
    Blocked,
}

pub struct FramePacer {
    fence: Arc<dyn Fence>,
    /// Last value handed to the GPU
    counter: u64,
    last_submitted: Vec<u64>,
}

impl FramePacer {
    pub fn new(device: &dyn GraphicsDevice, slot_count: u32) -> Result<Self> {
        if slot_count == 0 {
            return Err(Error::InitializationFailed(
                "frame pacer needs at least one slot".to_string(),
            ));
        }
        Ok(Self {
            fence: device.create_fence(0)?,
            counter: 0,
            last_submitted: vec![0; slot_count as usize],
        })
    }

    pub fn slot_count(&self) -> u32 {
        self.last_submitted.len() as u32
    }

    pub fn fence(&self) -> &Arc<dyn Fence> {
        &self.fence
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Fence value the slot's last submission retires at (0 when never used)
    pub fn last_submitted(&self, slot: u32) -> Result<u64> {
        self.last_submitted
            .get(slot as usize)
            .copied()
            .ok_or_else(|| Self::bad_slot(slot))
    }

    /// Enqueue a signal for the work just submitted on `slot`
    ///
    /// Returns the signaled value.
    pub fn signal(&mut self, device: &dyn GraphicsDevice, slot: u32) -> Result<u64> {
        let value = self.counter + 1;
        let entry = self
            .last_submitted
            .get_mut(slot as usize)
            .ok_or_else(|| Self::bad_slot(slot))?;
        device.signal(self.fence.as_ref(), value)?;
        *entry = value;
        self.counter = value;
        Ok(value)
    }

    pub fn is_complete(&self, slot: u32) -> Result<bool> {
        Ok(self.fence.completed_value()? >= self.last_submitted(slot)?)
    }

    /// Block until the slot's last submission retired
    pub fn wait(&self, slot: u32) -> Result<WaitOutcome> {
        let target = self.last_submitted(slot)?;
        if self.fence.completed_value()? >= target {
            return Ok(WaitOutcome::Ready);
        }
        self.fence.wait_for(target)?;
        Ok(WaitOutcome::Blocked)
    }

    /// Signal once more and wait for it, retiring every submission
    pub fn drain(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        let value = self.counter + 1;
        device.signal(self.fence.as_ref(), value)?;
        self.counter = value;
        self.fence.wait_for(value)
    }

    fn bad_slot(slot: u32) -> Error {
        Error::InvalidResource(format!("frame slot {} out of range", slot))
    }
}

#[cfg(test)]
#[path = "pacer_tests.rs"]
mod tests;
