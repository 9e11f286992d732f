/// GPU fence trait

use std::any::Any;

use crate::error::Result;

/// Monotonic GPU completion counter
///
/// The queue raises the value when it reaches a signal enqueued through
/// `GraphicsDevice::signal`; the CPU reads it or blocks on it.
pub trait Fence: Send + Sync {
    /// Highest value the GPU has reached
    fn completed_value(&self) -> Result<u64>;

    /// Block until `completed_value() >= value`. No timeout.
    fn wait_for(&self, value: u64) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
