/// Frame module - fence pacing, the frame loop and background uploads

pub mod pacer;
pub mod sequencer;
pub mod upload;

pub use pacer::{FramePacer, WaitOutcome};
pub use sequencer::{FrameInfo, FramePhase, FrameSequencer, FrameStats};
pub use upload::UploadPool;
