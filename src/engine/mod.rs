pub mod acquisition;
pub mod averaging;
pub mod buffers;
pub mod state;
pub mod worker;

pub use acquisition::{Acquisition, Pass, StopSignal};
pub use averaging::reduce;
pub use buffers::{SegmentData, SweepData};
pub use state::SweepState;
pub use worker::{SweepEvent, SweepHandle, SweepOutcome, SweepWorker};
