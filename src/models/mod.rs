pub mod error;
pub mod failure;
pub mod progress;
pub mod stage;

pub use error::PipelineError;
pub use failure::FallbackSignal;
pub use progress::{EpicCycleState, EpicScope, IterationState, Progress, StageState};
pub use stage::{Stage, StageStatus};
