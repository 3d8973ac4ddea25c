//! Scheduling core: rate policy, generation-debt scheduler, clocks, and the driver loop.

pub mod error;
pub mod events;
pub mod playback;
pub mod processor;
pub mod quality;
pub mod rate_policy;
pub mod scheduler;
pub mod session;
pub mod wall_clock;

#[cfg(feature = "tokio-runtime")]
pub mod driver;

pub use error::{AppResult, PlaybackError, ProcessError};
pub use events::{
    build_playback_event, EventSink, InMemoryEventSink, PlaybackEvent, PlaybackEventKind,
    TracingEventSink,
};
pub use playback::{apply_tick, ExecutionMode, PlaybackState, TickReport};
pub use processor::{
    reencode_with_retry, run_batch, BatchOutcome, FrameSnapshot, GenerationProcessor,
    OffloadedProcessor, QualityMetrics,
};
pub use quality::{compute_quality, plan_qualities};
pub use rate_policy::{compute_effective_gen_per_sec, RatePolicyInput};
pub use scheduler::{
    plan_tick, settle_after_process, DebtCap, SchedulerPlan, SchedulerState, SchedulerTuning,
};
pub use session::{EpochToken, SessionEpoch};
pub use wall_clock::WallClockState;

#[cfg(feature = "tokio-runtime")]
pub use driver::{DriverSnapshot, PlaybackDriver, TickOutcome};
