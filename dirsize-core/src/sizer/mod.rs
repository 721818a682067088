mod accumulator;
mod coordinator;
mod progress;
mod queue;
mod worker;

pub use accumulator::{SizeAccumulator, SizeResult};
pub use coordinator::{SizeReport, Sizer, SizerConfig, compute_size};
pub use progress::{SizeProgress, WorkerStats};
pub use queue::{InFlight, WorkQueue};
pub use worker::WorkerState;
