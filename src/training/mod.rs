mod metrics;
mod output;
mod renderer;
mod train;

pub use metrics::{IoUInput, IoUMetric};
pub use output::SegmentationOutput;
pub use renderer::TracingRenderer;
pub use train::TrainingConfig;
