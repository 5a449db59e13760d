use burn::train::renderer::{MetricState, MetricsRenderer, TrainingProgress};
use tracing::{debug, trace};

/// Reports training progress through `tracing` instead of a terminal UI.
pub struct TracingRenderer;

impl MetricsRenderer for TracingRenderer {
    fn update_train(&mut self, state: MetricState) {
        if let MetricState::Numeric(entry, value) = state {
            trace!(metric = %entry.name, value, "train");
        }
    }

    fn update_valid(&mut self, state: MetricState) {
        if let MetricState::Numeric(entry, value) = state {
            trace!(metric = %entry.name, value, "valid");
        }
    }

    fn render_train(&mut self, item: TrainingProgress) {
        debug!(?item, "Training");
    }

    fn render_valid(&mut self, item: TrainingProgress) {
        debug!(?item, "Validating");
    }
}
