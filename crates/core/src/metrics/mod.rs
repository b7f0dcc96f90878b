pub mod registry;
pub mod screening_metrics;

pub use registry::MetricsRegistry;
pub use screening_metrics::ScreeningMetrics;
