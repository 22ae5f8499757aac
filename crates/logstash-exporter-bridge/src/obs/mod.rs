//! Observability: the metrics registry and the exporter's own metric families.

pub mod exporter;
pub mod metrics;

pub use exporter::ExporterMetrics;
pub use metrics::Registry;
