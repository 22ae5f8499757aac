//! The metric families published by the exporter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logstash_exporter_core::error::Result;
use logstash_exporter_core::event::Event;

use super::metrics::{linear_buckets, CounterVec, GaugeVec, HistogramVec, Registry};

pub const EVENTS_PROCESSED: &str = "logstash_exporter_events_processed_total";
pub const LAST_SEEN_EVENT: &str = "logstash_exporter_last_seen_event";
pub const PARSING_DURATION: &str = "logstash_exporter_parsing_duration_seconds";
pub const STAGING_QUEUE_ENTRIES: &str = "logstash_exporter_staging_queue_entries";

const EVENT_LABELS: [&str; 2] = ["host", "type"];

/// Latency buckets: -40s .. 55s in 5s steps. Negative values show producer
/// clocks running ahead of ours.
pub fn parsing_duration_buckets() -> Vec<f64> {
    linear_buckets(-40.0, 5.0, 20)
}

pub struct ExporterMetrics {
    registry: Arc<Registry>,
    pub events_processed: Arc<CounterVec>,
    pub last_seen_event: Arc<GaugeVec>,
    pub parsing_duration: Arc<HistogramVec>,
    pub staging_queue_entries: Arc<GaugeVec>,
}

impl ExporterMetrics {
    /// Register the exporter families on `registry`.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let events_processed = registry.register_counter(
            EVENTS_PROCESSED,
            "Total number of events processed by logstash.",
            &EVENT_LABELS,
        )?;
        let last_seen_event = registry.register_gauge(
            LAST_SEEN_EVENT,
            "Timestamp of the last seen event in the redis queue.",
            &EVENT_LABELS,
        )?;
        let parsing_duration = registry.register_histogram(
            PARSING_DURATION,
            "Logstash parsing latency.",
            &EVENT_LABELS,
            parsing_duration_buckets(),
        )?;
        let staging_queue_entries = registry.register_gauge(
            STAGING_QUEUE_ENTRIES,
            "Current number of pending events in the logstash staging queue.",
            &[],
        )?;
        staging_queue_entries.set(&[], 0.0)?;

        Ok(Self {
            registry,
            events_processed,
            last_seen_event,
            parsing_duration,
            staging_queue_entries,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Update the three per-event series for `(host, type)`.
    pub fn record_event(&self, event: &Event, now: DateTime<Utc>) -> Result<()> {
        let labels = [event.host.as_str(), event.event_type.as_str()];
        self.events_processed.inc(&labels)?;
        self.parsing_duration.observe(&labels, event.latency_seconds(now))?;
        self.last_seen_event.set(&labels, event.unix_seconds())?;
        Ok(())
    }

    pub fn set_staging_entries(&self, len: i64) -> Result<()> {
        self.staging_queue_entries.set(&[], len as f64)
    }

    pub fn staging_entries(&self) -> f64 {
        self.staging_queue_entries.get(&[]).unwrap_or(0.0)
    }

    pub fn render(&self) -> String {
        self.registry.render()
    }
}
