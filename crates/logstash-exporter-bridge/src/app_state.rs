//! Shared application state.
//!
//! Owns the registry explicitly; the ingestion loop, the sampler and the HTTP
//! handlers each get a clone of the same `Arc`s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logstash_exporter_core::error::Result;

use crate::config::ExporterConfig;
use crate::obs::{ExporterMetrics, Registry};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<ExporterMetrics>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    draining: AtomicBool,
}

impl AppState {
    /// Build application state with a fresh registry.
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(ExporterMetrics::new(registry)?);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                draining: AtomicBool::new(false),
            }),
            metrics,
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<ExporterMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }
}
