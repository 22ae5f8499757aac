//! Staging queue depth sampler.
//!
//! Every tick, reads `LLEN` of the staging queue and publishes it as the
//! `staging_queue_entries` gauge. A failed sample leaves the gauge at its last
//! value; the connection is kept across ticks and rebuilt only when broken.
//! A stalled `LLEN` counts as broken after one interval. A slow connect delays
//! the following ticks instead of being cut short.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use logstash_exporter_core::error::{ExporterError, Result};

use crate::lifecycle::shutdown_requested;
use crate::obs::ExporterMetrics;
use crate::queue::{QueueConnection, QueueConnector};

pub struct StagingSampler {
    connector: Arc<dyn QueueConnector>,
    metrics: Arc<ExporterMetrics>,
    queue: String,
    interval: Duration,
    conn: Option<Box<dyn QueueConnection>>,
}

impl StagingSampler {
    pub fn new(
        connector: Arc<dyn QueueConnector>,
        metrics: Arc<ExporterMetrics>,
        queue: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            connector,
            metrics,
            queue: queue.into(),
            interval,
            conn: None,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tick.tick() => {}
            }
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = self.sample_once() => {}
            }
        }
        tracing::info!(queue=%self.queue, "staging queue sampler stopped");
    }

    /// Take one sample. Errors are logged here; the returned value is for tests.
    pub async fn sample_once(&mut self) -> Result<i64> {
        let res = self.try_sample().await;
        match &res {
            Ok(len) => tracing::debug!(queue=%self.queue, entries=len, "staging queue sampled"),
            Err(e) => {
                tracing::warn!(queue=%self.queue, kind=e.kind().as_str(), error=%e, "failed to read staging queue");
                if e.is_connection_fatal() {
                    self.conn = None;
                }
            }
        }
        res
    }

    async fn try_sample(&mut self) -> Result<i64> {
        if self.conn.is_none() {
            self.conn = Some(self.connector.connect().await?);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Err(ExporterError::Internal("staging connection missing".into()));
        };
        // connect is bounded by its own timeout; the query by one interval
        let len = tokio::time::timeout(self.interval, conn.length(&self.queue))
            .await
            .map_err(|_| ExporterError::Connection(format!("LLEN {} timed out", self.queue)))??;
        if len < 0 {
            return Err(ExporterError::reply(format!("negative queue length {len}")));
        }
        self.metrics.set_staging_entries(len)?;
        Ok(len)
    }
}
