//! Ingestion loop: blocking pop from the stats queue, decode, record.
//!
//! Single consumer. One event is fully recorded before the next pop, so series
//! for a given `(host, type)` move in queue order.
//!
//! Failure handling:
//! - connect/auth failure: wait `reconnect`, connect again
//! - pop failure that leaves the connection usable: wait `retry`, pop again
//! - pop failure that breaks the connection: drop it, wait `reconnect`
//! - reply of the wrong shape: log, skip, pop again
//! - undecodable payload: log, drop the message, pop again

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use logstash_exporter_core::error::Result;
use logstash_exporter_core::event::{decode_event, Event};

use crate::lifecycle::shutdown_requested;
use crate::obs::ExporterMetrics;
use crate::queue::{QueueConnection, QueueConnector};
use crate::retry::{backoff, RetryPolicy};

/// Decode one payload and update its series. Nothing is recorded on error.
pub fn process_payload(metrics: &ExporterMetrics, payload: &str) -> Result<Event> {
    let now = Utc::now();
    let event = decode_event(payload, now)?;
    metrics.record_event(&event, now)?;
    Ok(event)
}

pub struct IngestionLoop {
    connector: Arc<dyn QueueConnector>,
    metrics: Arc<ExporterMetrics>,
    queue: String,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

enum Session {
    /// Connection is gone; rebuild it.
    Lost,
    Shutdown,
}

impl IngestionLoop {
    pub fn new(
        connector: Arc<dyn QueueConnector>,
        metrics: Arc<ExporterMetrics>,
        queue: impl Into<String>,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connector,
            metrics,
            queue: queue.into(),
            retry,
            shutdown,
        }
    }

    /// Run until shutdown. Queue failures never end the loop.
    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            tracing::info!(queue=%self.queue, "starting redis queue listener");

            let connected = tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => break,
                res = self.connector.connect() => res,
            };

            match connected {
                Ok(conn) => {
                    if let Session::Shutdown = self.consume(conn).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(queue=%self.queue, kind=e.kind().as_str(), error=%e, "queue connection failed");
                }
            }

            let wait = self.retry.reconnect_wait();
            tracing::warn!(queue=%self.queue, wait_ms=wait.as_millis() as u64, "queue listener ended, reconnecting");
            if backoff(wait, &mut self.shutdown).await {
                break;
            }
        }
        tracing::info!(queue=%self.queue, "queue listener stopped");
    }

    async fn consume(&mut self, mut conn: Box<dyn QueueConnection>) -> Session {
        loop {
            tracing::debug!(queue=%self.queue, "waiting for new entry in queue");

            let popped = tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => return Session::Shutdown,
                res = conn.blocking_pop(&self.queue) => res,
            };

            match popped {
                Ok(mut reply) => {
                    if reply.len() != 2 {
                        tracing::warn!(queue=%self.queue, elements=reply.len(), reply=?reply, "unable to convert queue reply");
                        continue;
                    }
                    let Some(payload) = reply.pop() else { continue };
                    self.handle(&payload);
                }
                Err(e) if e.is_connection_fatal() => {
                    tracing::warn!(queue=%self.queue, kind=e.kind().as_str(), error=%e, "queue connection broken");
                    return Session::Lost;
                }
                Err(e) => {
                    let wait = self.retry.retry_wait();
                    tracing::warn!(
                        queue=%self.queue,
                        kind=e.kind().as_str(),
                        error=%e,
                        wait_ms=wait.as_millis() as u64,
                        "failed to pop from queue, retrying"
                    );
                    if backoff(wait, &mut self.shutdown).await {
                        return Session::Shutdown;
                    }
                }
            }
        }
    }

    fn handle(&self, payload: &str) {
        tracing::debug!(queue=%self.queue, payload=%payload, "processing queue entry");
        match process_payload(&self.metrics, payload) {
            Ok(ev) => {
                tracing::debug!(host=%ev.host, event_type=%ev.event_type, timestamp=%ev.timestamp, "queue entry recorded");
            }
            Err(e) => {
                tracing::warn!(kind=e.kind().as_str(), error=%e, payload=%payload, "dropping queue entry");
            }
        }
    }
}
