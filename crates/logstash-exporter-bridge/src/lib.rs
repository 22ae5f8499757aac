//! Logstash exporter bridge library entry.
//!
//! This crate wires the queue client, ingestion loop, staging sampler,
//! metrics registry and HTTP exposition into one process. It is intended to be
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod ingest;
pub mod lifecycle;
pub mod logging;
pub mod obs;
pub mod ops;
pub mod queue;
pub mod retry;
pub mod router;
pub mod sampler;
