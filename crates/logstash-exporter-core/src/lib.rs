//! Logstash exporter core: event decoding, queue wire codec, and the shared
//! error type.
//!
//! This crate carries no runtime or transport dependencies. The bridge crate
//! owns sockets, timers and metric state; everything here is pure
//! transformation of bytes and text into typed values.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! A malformed queue payload or a garbled reply from the broker must surface as
//! `ExporterError`, never bring the exporter down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod event;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, ExporterError, Result};
pub use event::{decode_event, Event, NOT_AVAILABLE};
