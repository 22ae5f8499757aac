//! Queue wire formats.
//!
//! The exporter talks to a Redis-compatible broker using RESP2. The parser is
//! panic-free: truncated input reports "need more bytes" and malformed input is
//! reported as `ExporterError`, so a misbehaving broker can only cost us a
//! reconnect.

pub mod resp;
