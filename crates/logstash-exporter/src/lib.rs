//! Top-level facade crate for the logstash exporter.
//!
//! Re-exports the core primitives and the bridge runtime so users can depend on a single crate.

pub mod core {
    pub use logstash_exporter_core::*;
}

pub mod bridge {
    pub use logstash_exporter_bridge::*;
}
