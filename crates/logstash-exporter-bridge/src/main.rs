//! logstash-exporter
//!
//! Pops logstash event notifications from a redis list and exposes per
//! `(host, type)` counters, last-seen timestamps and latency histograms on
//! `/metrics`, together with the depth of the staging queue.

use std::process::ExitCode;

use clap::Parser;

use logstash_exporter_bridge::{config, lifecycle, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = config::Cli::parse();

    let cfg = match config::resolve(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("logstash-exporter: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&cfg.log) {
        eprintln!("logstash-exporter: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        redis=%cfg.redis.addr,
        stats_queue=%cfg.redis.stats_queue,
        staging_queue=%cfg.redis.staging_queue,
        "logstash-exporter starting"
    );

    match lifecycle::run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "logstash-exporter failed");
            ExitCode::FAILURE
        }
    }
}
