//! Command-line flags. Every flag can also come from the environment.

use std::path::PathBuf;

use clap::Parser;

use super::schema::{ExporterConfig, LogFormat, LogSink};

#[derive(Debug, Default, Parser)]
#[command(
    name = "logstash-exporter",
    about = "Expose logstash events queued in redis as Prometheus metrics"
)]
pub struct Cli {
    /// Optional YAML config file; flags override its values.
    #[arg(long, env = "LOGSTASH_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// The address to listen on for HTTP requests.
    #[arg(long = "listen-address", env = "LOGSTASH_EXPORTER_LISTEN")]
    pub listen_address: Option<String>,

    /// Address of the redis server.
    #[arg(long = "redis.addr", env = "LOGSTASH_EXPORTER_REDIS_ADDR")]
    pub redis_addr: Option<String>,

    /// Password for the redis server.
    #[arg(long = "redis.password", env = "LOGSTASH_EXPORTER_REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Message queue between logstash and the exporter.
    #[arg(long = "redis-stats-queue", env = "LOGSTASH_EXPORTER_STATS_QUEUE")]
    pub stats_queue: Option<String>,

    /// Message queue between staging logstash and logstash.
    #[arg(long = "redis-staging-queue", env = "LOGSTASH_EXPORTER_STAGING_QUEUE")]
    pub staging_queue: Option<String>,

    /// Enable debug logging.
    #[arg(long, env = "LOGSTASH_EXPORTER_DEBUG")]
    pub debug: bool,

    #[arg(long = "log.format", value_enum)]
    pub log_format: Option<LogFormat>,

    #[arg(long = "log.sink", value_enum)]
    pub log_sink: Option<LogSink>,
}

impl Cli {
    /// Apply explicitly given flags on top of `cfg`.
    pub fn apply(&self, cfg: &mut ExporterConfig) {
        if let Some(v) = &self.listen_address {
            cfg.http.listen = v.clone();
        }
        if let Some(v) = &self.redis_addr {
            cfg.redis.addr = v.clone();
        }
        if let Some(v) = &self.redis_password {
            cfg.redis.password = Some(v.clone());
        }
        if let Some(v) = &self.stats_queue {
            cfg.redis.stats_queue = v.clone();
        }
        if let Some(v) = &self.staging_queue {
            cfg.redis.staging_queue = v.clone();
        }
        if self.debug {
            cfg.log.debug = true;
        }
        if let Some(v) = self.log_format {
            cfg.log.format = v;
        }
        if let Some(v) = self.log_sink {
            cfg.log.sink = v;
        }
    }
}
