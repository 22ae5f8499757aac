use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use logstash_exporter_core::error::{ExporterError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub redis: RedisSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub sampler: SamplerSection,

    #[serde(default)]
    pub log: LogSection,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            http: HttpSection::default(),
            redis: RedisSection::default(),
            retry: RetrySection::default(),
            sampler: SamplerSection::default(),
            log: LogSection::default(),
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ExporterError::Config(format!("unsupported config version {}", self.version)));
        }

        self.http.validate()?;
        self.redis.validate()?;
        self.retry.validate()?;
        self.sampler.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl HttpSection {
    /// Listen address. A bare `:port` binds every interface.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let raw = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };
        raw.parse()
            .map_err(|e| ExporterError::Config(format!("http.listen `{}` is not a socket address: {e}", self.listen)))
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSection {
    #[serde(default = "default_redis_addr")]
    pub addr: String,

    /// Empty means no `AUTH` handshake.
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_stats_queue")]
    pub stats_queue: String,

    #[serde(default = "default_staging_queue")]
    pub staging_queue: String,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            addr: default_redis_addr(),
            password: None,
            stats_queue: default_stats_queue(),
            staging_queue: default_staging_queue(),
        }
    }
}

impl RedisSection {
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() || !self.addr.contains(':') {
            return Err(ExporterError::Config(format!(
                "redis.addr `{}` must be host:port",
                self.addr
            )));
        }
        if self.stats_queue.is_empty() {
            return Err(ExporterError::Config("redis.stats_queue must not be empty".into()));
        }
        if self.staging_queue.is_empty() {
            return Err(ExporterError::Config("redis.staging_queue must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Wait before retrying a failed pop on the same connection.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Wait before rebuilding a broken connection.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default)]
    pub jitter_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            jitter_ms: 0,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RetrySection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_delay_ms == 0 || self.reconnect_delay_ms == 0 {
            return Err(ExporterError::Config("retry delays must be greater than zero".into()));
        }
        if self.reconnect_delay_ms < self.retry_delay_ms {
            return Err(ExporterError::Config(
                "retry.reconnect_delay_ms must not be shorter than retry_delay_ms".into(),
            ));
        }
        if self.jitter_ms > self.retry_delay_ms {
            return Err(ExporterError::Config(
                "retry.jitter_ms must not exceed retry_delay_ms".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ExporterError::Config("retry.connect_timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerSection {
    #[serde(default = "default_sample_interval_ms")]
    pub interval_ms: u64,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self { interval_ms: default_sample_interval_ms() }
    }
}

impl SamplerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(ExporterError::Config("sampler.interval_ms must be greater than zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogSink {
    Stdout,
    Syslog,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_sink")]
    pub sink: LogSink,

    #[serde(default = "default_syslog_path")]
    pub syslog_path: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            debug: false,
            format: default_log_format(),
            sink: default_log_sink(),
            syslog_path: default_syslog_path(),
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_redis_addr() -> String {
    "127.0.0.1:6379".into()
}
fn default_stats_queue() -> String {
    "logstash-prometheus-stats".into()
}
fn default_staging_queue() -> String {
    "logstash-staging".into()
}
fn default_retry_delay_ms() -> u64 {
    5000
}
fn default_reconnect_delay_ms() -> u64 {
    10000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_sample_interval_ms() -> u64 {
    1000
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}
fn default_log_sink() -> LogSink {
    LogSink::Stdout
}
fn default_syslog_path() -> String {
    "/dev/log".into()
}
