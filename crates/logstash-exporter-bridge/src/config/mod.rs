//! Exporter config loader (strict parsing).
//!
//! Layers, later wins: built-in defaults, optional YAML file, command-line
//! flags / environment. The result is validated once and never mutated.

pub mod cli;
pub mod schema;

use std::fs;
use std::path::Path;

use logstash_exporter_core::error::{ExporterError, Result};

pub use cli::Cli;
pub use schema::{ExporterConfig, LogFormat, LogSection, LogSink, RedisSection, RetrySection};

pub fn load_from_file(path: &Path) -> Result<ExporterConfig> {
    let cfg = parse_file(path)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Build the runtime config from parsed flags.
pub fn resolve(cli: &Cli) -> Result<ExporterConfig> {
    let mut cfg = match &cli.config {
        Some(path) => parse_file(path)?,
        None => ExporterConfig::default(),
    };
    cli.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

fn parse_file(path: &Path) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ExporterError::Config(format!("read config {} failed: {e}", path.display())))?;
    parse_str(&s)
}

fn parse_str(s: &str) -> Result<ExporterConfig> {
    serde_yaml::from_str(s).map_err(|e| ExporterError::Config(format!("invalid yaml: {e}")))
}
