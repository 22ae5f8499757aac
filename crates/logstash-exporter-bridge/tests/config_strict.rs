#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::Write;

use clap::Parser;

use logstash_exporter_bridge::config::{self, Cli, LogFormat, LogSink};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
redis:
  addr: "127.0.0.1:6379"
  stats_queu: "typo" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.http.listen, "0.0.0.0:8080");
    assert_eq!(cfg.redis.addr, "127.0.0.1:6379");
    assert_eq!(cfg.redis.stats_queue, "logstash-prometheus-stats");
    assert_eq!(cfg.redis.staging_queue, "logstash-staging");
    assert_eq!(cfg.redis.password(), None);
    assert_eq!(cfg.retry.retry_delay_ms, 5000);
    assert_eq!(cfg.retry.reconnect_delay_ms, 10000);
    assert_eq!(cfg.sampler.interval_ms, 1000);
    assert_eq!(cfg.log.sink, LogSink::Stdout);
}

#[test]
fn validation_rejects_bad_values() {
    let cases = [
        "version: 2\n",
        "version: 1\nhttp: { listen: \"not-an-addr\" }\n",
        "version: 1\nredis: { addr: \"\" }\n",
        "version: 1\nredis: { stats_queue: \"\" }\n",
        "version: 1\nsampler: { interval_ms: 0 }\n",
        "version: 1\nretry: { retry_delay_ms: 0 }\n",
        "version: 1\nretry: { retry_delay_ms: 5000, reconnect_delay_ms: 1000 }\n",
        "version: 1\nretry: { retry_delay_ms: 100, jitter_ms: 500 }\n",
    ];
    for yaml in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.kind().as_str(), "CONFIG", "{yaml}");
    }
}

#[test]
fn go_style_listen_address() {
    let cfg = config::load_from_str("version: 1\nhttp: { listen: \":9198\" }\n").unwrap();
    assert_eq!(cfg.http.listen_addr().unwrap().to_string(), "0.0.0.0:9198");
}

#[test]
fn flags_override_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "version: 1\nredis:\n  addr: \"redis:6379\"\n  password: \"from-file\"\nlog:\n  format: json\n"
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "logstash-exporter",
        "--config",
        file.path().to_str().unwrap(),
        "--redis.addr",
        "10.0.0.5:6380",
        "--redis-stats-queue",
        "stats",
        "--debug",
    ])
    .unwrap();
    let cfg = config::resolve(&cli).unwrap();

    assert_eq!(cfg.redis.addr, "10.0.0.5:6380");
    assert_eq!(cfg.redis.password(), Some("from-file"));
    assert_eq!(cfg.redis.stats_queue, "stats");
    assert_eq!(cfg.log.format, LogFormat::Json);
    assert!(cfg.log.debug);
}

#[test]
fn empty_password_means_no_auth() {
    let cli = Cli::try_parse_from(["logstash-exporter", "--redis.password", ""]).unwrap();
    let cfg = config::resolve(&cli).unwrap();
    assert_eq!(cfg.redis.password(), None);
}
