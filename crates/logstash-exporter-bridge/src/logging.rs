//! Log sink selection.
//!
//! `RUST_LOG` wins when set; otherwise `info`, or `debug` with the debug flag.
//! The syslog sink sends one datagram per event to the local syslog socket,
//! prefixed with an RFC 3164 `<PRI>` (facility `daemon`). It exists on unix
//! only; elsewhere selecting it is a startup error.

#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::os::unix::net::UnixDatagram;
#[cfg(unix)]
use std::sync::Arc;

#[cfg(unix)]
use tracing::{Level, Metadata};
#[cfg(unix)]
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use logstash_exporter_core::error::{ExporterError, Result};

use crate::config::{LogFormat, LogSection, LogSink};

#[cfg(unix)]
const FACILITY_DAEMON: u8 = 3;
#[cfg(unix)]
const SYSLOG_TAG: &str = "logstash-exporter";

pub fn init(cfg: &LogSection) -> Result<()> {
    let default_level = if cfg.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = match (cfg.sink, cfg.format) {
        (LogSink::Stdout, LogFormat::Text) => fmt().with_env_filter(filter).try_init(),
        (LogSink::Stdout, LogFormat::Json) => fmt().json().with_env_filter(filter).try_init(),
        #[cfg(unix)]
        (LogSink::Syslog, format) => {
            let writer = SyslogMakeWriter::connect(&cfg.syslog_path)?;
            let builder = fmt().with_env_filter(filter).with_ansi(false).without_time().with_writer(writer);
            match format {
                LogFormat::Text => builder.try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
        #[cfg(not(unix))]
        (LogSink::Syslog, _) => {
            return Err(ExporterError::Config("syslog sink is only available on unix".into()));
        }
    };

    installed.map_err(|e| ExporterError::Internal(format!("logging init failed: {e}")))
}

#[cfg(unix)]
fn severity(level: &Level) -> u8 {
    if *level == Level::ERROR {
        3
    } else if *level == Level::WARN {
        4
    } else if *level == Level::INFO {
        6
    } else {
        7
    }
}

#[cfg(unix)]
#[derive(Clone)]
pub struct SyslogMakeWriter {
    socket: Arc<UnixDatagram>,
    pid: u32,
}

#[cfg(unix)]
impl SyslogMakeWriter {
    pub fn connect(path: &str) -> Result<Self> {
        let socket = UnixDatagram::unbound()
            .and_then(|s| s.connect(path).map(|_| s))
            .map_err(|e| ExporterError::Config(format!("cannot open syslog socket {path}: {e}")))?;
        Ok(Self {
            socket: Arc::new(socket),
            pid: std::process::id(),
        })
    }

    pub fn line_writer(&self, level: &Level) -> SyslogLine {
        SyslogLine {
            socket: Arc::clone(&self.socket),
            header: format!("<{}>{}[{}]: ", FACILITY_DAEMON * 8 + severity(level), SYSLOG_TAG, self.pid),
            buf: Vec::new(),
        }
    }
}

#[cfg(unix)]
impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogLine;

    fn make_writer(&'a self) -> Self::Writer {
        self.line_writer(&Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.line_writer(meta.level())
    }
}

/// Buffers one formatted event and sends it as a single datagram on drop.
#[cfg(unix)]
pub struct SyslogLine {
    socket: Arc<UnixDatagram>,
    header: String,
    buf: Vec<u8>,
}

#[cfg(unix)]
impl io::Write for SyslogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for SyslogLine {
    fn drop(&mut self) {
        let body = String::from_utf8_lossy(&self.buf);
        let body = body.trim_end_matches('\n');
        if body.is_empty() {
            return;
        }
        let mut msg = self.header.clone().into_bytes();
        msg.extend_from_slice(body.as_bytes());
        // the sink has nowhere to report its own failures
        let _ = self.socket.send(&msg);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn syslog_lines_carry_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.sock");
        let receiver = UnixDatagram::bind(&path).unwrap();

        let sink = SyslogMakeWriter::connect(path.to_str().unwrap()).unwrap();
        {
            let mut line = sink.line_writer(&Level::WARN);
            line.write_all(b"queue connection broken\n").unwrap();
        }

        let mut buf = [0u8; 256];
        let n = receiver.recv(&mut buf).unwrap();
        let got = std::str::from_utf8(&buf[..n]).unwrap();
        let expected = format!("<28>logstash-exporter[{}]: queue connection broken", std::process::id());
        assert_eq!(got, expected);
    }

    #[test]
    fn missing_socket_is_a_startup_error() {
        let err = SyslogMakeWriter::connect("/nonexistent/dir/log.sock").err().unwrap();
        assert_eq!(err.kind().as_str(), "CONFIG");
    }

    #[test]
    fn syslog_sink_fails_before_installing() {
        let cfg = LogSection {
            sink: LogSink::Syslog,
            syslog_path: "/nonexistent/dir/log.sock".into(),
            ..LogSection::default()
        };
        let err = init(&cfg).unwrap_err();
        assert_eq!(err.kind().as_str(), "CONFIG");
    }
}
