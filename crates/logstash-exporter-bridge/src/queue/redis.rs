//! Redis-backed queue connection (RESP2 over TCP).
//!
//! `AUTH` is sent once per connection when a password is configured. Commands
//! are strictly request/response; the read buffer only ever holds the tail of
//! the reply being awaited.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use logstash_exporter_core::error::{ExporterError, Result};
use logstash_exporter_core::protocol::resp::{decode_reply, encode_command, RespValue};

use super::{QueueConnection, QueueConnector};
use crate::config::{RedisSection, RetrySection};

pub struct RedisConnection<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> RedisConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Send one command and read its reply.
    pub async fn command(&mut self, args: &[&[u8]]) -> Result<RespValue> {
        self.stream.write_all(&encode_command(args)).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<RespValue> {
        loop {
            if let Some(reply) = decode_reply(&mut self.buf)? {
                return Ok(reply);
            }
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(ExporterError::Connection("connection closed by server".into()));
            }
        }
    }

    /// `AUTH <password>`; anything but `+OK` is an auth failure.
    pub async fn authenticate(&mut self, password: &str) -> Result<()> {
        match self.command(&[b"AUTH", password.as_bytes()]).await? {
            RespValue::Simple(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(ExporterError::Auth(e)),
            other => Err(ExporterError::Auth(format!("unexpected AUTH reply: {}", other.type_name()))),
        }
    }
}

#[async_trait]
impl<S> QueueConnection for RedisConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn blocking_pop(&mut self, queue: &str) -> Result<Vec<String>> {
        let reply = self.command(&[b"BLPOP", queue.as_bytes(), b"0"]).await?;
        Ok(reply.into_strings()?.unwrap_or_default())
    }

    async fn length(&mut self, queue: &str) -> Result<i64> {
        self.command(&[b"LLEN", queue.as_bytes()]).await?.into_integer()
    }
}

pub struct RedisConnector {
    addr: String,
    password: Option<String>,
    connect_timeout: Duration,
}

impl RedisConnector {
    pub fn new(addr: impl Into<String>, password: Option<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            password: password.filter(|p| !p.is_empty()),
            connect_timeout,
        }
    }

    pub fn from_config(redis: &RedisSection, retry: &RetrySection) -> Self {
        Self::new(
            redis.addr.clone(),
            redis.password().map(str::to_owned),
            retry.connect_timeout(),
        )
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn connect_redis(&self) -> Result<RedisConnection<TcpStream>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr.as_str()))
            .await
            .map_err(|_| ExporterError::Connection(format!("connect to {} timed out", self.addr)))?
            .map_err(|e| ExporterError::Connection(format!("connect to {} failed: {e}", self.addr)))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(addr=%self.addr, error=%e, "failed to set TCP_NODELAY");
        }

        let mut conn = RedisConnection::new(stream);
        if let Some(password) = &self.password {
            conn.authenticate(password).await?;
        }
        tracing::debug!(addr=%self.addr, authenticated=self.password.is_some(), "redis connection established");
        Ok(conn)
    }
}

#[async_trait]
impl QueueConnector for RedisConnector {
    async fn connect(&self) -> Result<Box<dyn QueueConnection>> {
        Ok(Box::new(self.connect_redis().await?))
    }
}
