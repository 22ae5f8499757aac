//! RESP2 command encoding and reply parsing (panic-free).
//!
//! Parsing rules:
//! - Never index (`buf[0]`) — always use `get()` and length checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.
//! - Partial frames return `Ok(None)` and consume nothing.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ExporterError, Result};

/// Upper bound for a bulk string, mirrors the broker's own `proto-max-bulk-len`.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Longest header/simple line accepted before giving up on finding CRLF.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Nested array limit.
const MAX_DEPTH: usize = 16;

/// One decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    /// `None` is the null bulk string (`$-1`).
    Bulk(Option<Bytes>),
    /// `None` is the null array (`*-1`).
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Interpret an array reply as a list of strings (e.g. `BLPOP`).
    /// Returns `None` for the null array.
    pub fn into_strings(self) -> Result<Option<Vec<String>>> {
        match self {
            RespValue::Array(None) => Ok(None),
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(Some(b)) => Ok(String::from_utf8_lossy(&b).into_owned()),
                    RespValue::Simple(s) => Ok(s),
                    other => Err(ExporterError::reply(format!("expected string element, got {}", other.type_name()))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            RespValue::Error(e) => Err(ExporterError::reply(e)),
            other => Err(ExporterError::reply(format!("expected array reply, got {}", other.type_name()))),
        }
    }

    /// Interpret an integer reply (e.g. `LLEN`).
    pub fn into_integer(self) -> Result<i64> {
        match self {
            RespValue::Integer(n) => Ok(n),
            RespValue::Error(e) => Err(ExporterError::reply(e)),
            other => Err(ExporterError::reply(format!("expected integer reply, got {}", other.type_name()))),
        }
    }

    /// Short name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            RespValue::Simple(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::Bulk(Some(_)) => "bulk string",
            RespValue::Bulk(None) => "null bulk string",
            RespValue::Array(Some(_)) => "array",
            RespValue::Array(None) => "null array",
        }
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Bytes {
    let mut out = BytesMut::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.put_u8(b'*');
    out.put_slice(args.len().to_string().as_bytes());
    out.put_slice(b"\r\n");
    for arg in args {
        out.put_u8(b'$');
        out.put_slice(arg.len().to_string().as_bytes());
        out.put_slice(b"\r\n");
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
    out.freeze()
}

/// Decode one reply from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` holds only part of a reply; in that case
/// nothing is consumed. On success the reply's bytes are removed from `buf`.
pub fn decode_reply(buf: &mut BytesMut) -> Result<Option<RespValue>> {
    match parse_value(buf, 0, 0)? {
        Some((value, consumed)) => {
            buf.advance(consumed);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse_value(src: &[u8], pos: usize, depth: usize) -> Result<Option<(RespValue, usize)>> {
    if depth > MAX_DEPTH {
        return Err(ExporterError::framing("reply nested too deeply"));
    }
    let Some(&tag) = src.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_line(src, pos + 1)? else {
        return Ok(None);
    };

    match tag {
        b'+' => Ok(Some((RespValue::Simple(utf8(line)?), next))),
        b'-' => Ok(Some((RespValue::Error(utf8(line)?), next))),
        b':' => Ok(Some((RespValue::Integer(parse_int(line)?), next))),
        b'$' => {
            let len = parse_int(line)?;
            if len == -1 {
                return Ok(Some((RespValue::Bulk(None), next)));
            }
            if !(0..=MAX_BULK_LEN).contains(&len) {
                return Err(ExporterError::framing(format!("invalid bulk length {len}")));
            }
            let end = next + len as usize;
            let Some(body) = src.get(next..end) else {
                return Ok(None);
            };
            match src.get(end..end + 2) {
                None => Ok(None),
                Some(b"\r\n") => Ok(Some((RespValue::Bulk(Some(Bytes::copy_from_slice(body))), end + 2))),
                Some(_) => Err(ExporterError::framing("bulk string not terminated by CRLF")),
            }
        }
        b'*' => {
            let len = parse_int(line)?;
            if len == -1 {
                return Ok(Some((RespValue::Array(None), next)));
            }
            if len < 0 {
                return Err(ExporterError::framing(format!("invalid array length {len}")));
            }
            let mut items = Vec::with_capacity((len as usize).min(64));
            let mut cursor = next;
            for _ in 0..len {
                match parse_value(src, cursor, depth + 1)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(Some(items)), cursor)))
        }
        other => Err(ExporterError::framing(format!("unexpected reply type byte 0x{other:02x}"))),
    }
}

/// Returns the line starting at `pos` (without CRLF) and the offset after it.
fn read_line(src: &[u8], pos: usize) -> Result<Option<(&[u8], usize)>> {
    let Some(rest) = src.get(pos..) else {
        return Ok(None);
    };
    match rest.windows(2).position(|w| w == b"\r\n") {
        Some(idx) => Ok(rest.get(..idx).map(|line| (line, pos + idx + 2))),
        None if rest.len() > MAX_LINE_LEN => Err(ExporterError::framing("reply line too long")),
        None => Ok(None),
    }
}

fn utf8(line: &[u8]) -> Result<String> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ExporterError::framing("reply line is not utf-8"))
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ExporterError::framing("invalid integer in reply"))
}
