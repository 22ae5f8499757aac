//! RESP reply parser vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::BytesMut;
use serde_json::{json, Value};

use logstash_exporter_core::protocol::resp::{decode_reply, RespValue};

use vector_loader::load;

/// Tagged JSON form of a reply so vectors can tell simple from bulk strings.
fn to_json(v: RespValue) -> Value {
    match v {
        RespValue::Simple(s) => json!({ "+": s }),
        RespValue::Error(s) => json!({ "-": s }),
        RespValue::Integer(n) => json!({ ":": n }),
        RespValue::Bulk(None) => json!({ "$": null }),
        RespValue::Bulk(Some(b)) => json!({ "$": String::from_utf8_lossy(&b) }),
        RespValue::Array(None) => json!({ "*": null }),
        RespValue::Array(Some(items)) => json!({ "*": items.into_iter().map(to_json).collect::<Vec<_>>() }),
    }
}

#[test]
fn resp_vectors() {
    let files = [
        "resp_blpop.json",
        "resp_llen.json",
        "resp_auth_ok.json",
        "resp_error.json",
        "resp_null_array.json",
        "resp_partial_bulk.json",
        "resp_bad_type.json",
        "resp_bad_bulk_len.json",
        "resp_bulk_missing_crlf.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.as_ref().expect("resp vector needs frame").decode();
        let mut buf = BytesMut::from(&raw[..]);
        let res = decode_reply(&mut buf);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.kind().as_str(), err.code, "vector={}", v.description);
            assert!(e.is_connection_fatal(), "vector={}", v.description);
            continue;
        }

        let reply = res.expect("expected ok parse");
        if v.expect_partial {
            assert!(reply.is_none(), "vector={}", v.description);
            assert_eq!(buf.len(), raw.len(), "vector={}", v.description);
            continue;
        }

        let reply = reply.expect("expected complete reply");
        assert_eq!(to_json(reply), v.expect.expect("missing expect block"), "vector={}", v.description);
        assert!(buf.is_empty(), "vector={}", v.description);
    }
}
