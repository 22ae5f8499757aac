//! The decoder and reply parser must never panic, whatever the input.

#![allow(clippy::unwrap_used)]

use bytes::BytesMut;
use chrono::Utc;
use proptest::prelude::*;

use logstash_exporter_core::event::{decode_event, NOT_AVAILABLE};
use logstash_exporter_core::protocol::resp::decode_reply;

proptest! {
    #[test]
    fn decode_event_never_panics(s in ".{0,256}") {
        let _ = decode_event(&s, Utc::now());
    }

    #[test]
    fn missing_labels_default(ty in "[a-z]{1,12}") {
        let payload = format!(r#"{{"type":"{ty}"}}"#);
        let ev = decode_event(&payload, Utc::now()).unwrap();
        prop_assert_eq!(ev.host.as_str(), NOT_AVAILABLE);
        prop_assert_eq!(ev.event_type, ty);
    }

    #[test]
    fn decode_reply_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut buf = BytesMut::from(&raw[..]);
        let _ = decode_reply(&mut buf);
    }

    #[test]
    fn decode_reply_handles_resp_like_noise(s in "[*$:+\\-]{1}[0-9\\-]{0,4}\r\n[a-z0-9\r\n$*:]{0,32}") {
        let mut buf = BytesMut::from(s.as_bytes());
        let _ = decode_reply(&mut buf);
    }
}
