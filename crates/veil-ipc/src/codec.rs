// ── Wire codec ──
//
// One discriminated JSON object per message: `{"type": ..., "payload": ...}`
// (the serde tag/content layout on the enums). Malformed frames are
// typed errors, never panics — the receiving side logs and drops them.

use thiserror::Error;

use crate::event::Event;
use crate::request::Request;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode_event(event: &Event) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(event).map_err(|source| CodecError::Encode {
        what: "event",
        source,
    })
}

pub fn decode_event(frame: &[u8]) -> Result<Event, CodecError> {
    serde_json::from_slice(frame).map_err(|source| CodecError::Decode {
        what: "event",
        source,
    })
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(request).map_err(|source| CodecError::Encode {
        what: "request",
        source,
    })
}

pub fn decode_request(frame: &[u8]) -> Result<Request, CodecError> {
    serde_json::from_slice(frame).map_err(|source| CodecError::Decode {
        what: "request",
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use veil_model::LoginStatus;

    #[test]
    fn event_frames_carry_a_type_tag() {
        let frame = encode_event(&Event::ListenerReady).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(json["type"], "ListenerReady");
    }

    #[test]
    fn login_status_round_trips_with_wire_format_expiry() {
        let event = Event::LoginStatus(Some(LoginStatus {
            account: "1234567890123456".into(),
            expiry: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
            is_new: false,
        }));

        let frame = encode_event(&event).unwrap();

        // The expiry must appear as the fixed wire string.
        let json: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(json["payload"]["expiry"], "2030-01-01 00:00:00 UTC");

        assert_eq!(decode_event(&frame).unwrap(), event);
    }

    #[test]
    fn requests_round_trip() {
        let requests = [
            Request::Login("1234".into()),
            Request::SetWireguardMtu(Some(1380)),
            Request::SetWireguardMtu(None),
            Request::ReplaceCustomDnsServer {
                old_server: "10.0.0.1".parse().unwrap(),
                new_server: "10.0.0.2".parse().unwrap(),
            },
        ];

        for request in requests {
            let frame = encode_request(&request).unwrap();
            assert_eq!(decode_request(&frame).unwrap(), request);
        }
    }

    #[test]
    fn malformed_frames_are_errors_not_panics() {
        assert!(decode_event(b"not json").is_err());
        assert!(decode_request(b"{\"type\":\"NoSuchRequest\"}").is_err());
    }

    #[test]
    fn malformed_expiry_in_a_frame_is_a_decode_error() {
        let frame = br#"{"type":"InvalidateAccountExpiry","payload":"2030-01-01 bogus"}"#;
        assert!(decode_request(frame).is_err());
    }
}
