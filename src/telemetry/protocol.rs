//! Stream message decoding.
//!
//! Two wire forms are accepted:
//!
//! ```text
//! tagged:   {"kind":"snapshot","records":[{..},{..}]}
//!           {"kind":"delta","record":{..}}
//! untagged: [{..},{..}]   → snapshot
//!           {..}          → delta
//! ```
//!
//! Every record is range-checked and snapshots must not repeat an id, so the
//! registry only ever sees well-formed input.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::telemetry::record::{ReplicaId, ReplicaRecord};

/// A decoded stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Authoritative replacement of the whole replica set, in server order.
    Snapshot(Vec<ReplicaRecord>),
    /// Current state of a single replica.
    Delta(ReplicaRecord),
}

impl Message {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Snapshot(_) => "snapshot",
            Message::Delta(_) => "delta",
        }
    }

    /// Encode in the tagged wire form.
    pub fn to_json(&self) -> String {
        let tagged = match self {
            Message::Snapshot(records) => TaggedRef::Snapshot { records },
            Message::Delta(record) => TaggedRef::Delta { record },
        };
        // Records hold only strings, numbers, bools and timestamps.
        serde_json::to_string(&tagged).unwrap_or_default()
    }
}

/// Errors produced while decoding a stream payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not JSON or does not have the record shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A numeric field is outside its valid range.
    #[error("replica {id}: {field} out of range ({value})")]
    InvalidField {
        id: ReplicaId,
        field: &'static str,
        value: f64,
    },

    /// A snapshot lists the same replica twice.
    #[error("snapshot repeats replica id {0}")]
    DuplicateId(ReplicaId),

    /// Payload is JSON but neither an array nor an object.
    #[error("unexpected payload type: {0}")]
    UnexpectedType(&'static str),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Tagged {
    Snapshot { records: Vec<ReplicaRecord> },
    Delta { record: ReplicaRecord },
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TaggedRef<'a> {
    Snapshot { records: &'a [ReplicaRecord] },
    Delta { record: &'a ReplicaRecord },
}

/// Decode and validate one stream payload.
pub fn decode(text: &str) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let tagged = value.get("kind").is_some();

    let message = match value {
        Value::Array(_) => Message::Snapshot(serde_json::from_value(value)?),
        Value::Object(_) if tagged => match serde_json::from_value::<Tagged>(value)? {
            Tagged::Snapshot { records } => Message::Snapshot(records),
            Tagged::Delta { record } => Message::Delta(record),
        },
        Value::Object(_) => Message::Delta(serde_json::from_value(value)?),
        Value::Null => return Err(DecodeError::UnexpectedType("null")),
        Value::Bool(_) => return Err(DecodeError::UnexpectedType("bool")),
        Value::Number(_) => return Err(DecodeError::UnexpectedType("number")),
        Value::String(_) => return Err(DecodeError::UnexpectedType("string")),
    };

    validate(&message)?;
    Ok(message)
}

fn validate(message: &Message) -> Result<(), DecodeError> {
    match message {
        Message::Delta(record) => record.validate(),
        Message::Snapshot(records) => {
            let mut seen = HashSet::with_capacity(records.len());
            for record in records {
                record.validate()?;
                if !seen.insert(record.id) {
                    return Err(DecodeError::DuplicateId(record.id));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REC_1: &str = r#"{"id":1,"url":"http://localhost:9001","ema_ms":12.0,"error_rate":0.0,"alive":true,"last_checked":"2024-05-01T12:00:00Z"}"#;
    const REC_2: &str = r#"{"id":2,"url":"http://localhost:9002","ema_ms":80.5,"error_rate":0.1,"alive":false,"last_checked":"2024-05-01T12:00:00Z"}"#;

    #[test]
    fn test_untagged_array_is_snapshot() {
        let msg = decode(&format!("[{},{}]", REC_1, REC_2)).unwrap();
        match msg {
            Message::Snapshot(records) => {
                assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_untagged_object_is_delta() {
        let msg = decode(REC_2).unwrap();
        assert_eq!(msg.kind(), "delta");
    }

    #[test]
    fn test_empty_array_is_empty_snapshot() {
        assert_eq!(decode("[]").unwrap(), Message::Snapshot(Vec::new()));
    }

    #[test]
    fn test_tagged_forms() {
        let snap = decode(&format!(r#"{{"kind":"snapshot","records":[{}]}}"#, REC_1)).unwrap();
        assert_eq!(snap.kind(), "snapshot");

        let delta = decode(&format!(r#"{{"kind":"delta","record":{}}}"#, REC_1)).unwrap();
        match delta {
            Message::Delta(record) => assert_eq!(record.id, 1),
            other => panic!("expected delta, got {:?}", other),
        }
    }

    #[test]
    fn test_tagged_encoding_decodes_back() {
        let original = decode(&format!("[{},{}]", REC_1, REC_2)).unwrap();
        assert_eq!(decode(&original.to_json()).unwrap(), original);
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(decode("{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode("42"), Err(DecodeError::UnexpectedType("number"))));
        assert!(matches!(decode(r#"{"kind":"resync"}"#), Err(DecodeError::Json(_))));
        assert!(matches!(decode(r#"{"id":1}"#), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let bad = REC_1.replace(r#""error_rate":0.0"#, r#""error_rate":1.5"#);
        assert!(matches!(
            decode(&bad),
            Err(DecodeError::InvalidField { id: 1, field: "error_rate", .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = decode(&format!("[{},{}]", REC_1, REC_1)).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateId(1)));
    }
}
