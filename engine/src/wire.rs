//! JSON bodies exchanged with the HTTP gateway.
//!
//! `val` is plain text, so a value hashed by `/work` is sent to `/put`
//! unchanged. The other binary fields are URL-safe base64 without padding.
//! Times are Unix milliseconds.

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use dave_types::{PublicKey, Record, Salt, Signature, Timestamp, Work};

use crate::EngineError;

pub fn encode_b64(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode_b64(field: &'static str, text: &str) -> Result<Vec<u8>, EngineError> {
    BASE64_URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| EngineError::Decode {
            field,
            reason: e.to_string(),
        })
}

/// `POST /work` request. `val` is the value as plain text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkRequest {
    pub key: String,
    pub val: String,
    pub time: u64,
    pub difficulty: u8,
}

/// `POST /work` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkResponse {
    pub salt: String,
    pub work: String,
}

/// A record as it travels over HTTP (`POST /put` body, `/list` results).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    pub key: String,
    /// Plain text, exactly the bytes the work was computed over.
    pub val: String,
    pub time: u64,
    pub salt: String,
    pub work: String,
    pub pub_key: String,
    pub sig: String,
}

impl TryFrom<&Record> for RecordEntry {
    type Error = EngineError;

    /// Fails for values that are not UTF-8 text.
    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let val = String::from_utf8(record.value.clone()).map_err(|_| EngineError::NonTextValue {
            key: record.key.clone(),
        })?;
        Ok(Self {
            key: record.key.clone(),
            val,
            time: record.time.as_millis(),
            salt: encode_b64(record.salt.as_bytes()),
            work: encode_b64(record.work.as_bytes()),
            pub_key: encode_b64(record.public_key.as_bytes()),
            sig: encode_b64(record.signature.as_bytes()),
        })
    }
}

impl TryFrom<RecordEntry> for Record {
    type Error = EngineError;

    fn try_from(entry: RecordEntry) -> Result<Self, Self::Error> {
        let length = |field: &'static str| {
            move |e: dave_types::TypesError| EngineError::Decode {
                field,
                reason: e.to_string(),
            }
        };
        Ok(Record {
            key: entry.key,
            value: entry.val.into_bytes(),
            time: Timestamp::from_millis(entry.time),
            salt: Salt::from_slice(&decode_b64("salt", &entry.salt)?).map_err(length("salt"))?,
            work: Work::from_slice(&decode_b64("work", &entry.work)?).map_err(length("work"))?,
            public_key: PublicKey::from_slice(&decode_b64("pubKey", &entry.pub_key)?)
                .map_err(length("pubKey"))?,
            signature: Signature::from_slice(&decode_b64("sig", &entry.sig)?)
                .map_err(length("sig"))?,
        })
    }
}

/// `POST /list` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default)]
    pub key_prefix: String,
    pub pub_key: String,
}

/// `POST /list` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub results: Vec<RecordEntry>,
    pub count: usize,
}

/// `GET /status` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub peers: usize,
    pub dats: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            key: "greeting".into(),
            value: b"hello world".to_vec(),
            time: Timestamp::from_millis(1_700_000_000_123),
            salt: Salt::from_counter(77),
            work: Work::new([9u8; 32]),
            public_key: PublicKey([1u8; 32]),
            signature: Signature([2u8; 64]),
        }
    }

    fn entry() -> RecordEntry {
        RecordEntry::try_from(&record()).unwrap()
    }

    #[test]
    fn value_travels_as_plain_text() {
        let entry = entry();
        assert_eq!(entry.val, "hello world");
        assert!(!entry.work.contains('='));
        assert_eq!(entry.salt, encode_b64(Salt::from_counter(77).as_bytes()));
    }

    #[test]
    fn entry_converts_back_to_record() {
        let back = Record::try_from(entry()).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn binary_value_cannot_be_sent() {
        let mut binary = record();
        binary.value = vec![0, 159, 146, 150];
        let err = RecordEntry::try_from(&binary).unwrap_err();
        assert_eq!(err, EngineError::NonTextValue { key: "greeting".into() });
    }

    #[test]
    fn bad_base64_names_the_field() {
        let mut entry = entry();
        entry.sig = "not base64!".into();
        let err = Record::try_from(entry).unwrap_err();
        assert!(matches!(err, EngineError::Decode { field: "sig", .. }));
    }

    #[test]
    fn short_work_rejected() {
        let mut entry = entry();
        entry.work = encode_b64(&[0u8; 16]);
        let err = Record::try_from(entry).unwrap_err();
        assert!(matches!(err, EngineError::Decode { field: "work", .. }));
    }

    #[test]
    fn entry_json_is_camel_case() {
        let json = serde_json::to_value(entry()).unwrap();
        assert!(json.get("pubKey").is_some());
        assert!(json.get("pub_key").is_none());
        assert_eq!(json["val"], "hello world");
    }
}
