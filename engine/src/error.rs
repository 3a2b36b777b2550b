use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("work does not match the record or is below difficulty {required}")]
    InvalidWork { required: u8 },

    #[error("record signature is invalid")]
    InvalidSignature,

    #[error("record time is {skew:?} in the future")]
    FromTheFuture { skew: Duration },

    #[error("record is older than the store ttl of {ttl:?}")]
    Expired { ttl: Duration },

    #[error("a newer record already exists for key {0}")]
    Stale(String),

    #[error("store is full ({capacity} records)")]
    Full { capacity: usize },

    #[error("engine has been shut down")]
    Killed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by gateway ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed {field}: {reason}")]
    Decode { field: &'static str, reason: String },

    #[error("value of {key:?} is not UTF-8 text")]
    NonTextValue { key: String },
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Transport(e.to_string())
    }
}
