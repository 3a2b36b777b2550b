//! Errors raised when building fixed-size types from untrusted bytes.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
