use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to read key file {path}: {source}")]
    ReadKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write key file {path}: {source}")]
    WriteKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid key file, expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid key file, public half does not match the seed")]
    PublicKeyMismatch,

    #[error("random source unavailable: {0}")]
    Random(String),
}

impl CryptoError {
    /// Whether the failure came from the filesystem rather than the key bytes.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::ReadKeyFile { .. } | Self::WriteKeyFile { .. })
    }
}
