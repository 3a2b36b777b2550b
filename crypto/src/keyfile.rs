//! Key files: 64 raw bytes, the Ed25519 seed followed by its public key.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use dave_types::{KeyPair, PrivateKey};

use crate::keys::keypair_from_private;
use crate::CryptoError;

/// Size of a key file on disk.
pub const KEY_FILE_LEN: usize = 64;

/// Read and validate a key file.
pub fn read_key_file(path: impl AsRef<Path>) -> Result<KeyPair, CryptoError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CryptoError::ReadKeyFile {
        path: path.display().to_string(),
        source,
    })?;
    if bytes.len() != KEY_FILE_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_FILE_LEN,
            actual: bytes.len(),
        });
    }
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes[..32]);
    let keypair = keypair_from_private(PrivateKey(seed));
    if keypair.public.0[..] != bytes[32..] {
        return Err(CryptoError::PublicKeyMismatch);
    }
    Ok(keypair)
}

/// Write a key pair to `path`, replacing any existing file.
pub fn write_key_file(path: impl AsRef<Path>, keypair: &KeyPair) -> Result<(), CryptoError> {
    let path = path.as_ref();
    let mut bytes = Vec::with_capacity(KEY_FILE_LEN);
    bytes.extend_from_slice(&keypair.private.0);
    bytes.extend_from_slice(&keypair.public.0);
    write_private(path, &bytes).map_err(|source| CryptoError::WriteKeyFile {
        path: path.display().to_string(),
        source,
    })
}

/// Create or truncate `path` readable by its owner only.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; an existing file keeps its bits.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
