//! Ed25519 key generation.

use dave_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;

use crate::CryptoError;

/// Generate a new Ed25519 key pair from the operating system's random source.
pub fn generate_keypair() -> Result<KeyPair, CryptoError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| CryptoError::Random(e.to_string()))?;
    Ok(keypair_from_seed(&seed))
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing_key = SigningKey::from_bytes(&private.0);
    PublicKey(signing_key.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keypairs() {
        let a = generate_keypair().unwrap();
        let b = generate_keypair().unwrap();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn public_from_private_is_deterministic() {
        let kp = generate_keypair().unwrap();
        assert_eq!(kp.public, public_from_private(&kp.private));
    }

    #[test]
    fn keypair_from_seed_deterministic() {
        let kp1 = keypair_from_seed(&[42u8; 32]);
        let kp2 = keypair_from_seed(&[42u8; 32]);
        assert_eq!(kp1.public, kp2.public);
        assert_eq!(kp1.private.0, kp2.private.0);
    }

    #[test]
    fn keypair_from_private_roundtrip() {
        let kp1 = keypair_from_seed(&[7u8; 32]);
        let kp2 = keypair_from_private(PrivateKey(kp1.private.0));
        assert_eq!(kp1.public, kp2.public);
    }
}
