//! Ed25519 signing and verification.
//!
//! Records are signed over their `work` digest, not the raw payload, so a
//! solved proof cannot be replayed under another identity.

use dave_types::{PrivateKey, PublicKey, Record, Signature, Work};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Sign a work digest.
pub fn sign_work(work: &Work, private_key: &PrivateKey) -> Signature {
    sign_message(work.as_bytes(), private_key)
}

/// Check that a record's signature covers its work under its public key.
pub fn verify_record_signature(record: &Record) -> bool {
    verify_signature(record.work.as_bytes(), &record.signature, &record.public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};
    use dave_types::{Salt, Timestamp};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair().unwrap();
        let sig = sign_message(b"test message", &kp.private);
        assert!(verify_signature(b"test message", &sig, &kp.public));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = generate_keypair().unwrap();
        let sig = sign_message(b"correct message", &kp.private);
        assert!(!verify_signature(b"wrong message", &sig, &kp.public));
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        let sig = sign_message(b"test", &kp1.private);
        assert!(!verify_signature(b"test", &sig, &kp2.public));
    }

    #[test]
    fn invalid_public_key() {
        let kp = generate_keypair().unwrap();
        let sig = sign_message(b"test", &kp.private);
        assert!(!verify_signature(b"test", &sig, &PublicKey([0xFF; 32])));
    }

    #[test]
    fn record_signature_binds_work() {
        let kp = keypair_from_seed(&[9u8; 32]);
        let work = Work::new([3u8; 32]);
        let mut record = Record {
            key: "k".into(),
            value: b"v".to_vec(),
            time: Timestamp::from_millis(1),
            salt: Salt::default(),
            work,
            public_key: kp.public.clone(),
            signature: sign_work(&work, &kp.private),
        };
        assert!(verify_record_signature(&record));

        record.work = Work::new([4u8; 32]);
        assert!(!verify_record_signature(&record));
    }
}
