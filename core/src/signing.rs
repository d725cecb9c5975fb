//! Signing and verification of trust-boundary artifacts.
//!
//! Ed25519 is used throughout: signatures are deterministic, so signing identical
//! content always yields identical bytes. Downstream components rely on this to keep
//! signed accumulators independent of contribution arrival order.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey},
};
use derivative::Derivative;

/// Errors returned by functions and methods in this module.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provided key material could not be used.
    #[error("rejected signing key: {0}")]
    KeyRejected(String),
    /// A cryptographic operation failed.
    #[error("cryptographic operation failed")]
    CryptoFailure,
    /// A signature did not verify against the given content and public key.
    #[error("signature verification failed")]
    InvalidSignature,
}

impl From<aws_lc_rs::error::Unspecified> for Error {
    fn from(_: aws_lc_rs::error::Unspecified) -> Self {
        Error::CryptoFailure
    }
}

impl From<aws_lc_rs::error::KeyRejected> for Error {
    fn from(err: aws_lc_rs::error::KeyRejected) -> Self {
        Error::KeyRejected(err.to_string())
    }
}

/// The signing keypair held inside the trust boundary.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SigningKeyPair {
    #[derivative(Debug = "ignore")]
    key_pair: Ed25519KeyPair,
}

impl SigningKeyPair {
    /// Generate a fresh keypair. Returns the keypair along with its PKCS#8 document so
    /// that the caller can seal it for later restarts.
    pub fn generate() -> Result<(Self, Vec<u8>), Error> {
        let document = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new())?;
        let key_pair = Ed25519KeyPair::from_pkcs8(document.as_ref())?;
        Ok((Self { key_pair }, Vec::from(document.as_ref())))
    }

    /// Reconstruct a keypair from a PKCS#8 document previously produced by
    /// [`Self::generate`].
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            key_pair: Ed25519KeyPair::from_pkcs8(pkcs8)?,
        })
    }

    /// Sign the given content.
    pub fn sign(&self, content: &[u8]) -> Vec<u8> {
        Vec::from(self.key_pair.sign(content).as_ref())
    }

    /// The raw public verification key.
    pub fn public_key(&self) -> Vec<u8> {
        Vec::from(self.key_pair.public_key().as_ref())
    }
}

/// Verify a signature produced by [`SigningKeyPair::sign`] against a raw public key.
pub fn verify(public_key: &[u8], content: &[u8], sig: &[u8]) -> Result<(), Error> {
    UnparsedPublicKey::new(&signature::ED25519, public_key)
        .verify(content, sig)
        .map_err(|_| Error::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::{verify, Error, SigningKeyPair};
    use assert_matches::assert_matches;

    #[test]
    fn sign_and_verify() {
        let (key_pair, _) = SigningKeyPair::generate().unwrap();
        let sig = key_pair.sign(b"content");
        verify(&key_pair.public_key(), b"content", &sig).unwrap();
    }

    #[test]
    fn signatures_are_deterministic() {
        let (key_pair, _) = SigningKeyPair::generate().unwrap();
        assert_eq!(key_pair.sign(b"content"), key_pair.sign(b"content"));
    }

    #[test]
    fn verify_rejects_tampered_content() {
        let (key_pair, _) = SigningKeyPair::generate().unwrap();
        let sig = key_pair.sign(b"content");
        assert_matches!(
            verify(&key_pair.public_key(), b"other content", &sig),
            Err(Error::InvalidSignature)
        );
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (key_pair, _) = SigningKeyPair::generate().unwrap();
        let (other_key_pair, _) = SigningKeyPair::generate().unwrap();
        let sig = key_pair.sign(b"content");
        assert_matches!(
            verify(&other_key_pair.public_key(), b"content", &sig),
            Err(Error::InvalidSignature)
        );
    }

    #[test]
    fn pkcs8_round_trip() {
        let (key_pair, pkcs8) = SigningKeyPair::generate().unwrap();
        let restored = SigningKeyPair::from_pkcs8(&pkcs8).unwrap();
        assert_eq!(key_pair.public_key(), restored.public_key());
        assert_eq!(key_pair.sign(b"content"), restored.sign(b"content"));
    }

    #[test]
    fn from_pkcs8_rejects_garbage() {
        assert_matches!(
            SigningKeyPair::from_pkcs8(&[0u8; 16]),
            Err(Error::KeyRejected(_))
        );
    }
}
