//! The session secret and the key material derived from it.
//!
//! One [`SessionSecret`] is provisioned per session. Everything the scheduling protocol
//! needs that must be deterministic yet unpredictable to the host is derived from it:
//! per-step RNG seeds, participation proof tokens, and the authentication tags that
//! protect negotiation payloads while they transit the untrusted host.

use aws_lc_rs::{
    hkdf::{Salt, HKDF_SHA256},
    hmac,
    rand::{SecureRandom, SystemRandom},
};
use conclave_messages::{Footprint, Round};
use derivative::Derivative;

/// Domain separation labels for the derivations below.
const SEED_SALT: &[u8] = b"conclave round seed";
const FOOTPRINT_CONTEXT: &[u8] = b"conclave footprint";
const NEGOTIATION_CONTEXT: &[u8] = b"conclave negotiation";

/// Length of an HMAC-SHA256 authentication tag.
const TAG_LEN: usize = 32;

/// Errors returned by functions and methods in this module.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cryptographic operation failed.
    #[error("cryptographic operation failed")]
    CryptoFailure,
    /// A sealed payload failed authentication.
    #[error("payload authentication failed")]
    InvalidTag,
}

impl From<aws_lc_rs::error::Unspecified> for Error {
    fn from(_: aws_lc_rs::error::Unspecified) -> Self {
        Error::CryptoFailure
    }
}

/// Secret keying material shared by all rounds of one session.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct SessionSecret(#[derivative(Debug = "ignore")] [u8; Self::LEN]);

impl SessionSecret {
    /// LEN is the length of a session secret in bytes.
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh session secret.
    pub fn generate() -> Result<Self, Error> {
        let mut bytes = [0u8; Self::LEN];
        SystemRandom::new().fill(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Derive the RNG seed for one negotiation step of one round. The derivation is a
    /// pure function of `(secret, round, step)`, which keeps every scheduling exchange
    /// reproducible from its inputs.
    pub fn round_step_seed(&self, round: &Round, step: u32) -> Result<[u8; 32], Error> {
        let round_bytes = round.as_number().to_be_bytes();
        let step_bytes = step.to_be_bytes();
        let info = [round_bytes.as_slice(), step_bytes.as_slice()];

        let prk = Salt::new(HKDF_SHA256, SEED_SALT).extract(&self.0);
        let okm = prk.expand(&info, HKDF_SHA256)?;
        let mut seed = [0u8; 32];
        okm.fill(&mut seed)?;
        Ok(seed)
    }

    /// Mint the participation proof token for a slot in a round.
    pub fn footprint(&self, round: &Round, slot: usize) -> Footprint {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.0);
        let mut content = Vec::with_capacity(FOOTPRINT_CONTEXT.len() + 4 + 8);
        content.extend_from_slice(FOOTPRINT_CONTEXT);
        content.extend_from_slice(&round.as_number().to_be_bytes());
        content.extend_from_slice(&(slot as u64).to_be_bytes());
        let tag = hmac::sign(&key, &content);
        // Unwrap safety: an HMAC-SHA256 tag is always exactly Footprint::LEN bytes.
        Footprint::try_from(tag.as_ref()).unwrap()
    }

    /// Seal a negotiation payload for transit through the untrusted host: appends an
    /// authentication tag binding the payload to this session.
    pub fn seal_negotiation(&self, payload: &[u8]) -> Vec<u8> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.0);
        let mut content = Vec::with_capacity(NEGOTIATION_CONTEXT.len() + payload.len());
        content.extend_from_slice(NEGOTIATION_CONTEXT);
        content.extend_from_slice(payload);
        let tag = hmac::sign(&key, &content);

        let mut sealed = Vec::with_capacity(payload.len() + TAG_LEN);
        sealed.extend_from_slice(payload);
        sealed.extend_from_slice(tag.as_ref());
        sealed
    }

    /// Authenticate a sealed negotiation payload and strip its tag. Fails if the tag is
    /// missing, truncated, or does not verify.
    pub fn open_negotiation<'a>(&self, sealed: &'a [u8]) -> Result<&'a [u8], Error> {
        let payload_len = sealed.len().checked_sub(TAG_LEN).ok_or(Error::InvalidTag)?;
        let (payload, tag) = sealed.split_at(payload_len);

        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.0);
        let mut content = Vec::with_capacity(NEGOTIATION_CONTEXT.len() + payload.len());
        content.extend_from_slice(NEGOTIATION_CONTEXT);
        content.extend_from_slice(payload);
        hmac::verify(&key, &content, tag).map_err(|_| Error::InvalidTag)?;

        Ok(payload)
    }
}
