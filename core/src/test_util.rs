//! Testing functionality that is only compiled when the `test-util` feature is enabled.

use crate::{secrets::SessionSecret, signing::SigningKeyPair};
use conclave_messages::ClientId;
use rand::random;

/// Generate an ephemeral signing keypair for tests.
pub fn ephemeral_signing_key_pair() -> SigningKeyPair {
    SigningKeyPair::generate().unwrap().0
}

/// A fixed session secret, so test assertions on derived values are stable.
pub fn fixed_session_secret() -> SessionSecret {
    SessionSecret::new([0x2a; SessionSecret::LEN])
}

/// Sample `count` random client IDs.
pub fn random_client_ids(count: usize) -> Vec<ClientId> {
    (0..count).map(|_| random()).collect()
}
