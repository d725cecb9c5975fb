//! Core cryptographic helpers shared by the components of Conclave: the trust-boundary
//! signing keypair and the session secret from which all protocol-visible randomness and
//! proof tokens are derived.

pub mod secrets;
pub mod signing;
#[cfg(feature = "test-util")]
pub mod test_util;
