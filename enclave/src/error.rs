use conclave_messages::{ClientId, Round};
use prio::codec::CodecError;

/// Errors returned by functions and methods in this crate. Every failure is surfaced to
/// the caller as one of these typed outcomes, always tied to the unmodified prior state;
/// there is no partial success.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid configuration was passed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    /// Error decoding an incoming message.
    #[error("message decoding failed: {0}")]
    MessageDecode(#[from] CodecError),
    /// Error handling a message.
    #[error("invalid message: {0}")]
    Message(#[from] conclave_messages::Error),
    /// A scheduling state was submitted that does not belong to the active round, or
    /// that this machine never issued.
    #[error("round {0}: unexpected scheduling state")]
    StateMismatch(Round),
    /// A scheduling state whose reservation map does not cover the session's population.
    #[error("population mismatch: got {got} slots, expected {expected}")]
    PopulationMismatch { got: usize, expected: usize },
    /// A footprint that was never minted for its round, or a footprint list that does
    /// not cover the reserved slots exactly.
    #[error("round {0}: invalid footprint")]
    InvalidFootprint(Round),
    /// The selection policy cannot satisfy its constraints for this round.
    #[error("round {0}: selection policy exhausted: {1}")]
    PolicyExhausted(Round, &'static str),
    /// A previously returned scheduling state was resubmitted.
    #[error("round {0}: stale scheduling state replayed")]
    Replay(Round),
    /// A `schedule` call was made for a round whose client set is already fixed.
    #[error("round {0}: scheduling round is closed")]
    RoundClosed(Round),
    /// An `aggregate` call named a round with no active aggregation.
    #[error("round {0}: aggregation round mismatch")]
    RoundMismatch(Round),
    /// The client has already contributed to this round's aggregate.
    #[error("round {round}: duplicate contribution from client {user_id}")]
    DuplicateContribution { round: Round, user_id: ClientId },
    /// The contribution did not decode under the configured contribution format.
    #[error("round {0}: corrupt contribution: {1}")]
    CorruptMessage(Round, &'static str),
    /// An aggregate's signature did not verify against its contents.
    #[error("round {0}: aggregation signature verification failed")]
    InvalidSignature(Round),
    /// The state guarding a round is held by another in-flight call. The identical call
    /// may be retried.
    #[error("{0} is locked by another caller")]
    Contended(&'static str),
    /// A signing operation failed.
    #[error("signing error: {0}")]
    Signing(#[from] conclave_core::signing::Error),
    /// A key-derivation operation failed.
    #[error("key derivation error: {0}")]
    Secrets(#[from] conclave_core::secrets::Error),
    /// An error representing a generic internal error; intended for "impossible"
    /// conditions.
    #[error("internal enclave error: {0}")]
    Internal(String),
}

impl Error {
    /// Provides a human-readable error code identifying the error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "invalid_configuration",
            Error::MessageDecode(_) => "message_decode",
            Error::Message(_) => "message",
            Error::StateMismatch(_) => "state_mismatch",
            Error::PopulationMismatch { .. } => "population_mismatch",
            Error::InvalidFootprint(_) => "invalid_footprint",
            Error::PolicyExhausted(_, _) => "policy_exhausted",
            Error::Replay(_) => "replay",
            Error::RoundClosed(_) => "round_closed",
            Error::RoundMismatch(_) => "round_mismatch",
            Error::DuplicateContribution { .. } => "duplicate_contribution",
            Error::CorruptMessage(_, _) => "corrupt_message",
            Error::InvalidSignature(_) => "invalid_signature",
            Error::Contended(_) => "contended",
            Error::Signing(_) => "signing",
            Error::Secrets(_) => "secrets",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether the caller may retry the identical call and expect it to eventually
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Contended(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use conclave_messages::Round;

    #[test]
    fn only_contention_is_retryable() {
        assert!(Error::Contended("scheduler").is_retryable());
        assert!(!Error::Replay(Round::from_number(0)).is_retryable());
        assert!(!Error::RoundClosed(Round::from_number(0)).is_retryable());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            Error::StateMismatch(Round::from_number(1)).error_code(),
            "state_mismatch"
        );
        assert_eq!(
            Error::PolicyExhausted(Round::from_number(1), "reason").error_code(),
            "policy_exhausted"
        );
        assert_eq!(Error::Contended("scheduler").error_code(), "contended");
    }
}
