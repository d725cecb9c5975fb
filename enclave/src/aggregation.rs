//! The signed aggregation engine.
//!
//! One engine serves one round. Each `aggregate` call is a pure function of its inputs:
//! the incoming aggregate is verified, the contribution is folded in through the
//! configured [`Combiner`], and the result is re-signed. Nothing is mutated in place, so
//! a failed call can never leave a partially folded aggregate behind.

use crate::{
    combiner::{CombineError, Combiner},
    error::Error,
};
use conclave_core::signing::{self, SigningKeyPair};
use conclave_messages::{AggregateRequest, Aggregation, ClientId, OpaqueBytes, Round};
use std::sync::Arc;
use tracing::debug;

/// Folds one opaque client contribution at a time into a round's running aggregate,
/// maintaining a signed, order-independent accumulator.
#[derive(Debug)]
pub struct AggregationEngine {
    round: Round,
    combiner: Arc<dyn Combiner>,
    key_pair: Arc<SigningKeyPair>,
}

impl AggregationEngine {
    pub fn new(round: Round, combiner: Arc<dyn Combiner>, key_pair: Arc<SigningKeyPair>) -> Self {
        Self {
            round,
            combiner,
            key_pair,
        }
    }

    /// The round this engine serves.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// The signed, empty accumulator every round starts from.
    pub fn empty_aggregation(&self) -> Result<Aggregation, Error> {
        self.assemble(Vec::new(), OpaqueBytes::new(self.combiner.identity()))
    }

    /// Verify that an aggregation's signature attests to exactly its contents for this
    /// engine's round.
    pub fn verify(&self, aggregation: &Aggregation) -> Result<(), Error> {
        verify_aggregation(&self.key_pair.public_key(), &self.round, aggregation)
    }

    /// Fold a single client contribution into the running aggregate.
    ///
    /// On any failure the caller's `current_agg` is untouched; the returned error is the
    /// complete outcome of the call.
    pub fn aggregate(&self, request: &AggregateRequest) -> Result<Aggregation, Error> {
        let round = *request.round();
        if round != self.round {
            return Err(Error::RoundMismatch(round));
        }

        let current_agg = request.current_agg();
        self.verify(current_agg)?;

        let user_id = *request.user_id();
        if current_agg.contains(&user_id) {
            return Err(Error::DuplicateContribution { round, user_id });
        }

        let aggregated_value = self
            .combiner
            .combine(
                current_agg.aggregated_value().as_bytes(),
                request.user_message().as_bytes(),
            )
            .map_err(|CombineError::Corrupt(reason)| Error::CorruptMessage(round, reason))?;

        let mut user_ids = Vec::from(current_agg.user_ids());
        user_ids.push(user_id);
        let new_agg = self.assemble(user_ids, OpaqueBytes::new(aggregated_value))?;
        debug!(
            round = %round,
            user_id = %user_id,
            contributions = new_agg.user_ids().len(),
            "folded contribution into aggregate"
        );
        Ok(new_agg)
    }

    fn assemble(
        &self,
        user_ids: Vec<ClientId>,
        aggregated_value: OpaqueBytes,
    ) -> Result<Aggregation, Error> {
        let content = Aggregation::signature_input(&self.round, &user_ids, &aggregated_value)?;
        let sig = OpaqueBytes::new(self.key_pair.sign(&content));
        Ok(Aggregation::new(user_ids, aggregated_value, sig)?)
    }
}

/// Verify an aggregation against a raw public key. This is the check consumers of a
/// round's terminal aggregate run outside the trust boundary.
pub fn verify_aggregation(
    public_key: &[u8],
    round: &Round,
    aggregation: &Aggregation,
) -> Result<(), Error> {
    let content = aggregation.signed_payload(round)?;
    signing::verify(public_key, &content, aggregation.sig().as_bytes())
        .map_err(|_| Error::InvalidSignature(*round))
}

#[cfg(test)]
mod tests {
    use super::{verify_aggregation, AggregationEngine};
    use crate::{
        combiner::{Combiner, ModAddCombiner, XorCombiner},
        error::Error,
    };
    use assert_matches::assert_matches;
    use conclave_core::{
        signing::SigningKeyPair,
        test_util::{ephemeral_signing_key_pair, random_client_ids},
    };
    use conclave_messages::{
        codec::Encode, AggregateRequest, Aggregation, ClientId, OpaqueBytes, Round,
    };
    use std::sync::Arc;

    fn engine(round: u32, combiner: Arc<dyn Combiner>) -> AggregationEngine {
        AggregationEngine::new(
            Round::from_number(round),
            combiner,
            Arc::new(ephemeral_signing_key_pair()),
        )
    }

    fn sum_engine(round: u32) -> AggregationEngine {
        engine(round, Arc::new(ModAddCombiner::new(1)))
    }

    fn encoded_u64(value: u64) -> OpaqueBytes {
        OpaqueBytes::new(Vec::from(value.to_le_bytes()))
    }

    fn fold(
        engine: &AggregationEngine,
        round: u32,
        user_id: ClientId,
        message: OpaqueBytes,
        current_agg: Aggregation,
    ) -> Result<Aggregation, Error> {
        engine.aggregate(&AggregateRequest::new(
            Round::from_number(round),
            user_id,
            message,
            current_agg,
        ))
    }

    #[test]
    fn empty_aggregation_is_signed_identity() {
        let engine = sum_engine(5);
        let empty = engine.empty_aggregation().unwrap();

        assert!(empty.user_ids().is_empty());
        assert_eq!(empty.aggregated_value(), &encoded_u64(0));
        engine.verify(&empty).unwrap();

        // Deterministic signing: recreating the empty accumulator yields identical
        // bytes.
        assert_eq!(empty, engine.empty_aggregation().unwrap());
    }

    #[test]
    fn single_fold_then_duplicate_rejection() {
        let engine = sum_engine(5);
        let empty = engine.empty_aggregation().unwrap();
        let user = random_client_ids(1)[0];

        let after_first = fold(&engine, 5, user, encoded_u64(10), empty).unwrap();
        assert_eq!(after_first.user_ids(), &[user]);
        assert_eq!(after_first.aggregated_value(), &encoded_u64(10));
        engine.verify(&after_first).unwrap();

        // A second contribution from the same client fails, and the aggregate the host
        // holds is byte-identical to what it held before the call.
        let before = after_first.get_encoded().unwrap();
        let err = fold(
            &engine,
            5,
            user,
            encoded_u64(10),
            after_first.clone(),
        )
        .unwrap_err();
        assert_matches!(err, Error::DuplicateContribution { user_id, .. } if user_id == user);
        assert_eq!(after_first.get_encoded().unwrap(), before);
    }

    #[test]
    fn fold_order_does_not_matter() {
        let engine = sum_engine(7);
        let users = random_client_ids(5);
        let contributions: Vec<(ClientId, OpaqueBytes)> = users
            .iter()
            .enumerate()
            .map(|(i, user)| (*user, encoded_u64((i as u64 + 1) * 100)))
            .collect();

        let mut permutations = Vec::new();
        for ordering in [
            Vec::from([0usize, 1, 2, 3, 4]),
            Vec::from([4usize, 3, 2, 1, 0]),
            Vec::from([2usize, 0, 4, 1, 3]),
        ] {
            let mut agg = engine.empty_aggregation().unwrap();
            for index in ordering {
                let (user, message) = &contributions[index];
                agg = fold(&engine, 7, *user, message.clone(), agg).unwrap();
            }
            permutations.push(agg);
        }

        for agg in &permutations {
            assert_eq!(agg.aggregated_value(), &encoded_u64(1500));
            assert_eq!(agg.sig(), permutations[0].sig());
            engine.verify(agg).unwrap();
        }
    }

    #[test]
    fn round_mismatch_is_rejected() {
        let engine = sum_engine(5);
        let empty = engine.empty_aggregation().unwrap();
        let user = random_client_ids(1)[0];

        assert_matches!(
            fold(&engine, 6, user, encoded_u64(1), empty),
            Err(Error::RoundMismatch(round)) if round == Round::from_number(6)
        );
    }

    #[test]
    fn corrupt_contribution_is_rejected() {
        let engine = sum_engine(5);
        let empty = engine.empty_aggregation().unwrap();
        let user = random_client_ids(1)[0];

        let err = fold(
            &engine,
            5,
            user,
            OpaqueBytes::new(Vec::from([0x01, 0x02])),
            empty,
        )
        .unwrap_err();
        assert_matches!(err, Error::CorruptMessage(_, _));
    }

    #[test]
    fn forged_aggregate_is_rejected() {
        let engine = sum_engine(5);
        let empty = engine.empty_aggregation().unwrap();
        let user = random_client_ids(1)[0];
        let honest = fold(&engine, 5, user, encoded_u64(10), empty).unwrap();

        // Tamper with the accumulator but keep the stale signature.
        let forged = Aggregation::new(
            Vec::from(honest.user_ids()),
            encoded_u64(11),
            honest.sig().clone(),
        )
        .unwrap();
        let other_user = random_client_ids(1)[0];
        assert_matches!(
            fold(&engine, 5, other_user, encoded_u64(1), forged),
            Err(Error::InvalidSignature(_))
        );
    }

    #[test]
    fn aggregate_signed_by_another_key_is_rejected() {
        let engine = sum_engine(5);
        let other_engine = AggregationEngine::new(
            Round::from_number(5),
            Arc::new(ModAddCombiner::new(1)),
            Arc::new(ephemeral_signing_key_pair()),
        );
        let foreign = other_engine.empty_aggregation().unwrap();
        let user = random_client_ids(1)[0];

        assert_matches!(
            fold(&engine, 5, user, encoded_u64(1), foreign),
            Err(Error::InvalidSignature(_))
        );
    }

    #[test]
    fn signature_binds_the_round() {
        let (key_pair, _) = SigningKeyPair::generate().unwrap();
        let key_pair = Arc::new(key_pair);
        let engine = AggregationEngine::new(
            Round::from_number(5),
            Arc::new(ModAddCombiner::new(1)),
            Arc::clone(&key_pair),
        );
        let empty = engine.empty_aggregation().unwrap();

        verify_aggregation(&key_pair.public_key(), &Round::from_number(5), &empty).unwrap();
        assert_matches!(
            verify_aggregation(&key_pair.public_key(), &Round::from_number(6), &empty),
            Err(Error::InvalidSignature(_))
        );
    }

    #[test]
    fn xor_contributions_combine_to_the_pad_sum() {
        let engine = engine(2, Arc::new(XorCombiner::new(4)));
        let users = random_client_ids(3);
        let pads = [
            [0x0fu8, 0x00, 0xff, 0x11],
            [0xf0u8, 0x00, 0x0f, 0x22],
            [0x00u8, 0xaa, 0xf0, 0x33],
        ];

        let mut agg = engine.empty_aggregation().unwrap();
        for (user, pad) in users.iter().zip(&pads) {
            agg = fold(&engine, 2, *user, OpaqueBytes::new(Vec::from(*pad)), agg).unwrap();
        }

        assert_eq!(
            agg.aggregated_value().as_bytes(),
            &[0x0f ^ 0xf0, 0xaa, 0xff ^ 0x0f ^ 0xf0, 0x11 ^ 0x22 ^ 0x33]
        );
        engine.verify(&agg).unwrap();
    }
}
