//! Client-selection policies.
//!
//! A policy decides which slots participate in a round and when the selection is
//! complete; the scheduling state machine enforces every protocol invariant around it
//! (footprint minting, replay protection, round advancement). Policies never see client
//! identities, only slot indexes.

use crate::error::Error;
use conclave_messages::{ReservationMap, Round};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::fmt::Debug;

/// Why a policy could not advance a round.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The policy cannot satisfy its selection constraints.
    #[error("{0}")]
    Exhausted(&'static str),
}

/// What a policy decided for one negotiation exchange.
#[derive(Debug, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Slots to newly reserve. Each must currently be unreserved.
    pub reserve: Vec<usize>,
    /// Whether the round's client set is complete once `reserve` is applied.
    pub done: bool,
}

/// A pluggable client-selection policy.
pub trait SelectionPolicy: Debug + Send + Sync {
    /// Decide the next batch of reservations for `round`, given the reservation map the
    /// host threaded back. `seed` is derived from the session secret and is a pure
    /// function of `(round, step)`, so a policy that draws all its randomness from it
    /// stays reproducible across crash retries.
    fn advance(
        &self,
        round: &Round,
        step: u32,
        seed: [u8; 32],
        reservation_map: &ReservationMap,
    ) -> Result<PolicyDecision, PolicyError>;
}

/// Seeded pseudorandom sampling without replacement.
///
/// Reserves `ceil(sample_fraction * population)` slots over one or more negotiation
/// exchanges, at most `batch_size` per exchange.
#[derive(Debug)]
pub struct FootprintSamplingPolicy {
    sample_fraction: f64,
    batch_size: usize,
}

impl FootprintSamplingPolicy {
    pub fn new(sample_fraction: f64, batch_size: usize) -> Result<Self, Error> {
        if !(sample_fraction > 0.0 && sample_fraction <= 1.0) {
            return Err(Error::InvalidConfiguration(
                "sample_fraction must be in (0, 1]",
            ));
        }
        if batch_size == 0 {
            return Err(Error::InvalidConfiguration("batch_size must be nonzero"));
        }
        Ok(Self {
            sample_fraction,
            batch_size,
        })
    }

    fn target(&self, population: usize) -> usize {
        (self.sample_fraction * population as f64).ceil() as usize
    }
}

impl SelectionPolicy for FootprintSamplingPolicy {
    fn advance(
        &self,
        _round: &Round,
        _step: u32,
        seed: [u8; 32],
        reservation_map: &ReservationMap,
    ) -> Result<PolicyDecision, PolicyError> {
        let population = reservation_map.population();
        let target = self.target(population);
        if target == 0 || target > population {
            return Err(PolicyError::Exhausted(
                "selection target is outside the population",
            ));
        }

        let reserved = reservation_map.reserved_count();
        if reserved >= target {
            return Ok(PolicyDecision {
                reserve: Vec::new(),
                done: true,
            });
        }

        let mut candidates: Vec<usize> = reservation_map.unreserved_slots().collect();
        if candidates.is_empty() {
            return Err(PolicyError::Exhausted("no unreserved slots remain"));
        }

        let needed = target - reserved;
        let batch = needed.min(self.batch_size).min(candidates.len());
        let mut rng = StdRng::from_seed(seed);
        let (chosen, _) = candidates.partial_shuffle(&mut rng, batch);
        let mut reserve = Vec::from(chosen);
        reserve.sort_unstable();

        let done = reserved + reserve.len() >= target;
        Ok(PolicyDecision { reserve, done })
    }
}

#[cfg(test)]
mod tests {
    use super::{FootprintSamplingPolicy, PolicyError, SelectionPolicy};
    use crate::error::Error;
    use assert_matches::assert_matches;
    use conclave_messages::{ReservationMap, Round};

    #[test]
    fn rejects_invalid_parameters() {
        assert_matches!(
            FootprintSamplingPolicy::new(0.0, 1),
            Err(Error::InvalidConfiguration(_))
        );
        assert_matches!(
            FootprintSamplingPolicy::new(1.5, 1),
            Err(Error::InvalidConfiguration(_))
        );
        assert_matches!(
            FootprintSamplingPolicy::new(0.5, 0),
            Err(Error::InvalidConfiguration(_))
        );
    }

    #[test]
    fn reserves_in_batches_until_target() {
        let policy = FootprintSamplingPolicy::new(0.1, 4).unwrap();
        let round = Round::from_number(0);
        let mut map = ReservationMap::with_population(100);

        let mut step = 0;
        loop {
            let decision = policy.advance(&round, step, [step as u8; 32], &map).unwrap();
            assert!(decision.reserve.len() <= 4);
            for slot in &decision.reserve {
                map.reserve(*slot).unwrap();
            }
            if decision.done {
                break;
            }
            step += 1;
        }

        assert_eq!(map.reserved_count(), 10);
        assert_eq!(step, 2);
    }

    #[test]
    fn decisions_are_deterministic_in_the_seed() {
        let policy = FootprintSamplingPolicy::new(0.25, 8).unwrap();
        let round = Round::from_number(3);
        let map = ReservationMap::with_population(40);

        let first = policy.advance(&round, 0, [7; 32], &map).unwrap();
        let second = policy.advance(&round, 0, [7; 32], &map).unwrap();
        assert_eq!(first, second);

        let different_seed = policy.advance(&round, 0, [8; 32], &map).unwrap();
        assert_eq!(first.reserve.len(), different_seed.reserve.len());
    }

    #[test]
    fn full_population_selection_finishes_in_one_exchange() {
        let policy = FootprintSamplingPolicy::new(1.0, 16).unwrap();
        let round = Round::from_number(0);
        let map = ReservationMap::with_population(8);

        let decision = policy.advance(&round, 0, [0; 32], &map).unwrap();
        assert_eq!(decision.reserve.len(), 8);
        assert!(decision.done);
    }

    #[test]
    fn already_satisfied_map_is_done_immediately() {
        let policy = FootprintSamplingPolicy::new(0.5, 4).unwrap();
        let round = Round::from_number(0);
        let mut map = ReservationMap::with_population(4);
        map.reserve(0).unwrap();
        map.reserve(1).unwrap();

        let decision = policy.advance(&round, 5, [0; 32], &map).unwrap();
        assert!(decision.reserve.is_empty());
        assert!(decision.done);
    }

    #[test]
    fn empty_population_is_exhausted() {
        let policy = FootprintSamplingPolicy::new(0.5, 4).unwrap();
        let map = ReservationMap::with_population(0);
        assert_matches!(
            policy.advance(&Round::from_number(0), 0, [0; 32], &map),
            Err(PolicyError::Exhausted(_))
        );
    }
}
