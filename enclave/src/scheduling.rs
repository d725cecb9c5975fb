//! The round-scheduling state machine.
//!
//! The machine decides, without revealing per-client decisions to the host, which
//! clients participate in each round. A round converges over one or more `schedule`
//! exchanges: the host threads the returned state and negotiation payload back verbatim,
//! and the injected [`SelectionPolicy`] reserves slots until the round's client set is
//! fixed.
//!
//! Every transform is a deterministic pure function of `(state, dc_message, session
//! secret)`. The machine's own bookkeeping only classifies incoming states: the expected
//! next exchange advances the round, the most recently accepted exchange re-derives the
//! identical response (crash-safe retry), anything older is a replay, and anything never
//! issued is a mismatch. Two divergent "current" states for one round are therefore
//! never both accepted.

use crate::{
    error::Error,
    policy::{PolicyError, SelectionPolicy},
};
use aws_lc_rs::digest::{digest, SHA256};
use conclave_core::secrets::SessionSecret;
use conclave_messages::{
    codec::{CodecError, Decode, Encode},
    Footprint, OpaqueBytes, ReservationMap, Round, SchedulingRequest, SchedulingResponse,
    SchedulingState,
};
use std::{collections::HashSet, io::Cursor};
use tracing::{debug, info};

/// SHA-256 fingerprint of one `(state, dc_message)` exchange.
type Fingerprint = [u8; 32];

fn fingerprint(state: &SchedulingState, dc_message: &OpaqueBytes) -> Result<Fingerprint, Error> {
    let mut bytes = state.get_encoded()?;
    dc_message.encode(&mut bytes)?;
    // Unwrap safety: SHA-256 digests are always 32 bytes.
    Ok(digest(&SHA256, &bytes).as_ref().try_into().unwrap())
}

/// The authenticated negotiation payload threaded through `dc_message`. Opaque to the
/// host; sealed with the session secret so tampering and cross-round splicing are
/// detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Negotiation {
    round: Round,
    step: u32,
}

impl Encode for Negotiation {
    fn encode(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        self.round.encode(bytes)?;
        self.step.encode(bytes)
    }

    fn encoded_len(&self) -> Option<usize> {
        Some(self.round.encoded_len()? + 4)
    }
}

impl Decode for Negotiation {
    fn decode(bytes: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Self {
            round: Round::decode(bytes)?,
            step: u32::decode(bytes)?,
        })
    }
}

/// Owns per-round client-selection state and advances it via repeated opaque policy
/// exchanges until a round is finalized.
#[derive(Debug)]
pub struct SchedulingStateMachine {
    population: usize,
    max_negotiation_steps: u32,
    policy: Box<dyn SelectionPolicy>,
    secret: SessionSecret,
    /// The round currently being scheduled.
    current_round: Round,
    /// The most recently finalized round, if any.
    last_finalized: Option<Round>,
    /// Fingerprint of the exchange the machine expects next.
    expected: Fingerprint,
    /// The most recently accepted exchange; resubmitting it re-derives the same
    /// response.
    last_accepted: Option<(Round, Fingerprint)>,
    /// Every exchange fingerprint this machine has issued, for replay classification.
    seen: HashSet<Fingerprint>,
}

impl SchedulingStateMachine {
    pub fn new(
        population: usize,
        max_negotiation_steps: u32,
        policy: Box<dyn SelectionPolicy>,
        secret: SessionSecret,
    ) -> Result<Self, Error> {
        if population == 0 {
            return Err(Error::InvalidConfiguration("population must be nonzero"));
        }
        if max_negotiation_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "max_negotiation_steps must be nonzero",
            ));
        }

        let current_round = Round::from_number(0);
        let expected = fingerprint(
            &Self::initial_state_for(population, &current_round),
            &OpaqueBytes::default(),
        )?;
        Ok(Self {
            population,
            max_negotiation_steps,
            policy,
            secret,
            current_round,
            last_finalized: None,
            expected,
            last_accepted: None,
            seen: HashSet::from([expected]),
        })
    }

    fn initial_state_for(population: usize, round: &Round) -> SchedulingState {
        // Unwrap safety: an empty footprint list contains no duplicates.
        SchedulingState::new(*round, ReservationMap::with_population(population), Vec::new())
            .unwrap()
    }

    /// The session's population size.
    pub fn population(&self) -> usize {
        self.population
    }

    /// The round currently being scheduled.
    pub fn current_round(&self) -> &Round {
        &self.current_round
    }

    /// The round-start state for the active round: empty reservation map, no footprints.
    /// This is the state the host submits on a round's opening exchange.
    pub fn initial_state(&self) -> SchedulingState {
        Self::initial_state_for(self.population, &self.current_round)
    }

    /// Restart the session at round zero, discarding all bookkeeping. The policy and
    /// session secret are retained.
    pub fn reset(&mut self) -> Result<(), Error> {
        let current_round = Round::from_number(0);
        let expected = fingerprint(
            &Self::initial_state_for(self.population, &current_round),
            &OpaqueBytes::default(),
        )?;
        self.current_round = current_round;
        self.last_finalized = None;
        self.expected = expected;
        self.last_accepted = None;
        self.seen = HashSet::from([expected]);
        Ok(())
    }

    /// Advance the round's selection by one exchange.
    ///
    /// On failure the machine's bookkeeping is untouched and the caller's state remains
    /// the valid input for a retry.
    pub fn schedule(&mut self, request: &SchedulingRequest) -> Result<SchedulingResponse, Error> {
        let state = request.cur_state();
        let dc_message = request.cur_dc_message();
        let round = *state.round();

        self.validate_population(state)?;
        self.validate_footprints(state)?;

        let exchange = fingerprint(state, dc_message)?;

        // Crash-safe retry: resubmitting the most recently accepted exchange re-derives
        // the identical response, even if that exchange finalized its round.
        if let Some((_, accepted)) = self.last_accepted {
            if exchange == accepted {
                return self.transform(state, dc_message);
            }
        }

        if let Some(last_finalized) = self.last_finalized {
            if round < last_finalized {
                return Err(Error::StateMismatch(round));
            }
            if round == last_finalized {
                return Err(Error::RoundClosed(round));
            }
        }
        if round != self.current_round {
            return Err(Error::StateMismatch(round));
        }
        if exchange != self.expected {
            return Err(if self.seen.contains(&exchange) {
                Error::Replay(round)
            } else {
                Error::StateMismatch(round)
            });
        }

        let response = self.transform(state, dc_message)?;

        // Commit bookkeeping only once the transform has fully succeeded.
        if response.is_final() {
            let next_round = round.increment()?;
            let next_expected = fingerprint(
                &Self::initial_state_for(self.population, &next_round),
                &OpaqueBytes::default(),
            )?;
            self.last_accepted = Some((round, exchange));
            self.last_finalized = Some(round);
            self.current_round = next_round;
            self.expected = next_expected;
            self.seen.insert(next_expected);
            info!(
                round = %round,
                participants = response.new_state().footprints().len(),
                "scheduling round finalized"
            );
        } else {
            let next_expected = fingerprint(response.new_state(), response.new_dc_message())?;
            self.last_accepted = Some((round, exchange));
            self.expected = next_expected;
            self.seen.insert(next_expected);
        }

        Ok(response)
    }

    /// The deterministic exchange transform. Reads no bookkeeping, so re-running it on
    /// an already-accepted input reproduces the identical response.
    fn transform(
        &self,
        state: &SchedulingState,
        dc_message: &OpaqueBytes,
    ) -> Result<SchedulingResponse, Error> {
        let round = *state.round();
        let step = self.decode_step(state, dc_message)?;
        if step >= self.max_negotiation_steps {
            return Err(Error::PolicyExhausted(
                round,
                "negotiation step limit reached",
            ));
        }

        let seed = self.secret.round_step_seed(&round, step)?;
        let decision = self
            .policy
            .advance(&round, step, seed, state.reservation_map())
            .map_err(|PolicyError::Exhausted(reason)| Error::PolicyExhausted(round, reason))?;

        let mut reservation_map = state.reservation_map().clone();
        let mut footprints = Vec::from(state.footprints());
        for slot in &decision.reserve {
            reservation_map.reserve(*slot).map_err(|err| {
                Error::Internal(format!("policy reserved an unavailable slot: {err}"))
            })?;
            footprints.push(self.secret.footprint(&round, *slot));
        }

        let new_state = SchedulingState::new(round, reservation_map, footprints)?;
        let next_step = step
            .checked_add(1)
            .ok_or_else(|| Error::Internal("negotiation step overflow".into()))?;
        let new_dc_message = self.seal_negotiation(&round, next_step)?;

        debug!(
            round = %round,
            step,
            reserved = new_state.reservation_map().reserved_count(),
            done = decision.done,
            "advanced scheduling negotiation"
        );
        Ok(SchedulingResponse::new(
            new_state,
            new_dc_message,
            decision.done,
        ))
    }

    /// Recover the negotiation step from `dc_message`. An empty payload is only valid
    /// for a round's opening exchange.
    fn decode_step(&self, state: &SchedulingState, dc_message: &OpaqueBytes) -> Result<u32, Error> {
        let round = *state.round();
        if dc_message.is_empty() {
            if state.reservation_map().reserved_count() != 0 || !state.footprints().is_empty() {
                return Err(Error::StateMismatch(round));
            }
            return Ok(0);
        }

        let payload = self
            .secret
            .open_negotiation(dc_message.as_bytes())
            .map_err(|_| Error::StateMismatch(round))?;
        let negotiation =
            Negotiation::get_decoded(payload).map_err(|_| Error::StateMismatch(round))?;
        if negotiation.round != round {
            return Err(Error::StateMismatch(round));
        }
        Ok(negotiation.step)
    }

    fn seal_negotiation(&self, round: &Round, step: u32) -> Result<OpaqueBytes, Error> {
        let payload = Negotiation {
            round: *round,
            step,
        }
        .get_encoded()?;
        Ok(OpaqueBytes::new(self.secret.seal_negotiation(&payload)))
    }

    fn validate_population(&self, state: &SchedulingState) -> Result<(), Error> {
        let got = state.reservation_map().population();
        if got != self.population {
            return Err(Error::PopulationMismatch {
                got,
                expected: self.population,
            });
        }
        Ok(())
    }

    /// Every footprint must be a token this machine minted for a reserved slot of the
    /// state's round, with exactly one footprint per reserved slot. (The message layer
    /// already rejects duplicate footprints at construction.)
    fn validate_footprints(&self, state: &SchedulingState) -> Result<(), Error> {
        let round = *state.round();
        let reservation_map = state.reservation_map();
        if state.footprints().len() != reservation_map.reserved_count() {
            return Err(Error::InvalidFootprint(round));
        }

        let expected: HashSet<Footprint> = reservation_map
            .reserved_slots()
            .map(|slot| self.secret.footprint(&round, slot))
            .collect();
        for footprint in state.footprints() {
            if !expected.contains(footprint) {
                return Err(Error::InvalidFootprint(round));
            }
        }
        Ok(())
    }
}
