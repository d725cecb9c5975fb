//! The request/response surface of the trust boundary.
//!
//! [`Enclave`] binds the scheduling state machine and the per-round aggregation engines
//! behind the blocking operations a gateway relays: `schedule`, `aggregate`, and the
//! `Empty`-returning health/reset acknowledgments. Mutation of a round's state is
//! serialized through its own lock; lock acquisition never blocks, so contention
//! surfaces as the retryable [`Error::Contended`] instead of a stalled caller.

use crate::{
    aggregation::{verify_aggregation, AggregationEngine},
    combiner::Combiner,
    config::EnclaveConfig,
    error::Error,
    policy::{FootprintSamplingPolicy, SelectionPolicy},
    scheduling::SchedulingStateMachine,
};
use conclave_core::{secrets::SessionSecret, signing::SigningKeyPair};
use conclave_messages::{
    AggregateRequest, AggregateResponse, Aggregation, Empty, Round, SchedulingRequest,
    SchedulingResponse, SchedulingState,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};
use tracing::{info, warn};

fn try_lock<'a, T>(mutex: &'a Mutex<T>, resource: &'static str) -> Result<MutexGuard<'a, T>, Error> {
    match mutex.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::WouldBlock) => Err(Error::Contended(resource)),
        // A poisoned lock means another caller panicked mid-mutation; there is no safe
        // state to continue from.
        Err(TryLockError::Poisoned(err)) => panic!("poisoned lock on {resource}: {err}"),
    }
}

/// The trusted core behind the gateway: round scheduling and signed aggregation,
/// consulted only through narrow request/response exchanges.
pub struct Enclave {
    config: EnclaveConfig,
    key_pair: Arc<SigningKeyPair>,
    combiner: Arc<dyn Combiner>,
    scheduler: Mutex<SchedulingStateMachine>,
    aggregations: Mutex<HashMap<Round, Arc<Mutex<AggregationEngine>>>>,
}

impl Enclave {
    /// Create an enclave with the default selection policy built from `config`.
    pub fn new(
        config: EnclaveConfig,
        secret: SessionSecret,
        key_pair: SigningKeyPair,
    ) -> Result<Self, Error> {
        config.validate()?;
        let policy = Box::new(FootprintSamplingPolicy::new(
            config.sample_fraction,
            config.reservation_batch_size,
        )?);
        Self::with_policy(config, secret, key_pair, policy)
    }

    /// Create an enclave with a caller-provided selection policy.
    pub fn with_policy(
        config: EnclaveConfig,
        secret: SessionSecret,
        key_pair: SigningKeyPair,
        policy: Box<dyn SelectionPolicy>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let combiner: Arc<dyn Combiner> = Arc::from(config.contribution_format.combiner());
        let scheduler = SchedulingStateMachine::new(
            config.population_size,
            config.max_negotiation_steps,
            policy,
            secret,
        )?;
        Ok(Self {
            config,
            key_pair: Arc::new(key_pair),
            combiner,
            scheduler: Mutex::new(scheduler),
            aggregations: Mutex::new(HashMap::new()),
        })
    }

    /// The raw public key external collaborators verify aggregates against.
    pub fn public_key(&self) -> Vec<u8> {
        self.key_pair.public_key()
    }

    /// The round-start scheduling state for the active round, for host bootstrap.
    pub fn initial_scheduling_state(&self) -> Result<SchedulingState, Error> {
        let scheduler = try_lock(&self.scheduler, "scheduler")?;
        Ok(scheduler.initial_state())
    }

    /// Advance the round-scheduling negotiation by one exchange. When the response is
    /// final, the round's aggregation engine is stood up as a side effect.
    pub fn handle_schedule(
        &self,
        request: &SchedulingRequest,
    ) -> Result<SchedulingResponse, Error> {
        let mut scheduler = try_lock(&self.scheduler, "scheduler")?;
        let response = scheduler.schedule(request)?;
        if response.is_final() {
            self.register_round(*response.new_state().round())?;
        }
        Ok(response)
    }

    /// Fold one client contribution into a round's running aggregate.
    pub fn handle_aggregate(&self, request: &AggregateRequest) -> Result<AggregateResponse, Error> {
        let round = *request.round();
        let engine = {
            let aggregations = try_lock(&self.aggregations, "aggregation registry")?;
            Arc::clone(
                aggregations
                    .get(&round)
                    .ok_or(Error::RoundMismatch(round))?,
            )
        };
        let engine = try_lock(&engine, "aggregation round")?;
        Ok(AggregateResponse::new(engine.aggregate(request)?))
    }

    /// The signed empty accumulator a round's aggregation starts from. Stands up the
    /// round's engine if scheduling has not already done so.
    pub fn empty_aggregation(&self, round: Round) -> Result<Aggregation, Error> {
        let engine = self.register_round(round)?;
        let engine = try_lock(&engine, "aggregation round")?;
        engine.empty_aggregation()
    }

    /// Drop a round's aggregation engine once its terminal aggregate has been consumed.
    pub fn discard_aggregation(&self, round: Round) -> Result<Empty, Error> {
        let mut aggregations = try_lock(&self.aggregations, "aggregation registry")?;
        if aggregations.remove(&round).is_none() {
            warn!(round = %round, "discarding aggregation for a round with no engine");
        }
        Ok(Empty {})
    }

    /// Verify an aggregation for a round against this enclave's public key.
    pub fn verify_aggregation(&self, round: &Round, aggregation: &Aggregation) -> Result<(), Error> {
        verify_aggregation(&self.key_pair.public_key(), round, aggregation)
    }

    /// Liveness probe.
    pub fn health_check(&self) -> Empty {
        Empty {}
    }

    /// Drop all per-round state and restart the scheduling session at round zero.
    pub fn reset(&self) -> Result<Empty, Error> {
        let mut scheduler = try_lock(&self.scheduler, "scheduler")?;
        let mut aggregations = try_lock(&self.aggregations, "aggregation registry")?;
        scheduler.reset()?;
        aggregations.clear();
        info!("enclave session reset");
        Ok(Empty {})
    }

    fn register_round(&self, round: Round) -> Result<Arc<Mutex<AggregationEngine>>, Error> {
        let mut aggregations = try_lock(&self.aggregations, "aggregation registry")?;
        Ok(Arc::clone(aggregations.entry(round).or_insert_with(|| {
            Arc::new(Mutex::new(AggregationEngine::new(
                round,
                Arc::clone(&self.combiner),
                Arc::clone(&self.key_pair),
            )))
        })))
    }

    /// The configuration this enclave was created with.
    pub fn config(&self) -> &EnclaveConfig {
        &self.config
    }
}
