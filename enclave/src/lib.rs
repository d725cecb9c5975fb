//! Conclave's trusted core: the round-scheduling state machine and the signed
//! aggregation engine.
//!
//! Both components are driven through narrow request/response exchanges by an untrusted
//! host. The host threads every piece of protocol state through the calls itself; the
//! trusted side keeps no hidden per-session objects beyond the bookkeeping needed to
//! reject forked or replayed states. Selection and combination logic are injected
//! policies, so the concrete sampling strategy and homomorphic combine are configuration,
//! not code.

pub mod aggregation;
pub mod combiner;
pub mod config;
pub mod error;
pub mod policy;
pub mod scheduling;
pub mod service;

pub use error::Error;
