//! Order-independent combination of client contributions.
//!
//! A [`Combiner`] is a commutative monoid over encoded accumulator values: folding a
//! fixed set of contributions yields the same accumulator no matter the order they
//! arrive in. Contributions from independent clients race and retry freely, so this is
//! the one property every implementation must provide.

use std::fmt::Debug;

/// Errors a combiner can surface.
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    /// The contribution or accumulator did not decode under the expected format.
    #[error("{0}")]
    Corrupt(&'static str),
}

/// A commutative, associative combine over encoded accumulators.
pub trait Combiner: Debug + Send + Sync {
    /// The encoded identity accumulator that every round starts from.
    fn identity(&self) -> Vec<u8>;

    /// Validate and decode `contribution`, then fold it into `accumulator`, returning
    /// the new encoded accumulator. Implementations must be associative and commutative
    /// over any fixed set of valid contributions.
    fn combine(&self, accumulator: &[u8], contribution: &[u8]) -> Result<Vec<u8>, CombineError>;
}

/// Combine fixed-length pads by bytewise XOR. The combine used by DC-net style blinded
/// contributions: every client submits a pad of the configured length, and XOR-ing all
/// pads recovers the plaintext sum of the blinded inputs.
#[derive(Debug)]
pub struct XorCombiner {
    message_length: usize,
}

impl XorCombiner {
    pub fn new(message_length: usize) -> Self {
        Self { message_length }
    }
}

impl Combiner for XorCombiner {
    fn identity(&self) -> Vec<u8> {
        vec![0; self.message_length]
    }

    fn combine(&self, accumulator: &[u8], contribution: &[u8]) -> Result<Vec<u8>, CombineError> {
        if accumulator.len() != self.message_length {
            return Err(CombineError::Corrupt("accumulator has unexpected length"));
        }
        if contribution.len() != self.message_length {
            return Err(CombineError::Corrupt("contribution has unexpected length"));
        }
        Ok(accumulator
            .iter()
            .zip(contribution)
            .map(|(lhs, rhs)| lhs ^ rhs)
            .collect())
    }
}

/// Combine vectors of little-endian u64 values by element-wise wrapping addition, the
/// shape of additively homomorphic aggregate shares.
#[derive(Debug)]
pub struct ModAddCombiner {
    vector_length: usize,
}

impl ModAddCombiner {
    pub fn new(vector_length: usize) -> Self {
        Self { vector_length }
    }

    fn decode(&self, encoded: &[u8], what: &'static str) -> Result<Vec<u64>, CombineError> {
        if encoded.len() != self.vector_length * 8 {
            return Err(CombineError::Corrupt(what));
        }
        Ok(encoded
            .chunks_exact(8)
            .map(|chunk| {
                // Unwrap safety: chunks_exact(8) always yields 8-byte chunks.
                u64::from_le_bytes(chunk.try_into().unwrap())
            })
            .collect())
    }
}

impl Combiner for ModAddCombiner {
    fn identity(&self) -> Vec<u8> {
        vec![0; self.vector_length * 8]
    }

    fn combine(&self, accumulator: &[u8], contribution: &[u8]) -> Result<Vec<u8>, CombineError> {
        let accumulator = self.decode(accumulator, "accumulator has unexpected length")?;
        let contribution = self.decode(contribution, "contribution has unexpected length")?;
        Ok(accumulator
            .into_iter()
            .zip(contribution)
            .flat_map(|(lhs, rhs)| lhs.wrapping_add(rhs).to_le_bytes())
            .collect())
    }
}
