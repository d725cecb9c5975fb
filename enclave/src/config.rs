//! Configuration for the trusted components.

use crate::{
    combiner::{Combiner, ModAddCombiner, XorCombiner},
    error::Error,
};
use serde::{Deserialize, Serialize};

/// Configuration for one Conclave session.
///
/// # Examples
///
/// ```
/// use conclave_enclave::config::EnclaveConfig;
///
/// let yaml_config = r#"
/// ---
/// population_size: 100
/// sample_fraction: 0.1
/// contribution_format: !xor
///   message_length: 256
/// "#;
///
/// let _decoded: EnclaveConfig = serde_yaml::from_str(yaml_config).unwrap();
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnclaveConfig {
    /// Number of registered client slots. Constant for the session's lifetime.
    pub population_size: usize,

    /// Fraction of the population the default selection policy reserves per round.
    pub sample_fraction: f64,

    /// Upper bound on slots reserved per negotiation exchange.
    #[serde(default = "EnclaveConfig::default_reservation_batch_size")]
    pub reservation_batch_size: usize,

    /// Upper bound on negotiation exchanges per round before the selection policy is
    /// considered exhausted.
    #[serde(default = "EnclaveConfig::default_max_negotiation_steps")]
    pub max_negotiation_steps: u32,

    /// The contribution format clients submit, which fixes the combine operation.
    pub contribution_format: ContributionFormat,
}

impl EnclaveConfig {
    fn default_reservation_batch_size() -> usize {
        8
    }

    fn default_max_negotiation_steps() -> u32 {
        64
    }

    /// Check this configuration for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.population_size == 0 {
            return Err(Error::InvalidConfiguration(
                "population_size must be nonzero",
            ));
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(Error::InvalidConfiguration(
                "sample_fraction must be in (0, 1]",
            ));
        }
        if self.reservation_batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "reservation_batch_size must be nonzero",
            ));
        }
        if self.max_negotiation_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "max_negotiation_steps must be nonzero",
            ));
        }
        self.contribution_format.validate()
    }
}

/// Contribution formats supported by the aggregation engine. The format fixes both how
/// client contributions are validated and the combine that folds them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionFormat {
    /// Fixed-length pads combined by bytewise XOR.
    Xor { message_length: usize },
    /// Little-endian u64 vectors combined by element-wise wrapping addition.
    ModAdd { vector_length: usize },
}

impl ContributionFormat {
    /// Build the combiner for this format.
    pub fn combiner(&self) -> Box<dyn Combiner> {
        match self {
            Self::Xor { message_length } => Box::new(XorCombiner::new(*message_length)),
            Self::ModAdd { vector_length } => Box::new(ModAddCombiner::new(*vector_length)),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Xor { message_length } if *message_length == 0 => Err(
                Error::InvalidConfiguration("message_length must be nonzero"),
            ),
            Self::ModAdd { vector_length } if *vector_length == 0 => Err(
                Error::InvalidConfiguration("vector_length must be nonzero"),
            ),
            _ => Ok(()),
        }
    }
}
