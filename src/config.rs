use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuantileError, Result};
use crate::model_checking::context::SolutionMethod;
use crate::model_checking::helper_methods::Termination;
use crate::model_checking::reward_cache::CacheKind;
use crate::model_checking::scc::SccMethod;
use crate::model_checking::topological::Scheduling;

/// Solver settings shared by every reward step. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolutionMethod,
    pub scc_method: SccMethod,
    pub scheduling: Scheduling,
    pub cache: CacheKind,
    /// Solve the zero-reward states as one block when false.
    pub use_scc: bool,
    pub epsilon: f64,
    pub termination: Termination,
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            method: SolutionMethod::ValueIteration,
            scc_method: SccMethod::Tarjan,
            scheduling: Scheduling::Sequential,
            cache: CacheKind::Individual,
            use_scc: true,
            epsilon: 1e-6,
            termination: Termination::Relative,
            max_iterations: 10_000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.0) {
            return Err(QuantileError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if self.max_iterations == 0 {
            return Err(QuantileError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn read_config_json<P: AsRef<Path>>(path: P) -> Result<SolverConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: SolverConfig = serde_json::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}
