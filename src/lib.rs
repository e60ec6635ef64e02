//! Reward-step quantile engine for Markov models.
//!
//! The values of reward step `r` depend only on lower steps through positive-reward
//! choices, so each step reduces to a fixed point over the zero-reward subgraph. That
//! subgraph is split into strongly connected components, the components are ordered (or
//! batched) by their dependencies, and each one is solved by value iteration, interval
//! iteration or a linear program.

pub mod config;
pub mod error;
pub mod model_checking;

pub use config::{read_config_json, SolverConfig};
pub use error::{QuantileError, Result};
pub use model_checking::helper_methods::MinMax;
pub use model_checking::model::{read_model_json, ExplicitModel, Model, ModelInput, ModelType};
pub use model_checking::quantile::{QuantileComputation, RewardBound};
