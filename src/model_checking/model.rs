use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use itertools::Itertools;
use log::warn;
use serde::Deserialize;

use super::state_index::StateIndexMap;
use crate::error::{QuantileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Dtmc,
    Mdp,
    Ctmc,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Successor {
    pub s: usize,
    pub p: f64,
}

/// Read-only view of a model with integer rewards.
pub trait Model: Sync {
    fn model_type(&self) -> ModelType;

    fn num_states(&self) -> usize;

    fn state_reward(&self, s: usize) -> u32;

    fn num_choices(&self, s: usize) -> usize;

    fn transition_reward(&self, s: usize, choice: usize) -> u32;

    fn successors(&self, s: usize, choice: usize) -> &[Successor];

    /// Reward collected when `choice` is taken in `s`.
    fn choice_reward(&self, s: usize, choice: usize) -> u32 {
        self.state_reward(s) + self.transition_reward(s, choice)
    }

    fn is_zero_reward_choice(&self, s: usize, choice: usize) -> bool {
        self.choice_reward(s, choice) == 0
    }

    fn zero_reward_choices(&self, s: usize) -> Vec<usize> {
        (0..self.num_choices(s))
            .filter(|c| self.is_zero_reward_choice(s, *c))
            .collect()
    }

    fn has_positive_reward_choice(&self, s: usize) -> bool {
        (0..self.num_choices(s)).any(|c| !self.is_zero_reward_choice(s, c))
    }

    /// Dense indices of the successors of `s` inside `within` reachable through a
    /// zero-reward choice.
    fn zero_reward_successors(&self, s: usize, within: &StateIndexMap) -> Vec<usize> {
        self.zero_reward_choices(s)
            .into_iter()
            .flat_map(move |c| self.successors(s, c).iter())
            .filter(|x| x.p > 0.0)
            .filter_map(|x| within.get(x.s))
            .unique()
            .collect()
    }

    fn max_choice_reward(&self) -> u32 {
        let mut max = 0;
        for s in 0..self.num_states() {
            for c in 0..self.num_choices(s) {
                max = max.max(self.choice_reward(s, c));
            }
        }
        max
    }
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub action: String,
    pub reward: u32,
    pub successors: Vec<Successor>,
}

#[derive(Debug, Clone)]
pub struct ExplicitModel {
    pub model_type: ModelType,
    pub state_rewards: Vec<u32>,
    pub choices: Vec<Vec<Choice>>,
}

impl ExplicitModel {
    pub fn new(model_type: ModelType, num_states: usize) -> ExplicitModel {
        ExplicitModel {
            model_type,
            state_rewards: vec![0; num_states],
            choices: vec![Vec::new(); num_states],
        }
    }

    pub fn add_choice(&mut self, s: usize, action: &str, reward: u32, s_prime: &[(usize, f64)]) -> &mut Self {
        self.choices[s].push(Choice {
            action: action.to_string(),
            reward,
            successors: s_prime.iter().map(|(s, p)| Successor { s: *s, p: *p }).collect(),
        });
        self
    }

    pub fn set_state_reward(&mut self, s: usize, reward: u32) -> &mut Self {
        self.state_rewards[s] = reward;
        self
    }

    /// Structural checks; deadlock states get a zero-reward self loop.
    pub fn validate(&mut self) -> Result<()> {
        let n = self.choices.len();
        for s in 0..n {
            if self.choices[s].is_empty() {
                warn!("state {} has no outgoing transitions, adding a self loop", s);
                self.choices[s].push(Choice {
                    action: "deadlock".to_string(),
                    reward: 0,
                    successors: vec![Successor { s, p: 1.0 }],
                });
            }
            if self.model_type == ModelType::Dtmc && self.choices[s].len() != 1 {
                return Err(QuantileError::InvalidModel(format!(
                    "DTMC state {} has {} choices",
                    s,
                    self.choices[s].len()
                )));
            }
            for choice in self.choices[s].iter() {
                if self.state_rewards[s].checked_add(choice.reward).is_none() {
                    return Err(QuantileError::InvalidModel(format!(
                        "reward of state {} action {} overflows",
                        s, choice.action
                    )));
                }
                if let Some(bad) = choice.successors.iter().find(|x| x.s >= n) {
                    return Err(QuantileError::InvalidModel(format!(
                        "state {} action {} leads to unknown state {}",
                        s, choice.action, bad.s
                    )));
                }
                if let Some(bad) = choice.successors.iter().find(|x| !x.p.is_finite() || x.p < 0.0) {
                    return Err(QuantileError::InvalidModel(format!(
                        "state {} action {} has probability {} for state {}",
                        s, choice.action, bad.p, bad.s
                    )));
                }
                if self.model_type != ModelType::Ctmc {
                    let total: f64 = choice.successors.iter().map(|x| x.p).sum();
                    if (total - 1.0).abs() > 1e-6 {
                        return Err(QuantileError::InvalidModel(format!(
                            "distribution of state {} action {} sums to {}",
                            s, choice.action, total
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Model for ExplicitModel {
    fn model_type(&self) -> ModelType {
        self.model_type
    }

    fn num_states(&self) -> usize {
        self.choices.len()
    }

    fn state_reward(&self, s: usize) -> u32 {
        self.state_rewards[s]
    }

    fn num_choices(&self, s: usize) -> usize {
        self.choices[s].len()
    }

    fn transition_reward(&self, s: usize, choice: usize) -> u32 {
        self.choices[s][choice].reward
    }

    fn successors(&self, s: usize, choice: usize) -> &[Successor] {
        &self.choices[s][choice].successors[..]
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelFile {
    pub model_type: ModelType,
    pub num_states: usize,
    pub initial: usize,
    pub targets: Vec<usize>,
    #[serde(default)]
    pub state_rewards: Option<Vec<u32>>,
    #[serde(default)]
    pub unbounded: Option<Vec<f64>>,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
pub struct Transition {
    pub s: usize,
    pub a: String,
    pub s_prime: Vec<Successor>,
    #[serde(default)]
    pub rewards: u32,
}

/// A model read from json together with the data of the property.
pub struct ModelInput {
    pub model: ExplicitModel,
    pub initial: usize,
    pub targets: Vec<usize>,
    pub unbounded: Option<Vec<f64>>,
}

impl ModelInput {
    pub fn target_flags(&self) -> Vec<bool> {
        let mut flags = vec![false; self.model.num_states()];
        for t in self.targets.iter() {
            flags[*t] = true;
        }
        flags
    }
}

impl ModelFile {
    pub fn into_input(self) -> Result<ModelInput> {
        let num_states = self.num_states;
        let mut model = ExplicitModel::new(self.model_type, num_states);
        if let Some(rewards) = self.state_rewards {
            if rewards.len() != self.num_states {
                return Err(QuantileError::InvalidModel(format!(
                    "{} state rewards for {} states",
                    rewards.len(),
                    self.num_states
                )));
            }
            model.state_rewards = rewards;
        }
        for t in self.transitions.into_iter() {
            if t.s >= self.num_states {
                return Err(QuantileError::InvalidModel(format!("transition from unknown state {}", t.s)));
            }
            model.choices[t.s].push(Choice {
                action: t.a,
                reward: t.rewards,
                successors: t.s_prime,
            });
        }
        model.validate()?;
        if self.initial >= num_states || self.targets.iter().any(|x| *x >= num_states) {
            return Err(QuantileError::InvalidModel("initial or target state out of range".to_string()));
        }
        if let Some(u) = self.unbounded.as_ref() {
            if u.len() != self.num_states {
                return Err(QuantileError::InvalidModel(format!(
                    "{} unbounded values for {} states",
                    u.len(),
                    self.num_states
                )));
            }
        }
        Ok(ModelInput {
            model,
            initial: self.initial,
            targets: self.targets,
            unbounded: self.unbounded,
        })
    }
}

pub fn read_model_json<P: AsRef<Path>>(path: P) -> Result<ModelInput> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let u: ModelFile = serde_json::from_reader(reader)?;
    u.into_input()
}
