//! Timestep record: one synchronized cross-agent step.
//!
//! A timestep bundles what every agent observed, did and received at a single
//! time index. It has no identity of its own; inside the replay buffer it is
//! just the row written at some `(row, time)` coordinate.

use std::collections::BTreeMap;

use thiserror::Error;

use super::array::Array;

pub const OBSERVATIONS: &str = "observations";
pub const ACTIONS: &str = "actions";
pub const REWARDS: &str = "rewards";
pub const TERMINALS: &str = "terminals";
pub const TRUNCATIONS: &str = "truncations";
pub const INFOS: &str = "infos";

/// Prefix under which info entries are flattened (`infos/legal_actions`).
pub const INFO_PREFIX: &str = "infos/";

/// Name of a flattened info entry.
pub fn info_field_name(key: &str) -> String {
    format!("{INFO_PREFIX}{key}")
}

/// Auxiliary per-step data (legal action masks, global env state, ...).
pub type Infos = BTreeMap<String, Array>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestepError {
    #[error("field `{field}` must have a leading agent axis, got a scalar")]
    MissingAgentAxis { field: &'static str },
    #[error("field `{field}` has {actual} agents, expected {expected} (from `observations`)")]
    AgentCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// One timestep for every agent.
///
/// The five core fields are shaped `[num_agents, ...]`. Info entries are
/// free-form: a global `env_state` need not carry an agent axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestep {
    pub observations: Array,
    pub actions: Array,
    pub rewards: Array,
    pub terminals: Array,
    pub truncations: Array,
    pub infos: Infos,
}

impl Timestep {
    /// Assemble a timestep, checking that all core fields agree on the
    /// number of agents.
    pub fn new(
        observations: Array,
        actions: Array,
        rewards: Array,
        terminals: Array,
        truncations: Array,
        infos: Infos,
    ) -> Result<Self, TimestepError> {
        let timestep = Self {
            observations,
            actions,
            rewards,
            terminals,
            truncations,
            infos,
        };
        timestep.check_agent_counts()?;
        Ok(timestep)
    }

    fn check_agent_counts(&self) -> Result<(), TimestepError> {
        let core = [
            (OBSERVATIONS, &self.observations),
            (ACTIONS, &self.actions),
            (REWARDS, &self.rewards),
            (TERMINALS, &self.terminals),
            (TRUNCATIONS, &self.truncations),
        ];

        let mut expected = None;
        for (field, array) in core {
            let Some(&agents) = array.shape().first() else {
                return Err(TimestepError::MissingAgentAxis { field });
            };
            match expected {
                None => expected = Some(agents),
                Some(n) if n != agents => {
                    return Err(TimestepError::AgentCountMismatch {
                        field,
                        expected: n,
                        actual: agents,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Number of agents (leading dimension of `observations`).
    pub fn num_agents(&self) -> usize {
        self.observations.shape().first().copied().unwrap_or(0)
    }

    /// Prepend unit batch and unit time axes to every field
    /// (`[agents, ...]` becomes `[1, 1, agents, ...]`), the layout the
    /// trajectory buffer's `add` expects.
    pub fn expand_batch_time_dims(self) -> Self {
        fn expand(array: Array) -> Array {
            let mut shape = Vec::with_capacity(array.rank() + 2);
            shape.extend_from_slice(&[1, 1]);
            shape.extend_from_slice(array.shape());
            array
                .reshape(shape)
                .expect("unit axes preserve the element count")
        }

        Self {
            observations: expand(self.observations),
            actions: expand(self.actions),
            rewards: expand(self.rewards),
            terminals: expand(self.terminals),
            truncations: expand(self.truncations),
            infos: self
                .infos
                .into_iter()
                .map(|(k, v)| (k, expand(v)))
                .collect(),
        }
    }

    /// All fields in canonical order; info entries are flattened as
    /// `infos/<key>` and follow the core fields in key order.
    pub fn fields(&self) -> Vec<(String, &Array)> {
        let mut fields = vec![
            (OBSERVATIONS.to_string(), &self.observations),
            (ACTIONS.to_string(), &self.actions),
            (REWARDS.to_string(), &self.rewards),
            (TERMINALS.to_string(), &self.terminals),
            (TRUNCATIONS.to_string(), &self.truncations),
        ];
        fields.extend(self.infos.iter().map(|(k, v)| (info_field_name(k), v)));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_agent_step() -> Timestep {
        Timestep::new(
            Array::from_f32([2, 3], vec![0.0; 6]).unwrap(),
            Array::vector_i64(vec![1, 0]),
            Array::vector_f32(vec![0.5, 0.5]),
            Array::vector_bool(vec![false, false]),
            Array::vector_bool(vec![false, false]),
            Infos::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_num_agents() {
        assert_eq!(two_agent_step().num_agents(), 2);
    }

    #[test]
    fn test_rejects_inconsistent_agent_counts() {
        let err = Timestep::new(
            Array::from_f32([2, 3], vec![0.0; 6]).unwrap(),
            Array::vector_i64(vec![1, 0, 2]),
            Array::vector_f32(vec![0.5, 0.5]),
            Array::vector_bool(vec![false, false]),
            Array::vector_bool(vec![false, false]),
            Infos::new(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            TimestepError::AgentCountMismatch {
                field: ACTIONS,
                expected: 2,
                actual: 3,
            }
        );
    }

    #[test]
    fn test_rejects_scalar_reward() {
        let err = Timestep::new(
            Array::vector_f32(vec![0.0]),
            Array::vector_i64(vec![0]),
            Array::scalar_f32(1.0),
            Array::vector_bool(vec![false]),
            Array::vector_bool(vec![false]),
            Infos::new(),
        )
        .unwrap_err();
        assert_eq!(err, TimestepError::MissingAgentAxis { field: REWARDS });
    }

    #[test]
    fn test_infos_are_free_form() {
        let mut infos = Infos::new();
        infos.insert("env_state".into(), Array::vector_f32(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
        let step = Timestep::new(
            Array::from_f32([2, 3], vec![0.0; 6]).unwrap(),
            Array::vector_i64(vec![1, 0]),
            Array::vector_f32(vec![0.5, 0.5]),
            Array::vector_bool(vec![false, false]),
            Array::vector_bool(vec![false, false]),
            infos,
        );
        assert!(step.is_ok());
    }

    #[test]
    fn test_expand_batch_time_dims() {
        let step = two_agent_step().expand_batch_time_dims();
        assert_eq!(step.observations.shape(), &[1, 1, 2, 3]);
        assert_eq!(step.rewards.shape(), &[1, 1, 2]);
    }

    #[test]
    fn test_fields_canonical_order() {
        let mut step = two_agent_step();
        step.infos.insert("legal_actions".into(), Array::vector_bool(vec![true, true]));
        step.infos.insert("env_state".into(), Array::vector_f32(vec![0.0]));

        let names: Vec<String> = step.fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "observations",
                "actions",
                "rewards",
                "terminals",
                "truncations",
                "infos/env_state",
                "infos/legal_actions",
            ]
        );
    }
}
