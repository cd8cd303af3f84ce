//! Sampled batch bundle handed to the training side.
//!
//! Field names match [`Timestep`](crate::core::timestep::Timestep); each array
//! now carries `[batch, time, ...]` leading dimensions. Consumers should look
//! fields up by name and make no assumption about how the buffer stores them.

use std::collections::BTreeMap;

use crate::core::array::Array;
use crate::core::timestep::{
    info_field_name, Infos, ACTIONS, INFO_PREFIX, OBSERVATIONS, REWARDS, TERMINALS, TRUNCATIONS,
};

use super::error::BufferError;

/// A batch of fixed-length windows, batch-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub observations: Array,
    pub actions: Array,
    pub rewards: Array,
    pub terminals: Array,
    pub truncations: Array,
    pub infos: Infos,
}

impl Experience {
    /// Rebuild the named bundle from flattened `name -> array` pairs.
    pub(crate) fn from_fields(mut fields: BTreeMap<String, Array>) -> Result<Self, BufferError> {
        let mut take = |name: &str| {
            fields.remove(name).ok_or_else(|| BufferError::FieldMismatch {
                expected: vec![name.to_string()],
                actual: Vec::new(),
            })
        };
        let observations = take(OBSERVATIONS)?;
        let actions = take(ACTIONS)?;
        let rewards = take(REWARDS)?;
        let terminals = take(TERMINALS)?;
        let truncations = take(TRUNCATIONS)?;

        let mut infos = Infos::new();
        for (name, array) in fields {
            match name.strip_prefix(INFO_PREFIX) {
                Some(key) => {
                    infos.insert(key.to_string(), array);
                }
                None => {
                    return Err(BufferError::FieldMismatch {
                        expected: Vec::new(),
                        actual: vec![name],
                    })
                }
            }
        }

        Ok(Self {
            observations,
            actions,
            rewards,
            terminals,
            truncations,
            infos,
        })
    }

    /// Look a field up by its canonical name (`"rewards"`, `"infos/legal_actions"`).
    pub fn get(&self, name: &str) -> Option<&Array> {
        match name {
            OBSERVATIONS => Some(&self.observations),
            ACTIONS => Some(&self.actions),
            REWARDS => Some(&self.rewards),
            TERMINALS => Some(&self.terminals),
            TRUNCATIONS => Some(&self.truncations),
            other => other
                .strip_prefix(INFO_PREFIX)
                .and_then(|key| self.infos.get(key)),
        }
    }

    /// Number of windows in the batch.
    pub fn batch_size(&self) -> usize {
        self.rewards.shape().first().copied().unwrap_or(0)
    }

    /// Length of every window.
    pub fn sequence_length(&self) -> usize {
        self.rewards.shape().get(1).copied().unwrap_or(0)
    }

    /// All fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (String, &Array)> {
        [
            (OBSERVATIONS, &self.observations),
            (ACTIONS, &self.actions),
            (REWARDS, &self.rewards),
            (TERMINALS, &self.terminals),
            (TRUNCATIONS, &self.truncations),
        ]
        .into_iter()
        .map(|(name, array)| (name.to_string(), array))
        .chain(self.infos.iter().map(|(k, v)| (info_field_name(k), v)))
    }
}
