//! Replay buffer facade used by offline training code.
//!
//! Owns the trajectory buffer geometry, its state and the sampling key, and
//! exposes the three operations training needs: append a timestep, draw a
//! batch of windows, and load a recorded dataset from a vault.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --add / populate_from_vault--> Active
//! Active --populate_from_vault--> Active (geometry replaced)
//! ```
//!
//! Storage is allocated on the first `add`, shaped after that timestep.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut buffer = ReplayBuffer::new(ReplayBufferConfig::new(20).with_batch_size(32))?;
//! if !buffer.populate_from_vault("smac_v1", "3m", "Good", "datasets") {
//!     // fall back to collecting online
//! }
//! let batch = buffer.sample()?;
//! let rewards = batch.rewards.to_tensor_data();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::array::Array;
use crate::core::rng::RngKey;
use crate::core::timestep::{Infos, Timestep};
use crate::vault::{Vault, VaultError};

use super::error::BufferError;
use super::experience::Experience;
use super::trajectory_buffer::{
    BufferSample, TrajectoryBuffer, TrajectoryBufferConfig, TrajectoryBufferState,
};

/// Configuration for the replay buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayBufferConfig {
    /// Timesteps per sampled window.
    pub sequence_length: usize,
    /// Ring capacity. Replaced by the dataset size after a vault load.
    pub max_size: usize,
    /// Windows per sample.
    pub batch_size: usize,
    /// Stride between eligible window starts.
    pub sample_period: usize,
    /// Seed of the sampling key.
    pub seed: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            sequence_length: 20,
            max_size: 50_000,
            batch_size: 32,
            sample_period: 1,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    pub fn new(sequence_length: usize) -> Self {
        Self {
            sequence_length,
            ..Default::default()
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_sample_period(mut self, sample_period: usize) -> Self {
        self.sample_period = sample_period;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), BufferError> {
        self.trajectory_config().validate()
    }

    fn trajectory_config(&self) -> TrajectoryBufferConfig {
        TrajectoryBufferConfig::new(self.max_size, self.batch_size, self.sequence_length)
            .with_period(self.sample_period)
            .with_min_length_time_axis(1)
    }
}

enum BufferSlot {
    Uninitialized,
    Active(TrajectoryBufferState),
}

/// Single-writer replay buffer over one trajectory stream.
pub struct ReplayBuffer {
    config: ReplayBufferConfig,
    buffer: TrajectoryBuffer,
    slot: BufferSlot,
    rng_key: RngKey,
}

impl ReplayBuffer {
    pub fn new(config: ReplayBufferConfig) -> Result<Self, BufferError> {
        let buffer = TrajectoryBuffer::new(config.trajectory_config())?;
        Ok(Self {
            rng_key: RngKey::new(config.seed),
            slot: BufferSlot::Uninitialized,
            buffer,
            config,
        })
    }

    /// Current geometry; a vault load rewrites `max_size` and `sample_period`.
    pub fn config(&self) -> &ReplayBufferConfig {
        &self.config
    }

    /// Current ring capacity.
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.slot, BufferSlot::Active(_))
    }

    /// Stored timesteps.
    pub fn len(&self) -> usize {
        self.state().map_or(0, TrajectoryBufferState::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn can_sample(&self) -> bool {
        self.state().is_some_and(|s| self.buffer.can_sample(s))
    }

    /// Buffer contents, once initialized.
    pub fn state(&self) -> Option<&TrajectoryBufferState> {
        match &self.slot {
            BufferSlot::Active(state) => Some(state),
            BufferSlot::Uninitialized => None,
        }
    }

    /// Append one timestep from per-agent arrays.
    pub fn add(
        &mut self,
        observations: Array,
        actions: Array,
        rewards: Array,
        terminals: Array,
        truncations: Array,
        infos: Infos,
    ) -> Result<(), BufferError> {
        let timestep = Timestep::new(observations, actions, rewards, terminals, truncations, infos)?;
        self.add_timestep(timestep)
    }

    /// Append one timestep; the first call allocates storage shaped after it.
    pub fn add_timestep(&mut self, timestep: Timestep) -> Result<(), BufferError> {
        match &mut self.slot {
            BufferSlot::Active(state) => {
                self.buffer.add(state, &timestep.expand_batch_time_dims())
            }
            BufferSlot::Uninitialized => {
                let mut state = self.buffer.init(&timestep);
                self.buffer.add(&mut state, &timestep.expand_batch_time_dims())?;
                self.slot = BufferSlot::Active(state);
                Ok(())
            }
        }
    }

    /// Draw a batch of windows shaped `[batch_size, sequence_length, ...]`.
    pub fn sample(&mut self) -> Result<Experience, BufferError> {
        self.sample_with_indices().map(|s| s.experience)
    }

    /// Like [`sample`](Self::sample), also reporting each window's start slot.
    ///
    /// The key advances only when a batch is actually drawn.
    pub fn sample_with_indices(&mut self) -> Result<BufferSample, BufferError> {
        let BufferSlot::Active(state) = &self.slot else {
            return Err(BufferError::Uninitialized);
        };

        let mut key = self.rng_key.clone();
        let sub_key = key.split_off();
        let sample = self.buffer.sample(state, sub_key)?;
        self.rng_key = key;
        Ok(sample)
    }

    /// Replace the buffer with a recorded dataset.
    ///
    /// Returns `false` (leaving the buffer untouched) if the dataset is
    /// missing or unreadable.
    pub fn populate_from_vault(
        &mut self,
        env_name: &str,
        scenario_name: &str,
        dataset_name: &str,
        rel_dir: impl AsRef<Path>,
    ) -> bool {
        match self.try_populate_from_vault(env_name, scenario_name, dataset_name, rel_dir) {
            Ok(_) => true,
            Err(e) => {
                log::warn!(
                    "Could not populate replay buffer from vault {env_name}/{scenario_name}/{dataset_name}: {e}"
                );
                false
            }
        }
    }

    /// Replace the buffer with a recorded dataset, returning its size.
    ///
    /// The dataset size becomes the new `max_size` and sampling switches to
    /// period 1 so every start in the dataset is eligible. On error nothing
    /// changes.
    pub fn try_populate_from_vault(
        &mut self,
        env_name: &str,
        scenario_name: &str,
        dataset_name: &str,
        rel_dir: impl AsRef<Path>,
    ) -> Result<usize, VaultError> {
        let vault = Vault::for_dataset(
            env_name,
            scenario_name,
            dataset_name,
            rel_dir.as_ref().to_path_buf(),
        );
        let state = vault.read()?.compact()?;

        let max_size = state.capacity();
        let config = self
            .config
            .clone()
            .with_max_size(max_size)
            .with_sample_period(1);
        let buffer = TrajectoryBuffer::new(config.trajectory_config())?;

        self.config = config;
        self.buffer = buffer;
        self.slot = BufferSlot::Active(state);

        log::debug!(
            "Populated replay buffer from {}/{}: max_size={}",
            vault.vault_name(),
            dataset_name,
            max_size
        );
        Ok(max_size)
    }

    /// Snapshot the buffer into a vault dataset.
    pub fn write_to_vault(
        &self,
        env_name: &str,
        scenario_name: &str,
        dataset_name: &str,
        rel_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, VaultError> {
        let state = self.state().ok_or(BufferError::Uninitialized)?;
        Vault::for_dataset(
            env_name,
            scenario_name,
            dataset_name,
            rel_dir.as_ref().to_path_buf(),
        )
        .write(state)
    }
}

/// Replay buffer shared between threads; the lock serializes key splits.
pub type SharedReplayBuffer = Arc<Mutex<ReplayBuffer>>;

/// Create a new shared replay buffer.
pub fn shared_replay_buffer(config: ReplayBufferConfig) -> Result<SharedReplayBuffer, BufferError> {
    Ok(Arc::new(Mutex::new(ReplayBuffer::new(config)?)))
}
