//! # offline_marl: replay buffers for offline multi-agent RL
//!
//! Stores synchronized multi-agent timesteps in a fixed-capacity ring,
//! samples fixed-length windows for sequence models, and loads or saves the
//! whole buffer as a vault dataset.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ReplayBuffer                          │
//! │   add(timestep) ──► TrajectoryBuffer::add ──► BufferState    │
//! │   sample()      ──► RngKey::split_off ──► windowed gather    │
//! │   populate_from_vault ──► Vault::read ──► compact ──► swap   │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//!          {rel_dir}/{env}/{scenario}.vlt/{dataset}/
//!              experience.safetensors + metadata.json
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use offline_marl::{ReplayBuffer, ReplayBufferConfig};
//!
//! let config = ReplayBufferConfig::new(20)
//!     .with_batch_size(32)
//!     .with_seed(42);
//! let mut buffer = ReplayBuffer::new(config)?;
//!
//! if !buffer.populate_from_vault("smac_v1", "3m", "Good", "vaults") {
//!     log::warn!("dataset missing, collecting online");
//! }
//! let batch = buffer.sample()?;
//! ```

pub mod buffers;
pub mod core;
pub mod vault;

pub use crate::core::array::{Array, ArrayData, DType};
pub use crate::core::rng::RngKey;
pub use crate::core::timestep::{Infos, Timestep};

pub use buffers::error::BufferError;
pub use buffers::experience::Experience;
pub use buffers::replay_buffer::{
    shared_replay_buffer, ReplayBuffer, ReplayBufferConfig, SharedReplayBuffer,
};
pub use buffers::trajectory_buffer::{
    BufferSample, TrajectoryBuffer, TrajectoryBufferConfig, TrajectoryBufferState,
};

pub use vault::{Vault, VaultError, VaultMetadata};
