//! Replay buffers for offline multi-agent training.
//!
//! - `TrajectoryBuffer`: fixed-capacity ring over one trajectory stream, with
//!   windowed sampling driven by an explicit `RngKey`
//! - `ReplayBuffer`: facade that owns the buffer state and key, allocates
//!   lazily on the first add, and loads/stores vault datasets
//! - `Experience`: sampled batch, fields shaped `[batch, time, ...]`

pub mod error;
pub mod experience;
pub mod replay_buffer;
pub mod trajectory_buffer;

pub use error::BufferError;
pub use experience::Experience;
pub use replay_buffer::{shared_replay_buffer, ReplayBuffer, ReplayBufferConfig, SharedReplayBuffer};
pub use trajectory_buffer::{
    BufferSample, FieldColumn, TrajectoryBuffer, TrajectoryBufferConfig, TrajectoryBufferState,
};
