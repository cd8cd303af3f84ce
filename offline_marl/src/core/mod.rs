//! Core value types shared by the buffers and the vault.

pub mod array;
pub mod rng;
pub mod timestep;

pub use array::{Array, ArrayData, ArrayError, DType};
pub use rng::RngKey;
pub use timestep::{Infos, Timestep, TimestepError};
