//! Vault snapshots of replay buffer contents.
//!
//! A vault is a directory named `{scenario}.vlt` under an environment
//! directory; each dataset inside it (e.g. `Good`, `Medium`, `Poor`) is a
//! complete, self-describing snapshot of one trajectory buffer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use offline_marl::vault::Vault;
//!
//! let vault = Vault::for_dataset("smac_v1", "3m", "Good", "datasets");
//! vault.write(&state)?;
//!
//! let restored = vault.read()?;
//! assert_eq!(restored.len(), state.len());
//! ```

pub mod vault;

pub use vault::{
    cleanup_tmp_files, list_datasets, vault_name, FieldMetadata, Vault, VaultError,
    VaultMetadata, EXPERIENCE_FILE, METADATA_FILE, VAULT_EXTENSION, VAULT_FORMAT_VERSION,
};
