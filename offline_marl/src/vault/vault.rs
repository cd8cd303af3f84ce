//! Vault: versioned on-disk snapshots of a trajectory buffer.
//!
//! Layout of one dataset:
//!
//! ```text
//! {rel_dir}/{env_name}/{scenario_name}.vlt/{dataset_name}/
//!     experience.safetensors   one tensor per field, shape [1, capacity, ...item]
//!     metadata.json            format version, geometry, field dtypes/shapes
//! ```
//!
//! Both files are staged as `*.tmp`; the old `metadata.json` is removed
//! before anything is renamed into place and the new one lands last, so a
//! dataset directory with a `metadata.json` is always complete. An
//! interrupted overwrite reads as a missing dataset, never a mixed one.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytemuck::cast_slice;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffers::error::BufferError;
use crate::buffers::trajectory_buffer::{FieldColumn, TrajectoryBufferState};
use crate::core::array::{ArrayData, DType};
use crate::core::timestep::{
    ACTIONS, INFO_PREFIX, OBSERVATIONS, REWARDS, TERMINALS, TRUNCATIONS,
};

/// On-disk format version written by this crate.
pub const VAULT_FORMAT_VERSION: u32 = 1;

pub const VAULT_EXTENSION: &str = "vlt";
pub const EXPERIENCE_FILE: &str = "experience.safetensors";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault dataset not found: {0}")]
    NotFound(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("safetensors: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
    #[error("vault format version {found} is not supported (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("corrupt vault: {0}")]
    Corrupt(String),
    #[error("vault holds no timesteps")]
    Empty,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Dtype and per-timestep shape of one stored field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub dtype: DType,
    pub item_shape: Vec<usize>,
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub format_version: u32,
    pub vault_name: String,
    pub vault_uid: String,
    pub capacity: usize,
    pub current_index: usize,
    pub is_full: bool,
    pub fields: BTreeMap<String, FieldMetadata>,
}

impl VaultMetadata {
    /// Timesteps held by the snapshot.
    pub fn num_timesteps(&self) -> usize {
        if self.is_full {
            self.capacity
        } else {
            self.current_index
        }
    }
}

/// Handle on one dataset (`vault_uid`) inside a named vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    vault_name: String,
    vault_uid: String,
    rel_dir: PathBuf,
}

impl Vault {
    pub fn new(
        vault_name: impl Into<String>,
        vault_uid: impl Into<String>,
        rel_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vault_name: vault_name.into(),
            vault_uid: vault_uid.into(),
            rel_dir: rel_dir.into(),
        }
    }

    /// Vault addressed by environment / scenario / dataset names.
    pub fn for_dataset(
        env_name: &str,
        scenario_name: &str,
        dataset_name: &str,
        rel_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            vault_name(env_name, scenario_name),
            dataset_name,
            rel_dir,
        )
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    pub fn vault_uid(&self) -> &str {
        &self.vault_uid
    }

    /// Dataset directory.
    pub fn path(&self) -> PathBuf {
        self.rel_dir.join(&self.vault_name).join(&self.vault_uid)
    }

    /// Whether a complete dataset exists on disk.
    pub fn exists(&self) -> bool {
        self.path().join(METADATA_FILE).is_file()
    }

    /// Snapshot `state`, replacing any dataset already stored under this uid.
    pub fn write(&self, state: &TrajectoryBufferState) -> Result<PathBuf, VaultError> {
        let dir = self.path();
        fs::create_dir_all(&dir)?;

        let capacity = state.capacity();
        let mut encoded: Vec<(String, Dtype, Vec<usize>, Cow<'_, [u8]>)> = Vec::new();
        let mut fields = BTreeMap::new();
        for (name, column) in state.fields() {
            let mut shape = vec![1, capacity];
            shape.extend_from_slice(column.item_shape());
            let (dtype, bytes) = encode(column.data());
            encoded.push((name.clone(), dtype, shape, bytes));
            fields.insert(
                name.clone(),
                FieldMetadata {
                    dtype: column.dtype(),
                    item_shape: column.item_shape().to_vec(),
                },
            );
        }

        let mut tensors: BTreeMap<String, TensorView<'_>> = BTreeMap::new();
        for (name, dtype, shape, bytes) in &encoded {
            tensors.insert(name.clone(), TensorView::new(*dtype, shape.clone(), bytes)?);
        }

        let header: HashMap<String, String> = HashMap::from([
            ("format".to_string(), "offline_marl.vault".to_string()),
            ("format_version".to_string(), VAULT_FORMAT_VERSION.to_string()),
        ]);

        let meta = VaultMetadata {
            format_version: VAULT_FORMAT_VERSION,
            vault_name: self.vault_name.clone(),
            vault_uid: self.vault_uid.clone(),
            capacity,
            current_index: state.current_index(),
            is_full: state.is_full(),
            fields,
        };

        let final_st = dir.join(EXPERIENCE_FILE);
        let tmp_st = final_st.with_extension("safetensors.tmp");
        let final_meta = dir.join(METADATA_FILE);
        let tmp_meta = final_meta.with_extension("json.tmp");

        // Stage both files before touching the live dataset.
        let st_bytes = safetensors::serialize(&tensors, &Some(header))?;
        let meta_bytes = serde_json::to_vec_pretty(&meta)?;
        fs::write(&tmp_st, st_bytes)?;
        if let Err(e) = fs::write(&tmp_meta, meta_bytes) {
            remove_tmp(&tmp_st);
            return Err(e.into());
        }

        // Without metadata the dataset reads as missing until both renames land.
        match fs::remove_file(&final_meta) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                remove_tmp(&tmp_st);
                remove_tmp(&tmp_meta);
                return Err(e.into());
            }
        }
        fs::rename(&tmp_st, &final_st)?;
        fs::rename(&tmp_meta, &final_meta)?;

        log::debug!(
            "Wrote vault {}/{}: {} timesteps, {} fields",
            self.vault_name,
            self.vault_uid,
            state.len(),
            meta.fields.len()
        );
        Ok(dir)
    }

    /// Read and check `metadata.json`.
    pub fn read_metadata(&self) -> Result<VaultMetadata, VaultError> {
        let path = self.path().join(METADATA_FILE);
        if !path.is_file() {
            return Err(VaultError::NotFound(self.path()));
        }
        let meta: VaultMetadata = serde_json::from_slice(&fs::read(&path)?)?;
        if meta.format_version != VAULT_FORMAT_VERSION {
            return Err(VaultError::VersionMismatch {
                expected: VAULT_FORMAT_VERSION,
                found: meta.format_version,
            });
        }
        check_field_set(&meta.fields)?;
        Ok(meta)
    }

    /// Restore the stored buffer state exactly as it was written.
    pub fn read(&self) -> Result<TrajectoryBufferState, VaultError> {
        let meta = self.read_metadata()?;
        if meta.num_timesteps() == 0 {
            return Err(VaultError::Empty);
        }

        let bytes = fs::read(self.path().join(EXPERIENCE_FILE))?;
        let tensors = SafeTensors::deserialize(&bytes)?;
        if tensors.len() != meta.fields.len() {
            return Err(VaultError::Corrupt(format!(
                "{} tensors stored, metadata lists {} fields",
                tensors.len(),
                meta.fields.len()
            )));
        }

        let mut experience = BTreeMap::new();
        for (name, field) in &meta.fields {
            let view = tensors
                .tensor(name)
                .map_err(|_| VaultError::Corrupt(format!("missing tensor `{name}`")))?;

            let mut expected = vec![1, meta.capacity];
            expected.extend_from_slice(&field.item_shape);
            if view.shape() != expected.as_slice() {
                return Err(VaultError::Corrupt(format!(
                    "tensor `{name}` has shape {:?}, expected {:?}",
                    view.shape(),
                    expected
                )));
            }

            let item_len: usize = field.item_shape.iter().product();
            let expected_bytes = meta.capacity * item_len * field.dtype.size_in_bytes();
            if view.data().len() != expected_bytes {
                return Err(VaultError::Corrupt(format!(
                    "tensor `{name}` holds {} bytes, expected {expected_bytes}",
                    view.data().len()
                )));
            }

            let data = decode(name, field.dtype, view.dtype(), view.data())?;
            let column =
                FieldColumn::from_parts(name, field.item_shape.clone(), meta.capacity, data)?;
            experience.insert(name.clone(), column);
        }

        let state = TrajectoryBufferState::from_parts(
            experience,
            meta.current_index,
            meta.is_full,
            meta.capacity,
        )?;

        log::debug!(
            "Read vault {}/{}: {} timesteps",
            self.vault_name,
            self.vault_uid,
            state.len()
        );
        Ok(state)
    }
}

/// `{env_name}/{scenario_name}.vlt`
pub fn vault_name(env_name: &str, scenario_name: &str) -> String {
    format!("{env_name}/{scenario_name}.{VAULT_EXTENSION}")
}

/// Dataset uids with a complete snapshot inside `rel_dir/vault_name`, sorted.
pub fn list_datasets(
    rel_dir: impl AsRef<Path>,
    vault_name: &str,
) -> Result<Vec<String>, VaultError> {
    let dir = rel_dir.as_ref().join(vault_name);
    if !dir.is_dir() {
        return Err(VaultError::NotFound(dir));
    }

    let mut uids: Vec<String> = fs::read_dir(&dir)?
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {e}", dir.display());
                None
            }
        })
        .filter(|e| e.path().join(METADATA_FILE).is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    uids.sort();
    Ok(uids)
}

/// Remove temporaries left behind by an interrupted write.
pub fn cleanup_tmp_files(dir: &Path) -> Result<(), VaultError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            if name.ends_with(".tmp") {
                remove_tmp(&path);
            }
        }
    }
    Ok(())
}

fn remove_tmp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }
}

/// A snapshot must hold the five core fields; anything else is an info entry.
fn check_field_set(fields: &BTreeMap<String, FieldMetadata>) -> Result<(), VaultError> {
    let core = [OBSERVATIONS, ACTIONS, REWARDS, TERMINALS, TRUNCATIONS];
    if let Some(missing) = core.iter().find(|name| !fields.contains_key(**name)) {
        return Err(VaultError::Corrupt(format!("missing core field `{missing}`")));
    }
    if let Some(stray) = fields
        .keys()
        .find(|name| !core.contains(&name.as_str()) && !name.starts_with(INFO_PREFIX))
    {
        return Err(VaultError::Corrupt(format!("unknown field `{stray}`")));
    }
    Ok(())
}

fn encode(data: &ArrayData) -> (Dtype, Cow<'_, [u8]>) {
    match data {
        ArrayData::F32(v) => (Dtype::F32, Cow::Borrowed(cast_slice(v))),
        ArrayData::I64(v) => (Dtype::I64, Cow::Borrowed(cast_slice(v))),
        ArrayData::Bool(v) => (Dtype::BOOL, Cow::Owned(v.iter().map(|&b| b as u8).collect())),
    }
}

fn decode(name: &str, dtype: DType, stored: Dtype, bytes: &[u8]) -> Result<ArrayData, VaultError> {
    let data = match (dtype, stored) {
        (DType::F32, Dtype::F32) => ArrayData::F32(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        (DType::I64, Dtype::I64) => ArrayData::I64(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    i64::from_le_bytes(b)
                })
                .collect(),
        ),
        (DType::Bool, Dtype::BOOL) => ArrayData::Bool(bytes.iter().map(|&b| b != 0).collect()),
        (expected, found) => {
            return Err(VaultError::Corrupt(format!(
                "tensor `{name}` stored as {found:?}, metadata says {expected}"
            )))
        }
    };
    Ok(data)
}
