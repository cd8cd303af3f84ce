//! Fixed-capacity trajectory buffer with windowed sampling.
//!
//! Key characteristics:
//! - **Ring storage** along the time axis; once full, the oldest timestep is
//!   overwritten by the newest append
//! - **Single row** (`add_batch_size == 1`): one continuous trajectory stream
//! - **Preallocated** per-field columns, sized from the first timestep; adds
//!   are slice copies, never reallocations
//! - **Windowed sampling**: i.i.d. uniform starts (with replacement) among
//!   the eligible offsets, each yielding a contiguous window of
//!   `sample_sequence_length` steps
//!
//! The buffer itself (`TrajectoryBuffer`) holds only geometry. All data lives
//! in a separate `TrajectoryBufferState` value that callers own and pass in,
//! so one geometry can be rebuilt around an existing state (as happens when a
//! vault is loaded).
//!
//! # Eligible offsets
//!
//! Time positions are counted from the oldest live slot: slot 0 before the
//! first wrap, `current_index` afterwards. A logical start `k * period` is
//! eligible when `k * period + sequence_length` does not exceed the number of
//! live timesteps. Windows therefore never straddle the write head and never
//! read slots that were not written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::array::{Array, ArrayData, DType};
use crate::core::rng::RngKey;
use crate::core::timestep::Timestep;

use super::error::BufferError;
use super::experience::Experience;

// ============================================================================
// Configuration
// ============================================================================

/// Geometry of a trajectory buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryBufferConfig {
    /// Ring capacity along the time axis.
    pub max_length_time_axis: usize,
    /// Rows written per add. Only a single row is supported.
    pub add_batch_size: usize,
    /// Windows per sample.
    pub sample_batch_size: usize,
    /// Timesteps per window.
    pub sample_sequence_length: usize,
    /// Stride between eligible window starts.
    pub period: usize,
    /// Timesteps that must be stored before sampling is allowed.
    pub min_length_time_axis: usize,
}

impl Default for TrajectoryBufferConfig {
    fn default() -> Self {
        Self {
            max_length_time_axis: 50_000,
            add_batch_size: 1,
            sample_batch_size: 32,
            sample_sequence_length: 20,
            period: 1,
            min_length_time_axis: 1,
        }
    }
}

impl TrajectoryBufferConfig {
    pub fn new(
        max_length_time_axis: usize,
        sample_batch_size: usize,
        sample_sequence_length: usize,
    ) -> Self {
        Self {
            max_length_time_axis,
            sample_batch_size,
            sample_sequence_length,
            ..Default::default()
        }
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    pub fn with_min_length_time_axis(mut self, min_length: usize) -> Self {
        self.min_length_time_axis = min_length;
        self
    }

    pub fn with_add_batch_size(mut self, add_batch_size: usize) -> Self {
        self.add_batch_size = add_batch_size;
        self
    }

    /// Check the geometry is usable.
    pub fn validate(&self) -> Result<(), BufferError> {
        let fail = |msg: String| Err(BufferError::InvalidConfig(msg));
        if self.max_length_time_axis == 0 {
            return fail("max_length_time_axis must be > 0".into());
        }
        if self.add_batch_size != 1 {
            return fail(format!(
                "add_batch_size must be 1 (single trajectory row), got {}",
                self.add_batch_size
            ));
        }
        if self.sample_batch_size == 0 {
            return fail("sample_batch_size must be > 0".into());
        }
        if self.sample_sequence_length == 0 {
            return fail("sample_sequence_length must be > 0".into());
        }
        if self.period == 0 {
            return fail("period must be > 0".into());
        }
        if self.sample_sequence_length > self.max_length_time_axis {
            return fail(format!(
                "sample_sequence_length ({}) exceeds max_length_time_axis ({})",
                self.sample_sequence_length, self.max_length_time_axis
            ));
        }
        if self.min_length_time_axis > self.max_length_time_axis {
            return fail(format!(
                "min_length_time_axis ({}) exceeds max_length_time_axis ({})",
                self.min_length_time_axis, self.max_length_time_axis
            ));
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

/// Preallocated storage for one field.
///
/// Holds `capacity` items of `item_shape` back to back; the single row
/// dimension is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldColumn {
    dtype: DType,
    item_shape: Vec<usize>,
    item_len: usize,
    data: ArrayData,
}

impl FieldColumn {
    fn zeros(dtype: DType, item_shape: Vec<usize>, capacity: usize) -> Self {
        let item_len = item_shape.iter().product();
        Self {
            dtype,
            data: ArrayData::zeros(dtype, capacity * item_len),
            item_shape,
            item_len,
        }
    }

    /// Rebuild a column from raw storage, checking its length.
    pub(crate) fn from_parts(
        name: &str,
        item_shape: Vec<usize>,
        capacity: usize,
        data: ArrayData,
    ) -> Result<Self, BufferError> {
        let item_len: usize = item_shape.iter().product();
        if data.len() != capacity * item_len {
            let mut expected = vec![1, capacity];
            expected.extend_from_slice(&item_shape);
            return Err(BufferError::ShapeMismatch {
                field: name.to_string(),
                expected,
                actual: vec![data.len()],
            });
        }
        Ok(Self {
            dtype: data.dtype(),
            item_shape,
            item_len,
            data,
        })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Shape of a single stored item (no row or time axis).
    pub fn item_shape(&self) -> &[usize] {
        &self.item_shape
    }

    /// Raw storage, `capacity * item_len` elements in slot order.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Append `len` items starting at slot `start` to `out`, wrapping at
    /// `capacity`. At most two slice copies.
    fn gather(&self, capacity: usize, start: usize, len: usize, out: &mut ArrayData) {
        let item = self.item_len;
        let first = len.min(capacity - start);
        out.extend_from_range(&self.data, start * item..(start + first) * item);
        if len > first {
            out.extend_from_range(&self.data, 0..(len - first) * item);
        }
    }

    /// Write `n` items from `src` starting at slot `start`, wrapping at
    /// `capacity`.
    fn scatter(&mut self, capacity: usize, start: usize, n: usize, src: &ArrayData) {
        let item = self.item_len;
        let first = n.min(capacity - start);
        self.data.copy_range_from(start * item, src, 0..first * item);
        if n > first {
            self.data.copy_range_from(0, src, first * item..n * item);
        }
    }
}

/// Contents of a trajectory buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBufferState {
    experience: BTreeMap<String, FieldColumn>,
    current_index: usize,
    is_full: bool,
    capacity: usize,
}

impl TrajectoryBufferState {
    /// Rebuild a state from stored parts (used by vault reads).
    pub(crate) fn from_parts(
        experience: BTreeMap<String, FieldColumn>,
        current_index: usize,
        is_full: bool,
        capacity: usize,
    ) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidConfig("capacity must be > 0".into()));
        }
        if current_index >= capacity {
            return Err(BufferError::InvalidConfig(format!(
                "current_index {current_index} out of range for capacity {capacity}"
            )));
        }
        if experience.is_empty() {
            return Err(BufferError::InvalidConfig("state has no fields".into()));
        }
        Ok(Self {
            experience,
            current_index,
            is_full,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next slot to be written.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Whether the write cursor has wrapped at least once.
    pub fn is_full(&self) -> bool {
        self.is_full
    }

    /// Live timesteps.
    pub fn len(&self) -> usize {
        if self.is_full {
            self.capacity
        } else {
            self.current_index
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot holding the oldest live timestep.
    pub fn oldest_index(&self) -> usize {
        if self.is_full {
            self.current_index
        } else {
            0
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.experience.keys().cloned().collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldColumn> {
        self.experience.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldColumn)> {
        self.experience.iter()
    }

    /// Live timesteps of one field, oldest first, shaped `[len, ...item]`.
    pub fn ordered(&self, name: &str) -> Option<Array> {
        let column = self.experience.get(name)?;
        let len = self.len();
        let mut out = ArrayData::with_capacity(column.dtype, len * column.item_len);
        column.gather(self.capacity, self.oldest_index(), len, &mut out);
        let mut shape = vec![len];
        shape.extend_from_slice(&column.item_shape);
        Array::new(shape, out).ok()
    }

    /// Copy the live timesteps into a state whose capacity equals the
    /// occupancy: oldest first, cursor at 0, marked full.
    pub fn compact(&self) -> Result<Self, BufferError> {
        let len = self.len();
        if len == 0 {
            return Err(BufferError::InsufficientData {
                available: 0,
                required: 1,
            });
        }

        let oldest = self.oldest_index();
        let experience = self
            .experience
            .iter()
            .map(|(name, column)| {
                let mut data = ArrayData::with_capacity(column.dtype, len * column.item_len);
                column.gather(self.capacity, oldest, len, &mut data);
                let compacted = FieldColumn {
                    dtype: column.dtype,
                    item_shape: column.item_shape.clone(),
                    item_len: column.item_len,
                    data,
                };
                (name.clone(), compacted)
            })
            .collect();

        Ok(Self {
            experience,
            current_index: 0,
            is_full: true,
            capacity: len,
        })
    }
}

// ============================================================================
// Sampling output
// ============================================================================

/// Result of one sample call.
#[derive(Debug, Clone)]
pub struct BufferSample {
    /// Windows shaped `[batch, time, ...]` per field.
    pub experience: Experience,
    /// Physical slot where each window starts.
    pub start_indices: Vec<usize>,
}

// ============================================================================
// Buffer functions
// ============================================================================

/// Trajectory buffer bound to a fixed geometry.
#[derive(Debug, Clone)]
pub struct TrajectoryBuffer {
    config: TrajectoryBufferConfig,
}

impl TrajectoryBuffer {
    pub fn new(config: TrajectoryBufferConfig) -> Result<Self, BufferError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrajectoryBufferConfig {
        &self.config
    }

    /// Allocate zeroed storage shaped after a single, un-batched timestep.
    pub fn init(&self, example: &Timestep) -> TrajectoryBufferState {
        let capacity = self.config.max_length_time_axis;
        let experience: BTreeMap<String, FieldColumn> = example
            .fields()
            .into_iter()
            .map(|(name, array)| {
                let column = FieldColumn::zeros(array.dtype(), array.shape().to_vec(), capacity);
                (name, column)
            })
            .collect();

        log::debug!(
            "Initialized trajectory buffer: capacity={}, fields={:?}",
            capacity,
            experience.keys().collect::<Vec<_>>()
        );

        TrajectoryBufferState {
            experience,
            current_index: 0,
            is_full: false,
            capacity,
        }
    }

    /// Append timesteps shaped `[1, steps, ...item]` at the write cursor.
    ///
    /// Every field is checked against the state before anything is written,
    /// so an error leaves the state unchanged.
    pub fn add(
        &self,
        state: &mut TrajectoryBufferState,
        steps: &Timestep,
    ) -> Result<(), BufferError> {
        let (incoming, n) = self.check_add(state, steps)?;
        if n == 0 {
            return Ok(());
        }

        let capacity = state.capacity;
        let start = state.current_index;
        // Key sets are identical and both maps iterate in key order.
        for (column, array) in state.experience.values_mut().zip(incoming.values()) {
            column.scatter(capacity, start, n, array.data());
        }

        let next = start + n;
        state.is_full |= next >= capacity;
        state.current_index = next % capacity;
        Ok(())
    }

    fn check_add<'a>(
        &self,
        state: &TrajectoryBufferState,
        steps: &'a Timestep,
    ) -> Result<(BTreeMap<String, &'a Array>, usize), BufferError> {
        let incoming: BTreeMap<String, &Array> = steps.fields().into_iter().collect();

        if !incoming.keys().eq(state.experience.keys()) {
            return Err(BufferError::FieldMismatch {
                expected: state.field_names(),
                actual: incoming.keys().cloned().collect(),
            });
        }

        let mut steps_in_add = None;
        for ((name, array), column) in incoming.iter().zip(state.experience.values()) {
            if array.dtype() != column.dtype {
                return Err(BufferError::DTypeMismatch {
                    field: name.clone(),
                    expected: column.dtype,
                    actual: array.dtype(),
                });
            }

            let shape = array.shape();
            let n = steps_in_add.unwrap_or_else(|| shape.get(1).copied().unwrap_or(1));
            let well_formed = shape.len() == column.item_shape.len() + 2
                && shape[0] == self.config.add_batch_size
                && shape[1] == n
                && shape[2..] == column.item_shape[..];
            if !well_formed {
                let mut expected = vec![self.config.add_batch_size, n];
                expected.extend_from_slice(&column.item_shape);
                return Err(BufferError::ShapeMismatch {
                    field: name.clone(),
                    expected,
                    actual: shape.to_vec(),
                });
            }
            steps_in_add = Some(n);
        }

        let n = steps_in_add.unwrap_or(0);
        if n > state.capacity {
            return Err(BufferError::AddTooLong {
                steps: n,
                capacity: state.capacity,
            });
        }
        Ok((incoming, n))
    }

    /// Number of eligible window starts in `state`.
    pub fn num_valid_items(&self, state: &TrajectoryBufferState) -> usize {
        let seq_len = self.config.sample_sequence_length;
        let live = state.len();
        if live < seq_len {
            return 0;
        }
        (live - seq_len) / self.config.period + 1
    }

    /// Whether `sample` would succeed on `state`.
    pub fn can_sample(&self, state: &TrajectoryBufferState) -> bool {
        state.len() >= self.config.min_length_time_axis && self.num_valid_items(state) > 0
    }

    /// Draw `sample_batch_size` windows using `key`.
    pub fn sample(
        &self,
        state: &TrajectoryBufferState,
        mut key: RngKey,
    ) -> Result<BufferSample, BufferError> {
        if !self.can_sample(state) {
            return Err(BufferError::InsufficientData {
                available: state.len(),
                required: self
                    .config
                    .sample_sequence_length
                    .max(self.config.min_length_time_axis),
            });
        }

        let batch_size = self.config.sample_batch_size;
        let seq_len = self.config.sample_sequence_length;
        let num_items = self.num_valid_items(state);
        let oldest = state.oldest_index();

        let start_indices: Vec<usize> = (0..batch_size)
            .map(|_| (oldest + key.uniform_index(num_items) * self.config.period) % state.capacity)
            .collect();

        let mut fields = BTreeMap::new();
        for (name, column) in &state.experience {
            let mut out =
                ArrayData::with_capacity(column.dtype, batch_size * seq_len * column.item_len);
            for &start in &start_indices {
                column.gather(state.capacity, start, seq_len, &mut out);
            }
            let mut shape = vec![batch_size, seq_len];
            shape.extend_from_slice(&column.item_shape);
            fields.insert(name.clone(), Array::new(shape, out)?);
        }

        Ok(BufferSample {
            experience: Experience::from_fields(fields)?,
            start_indices,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timestep::{Infos, REWARDS};

    /// Single-agent timestep whose every field encodes `value`.
    fn make_step(value: f32) -> Timestep {
        Timestep::new(
            Array::from_f32([1, 2], vec![value, value + 0.5]).unwrap(),
            Array::vector_i64(vec![value as i64]),
            Array::vector_f32(vec![value]),
            Array::vector_bool(vec![false]),
            Array::vector_bool(vec![false]),
            Infos::new(),
        )
        .unwrap()
    }

    fn buffer(capacity: usize, batch: usize, seq_len: usize) -> TrajectoryBuffer {
        TrajectoryBuffer::new(TrajectoryBufferConfig::new(capacity, batch, seq_len)).unwrap()
    }

    fn filled(buf: &TrajectoryBuffer, n: usize) -> TrajectoryBufferState {
        let mut state = buf.init(&make_step(0.0));
        for i in 0..n {
            buf.add(&mut state, &make_step(i as f32).expand_batch_time_dims())
                .unwrap();
        }
        state
    }

    fn ordered_rewards(state: &TrajectoryBufferState) -> Vec<f32> {
        state.ordered(REWARDS).unwrap().to_f32_vec()
    }

    #[test]
    fn test_config_validation() {
        assert!(TrajectoryBufferConfig::new(10, 2, 3).validate().is_ok());
        assert!(TrajectoryBufferConfig::new(0, 2, 3).validate().is_err());
        assert!(TrajectoryBufferConfig::new(10, 0, 3).validate().is_err());
        assert!(TrajectoryBufferConfig::new(10, 2, 11).validate().is_err());
        assert!(TrajectoryBufferConfig::new(10, 2, 3)
            .with_period(0)
            .validate()
            .is_err());
        assert!(TrajectoryBufferConfig::new(10, 2, 3)
            .with_add_batch_size(4)
            .validate()
            .is_err());
    }

    #[test]
    fn test_init_allocates_capacity() {
        let buf = buffer(8, 1, 2);
        let state = buf.init(&make_step(0.0));

        assert_eq!(state.capacity(), 8);
        assert_eq!(state.current_index(), 0);
        assert!(!state.is_full());
        assert!(state.is_empty());

        let obs = state.field("observations").unwrap();
        assert_eq!(obs.item_shape(), &[1, 2]);
        assert_eq!(obs.data().len(), 16);
    }

    #[test]
    fn test_add_advances_cursor_and_wraps() {
        let buf = buffer(3, 1, 1);
        let mut state = filled(&buf, 2);
        assert_eq!(state.current_index(), 2);
        assert!(!state.is_full());

        buf.add(&mut state, &make_step(2.0).expand_batch_time_dims())
            .unwrap();
        assert_eq!(state.current_index(), 0);
        assert!(state.is_full());
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_ring_keeps_most_recent() {
        let buf = buffer(5, 1, 1);
        let state = filled(&buf, 7);
        assert_eq!(ordered_rewards(&state), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_add_rejects_shape_mismatch_without_mutation() {
        let buf = buffer(4, 1, 1);
        let mut state = filled(&buf, 2);
        let before = state.clone();

        let wrong = Timestep::new(
            Array::from_f32([1, 3], vec![0.0; 3]).unwrap(),
            Array::vector_i64(vec![0]),
            Array::vector_f32(vec![9.0]),
            Array::vector_bool(vec![false]),
            Array::vector_bool(vec![false]),
            Infos::new(),
        )
        .unwrap()
        .expand_batch_time_dims();

        let err = buf.add(&mut state, &wrong).unwrap_err();
        assert!(matches!(err, BufferError::ShapeMismatch { ref field, .. } if field == "observations"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_add_rejects_dtype_mismatch() {
        let buf = buffer(4, 1, 1);
        let mut state = filled(&buf, 1);
        let mut step = make_step(1.0);
        step.actions = Array::vector_f32(vec![1.0]);

        let err = buf
            .add(&mut state, &step.expand_batch_time_dims())
            .unwrap_err();
        assert!(matches!(err, BufferError::DTypeMismatch { .. }));
    }

    #[test]
    fn test_add_rejects_unexpanded_timestep() {
        let buf = buffer(4, 1, 1);
        let mut state = filled(&buf, 1);
        let err = buf.add(&mut state, &make_step(1.0)).unwrap_err();
        assert!(matches!(err, BufferError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_add_rejects_new_info_field() {
        let buf = buffer(4, 1, 1);
        let mut state = filled(&buf, 1);
        let mut step = make_step(1.0);
        step.infos.insert("legal_actions".into(), Array::vector_bool(vec![true]));

        let err = buf
            .add(&mut state, &step.expand_batch_time_dims())
            .unwrap_err();
        assert!(matches!(err, BufferError::FieldMismatch { .. }));
    }

    #[test]
    fn test_bulk_add_wraps() {
        let buf = buffer(4, 1, 1);
        let mut state = filled(&buf, 3);

        // Three steps at once, starting at slot 3: slots 3, 0, 1.
        let bulk = Timestep {
            observations: Array::from_f32([1, 3, 1, 2], vec![0.0; 6]).unwrap(),
            actions: Array::from_i64([1, 3, 1], vec![10, 11, 12]).unwrap(),
            rewards: Array::from_f32([1, 3, 1], vec![10.0, 11.0, 12.0]).unwrap(),
            terminals: Array::from_bool([1, 3, 1], vec![false; 3]).unwrap(),
            truncations: Array::from_bool([1, 3, 1], vec![false; 3]).unwrap(),
            infos: Infos::new(),
        };
        buf.add(&mut state, &bulk).unwrap();

        assert!(state.is_full());
        assert_eq!(state.current_index(), 2);
        assert_eq!(ordered_rewards(&state), vec![2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_add_rejects_more_steps_than_capacity() {
        let buf = buffer(2, 1, 1);
        let mut state = filled(&buf, 0);
        let bulk = Timestep {
            observations: Array::from_f32([1, 3, 1, 2], vec![0.0; 6]).unwrap(),
            actions: Array::from_i64([1, 3, 1], vec![0; 3]).unwrap(),
            rewards: Array::from_f32([1, 3, 1], vec![0.0; 3]).unwrap(),
            terminals: Array::from_bool([1, 3, 1], vec![false; 3]).unwrap(),
            truncations: Array::from_bool([1, 3, 1], vec![false; 3]).unwrap(),
            infos: Infos::new(),
        };
        assert_eq!(
            buf.add(&mut state, &bulk).unwrap_err(),
            BufferError::AddTooLong {
                steps: 3,
                capacity: 2
            }
        );
    }

    #[test]
    fn test_num_valid_items() {
        let buf = buffer(20, 1, 3);
        assert_eq!(buf.num_valid_items(&filled(&buf, 2)), 0);
        assert_eq!(buf.num_valid_items(&filled(&buf, 3)), 1);
        assert_eq!(buf.num_valid_items(&filled(&buf, 10)), 8);
        // Full: every logical start whose window fits.
        assert_eq!(buf.num_valid_items(&filled(&buf, 25)), 18);

        let strided = TrajectoryBuffer::new(
            TrajectoryBufferConfig::new(20, 1, 3).with_period(2),
        )
        .unwrap();
        // Starts 0, 2, 4, 6 fit in 10 steps (6 + 3 <= 10).
        assert_eq!(strided.num_valid_items(&filled(&strided, 10)), 4);
    }

    #[test]
    fn test_sample_shapes() {
        let buf = buffer(16, 4, 3);
        let state = filled(&buf, 10);
        let sample = buf.sample(&state, RngKey::new(0)).unwrap();

        assert_eq!(sample.start_indices.len(), 4);
        assert_eq!(sample.experience.observations.shape(), &[4, 3, 1, 2]);
        assert_eq!(sample.experience.actions.shape(), &[4, 3, 1]);
        assert_eq!(sample.experience.rewards.shape(), &[4, 3, 1]);
        assert_eq!(sample.experience.terminals.shape(), &[4, 3, 1]);
    }

    #[test]
    fn test_sample_windows_are_contiguous_and_written() {
        let buf = buffer(20, 8, 3);
        let state = filled(&buf, 10);

        let mut key = RngKey::new(11);
        for _ in 0..50 {
            let (next, sub) = key.split();
            key = next;
            let sample = buf.sample(&state, sub).unwrap();
            let rewards = sample.experience.rewards.to_f32_vec();
            for (b, &start) in sample.start_indices.iter().enumerate() {
                assert!(start + 3 <= 10, "window at {start} reads unwritten slots");
                let window = &rewards[b * 3..b * 3 + 3];
                assert_eq!(window, &[start as f32, start as f32 + 1.0, start as f32 + 2.0]);
            }
        }
    }

    #[test]
    fn test_sample_wrapped_windows_follow_temporal_order() {
        let buf = buffer(5, 16, 2);
        let state = filled(&buf, 7); // live: 2..=6, oldest at slot 2

        let sample = buf.sample(&state, RngKey::new(5)).unwrap();
        let rewards = sample.experience.rewards.to_f32_vec();
        for b in 0..16 {
            let (first, second) = (rewards[b * 2], rewards[b * 2 + 1]);
            assert!((2.0..=5.0).contains(&first));
            assert_eq!(second, first + 1.0);
        }
    }

    #[test]
    fn test_sample_insufficient_data() {
        let buf = buffer(10, 2, 4);
        let state = filled(&buf, 3);
        assert!(!buf.can_sample(&state));
        assert_eq!(
            buf.sample(&state, RngKey::new(0)).unwrap_err(),
            BufferError::InsufficientData {
                available: 3,
                required: 4
            }
        );
    }

    #[test]
    fn test_sample_respects_min_length() {
        let buf = TrajectoryBuffer::new(
            TrajectoryBufferConfig::new(10, 1, 2).with_min_length_time_axis(5),
        )
        .unwrap();
        assert!(!buf.can_sample(&filled(&buf, 4)));
        assert!(buf.can_sample(&filled(&buf, 5)));
    }

    #[test]
    fn test_sample_deterministic_for_key() {
        let buf = buffer(32, 8, 4);
        let state = filled(&buf, 30);
        let a = buf.sample(&state, RngKey::new(99)).unwrap();
        let b = buf.sample(&state, RngKey::new(99)).unwrap();
        assert_eq!(a.start_indices, b.start_indices);
        assert_eq!(a.experience, b.experience);
    }

    #[test]
    fn test_compact_orders_and_shrinks() {
        let buf = buffer(5, 1, 1);
        let state = filled(&buf, 7);
        let compacted = state.compact().unwrap();

        assert_eq!(compacted.capacity(), 5);
        assert_eq!(compacted.current_index(), 0);
        assert!(compacted.is_full());
        assert_eq!(ordered_rewards(&compacted), vec![2.0, 3.0, 4.0, 5.0, 6.0]);

        let partial = filled(&buffer(10, 1, 1), 4).compact().unwrap();
        assert_eq!(partial.capacity(), 4);
        assert_eq!(ordered_rewards(&partial), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_compact_empty_fails() {
        let buf = buffer(5, 1, 1);
        assert!(filled(&buf, 0).compact().is_err());
    }
}
