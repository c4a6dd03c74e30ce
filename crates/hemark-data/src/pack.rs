//! Data packs and sample-space index arithmetic.
//!
//! All buffers of a benchmark live in one arena allocation so the backend can
//! be handed contiguous batched views. The harness owns the storage; backends
//! only ever see read-only input views and write into separately staged
//! output buffers.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use hemark_abi::{DataType, RawDataBuffer, RawDataPack, RawPackCollection};

use crate::element::Element;
use crate::error::DataError;

/// Minimum alignment of every buffer handed to a backend.
pub const BUFFER_ALIGN: usize = 64;

// ============================================================================
// Sample space
// ============================================================================

/// The Cartesian product of per-parameter batch sizes, with the canonical
/// linearization `flat = Σ i_k · Π_{j<k} batch[j]`.
#[derive(Clone, Debug)]
pub struct SampleSpace {
    batch_sizes: Vec<u64>,
}

impl SampleSpace {
    pub fn new(input_batch_sizes: &[u64]) -> Result<Self, DataError> {
        if input_batch_sizes.is_empty() || input_batch_sizes.iter().any(|&b| b == 0) {
            return Err(DataError::EmptySampleSpace);
        }
        Ok(Self {
            batch_sizes: input_batch_sizes.to_vec(),
        })
    }

    pub fn param_count(&self) -> usize {
        self.batch_sizes.len()
    }

    pub fn batch_size(&self, param: usize) -> u64 {
        self.batch_sizes[param]
    }

    pub fn batch_sizes(&self) -> &[u64] {
        &self.batch_sizes
    }

    /// Total number of result samples.
    pub fn result_batch_size(&self) -> u64 {
        self.batch_sizes.iter().product()
    }

    /// Linearize a multi-index.
    pub fn flat_index(&self, multi: &[u64]) -> u64 {
        debug_assert_eq!(multi.len(), self.batch_sizes.len());
        let mut flat = 0;
        let mut stride = 1;
        for (i, &b) in multi.iter().zip(&self.batch_sizes) {
            debug_assert!(*i < b);
            flat += i * stride;
            stride *= b;
        }
        flat
    }

    /// Invert [`flat_index`](Self::flat_index).
    pub fn multi_index(&self, flat: u64) -> Vec<u64> {
        debug_assert!(flat < self.result_batch_size());
        let mut rem = flat;
        self.batch_sizes
            .iter()
            .map(|&b| {
                let i = rem % b;
                rem /= b;
                i
            })
            .collect()
    }

    /// Iterate every multi-index in flat order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<u64>> + '_ {
        (0..self.result_batch_size()).map(|flat| self.multi_index(flat))
    }
}

// ============================================================================
// Arena
// ============================================================================

/// One zeroed allocation holding every buffer of a data set, 64-byte aligned.
struct Arena {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Arena {
    fn zeroed(size: usize) -> Result<Self, DataError> {
        let layout = Layout::from_size_align(size.max(BUFFER_ALIGN), BUFFER_ALIGN)
            .map_err(|_| DataError::AllocationFailed { bytes: size })?;
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(DataError::AllocationFailed { bytes: size })?;
        Ok(Self { ptr, layout })
    }

    fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.layout.size());
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len) }
    }

    #[allow(clippy::mut_from_ref)]
    fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.layout.size());
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset), len) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    offset: usize,
    size: usize,
}

struct PackLayout {
    slots: Vec<Slot>,
}

fn align_up(v: usize) -> usize {
    (v + BUFFER_ALIGN - 1) & !(BUFFER_ALIGN - 1)
}

// ============================================================================
// Test data
// ============================================================================

/// Inputs and expected outputs for one benchmark.
///
/// Input pack `i` holds `batch_size[i]` buffers; every output pack holds one
/// buffer per point of the sample space. Expected outputs are filled once at
/// generation time and are immutable afterwards.
pub struct TestData {
    data_type: DataType,
    space: SampleSpace,
    input_packs: Vec<PackLayout>,
    output_packs: Vec<PackLayout>,
    arena: Arena,
}

impl TestData {
    /// Allocate buffers for `input_batch_sizes.len()` input parameters and
    /// `output_buffer_sizes.len()` results. Buffer sizes are in bytes and
    /// must be nonzero.
    pub fn new(
        data_type: DataType,
        input_batch_sizes: &[u64],
        input_buffer_sizes: &[u64],
        output_buffer_sizes: &[u64],
    ) -> Result<Self, DataError> {
        assert_eq!(input_batch_sizes.len(), input_buffer_sizes.len());
        let space = SampleSpace::new(input_batch_sizes)?;
        let result_batch = space.result_batch_size();

        for (index, &size) in input_buffer_sizes
            .iter()
            .chain(output_buffer_sizes)
            .enumerate()
        {
            if size == 0 {
                return Err(DataError::ZeroSizeBuffer { index });
            }
        }

        let mut offset = 0usize;
        let mut layout_pack = |buffer_size: u64, count: u64| -> PackLayout {
            let slots = (0..count)
                .map(|_| {
                    let slot = Slot {
                        offset,
                        size: buffer_size as usize,
                    };
                    offset = align_up(offset + buffer_size as usize);
                    slot
                })
                .collect();
            PackLayout { slots }
        };

        let input_packs: Vec<PackLayout> = input_buffer_sizes
            .iter()
            .zip(input_batch_sizes)
            .map(|(&size, &batch)| layout_pack(size, batch))
            .collect();
        let output_packs: Vec<PackLayout> = output_buffer_sizes
            .iter()
            .map(|&size| layout_pack(size, result_batch))
            .collect();

        tracing::debug!(
            bytes = offset,
            inputs = input_packs.len(),
            result_batch,
            "allocating data arena"
        );
        let arena = Arena::zeroed(offset)?;
        Ok(Self {
            data_type,
            space,
            input_packs,
            output_packs,
            arena,
        })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn space(&self) -> &SampleSpace {
        &self.space
    }

    pub fn input_count(&self) -> usize {
        self.input_packs.len()
    }

    pub fn output_count(&self) -> usize {
        self.output_packs.len()
    }

    /// Byte size of one buffer of the given output pack.
    pub fn output_buffer_size(&self, output: usize) -> usize {
        self.output_packs[output].slots[0].size
    }

    pub fn input_bytes(&self, param: usize, sample: u64) -> &[u8] {
        let slot = self.input_packs[param].slots[sample as usize];
        self.arena.slice(slot.offset, slot.size)
    }

    pub fn expected_bytes(&self, output: usize, flat: u64) -> &[u8] {
        let slot = self.output_packs[output].slots[flat as usize];
        self.arena.slice(slot.offset, slot.size)
    }

    /// Typed view of an input buffer.
    pub fn input_slice<T: Element>(&self, param: usize, sample: u64) -> &[T] {
        assert_eq!(self.data_type, T::DATA_TYPE, "element type mismatch");
        cast_slice(self.input_bytes(param, sample))
    }

    /// Typed view of an expected-output buffer.
    pub fn expected_slice<T: Element>(&self, output: usize, flat: u64) -> &[T] {
        assert_eq!(self.data_type, T::DATA_TYPE, "element type mismatch");
        cast_slice(self.expected_bytes(output, flat))
    }

    pub(crate) fn input_slice_mut<T: Element>(&mut self, param: usize, sample: u64) -> &mut [T] {
        assert_eq!(self.data_type, T::DATA_TYPE, "element type mismatch");
        let slot = self.input_packs[param].slots[sample as usize];
        cast_slice_mut(self.arena.slice_mut(slot.offset, slot.size))
    }

    pub(crate) fn expected_slice_mut<T: Element>(&mut self, output: usize, flat: u64) -> &mut [T] {
        assert_eq!(self.data_type, T::DATA_TYPE, "element type mismatch");
        let slot = self.output_packs[output].slots[flat as usize];
        cast_slice_mut(self.arena.slice_mut(slot.offset, slot.size))
    }

    /// Raw views over the full input batches, for `encode`.
    pub fn input_packs(&self) -> RawPacks {
        self.raw_inputs(None)
    }

    /// Raw view over a single input parameter's batch; `first_sample_only`
    /// narrows it to one buffer.
    pub fn param_packs(&self, param: usize, first_sample_only: bool) -> RawPacks {
        let pack = &self.input_packs[param];
        let count = if first_sample_only {
            1
        } else {
            pack.slots.len()
        };
        let buffers = pack.slots[..count]
            .iter()
            .enumerate()
            .map(|(sample, slot)| RawDataBuffer {
                p: self.arena.slice(slot.offset, slot.size).as_ptr() as *mut _,
                size: slot.size as u64,
                tag: sample as i64,
            })
            .collect();
        RawPacks::new(buffers, vec![(param as u64, 0, count)])
    }

    /// Raw views over only the first sample of every input pack (the latency
    /// category operates on single samples).
    pub fn first_sample_packs(&self) -> RawPacks {
        self.raw_inputs(Some(1))
    }

    fn raw_inputs(&self, take: Option<usize>) -> RawPacks {
        let mut buffers = Vec::new();
        let mut bounds = Vec::new();
        for (param, pack) in self.input_packs.iter().enumerate() {
            let count = take.unwrap_or(pack.slots.len()).min(pack.slots.len());
            let start = buffers.len();
            for (sample, slot) in pack.slots[..count].iter().enumerate() {
                buffers.push(RawDataBuffer {
                    p: self.arena.slice(slot.offset, slot.size).as_ptr() as *mut _,
                    size: slot.size as u64,
                    tag: sample as i64,
                });
            }
            bounds.push((param as u64, start, buffers.len()));
        }
        RawPacks::new(buffers, bounds)
    }
}

/// Separately staged, writable buffers with the same output shape as a
/// [`TestData`], used to receive decoded backend results.
pub struct OutputBatch {
    data_type: DataType,
    packs: Vec<PackLayout>,
    arena: Arena,
}

impl OutputBatch {
    /// One buffer per output pack per point of the sample space.
    pub fn new_like(data: &TestData) -> Result<Self, DataError> {
        Self::with_result_count(data, data.space().result_batch_size())
    }

    /// One buffer per output pack; receives a single-sample pipeline result.
    pub fn new_single(data: &TestData) -> Result<Self, DataError> {
        Self::with_result_count(data, 1)
    }

    fn with_result_count(data: &TestData, result_batch: u64) -> Result<Self, DataError> {
        let mut offset = 0usize;
        let packs = (0..data.output_count())
            .map(|output| {
                let size = data.output_buffer_size(output);
                let slots = (0..result_batch)
                    .map(|_| {
                        let slot = Slot { offset, size };
                        offset = align_up(offset + size);
                        slot
                    })
                    .collect();
                PackLayout { slots }
            })
            .collect();
        let arena = Arena::zeroed(offset)?;
        Ok(Self {
            data_type: data.data_type(),
            packs,
            arena,
        })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn bytes(&self, output: usize, flat: u64) -> &[u8] {
        let slot = self.packs[output].slots[flat as usize];
        self.arena.slice(slot.offset, slot.size)
    }

    /// Raw writable views for `decode`.
    pub fn raw_packs(&mut self) -> RawPacks {
        let mut buffers = Vec::new();
        let mut bounds = Vec::new();
        for (output, pack) in self.packs.iter().enumerate() {
            let start = buffers.len();
            for (sample, slot) in pack.slots.iter().enumerate() {
                buffers.push(RawDataBuffer {
                    p: self.arena.slice_mut(slot.offset, slot.size).as_mut_ptr().cast(),
                    size: slot.size as u64,
                    tag: sample as i64,
                });
            }
            bounds.push((output as u64, start, buffers.len()));
        }
        RawPacks::new(buffers, bounds)
    }
}

/// Owned storage backing a [`RawPackCollection`].
///
/// The raw pointers stay valid for as long as this value and the data set it
/// was built from are both alive; keep it in scope across the ABI call.
pub struct RawPacks {
    buffers: Vec<RawDataBuffer>,
    packs: Vec<RawDataPack>,
}

impl RawPacks {
    fn new(buffers: Vec<RawDataBuffer>, bounds: Vec<(u64, usize, usize)>) -> Self {
        let mut this = Self {
            buffers,
            packs: Vec::with_capacity(bounds.len()),
        };
        for (param_position, start, end) in bounds {
            this.packs.push(RawDataPack {
                buffers: this.buffers[start..end].as_ptr() as *mut _,
                buffer_count: (end - start) as u64,
                param_position,
            });
        }
        this
    }

    pub fn collection(&mut self) -> RawPackCollection {
        RawPackCollection {
            packs: self.packs.as_mut_ptr(),
            pack_count: self.packs.len() as u64,
        }
    }
}

fn cast_slice<T: Element>(bytes: &[u8]) -> &[T] {
    debug_assert_eq!(bytes.len() % std::mem::size_of::<T>(), 0);
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<T>(), 0);
    unsafe {
        std::slice::from_raw_parts(
            bytes.as_ptr().cast::<T>(),
            bytes.len() / std::mem::size_of::<T>(),
        )
    }
}

fn cast_slice_mut<T: Element>(bytes: &mut [u8]) -> &mut [T] {
    debug_assert_eq!(bytes.len() % std::mem::size_of::<T>(), 0);
    debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<T>(), 0);
    unsafe {
        std::slice::from_raw_parts_mut(
            bytes.as_mut_ptr().cast::<T>(),
            bytes.len() / std::mem::size_of::<T>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_matches_strided_sum() {
        let space = SampleSpace::new(&[2, 3]).unwrap();
        assert_eq!(space.result_batch_size(), 6);
        assert_eq!(space.flat_index(&[1, 2]), 5);
        assert_eq!(space.flat_index(&[0, 0]), 0);
    }

    #[test]
    fn index_round_trip_is_a_bijection() {
        let space = SampleSpace::new(&[3, 4, 2]).unwrap();
        let total = space.result_batch_size();
        let mut seen = vec![false; total as usize];
        for flat in 0..total {
            let multi = space.multi_index(flat);
            assert_eq!(space.flat_index(&multi), flat);
            assert!(!seen[flat as usize]);
            seen[flat as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn empty_or_zero_batch_is_rejected() {
        assert!(SampleSpace::new(&[]).is_err());
        assert!(SampleSpace::new(&[2, 0]).is_err());
    }

    #[test]
    fn buffers_are_aligned_and_zeroed() {
        let data = TestData::new(DataType::Float64, &[2, 3], &[32, 32], &[8]).unwrap();
        for param in 0..2 {
            for sample in 0..data.space().batch_size(param) {
                let bytes = data.input_bytes(param, sample);
                assert_eq!(bytes.as_ptr() as usize % BUFFER_ALIGN, 0);
                assert!(bytes.iter().all(|&b| b == 0));
            }
        }
        assert_eq!(data.output_count(), 1);
        assert_eq!(data.expected_bytes(0, 5).len(), 8);
    }

    #[test]
    fn zero_size_buffer_is_rejected() {
        assert!(TestData::new(DataType::Int32, &[1], &[0], &[4]).is_err());
        assert!(TestData::new(DataType::Int32, &[1], &[4], &[0]).is_err());
    }

    #[test]
    fn raw_packs_cover_the_batches() {
        let data = TestData::new(DataType::Int32, &[2, 3], &[16, 16], &[4]).unwrap();
        let mut raw = data.input_packs();
        let collection = raw.collection();
        assert_eq!(collection.pack_count, 2);
        let packs = unsafe { std::slice::from_raw_parts(collection.packs, 2) };
        assert_eq!(packs[0].buffer_count, 2);
        assert_eq!(packs[1].buffer_count, 3);
        assert_eq!(packs[0].param_position, 0);
        assert_eq!(packs[1].param_position, 1);

        let mut single = data.first_sample_packs();
        let collection = single.collection();
        let packs = unsafe { std::slice::from_raw_parts(collection.packs, 2) };
        assert_eq!(packs[0].buffer_count, 1);
        assert_eq!(packs[1].buffer_count, 1);
    }
}
