//! In-process mock backend for driver and engine tests.
//!
//! Computes the supported workloads in cleartext so end-to-end runs validate
//! against the generators' ground truth, and records every interaction so
//! tests can assert on handle lifecycles and mask handling.

use std::collections::HashMap;

use hemark_abi::{
    AbiError, Backend, BackendError, BenchmarkDescriptor, DataType, ParamPosition, RawHandle,
    RawPackCollection, Workload, WorkloadParam,
};
use hemark_data::Element;
use parking_lot::Mutex;

/// One benchmark variant the mock advertises.
#[derive(Clone)]
pub struct MockBenchmark {
    pub descriptor: BenchmarkDescriptor,
    pub default_params: Vec<Vec<WorkloadParam>>,
}

#[derive(Clone)]
struct ParamData {
    param_position: u64,
    buffers: Vec<Vec<u8>>,
}

#[derive(Default)]
struct State {
    next_tag: i64,
    live: Vec<i64>,
    destroyed: Vec<i64>,
    encoded: HashMap<i64, Vec<ParamData>>,
    loaded: HashMap<i64, Vec<ParamData>>,
    results: HashMap<i64, Vec<Vec<u8>>>,
    instances: HashMap<i64, (usize, Vec<WorkloadParam>)>,
    encrypted_positions: Vec<u64>,
    operate_calls: Vec<u64>,
    fail_step: Option<&'static str>,
    last_error: String,
}

/// Scripted backend living entirely in-process.
pub struct MockBackend {
    benchmarks: Vec<MockBenchmark>,
    state: Mutex<State>,
}

impl MockBackend {
    pub fn new(benchmarks: Vec<MockBenchmark>) -> Self {
        Self {
            benchmarks,
            state: Mutex::new(State::default()),
        }
    }

    /// Make the next call of the named pipeline step fail with a backend
    /// error; subsequent calls succeed again.
    pub fn fail_at(&self, step: &'static str) {
        self.state.lock().fail_step = Some(step);
    }

    /// Param positions that were passed to `encrypt`, in call order.
    pub fn encrypted_positions(&self) -> Vec<u64> {
        self.state.lock().encrypted_positions.clone()
    }

    /// `iterations` totals of every `operate` call.
    pub fn operate_calls(&self) -> Vec<u64> {
        self.state.lock().operate_calls.clone()
    }

    /// Handles created but not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn destroyed_handles(&self) -> usize {
        self.state.lock().destroyed.len()
    }
}

impl State {
    fn new_handle(&mut self) -> RawHandle {
        self.next_tag += 1;
        self.live.push(self.next_tag);
        RawHandle {
            p: std::ptr::null_mut(),
            size: 0,
            tag: self.next_tag,
        }
    }

    fn check_step(&mut self, step: &'static str) -> Result<(), BackendError> {
        if self.fail_step == Some(step) {
            self.fail_step = None;
            self.last_error = format!("injected failure at {}", step);
            return Err(BackendError {
                code: 42,
                message: self.last_error.clone(),
            });
        }
        Ok(())
    }
}

fn read_collection(collection: &RawPackCollection) -> Vec<ParamData> {
    let packs =
        unsafe { std::slice::from_raw_parts(collection.packs, collection.pack_count as usize) };
    packs
        .iter()
        .map(|pack| {
            let buffers =
                unsafe { std::slice::from_raw_parts(pack.buffers, pack.buffer_count as usize) };
            ParamData {
                param_position: pack.param_position,
                buffers: buffers
                    .iter()
                    .map(|b| {
                        unsafe { std::slice::from_raw_parts(b.p.cast::<u8>(), b.size as usize) }
                            .to_vec()
                    })
                    .collect(),
            }
        })
        .collect()
}

impl Backend for MockBackend {
    fn list_benchmarks(&self) -> Result<Vec<RawHandle>, BackendError> {
        Ok((0..self.benchmarks.len())
            .map(|i| RawHandle {
                p: std::ptr::null_mut(),
                size: 0,
                tag: -(i as i64 + 1),
            })
            .collect())
    }

    fn describe(
        &self,
        h_desc: RawHandle,
    ) -> Result<(BenchmarkDescriptor, Vec<Vec<WorkloadParam>>), AbiError> {
        let index = (-h_desc.tag - 1) as usize;
        let bench = self.benchmarks.get(index).ok_or(BackendError {
            code: 2,
            message: "unknown benchmark descriptor handle".into(),
        })?;
        Ok((bench.descriptor, bench.default_params.clone()))
    }

    fn init_benchmark(
        &self,
        h_desc: RawHandle,
        params: &[WorkloadParam],
    ) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.check_step("init_benchmark")?;
        let index = (-h_desc.tag - 1) as usize;
        let handle = state.new_handle();
        state.instances.insert(handle.tag, (index, params.to_vec()));
        Ok(handle)
    }

    fn encode(
        &self,
        _h_bench: RawHandle,
        packs: &RawPackCollection,
    ) -> Result<RawHandle, BackendError> {
        let data = read_collection(packs);
        let mut state = self.state.lock();
        state.check_step("encode")?;
        let handle = state.new_handle();
        state.encoded.insert(handle.tag, data);
        Ok(handle)
    }

    fn encrypt(&self, _h_bench: RawHandle, plain: RawHandle) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.check_step("encrypt")?;
        let data = state
            .encoded
            .get(&plain.tag)
            .cloned()
            .ok_or_else(|| BackendError {
                code: 3,
                message: "encrypt of unknown handle".into(),
            })?;
        for pack in &data {
            state.encrypted_positions.push(pack.param_position);
        }
        let handle = state.new_handle();
        state.encoded.insert(handle.tag, data);
        Ok(handle)
    }

    fn load(&self, _h_bench: RawHandle, locals: &[RawHandle]) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.check_step("load")?;
        let mut gathered = Vec::new();
        for local in locals {
            let mut data = state
                .encoded
                .get(&local.tag)
                .cloned()
                .ok_or_else(|| BackendError {
                    code: 4,
                    message: "load of unknown handle".into(),
                })?;
            gathered.append(&mut data);
        }
        let handle = state.new_handle();
        state.loaded.insert(handle.tag, gathered);
        Ok(handle)
    }

    fn operate(
        &self,
        h_bench: RawHandle,
        remote: RawHandle,
        positions: &[ParamPosition],
    ) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.check_step("operate")?;
        let (index, w_params) = state
            .instances
            .get(&h_bench.tag)
            .cloned()
            .ok_or_else(|| BackendError {
                code: 5,
                message: "operate on unknown benchmark handle".into(),
            })?;
        let descriptor = self.benchmarks[index].descriptor;
        let mut params = state
            .loaded
            .get(&remote.tag)
            .cloned()
            .ok_or_else(|| BackendError {
                code: 6,
                message: "operate on unknown remote handle".into(),
            })?;
        params.sort_by_key(|p| p.param_position);

        let total: u64 = positions.iter().map(|p| p.batch_size).product();
        state.operate_calls.push(total);

        let mut results = Vec::with_capacity(total as usize);
        for flat in 0..total {
            // first parameter varies fastest, matching the harness
            // linearization
            let mut rem = flat;
            let inputs: Vec<&[u8]> = positions
                .iter()
                .enumerate()
                .map(|(param, pos)| {
                    let idx = pos.value_index + rem % pos.batch_size;
                    rem /= pos.batch_size;
                    params[param].buffers[idx as usize].as_slice()
                })
                .collect();
            results.push(compute(descriptor.workload, descriptor.data_type, &w_params, &inputs)?);
        }

        let handle = state.new_handle();
        state.results.insert(handle.tag, results);
        Ok(handle)
    }

    fn store(&self, _h_bench: RawHandle, remote: RawHandle) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.check_step("store")?;
        let results = state
            .results
            .get(&remote.tag)
            .cloned()
            .ok_or_else(|| BackendError {
                code: 7,
                message: "store of unknown handle".into(),
            })?;
        let handle = state.new_handle();
        state.results.insert(handle.tag, results);
        Ok(handle)
    }

    fn decrypt(&self, _h_bench: RawHandle, cipher: RawHandle) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.check_step("decrypt")?;
        let results = state
            .results
            .get(&cipher.tag)
            .cloned()
            .ok_or_else(|| BackendError {
                code: 8,
                message: "decrypt of unknown handle".into(),
            })?;
        let handle = state.new_handle();
        state.results.insert(handle.tag, results);
        Ok(handle)
    }

    fn decode(
        &self,
        _h_bench: RawHandle,
        encoded: RawHandle,
        out: &mut RawPackCollection,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check_step("decode")?;
        let results = state
            .results
            .get(&encoded.tag)
            .cloned()
            .ok_or_else(|| BackendError {
                code: 9,
                message: "decode of unknown handle".into(),
            })?;
        let packs = unsafe { std::slice::from_raw_parts(out.packs, out.pack_count as usize) };
        for pack in packs {
            let buffers =
                unsafe { std::slice::from_raw_parts(pack.buffers, pack.buffer_count as usize) };
            for (buffer, result) in buffers.iter().zip(&results) {
                let len = (buffer.size as usize).min(result.len());
                unsafe {
                    std::ptr::copy_nonoverlapping(result.as_ptr(), buffer.p.cast::<u8>(), len)
                };
            }
        }
        Ok(())
    }

    fn destroy_handle(&self, h: RawHandle) {
        let mut state = self.state.lock();
        if let Some(pos) = state.live.iter().position(|&tag| tag == h.tag) {
            state.live.remove(pos);
            state.destroyed.push(h.tag);
        }
        state.encoded.remove(&h.tag);
        state.loaded.remove(&h.tag);
        state.results.remove(&h.tag);
        state.instances.remove(&h.tag);
    }

    fn scheme_name(&self, _scheme: i32) -> String {
        "MockScheme".into()
    }

    fn security_name(&self, _scheme: i32, _security: i32) -> String {
        "128 bits".into()
    }

    fn extra_description(&self, _h_desc: RawHandle, _params: &[WorkloadParam]) -> String {
        String::new()
    }

    fn last_error(&self) -> String {
        self.state.lock().last_error.clone()
    }
}

// ============================================================================
// Cleartext kernels
// ============================================================================

fn compute(
    workload: Workload,
    data_type: DataType,
    w_params: &[WorkloadParam],
    inputs: &[&[u8]],
) -> Result<Vec<u8>, BackendError> {
    match data_type {
        DataType::Int32 => compute_typed::<i32>(workload, w_params, inputs),
        DataType::Int64 => compute_typed::<i64>(workload, w_params, inputs),
        DataType::Float32 => compute_typed::<f32>(workload, w_params, inputs),
        DataType::Float64 => compute_typed::<f64>(workload, w_params, inputs),
    }
}

fn compute_typed<T: Element>(
    workload: Workload,
    w_params: &[WorkloadParam],
    inputs: &[&[u8]],
) -> Result<Vec<u8>, BackendError> {
    let a: Vec<T> = from_bytes(inputs[0]);
    let b: Vec<T> = from_bytes(inputs[1]);
    let result: Vec<T> = match workload {
        Workload::EltwiseAdd => a.iter().zip(&b).map(|(&x, &y)| x.add(y)).collect(),
        Workload::EltwiseMult => a.iter().zip(&b).map(|(&x, &y)| x.mul(y)).collect(),
        Workload::DotProduct => {
            vec![a
                .iter()
                .zip(&b)
                .fold(T::zero(), |acc, (&x, &y)| acc.add(x.mul(y)))]
        }
        Workload::MatrixMultiply => {
            let dims: Vec<u64> = w_params
                .iter()
                .map(|p| match p {
                    WorkloadParam::U64(v) => *v,
                    _ => 0,
                })
                .collect();
            let (rows_a, cols_a, cols_b) =
                (dims[0] as usize, dims[1] as usize, dims[2] as usize);
            let mut out = vec![T::zero(); rows_a * cols_b];
            for row in 0..rows_a {
                for col in 0..cols_b {
                    let mut acc = T::zero();
                    for k in 0..cols_a {
                        acc = acc.add(a[row * cols_a + k].mul(b[k * cols_b + col]));
                    }
                    out[row * cols_b + col] = acc;
                }
            }
            out
        }
        other => {
            return Err(BackendError {
                code: 10,
                message: format!("mock backend cannot compute workload {:?}", other),
            })
        }
    };
    Ok(to_bytes(&result))
}

fn from_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(|chunk| unsafe { std::ptr::read_unaligned(chunk.as_ptr().cast::<T>()) })
        .collect()
}

fn to_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let ptr = values.as_ptr().cast::<u8>();
    unsafe { std::slice::from_raw_parts(ptr, std::mem::size_of_val(values)) }.to_vec()
}
