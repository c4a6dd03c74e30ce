//! Typed backend adapter over the raw function table.

use std::ffi::c_char;
use std::path::Path;
use std::sync::Arc;

use libloading::os::unix::{Library, RTLD_NOW};
use tracing::{debug, error, trace};

use crate::api::Api;
use crate::error::{AbiError, BackendError};
use crate::types::{
    BenchmarkDescriptor, ErrorCode, ParamPosition, RawBenchmarkDescriptor, RawHandle,
    RawPackCollection, RawWorkloadParam, RawWorkloadParamValue, RawWorkloadParams, WorkloadParam,
    CODE_OK,
};

/// Typed view of one backend instance.
///
/// Every operation normalizes nonzero return codes into [`BackendError`]
/// carrying the backend's last-error string. Implemented by
/// [`SharedLibBackend`] for real backends and by the in-process mock used in
/// tests.
pub trait Backend {
    /// Enumerate the descriptor handles of every benchmark the backend
    /// supports.
    fn list_benchmarks(&self) -> Result<Vec<RawHandle>, BackendError>;

    /// Fetch the descriptor and the backend's default workload-parameter
    /// sets for one benchmark.
    fn describe(
        &self,
        h_desc: RawHandle,
    ) -> Result<(BenchmarkDescriptor, Vec<Vec<WorkloadParam>>), AbiError>;

    /// Instantiate a benchmark for the given workload parameters.
    fn init_benchmark(
        &self,
        h_desc: RawHandle,
        params: &[WorkloadParam],
    ) -> Result<RawHandle, BackendError>;

    fn encode(
        &self,
        h_bench: RawHandle,
        packs: &RawPackCollection,
    ) -> Result<RawHandle, BackendError>;
    fn encrypt(&self, h_bench: RawHandle, plain: RawHandle) -> Result<RawHandle, BackendError>;
    fn load(&self, h_bench: RawHandle, locals: &[RawHandle]) -> Result<RawHandle, BackendError>;
    fn operate(
        &self,
        h_bench: RawHandle,
        remote: RawHandle,
        positions: &[ParamPosition],
    ) -> Result<RawHandle, BackendError>;
    fn store(&self, h_bench: RawHandle, remote: RawHandle) -> Result<RawHandle, BackendError>;
    fn decrypt(&self, h_bench: RawHandle, cipher: RawHandle) -> Result<RawHandle, BackendError>;
    fn decode(
        &self,
        h_bench: RawHandle,
        encoded: RawHandle,
        out: &mut RawPackCollection,
    ) -> Result<(), BackendError>;

    /// Release a backend handle. Must tolerate being called on handles the
    /// backend has already invalidated.
    fn destroy_handle(&self, h: RawHandle);

    fn scheme_name(&self, scheme: i32) -> String;
    fn security_name(&self, scheme: i32, security: i32) -> String;
    fn extra_description(&self, h_desc: RawHandle, params: &[WorkloadParam]) -> String;
    fn last_error(&self) -> String;
}

/// Move-only owner of a backend handle.
///
/// Dropping the guard calls `destroyHandle` exactly once; construction
/// failure paths release the handle the same way as normal teardown.
pub struct HandleGuard {
    backend: Arc<dyn Backend>,
    raw: Option<RawHandle>,
}

impl HandleGuard {
    pub fn new(backend: Arc<dyn Backend>, raw: RawHandle) -> Self {
        Self {
            backend,
            raw: Some(raw),
        }
    }

    /// The wrapped handle. Valid until the guard is dropped.
    pub fn raw(&self) -> RawHandle {
        self.raw.expect("handle already released")
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.backend.destroy_handle(raw);
        }
    }
}

/// Backend loaded from a shared library.
pub struct SharedLibBackend {
    // Field order matters: the engine handle and API must die before the
    // library is unloaded.
    engine: RawHandle,
    api: Api,
    _lib: Library,
}

impl SharedLibBackend {
    /// Load a backend library and initialize its engine.
    pub fn load(lib_path: impl AsRef<Path>) -> Result<Self, AbiError> {
        let lib_path = lib_path.as_ref();
        if !lib_path.exists() {
            error!(path = %lib_path.display(), "backend library not found");
            return Err(AbiError::LibraryNotFound(lib_path.display().to_string()));
        }

        debug!(path = %lib_path.display(), "loading backend library");
        let lib = unsafe { Library::open(Some(lib_path), RTLD_NOW)? };
        let api = unsafe { Api::load(&lib)? };

        let mut engine = RawHandle::null();
        let code = unsafe { (api.init)(&mut engine) };
        if code != CODE_OK {
            let message = last_error_string(&api);
            error!(code, message, "backend engine initialization failed");
            return Err(BackendError { code, message }.into());
        }

        trace!("backend engine initialized");
        Ok(Self {
            engine,
            api,
            _lib: lib,
        })
    }

    fn check(&self, code: ErrorCode) -> Result<(), BackendError> {
        if code == CODE_OK {
            Ok(())
        } else {
            Err(BackendError {
                code,
                message: last_error_string(&self.api),
            })
        }
    }
}

impl Drop for SharedLibBackend {
    fn drop(&mut self) {
        unsafe {
            (self.api.destroy)(self.engine);
        }
    }
}

impl Backend for SharedLibBackend {
    fn list_benchmarks(&self) -> Result<Vec<RawHandle>, BackendError> {
        let mut count = 0u64;
        self.check(unsafe {
            (self.api.subscribe_benchmarks)(self.engine, std::ptr::null_mut(), &mut count)
        })?;
        let mut handles = vec![RawHandle::null(); count as usize];
        self.check(unsafe {
            (self.api.subscribe_benchmarks)(self.engine, handles.as_mut_ptr(), &mut count)
        })?;
        handles.truncate(count as usize);
        Ok(handles)
    }

    fn describe(
        &self,
        h_desc: RawHandle,
    ) -> Result<(BenchmarkDescriptor, Vec<Vec<WorkloadParam>>), AbiError> {
        let mut param_count = 0u64;
        let mut set_count = 0u64;
        self.check(unsafe {
            (self.api.get_workload_params_details)(
                self.engine,
                h_desc,
                &mut param_count,
                &mut set_count,
            )
        })?;

        let mut raw_desc = RawBenchmarkDescriptor {
            workload: 0,
            category: 0,
            data_type: 0,
            cipher_param_mask: 0,
            scheme: 0,
            security: 0,
            other: 0,
            cat_params: crate::types::RawCategoryParams {
                reserved: [0; crate::types::MAX_CATEGORY_PARAMS],
            },
        };
        let total = (param_count * set_count) as usize;
        let mut raw_params = vec![
            RawWorkloadParam {
                kind: 0,
                value: RawWorkloadParamValue { u: 0 },
            };
            total
        ];
        let params_ptr = if total == 0 {
            std::ptr::null_mut()
        } else {
            raw_params.as_mut_ptr()
        };
        self.check(unsafe {
            (self.api.describe_benchmark)(self.engine, h_desc, &mut raw_desc, params_ptr)
        })?;

        let descriptor = BenchmarkDescriptor::from_raw(&raw_desc)?;
        let mut sets = Vec::with_capacity(set_count as usize);
        for chunk in raw_params.chunks_exact(param_count.max(1) as usize) {
            let mut set = Vec::with_capacity(chunk.len());
            for raw in chunk {
                set.push(WorkloadParam::try_from_raw(raw).ok_or(
                    AbiError::InvalidDescriptor {
                        what: "workload parameter type",
                        value: raw.kind,
                    },
                )?);
            }
            sets.push(set);
        }
        if param_count == 0 && set_count > 0 {
            sets = vec![Vec::new(); set_count as usize];
        }
        Ok((descriptor, sets))
    }

    fn init_benchmark(
        &self,
        h_desc: RawHandle,
        params: &[WorkloadParam],
    ) -> Result<RawHandle, BackendError> {
        let raw: Vec<RawWorkloadParam> = params.iter().map(|p| p.as_raw()).collect();
        let raw_params = RawWorkloadParams {
            params: raw.as_ptr(),
            count: raw.len() as u64,
        };
        let params_ptr = if raw.is_empty() {
            std::ptr::null()
        } else {
            &raw_params as *const RawWorkloadParams
        };
        let mut out = RawHandle::null();
        self.check(unsafe {
            (self.api.init_benchmark)(self.engine, h_desc, params_ptr, &mut out)
        })?;
        Ok(out)
    }

    fn encode(
        &self,
        h_bench: RawHandle,
        packs: &RawPackCollection,
    ) -> Result<RawHandle, BackendError> {
        let mut out = RawHandle::null();
        self.check(unsafe { (self.api.encode)(h_bench, packs, &mut out) })?;
        Ok(out)
    }

    fn encrypt(&self, h_bench: RawHandle, plain: RawHandle) -> Result<RawHandle, BackendError> {
        let mut out = RawHandle::null();
        self.check(unsafe { (self.api.encrypt)(h_bench, plain, &mut out) })?;
        Ok(out)
    }

    fn load(&self, h_bench: RawHandle, locals: &[RawHandle]) -> Result<RawHandle, BackendError> {
        let mut out = RawHandle::null();
        self.check(unsafe {
            (self.api.load)(h_bench, locals.as_ptr(), locals.len() as u64, &mut out)
        })?;
        Ok(out)
    }

    fn operate(
        &self,
        h_bench: RawHandle,
        remote: RawHandle,
        positions: &[ParamPosition],
    ) -> Result<RawHandle, BackendError> {
        let mut out = RawHandle::null();
        self.check(unsafe {
            (self.api.operate)(
                h_bench,
                remote,
                positions.as_ptr(),
                positions.len() as u64,
                &mut out,
            )
        })?;
        Ok(out)
    }

    fn store(&self, h_bench: RawHandle, remote: RawHandle) -> Result<RawHandle, BackendError> {
        let mut out = RawHandle::null();
        self.check(unsafe { (self.api.store)(h_bench, remote, &mut out) })?;
        Ok(out)
    }

    fn decrypt(&self, h_bench: RawHandle, cipher: RawHandle) -> Result<RawHandle, BackendError> {
        let mut out = RawHandle::null();
        self.check(unsafe { (self.api.decrypt)(h_bench, cipher, &mut out) })?;
        Ok(out)
    }

    fn decode(
        &self,
        h_bench: RawHandle,
        encoded: RawHandle,
        out: &mut RawPackCollection,
    ) -> Result<(), BackendError> {
        self.check(unsafe { (self.api.decode)(h_bench, encoded, out) })
    }

    fn destroy_handle(&self, h: RawHandle) {
        let code = unsafe { (self.api.destroy_handle)(h) };
        if code != CODE_OK {
            // Teardown is best-effort; a failed destroy must not mask the
            // error that got us here.
            debug!(code, "destroyHandle reported an error");
        }
    }

    fn scheme_name(&self, scheme: i32) -> String {
        fetch_string(|buf, size| unsafe {
            (self.api.get_scheme_name)(self.engine, scheme, buf, size)
        })
    }

    fn security_name(&self, scheme: i32, security: i32) -> String {
        fetch_string(|buf, size| unsafe {
            (self.api.get_security_name)(self.engine, scheme, security, buf, size)
        })
    }

    fn extra_description(&self, h_desc: RawHandle, params: &[WorkloadParam]) -> String {
        let raw: Vec<RawWorkloadParam> = params.iter().map(|p| p.as_raw()).collect();
        let raw_params = RawWorkloadParams {
            params: raw.as_ptr(),
            count: raw.len() as u64,
        };
        fetch_string(|buf, size| unsafe {
            (self.api.get_extra_description)(self.engine, h_desc, &raw_params, buf, size)
        })
    }

    fn last_error(&self) -> String {
        last_error_string(&self.api)
    }
}

fn last_error_string(api: &Api) -> String {
    fetch_string(|buf, size| unsafe { (api.get_last_error_description)(buf, size) })
}

/// Drive the two-call string protocol: query the needed size, then fill a
/// caller-owned buffer.
fn fetch_string(call: impl Fn(*mut c_char, u64) -> u64) -> String {
    let needed = call(std::ptr::null_mut(), 0);
    if needed <= 1 {
        return String::new();
    }
    let mut buf = vec![0u8; needed as usize];
    call(buf.as_mut_ptr().cast::<c_char>(), buf.len() as u64);
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    buf.truncate(end);
    String::from_utf8_lossy(&buf).into_owned()
}
