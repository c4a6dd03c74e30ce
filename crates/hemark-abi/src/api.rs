//! Backend function table loading.

use std::ffi::c_char;

use libloading::os::unix::{Library, Symbol};
use tracing::error;

use crate::error::AbiError;
use crate::types::{
    ErrorCode, ParamPosition, RawBenchmarkDescriptor, RawHandle, RawPackCollection,
    RawWorkloadParam, RawWorkloadParams,
};

pub type FnInit = unsafe extern "C" fn(*mut RawHandle) -> ErrorCode;
pub type FnDestroy = unsafe extern "C" fn(RawHandle) -> ErrorCode;
/// With a null output array, only the count is written.
pub type FnSubscribeBenchmarks =
    unsafe extern "C" fn(RawHandle, *mut RawHandle, *mut u64) -> ErrorCode;
pub type FnGetWorkloadParamsDetails =
    unsafe extern "C" fn(RawHandle, RawHandle, *mut u64, *mut u64) -> ErrorCode;
/// The parameter array receives the backend's default workload-parameter
/// sets (`set_count * param_count` entries); it may be null.
pub type FnDescribeBenchmark = unsafe extern "C" fn(
    RawHandle,
    RawHandle,
    *mut RawBenchmarkDescriptor,
    *mut RawWorkloadParam,
) -> ErrorCode;
pub type FnInitBenchmark =
    unsafe extern "C" fn(RawHandle, RawHandle, *const RawWorkloadParams, *mut RawHandle)
        -> ErrorCode;
pub type FnEncode =
    unsafe extern "C" fn(RawHandle, *const RawPackCollection, *mut RawHandle) -> ErrorCode;
pub type FnEncrypt = unsafe extern "C" fn(RawHandle, RawHandle, *mut RawHandle) -> ErrorCode;
pub type FnLoad =
    unsafe extern "C" fn(RawHandle, *const RawHandle, u64, *mut RawHandle) -> ErrorCode;
pub type FnOperate = unsafe extern "C" fn(
    RawHandle,
    RawHandle,
    *const ParamPosition,
    u64,
    *mut RawHandle,
) -> ErrorCode;
pub type FnStore = unsafe extern "C" fn(RawHandle, RawHandle, *mut RawHandle) -> ErrorCode;
pub type FnDecrypt = unsafe extern "C" fn(RawHandle, RawHandle, *mut RawHandle) -> ErrorCode;
pub type FnDecode =
    unsafe extern "C" fn(RawHandle, RawHandle, *mut RawPackCollection) -> ErrorCode;
pub type FnDestroyHandle = unsafe extern "C" fn(RawHandle) -> ErrorCode;
/// String getters return the needed size including the terminator and fill
/// at most `size` bytes when the buffer is non-null; the caller owns the
/// buffer.
pub type FnGetSchemeName = unsafe extern "C" fn(RawHandle, i32, *mut c_char, u64) -> u64;
pub type FnGetSecurityName = unsafe extern "C" fn(RawHandle, i32, i32, *mut c_char, u64) -> u64;
pub type FnGetExtraDescription = unsafe extern "C" fn(
    RawHandle,
    RawHandle,
    *const RawWorkloadParams,
    *mut c_char,
    u64,
) -> u64;
pub type FnGetLastErrorDescription = unsafe extern "C" fn(*mut c_char, u64) -> u64;

/// Resolved backend entry points.
#[derive(Clone, Copy)]
pub struct Api {
    pub init: FnInit,
    pub destroy: FnDestroy,
    pub subscribe_benchmarks: FnSubscribeBenchmarks,
    pub get_workload_params_details: FnGetWorkloadParamsDetails,
    pub describe_benchmark: FnDescribeBenchmark,
    pub init_benchmark: FnInitBenchmark,
    pub encode: FnEncode,
    pub encrypt: FnEncrypt,
    pub load: FnLoad,
    pub operate: FnOperate,
    pub store: FnStore,
    pub decrypt: FnDecrypt,
    pub decode: FnDecode,
    pub destroy_handle: FnDestroyHandle,
    pub get_scheme_name: FnGetSchemeName,
    pub get_security_name: FnGetSecurityName,
    pub get_extra_description: FnGetExtraDescription,
    pub get_last_error_description: FnGetLastErrorDescription,
}

impl Api {
    /// Resolve every required export from a loaded backend library.
    pub unsafe fn load(lib: &Library) -> Result<Self, AbiError> {
        unsafe {
            Ok(Self {
                init: load_symbol(lib, b"init", "init")?,
                destroy: load_symbol(lib, b"destroy", "destroy")?,
                subscribe_benchmarks: load_symbol(
                    lib,
                    b"subscribeBenchmarks",
                    "subscribeBenchmarks",
                )?,
                get_workload_params_details: load_symbol(
                    lib,
                    b"getWorkloadParamsDetails",
                    "getWorkloadParamsDetails",
                )?,
                describe_benchmark: load_symbol(lib, b"describeBenchmark", "describeBenchmark")?,
                init_benchmark: load_symbol(lib, b"initBenchmark", "initBenchmark")?,
                encode: load_symbol(lib, b"encode", "encode")?,
                encrypt: load_symbol(lib, b"encrypt", "encrypt")?,
                load: load_symbol(lib, b"load", "load")?,
                operate: load_symbol(lib, b"operate", "operate")?,
                store: load_symbol(lib, b"store", "store")?,
                decrypt: load_symbol(lib, b"decrypt", "decrypt")?,
                decode: load_symbol(lib, b"decode", "decode")?,
                destroy_handle: load_symbol(lib, b"destroyHandle", "destroyHandle")?,
                get_scheme_name: load_symbol(lib, b"getSchemeName", "getSchemeName")?,
                get_security_name: load_symbol(lib, b"getSecurityName", "getSecurityName")?,
                get_extra_description: load_symbol(
                    lib,
                    b"getExtraDescription",
                    "getExtraDescription",
                )?,
                get_last_error_description: load_symbol(
                    lib,
                    b"getLastErrorDescription",
                    "getLastErrorDescription",
                )?,
            })
        }
    }
}

unsafe fn load_symbol<T: Copy>(
    lib: &Library,
    symbol: &[u8],
    label: &'static str,
) -> Result<T, AbiError> {
    unsafe {
        let sym: Symbol<T> = lib.get(symbol).map_err(|e| {
            error!(symbol = label, "symbol not found in backend library");
            AbiError::SymbolNotFound(label, e)
        })?;
        Ok(*sym)
    }
}
