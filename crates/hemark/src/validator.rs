//! Numerical validation of backend outputs against ground truth.

use hemark_abi::DataType;
use hemark_data::{OutputBatch, TestData};
use thiserror::Error;

use crate::config::BenchConfig;

/// Absolute floor below which float comparisons stop being relative.
const FLOOR_F32: f64 = 1e-7;
const FLOOR_F64: f64 = 1e-10;

/// A numerical mismatch, pinpointed to one element of one result buffer.
#[derive(Debug, Clone, Error)]
#[error(
    "result {flat_index} (multi-index {multi_index:?}) differs at element {offset}: \
     expected {expected}, got {actual}"
)]
pub struct ValidationFailure {
    pub flat_index: u64,
    pub multi_index: Vec<u64>,
    /// Element offset of the first mismatch within the buffer.
    pub offset: usize,
    pub expected: String,
    pub actual: String,
}

/// Compare every produced result of `actual` against the expected outputs of
/// `data`. `result_count` bounds how many results were actually produced (a
/// latency run only fills the first one).
pub fn validate(
    data: &TestData,
    actual: &OutputBatch,
    result_count: u64,
    config: &BenchConfig,
) -> Result<(), ValidationFailure> {
    let count = result_count.min(data.space().result_batch_size());
    for output in 0..data.output_count() {
        for flat in 0..count {
            let expected = data.expected_bytes(output, flat);
            let produced = actual.bytes(output, flat);
            if let Some((offset, e, a)) =
                first_mismatch(data.data_type(), expected, produced, config)
            {
                return Err(ValidationFailure {
                    flat_index: flat,
                    multi_index: data.space().multi_index(flat),
                    offset,
                    expected: e,
                    actual: a,
                });
            }
        }
    }
    Ok(())
}

/// Compare one expected/produced buffer pair; `Some` carries the first
/// differing element offset and both formatted values.
pub fn first_mismatch(
    data_type: DataType,
    expected: &[u8],
    produced: &[u8],
    config: &BenchConfig,
) -> Option<(usize, String, String)> {
    match data_type {
        DataType::Int32 => mismatch_exact::<i32>(expected, produced),
        DataType::Int64 => mismatch_exact::<i64>(expected, produced),
        DataType::Float32 => {
            mismatch_close::<f32>(expected, produced, config.tolerance_f32, FLOOR_F32)
        }
        DataType::Float64 => {
            mismatch_close::<f64>(expected, produced, config.tolerance_f64, FLOOR_F64)
        }
    }
}

trait Raw: Copy + std::fmt::Display {
    const SIZE: usize;
    fn read(bytes: &[u8]) -> Self;
}

macro_rules! impl_raw {
    ($($t:ty),*) => {$(
        impl Raw for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn read(bytes: &[u8]) -> Self {
                <$t>::from_ne_bytes(bytes.try_into().expect("buffer length checked"))
            }
        }
    )*};
}

impl_raw!(i32, i64, f32, f64);

fn elements<'a, T: Raw + 'a>(bytes: &'a [u8]) -> impl Iterator<Item = T> + 'a {
    bytes.chunks_exact(T::SIZE).map(T::read)
}

fn mismatch_exact<T: Raw + PartialEq>(
    expected: &[u8],
    produced: &[u8],
) -> Option<(usize, String, String)> {
    elements::<T>(expected)
        .zip(elements::<T>(produced))
        .position(|(e, a)| e != a)
        .map(|offset| {
            let e: T = elements(expected).nth(offset).unwrap();
            let a: T = elements(produced).nth(offset).unwrap();
            (offset, e.to_string(), a.to_string())
        })
}

fn mismatch_close<T: Raw + Into<f64>>(
    expected: &[u8],
    produced: &[u8],
    tolerance: f64,
    floor: f64,
) -> Option<(usize, String, String)> {
    elements::<T>(expected)
        .zip(elements::<T>(produced))
        .position(|(e, a)| !close_enough(a.into(), e.into(), tolerance, floor))
        .map(|offset| {
            let e: T = elements(expected).nth(offset).unwrap();
            let a: T = elements(produced).nth(offset).unwrap();
            (offset, e.to_string(), a.to_string())
        })
}

/// `|a - e| <= tol * max(|e|, floor)`; the floor keeps near-zero expected
/// values from demanding exactness.
fn close_enough(actual: f64, expected: f64, tolerance: f64, floor: f64) -> bool {
    (actual - expected).abs() <= tolerance * expected.abs().max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn bench_config() -> BenchConfig {
        Config::default().bench_config()
    }

    fn bytes_of<T: Copy>(values: &[T]) -> Vec<u8> {
        let ptr = values.as_ptr().cast::<u8>();
        unsafe { std::slice::from_raw_parts(ptr, std::mem::size_of_val(values)) }.to_vec()
    }

    #[test]
    fn identical_buffers_pass_for_every_type() {
        let config = bench_config();
        let ints = bytes_of(&[1i32, -5, 7]);
        assert!(first_mismatch(DataType::Int32, &ints, &ints, &config).is_none());
        let longs = bytes_of(&[1i64, i64::MIN]);
        assert!(first_mismatch(DataType::Int64, &longs, &longs, &config).is_none());
        let floats = bytes_of(&[0.0f32, 1.5, -2.25]);
        assert!(first_mismatch(DataType::Float32, &floats, &floats, &config).is_none());
        let doubles = bytes_of(&[0.0f64, 70.0]);
        assert!(first_mismatch(DataType::Float64, &doubles, &doubles, &config).is_none());
    }

    #[test]
    fn identical_buffers_pass_with_zero_tolerance() {
        let mut config = bench_config();
        config.tolerance_f32 = 0.0;
        config.tolerance_f64 = 0.0;
        let doubles = bytes_of(&[3.25f64, -1.5]);
        assert!(first_mismatch(DataType::Float64, &doubles, &doubles, &config).is_none());
    }

    #[test]
    fn dot_product_tolerance() {
        let config = bench_config();
        let expected = bytes_of(&[70.0f64]);
        assert!(first_mismatch(DataType::Float64, &expected, &bytes_of(&[70.0f64]), &config)
            .is_none());
        let off = first_mismatch(DataType::Float64, &expected, &bytes_of(&[70.8f64]), &config);
        assert!(off.is_some());
    }

    #[test]
    fn absolute_floor_near_zero() {
        let config = bench_config();
        // |1e-12 - 0| <= 0.01 * max(0, 1e-10)
        let expected = bytes_of(&[0.0f64]);
        assert!(
            first_mismatch(DataType::Float64, &expected, &bytes_of(&[1e-12f64]), &config)
                .is_none()
        );
        // 2% off a unit value fails at 1% tolerance.
        let expected = bytes_of(&[1.0f64]);
        assert!(
            first_mismatch(DataType::Float64, &expected, &bytes_of(&[1.02f64]), &config)
                .is_some()
        );
    }

    #[test]
    fn integers_require_exact_equality() {
        let config = bench_config();
        let expected = bytes_of(&[100i32, 200]);
        let produced = bytes_of(&[100i32, 201]);
        let (offset, e, a) =
            first_mismatch(DataType::Int32, &expected, &produced, &config).unwrap();
        assert_eq!(offset, 1);
        assert_eq!(e, "200");
        assert_eq!(a, "201");
    }

    #[test]
    fn failure_carries_indices() {
        use hemark_data::{OutputBatch, TestData};

        let data = TestData::new(DataType::Int32, &[2, 3], &[4, 4], &[4]).unwrap();
        let mut actual = OutputBatch::new_like(&data).unwrap();
        assert!(validate(&data, &actual, 6, &bench_config()).is_ok());

        // Corrupt the produced value at flat index 5 (multi [1, 2]) through
        // the same raw views a backend decode would use.
        let mut raw = actual.raw_packs();
        let collection = raw.collection();
        let packs = unsafe { std::slice::from_raw_parts(collection.packs, 1) };
        let buffers = unsafe { std::slice::from_raw_parts(packs[0].buffers, 6) };
        unsafe { std::ptr::write(buffers[5].p.cast::<i32>(), 7) };

        let err = validate(&data, &actual, 6, &bench_config()).unwrap_err();
        assert_eq!(err.flat_index, 5);
        assert_eq!(err.multi_index, vec![1, 2]);
        assert_eq!(err.offset, 0);
        assert_eq!(err.actual, "7");
    }
}
