//! Matrix multiplication.

use hemark_abi::DataType;

use crate::element::Element;
use crate::error::DataError;
use crate::pack::TestData;
use crate::rng;

/// Generate inputs and expected outputs for `M2 = M0 × M1` with row-major
/// matrices of shape `(rows_a × cols_a) × (cols_a × cols_b)`.
pub fn generate(
    rows_a: u64,
    cols_a: u64,
    cols_b: u64,
    batch_size_a: u64,
    batch_size_b: u64,
    data_type: DataType,
) -> Result<TestData, DataError> {
    match data_type {
        DataType::Int32 => {
            generate_typed::<i32>(rows_a, cols_a, cols_b, batch_size_a, batch_size_b)
        }
        DataType::Int64 => {
            generate_typed::<i64>(rows_a, cols_a, cols_b, batch_size_a, batch_size_b)
        }
        DataType::Float32 => {
            generate_typed::<f32>(rows_a, cols_a, cols_b, batch_size_a, batch_size_b)
        }
        DataType::Float64 => {
            generate_typed::<f64>(rows_a, cols_a, cols_b, batch_size_a, batch_size_b)
        }
    }
}

fn generate_typed<T: Element>(
    rows_a: u64,
    cols_a: u64,
    cols_b: u64,
    batch_size_a: u64,
    batch_size_b: u64,
) -> Result<TestData, DataError> {
    let elem = T::DATA_TYPE.size_of() as u64;
    let mut data = TestData::new(
        T::DATA_TYPE,
        &[batch_size_a, batch_size_b],
        &[rows_a * cols_a * elem, cols_a * cols_b * elem],
        &[rows_a * cols_b * elem],
    )?;

    for param in 0..2 {
        for sample in 0..data.space().batch_size(param) {
            rng::fill_normal(data.input_slice_mut::<T>(param, sample), 0.0, 10.0);
        }
    }

    for m0_i in 0..batch_size_a {
        for m1_i in 0..batch_size_b {
            let flat = data.space().flat_index(&[m0_i, m1_i]);
            let product = mat_mul(
                data.input_slice::<T>(0, m0_i),
                data.input_slice::<T>(1, m1_i),
                rows_a as usize,
                cols_a as usize,
                cols_b as usize,
            );
            data.expected_slice_mut::<T>(0, flat).copy_from_slice(&product);
        }
    }

    Ok(data)
}

/// Naive triple loop, row-major, accumulating left to right in `T`.
pub(crate) fn mat_mul<T: Element>(
    a: &[T],
    b: &[T],
    rows_a: usize,
    cols_a: usize,
    cols_b: usize,
) -> Vec<T> {
    let mut result = vec![T::zero(); rows_a * cols_b];
    for row in 0..rows_a {
        for col in 0..cols_b {
            let mut acc = T::zero();
            for k in 0..cols_a {
                acc = acc.add(a[row * cols_a + k].mul(b[k * cols_b + col]));
            }
            result[row * cols_b + col] = acc;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_matrices() {
        // (2x3) x (3x2)
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [1.0f32, 0.0, 0.0, 1.0, 1.0, 0.0];
        let c = mat_mul(&a, &b, 2, 3, 2);
        assert_eq!(c, vec![4.0, 2.0, 10.0, 5.0]);
    }

    #[test]
    fn expected_matches_kernel() {
        let _guard = rng::lock_for_tests();
        rng::seed(21);
        let data = generate(2, 3, 2, 2, 1, DataType::Int32).unwrap();
        for m0_i in 0..2 {
            let flat = data.space().flat_index(&[m0_i, 0]);
            let expect = mat_mul(
                data.input_slice::<i32>(0, m0_i),
                data.input_slice::<i32>(1, 0),
                2,
                3,
                2,
            );
            assert_eq!(data.expected_slice::<i32>(0, flat), expect.as_slice());
        }
    }
}
