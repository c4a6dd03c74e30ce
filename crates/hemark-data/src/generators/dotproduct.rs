//! Vector dot product.

use hemark_abi::DataType;

use crate::element::Element;
use crate::error::DataError;
use crate::pack::TestData;
use crate::rng;

/// Generate inputs and expected outputs for `c = a · b`.
pub fn generate(
    vector_size: u64,
    batch_size_a: u64,
    batch_size_b: u64,
    data_type: DataType,
) -> Result<TestData, DataError> {
    match data_type {
        DataType::Int32 => generate_typed::<i32>(vector_size, batch_size_a, batch_size_b),
        DataType::Int64 => generate_typed::<i64>(vector_size, batch_size_a, batch_size_b),
        DataType::Float32 => generate_typed::<f32>(vector_size, batch_size_a, batch_size_b),
        DataType::Float64 => generate_typed::<f64>(vector_size, batch_size_a, batch_size_b),
    }
}

fn generate_typed<T: Element>(
    vector_size: u64,
    batch_size_a: u64,
    batch_size_b: u64,
) -> Result<TestData, DataError> {
    let elem = T::DATA_TYPE.size_of() as u64;
    let mut data = TestData::new(
        T::DATA_TYPE,
        &[batch_size_a, batch_size_b],
        &[vector_size * elem, vector_size * elem],
        // a single component: the scalar product
        &[elem],
    )?;

    for param in 0..2 {
        for sample in 0..data.space().batch_size(param) {
            rng::fill_normal(data.input_slice_mut::<T>(param, sample), 0.0, 10.0);
        }
    }

    for a_i in 0..batch_size_a {
        for b_i in 0..batch_size_b {
            let flat = data.space().flat_index(&[a_i, b_i]);
            let value = dot(data.input_slice::<T>(0, a_i), data.input_slice::<T>(1, b_i));
            data.expected_slice_mut::<T>(0, flat)[0] = value;
        }
    }

    Ok(data)
}

/// Inner product accumulated left to right in `T`.
pub(crate) fn dot<T: Element>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .fold(T::zero(), |acc, (&x, &y)| acc.add(x.mul(y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        let a = [1.0f64, 2.0, 3.0, 4.0];
        let b = [5.0f64, 6.0, 7.0, 8.0];
        assert_eq!(dot(&a, &b), 70.0);
    }

    #[test]
    fn integer_accumulation_wraps() {
        let a = [i32::MAX, 1];
        let b = [2, 0];
        // MAX * 2 wraps; no saturation.
        assert_eq!(dot(&a, &b), i32::MAX.wrapping_mul(2));
    }

    #[test]
    fn expected_matches_kernel() {
        let _guard = rng::lock_for_tests();
        rng::seed(1);
        let data = generate(4, 2, 2, DataType::Float64).unwrap();
        for a_i in 0..2 {
            for b_i in 0..2 {
                let flat = data.space().flat_index(&[a_i, b_i]);
                let expect = dot(
                    data.input_slice::<f64>(0, a_i),
                    data.input_slice::<f64>(1, b_i),
                );
                assert_eq!(data.expected_slice::<f64>(0, flat)[0], expect);
            }
        }
    }
}
