//! Element-wise vector addition and multiplication.

use hemark_abi::DataType;

use crate::element::Element;
use crate::error::DataError;
use crate::pack::TestData;
use crate::rng;

/// Which element-wise operation the data models.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EltwiseKind {
    Add,
    Mult,
}

/// Generate inputs and expected outputs for `C[i] = A[i] op B[i]` over
/// equal-length vectors.
pub fn generate(
    kind: EltwiseKind,
    vector_size: u64,
    batch_size_a: u64,
    batch_size_b: u64,
    data_type: DataType,
) -> Result<TestData, DataError> {
    match data_type {
        DataType::Int32 => generate_typed::<i32>(kind, vector_size, batch_size_a, batch_size_b),
        DataType::Int64 => generate_typed::<i64>(kind, vector_size, batch_size_a, batch_size_b),
        DataType::Float32 => generate_typed::<f32>(kind, vector_size, batch_size_a, batch_size_b),
        DataType::Float64 => generate_typed::<f64>(kind, vector_size, batch_size_a, batch_size_b),
    }
}

fn generate_typed<T: Element>(
    kind: EltwiseKind,
    vector_size: u64,
    batch_size_a: u64,
    batch_size_b: u64,
) -> Result<TestData, DataError> {
    let elem = T::DATA_TYPE.size_of() as u64;
    let vec_bytes = vector_size * elem;
    let mut data = TestData::new(
        T::DATA_TYPE,
        &[batch_size_a, batch_size_b],
        &[vec_bytes, vec_bytes],
        &[vec_bytes],
    )?;

    for param in 0..2 {
        for sample in 0..data.space().batch_size(param) {
            rng::fill_normal(data.input_slice_mut::<T>(param, sample), 0.0, 10.0);
        }
    }

    for a_i in 0..batch_size_a {
        for b_i in 0..batch_size_b {
            let flat = data.space().flat_index(&[a_i, b_i]);
            let result: Vec<T> = data
                .input_slice::<T>(0, a_i)
                .iter()
                .zip(data.input_slice::<T>(1, b_i))
                .map(|(&a, &b)| match kind {
                    EltwiseKind::Add => a.add(b),
                    EltwiseKind::Mult => a.mul(b),
                })
                .collect();
            data.expected_slice_mut::<T>(0, flat).copy_from_slice(&result);
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_is_componentwise() {
        let _guard = rng::lock_for_tests();
        rng::seed(7);
        let data = generate(EltwiseKind::Add, 8, 2, 3, DataType::Int64).unwrap();
        for a_i in 0..2 {
            for b_i in 0..3 {
                let flat = data.space().flat_index(&[a_i, b_i]);
                let a = data.input_slice::<i64>(0, a_i);
                let b = data.input_slice::<i64>(1, b_i);
                let c = data.expected_slice::<i64>(0, flat);
                for k in 0..8 {
                    assert_eq!(c[k], a[k].wrapping_add(b[k]));
                }
            }
        }
    }

    #[test]
    fn generation_is_deterministic_under_a_seed() {
        let _guard = rng::lock_for_tests();
        rng::seed(99);
        let first = generate(EltwiseKind::Mult, 16, 2, 2, DataType::Float32).unwrap();
        rng::seed(99);
        let second = generate(EltwiseKind::Mult, 16, 2, 2, DataType::Float32).unwrap();

        for param in 0..2 {
            for sample in 0..2 {
                assert_eq!(
                    first.input_bytes(param, sample),
                    second.input_bytes(param, sample)
                );
            }
        }
        for flat in 0..first.space().result_batch_size() {
            assert_eq!(first.expected_bytes(0, flat), second.expected_bytes(0, flat));
        }
    }
}
