//! Logistic regression inference: `y = sigmoid(w · x + b)`.
//!
//! Besides the true sigmoid, three polynomial approximations are supported,
//! matching what HE schemes can evaluate. The reference value is always
//! computed in f64 and then cast to the declared float type.

use hemark_abi::DataType;

use crate::element::Element;
use crate::error::DataError;
use crate::pack::TestData;
use crate::rng;

/// Sigmoid flavor: the exact function or a polynomial approximation of the
/// given degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigmoidDegree {
    Exact,
    D3,
    D5,
    D7,
}

// Approximation coefficients in ascending powers.
const POLY_D3: [f64; 4] = [0.5, 0.15012, 0.0, -0.0015930078125];
const POLY_D5: [f64; 6] = [
    0.5,
    0.19131,
    0.0,
    -0.0045963,
    0.0,
    0.0000412332000732421875,
];
const POLY_D7: [f64; 8] = [
    0.5,
    0.21687,
    0.0,
    -0.00819154296875,
    0.0,
    0.0001658331298828125,
    0.0,
    -0.00000119561672210693359375,
];

/// Generate weights, bias, inputs and expected inferences.
///
/// W and b have a single sample; X has `batch_size_input` samples and the
/// result batch has the same size (the unused W/b coordinates are zero).
pub fn generate(
    degree: SigmoidDegree,
    feature_count: u64,
    batch_size_input: u64,
    data_type: DataType,
) -> Result<TestData, DataError> {
    match data_type {
        DataType::Float32 => generate_typed::<f32>(degree, feature_count, batch_size_input),
        DataType::Float64 => generate_typed::<f64>(degree, feature_count, batch_size_input),
        other => Err(DataError::UnsupportedDataType {
            workload: "logistic regression",
            data_type: other,
        }),
    }
}

fn generate_typed<T: Element>(
    degree: SigmoidDegree,
    feature_count: u64,
    batch_size_input: u64,
) -> Result<TestData, DataError> {
    let elem = T::DATA_TYPE.size_of() as u64;
    let mut data = TestData::new(
        T::DATA_TYPE,
        &[1, 1, batch_size_input],
        &[feature_count * elem, elem, feature_count * elem],
        &[elem],
    )?;

    for param in 0..3 {
        for sample in 0..data.space().batch_size(param) {
            rng::fill_normal(data.input_slice_mut::<T>(param, sample), 0.0, 1.0);
        }
    }

    for input_i in 0..batch_size_input {
        let flat = data.space().flat_index(&[0, 0, input_i]);
        let value = inference(
            degree,
            data.input_slice::<T>(0, 0),
            data.input_slice::<T>(1, 0)[0],
            data.input_slice::<T>(2, input_i),
        );
        data.expected_slice_mut::<T>(0, flat)[0] = value;
    }

    Ok(data)
}

/// One inference: linear part accumulated in `T`, sigmoid evaluated in f64.
pub(crate) fn inference<T: Element>(degree: SigmoidDegree, w: &[T], b: T, x: &[T]) -> T {
    let linear = super::dotproduct::dot(w, x).add(b);
    T::from_f64(sigmoid(degree, linear.to_f64()))
}

pub(crate) fn sigmoid(degree: SigmoidDegree, x: f64) -> f64 {
    match degree {
        SigmoidDegree::Exact => 1.0 / (1.0 + (-x).exp()),
        SigmoidDegree::D3 => horner(x, &POLY_D3),
        SigmoidDegree::D5 => horner(x, &POLY_D5),
        SigmoidDegree::D7 => horner(x, &POLY_D7),
    }
}

/// Evaluate a polynomial given in ascending powers:
/// `a_n x^n + … + a_0 == (…((a_n x + a_n-1) x + a_n-2) x … ) x + a_0`.
fn horner(x: f64, coeff: &[f64]) -> f64 {
    let mut iter = coeff.iter().rev();
    let mut acc = *iter.next().expect("polynomial has at least one coefficient");
    for &c in iter {
        acc = acc * x + c;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approximations_pass_through_one_half_at_zero() {
        for degree in [
            SigmoidDegree::Exact,
            SigmoidDegree::D3,
            SigmoidDegree::D5,
            SigmoidDegree::D7,
        ] {
            assert_eq!(sigmoid(degree, 0.0), 0.5);
        }
    }

    #[test]
    fn degree_three_at_two() {
        // 0.5 + 0.15012*2 - 0.0015930078125*8
        let expect = 0.7874959375;
        assert!((sigmoid(SigmoidDegree::D3, 2.0) - expect).abs() < 1e-10);
    }

    #[test]
    fn inference_with_unit_weights() {
        let w = [1.0f64, 1.0];
        let x = [1.0f64, 1.0];
        let y = inference(SigmoidDegree::D3, &w, 0.0, &x);
        assert!((y - 0.7874959375).abs() < 1e-10);

        let zero = inference(SigmoidDegree::D3, &w, 0.0, &[0.0, 0.0]);
        assert_eq!(zero, 0.5);
    }

    #[test]
    fn exact_sigmoid_is_monotone() {
        let lo = sigmoid(SigmoidDegree::Exact, -4.0);
        let mid = sigmoid(SigmoidDegree::Exact, 0.0);
        let hi = sigmoid(SigmoidDegree::Exact, 4.0);
        assert!(lo < mid && mid < hi);
        assert!(lo > 0.0 && hi < 1.0);
    }

    #[test]
    fn integer_data_types_are_rejected() {
        let _guard = rng::lock_for_tests();
        rng::seed(5);
        assert!(matches!(
            generate(SigmoidDegree::Exact, 4, 2, DataType::Int32),
            Err(DataError::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn result_batch_tracks_the_input_batch() {
        let _guard = rng::lock_for_tests();
        rng::seed(11);
        let data = generate(SigmoidDegree::D5, 4, 3, DataType::Float64).unwrap();
        assert_eq!(data.space().result_batch_size(), 3);
        for input_i in 0..3 {
            let flat = data.space().flat_index(&[0, 0, input_i]);
            let expect = inference(
                SigmoidDegree::D5,
                data.input_slice::<f64>(0, 0),
                data.input_slice::<f64>(1, 0)[0],
                data.input_slice::<f64>(2, input_i),
            );
            assert_eq!(data.expected_slice::<f64>(0, flat)[0], expect);
        }
    }
}
