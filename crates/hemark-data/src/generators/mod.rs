//! Per-workload reference data generators.
//!
//! Each generator draws inputs from the global seeded generator and computes
//! the expected output for every point of the sample space in the declared
//! data type, exactly once, before the benchmark runs.

pub mod dotproduct;
pub mod eltwise;
pub mod logreg;
pub mod matmult;

pub use eltwise::EltwiseKind;
pub use logreg::SigmoidDegree;
