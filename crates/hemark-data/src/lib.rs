//! Reference data for hemark benchmarks.
//!
//! Owns the multi-dimensional sample space of input/expected buffers and the
//! per-workload generators that fill it. All randomness flows through one
//! process-global seeded generator so a run is reproducible from its seed.

mod element;
mod error;
pub mod generators;
mod pack;
pub mod rng;

pub use element::Element;
pub use error::DataError;
pub use pack::{OutputBatch, RawPacks, SampleSpace, TestData, BUFFER_ALIGN};
