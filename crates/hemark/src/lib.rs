//! hemark - benchmarking test harness for homomorphic-encryption backends.
//!
//! A backend shared library describes the benchmark variants it supports; the
//! harness matches each descriptor against its workload catalog, generates
//! reference data, drives the backend through the fixed pipeline
//! (encode → encrypt → load → operate → store → decrypt → decode), times every
//! stage, validates the results against cleartext ground truth and writes a
//! CSV report per benchmark.

pub mod benchmark;
pub mod cancel;
pub mod config;
pub mod description;
pub mod drivers;
pub mod engine;
mod error;
pub mod sanitize;
pub mod test_support;
pub mod validator;

pub use config::{BenchConfig, Config};
pub use description::{BenchmarkDescription, DescriptionToken, MatcherId};
pub use engine::{Engine, RunSummary};
pub use error::{Error, Result};
pub use validator::ValidationFailure;
