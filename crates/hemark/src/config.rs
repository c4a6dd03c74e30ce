//! Harness configuration.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_sample_size() -> u64 {
    100
}

fn default_tolerance() -> f64 {
    0.01
}

/// Harness configuration, read from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Samples per op parameter when the backend requests zero.
    #[serde(default = "default_sample_size")]
    pub default_sample_size: u64,

    /// Seed for the global generator; current time when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Minimum latency test time; zero defers to the descriptor's value.
    #[serde(default)]
    pub min_test_time_ms: u64,

    /// Relative tolerance for Float32 results.
    #[serde(default = "default_tolerance")]
    pub tolerance_f32: f64,

    /// Relative tolerance for Float64 results.
    #[serde(default = "default_tolerance")]
    pub tolerance_f64: f64,

    /// Backend shared library to benchmark.
    #[serde(default)]
    pub backend_lib_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sample_size: default_sample_size(),
            random_seed: None,
            min_test_time_ms: 0,
            tolerance_f32: default_tolerance(),
            tolerance_f64: default_tolerance(),
            backend_lib_path: None,
        }
    }
}

impl Config {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            Error::Config(format!("malformed config file {}: {}", path.display(), e))
        })
    }

    /// Serialize, e.g. for `--dump`.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).expect("config serialization cannot fail")
    }

    /// The seed to use for this run.
    pub fn resolved_seed(&self) -> u64 {
        self.random_seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }

    /// The slice of the configuration sealed into every benchmark token.
    pub fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            default_sample_size: self.default_sample_size,
            min_test_time_ms: self.min_test_time_ms,
            tolerance_f32: self.tolerance_f32,
            tolerance_f64: self.tolerance_f64,
        }
    }
}

/// Per-benchmark configuration derived from [`Config`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchConfig {
    pub default_sample_size: u64,
    pub min_test_time_ms: u64,
    pub tolerance_f32: f64,
    pub tolerance_f64: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.default_sample_size, 100);
        assert_eq!(config.random_seed, None);
        assert_eq!(config.min_test_time_ms, 0);
        assert_eq!(config.tolerance_f32, 0.01);
        assert_eq!(config.tolerance_f64, 0.01);
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = Config::default();
        config.random_seed = Some(42);
        config.backend_lib_path = Some(PathBuf::from("/opt/backend/libseal.so"));
        let yaml = config.to_yaml();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.random_seed, Some(42));
        assert_eq!(
            parsed.backend_lib_path.as_deref(),
            Some(Path::new("/opt/backend/libseal.so"))
        );
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("tolerance_f64: 0.05\n").unwrap();
        assert_eq!(parsed.tolerance_f64, 0.05);
        assert_eq!(parsed.tolerance_f32, 0.01);
        assert_eq!(parsed.default_sample_size, 100);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_yaml::from_str::<Config>("no_such_option: 1\n").is_err());
    }

    #[test]
    fn explicit_seed_wins() {
        let mut config = Config::default();
        config.random_seed = Some(7);
        assert_eq!(config.resolved_seed(), 7);
    }
}
