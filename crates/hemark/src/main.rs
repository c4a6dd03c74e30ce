//! hemark CLI - benchmark a homomorphic-encryption backend library.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hemark::{cancel, Config, Engine, Error};
use hemark_abi::SharedLibBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit codes per the harness contract.
const EXIT_SUCCESS: i32 = 0;
const EXIT_VALIDATION_FAILED: i32 = 1;
const EXIT_BACKEND_ERROR: i32 = 2;
const EXIT_CONFIG_ERROR: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "hemark")]
#[command(about = "Benchmarking test harness for homomorphic-encryption backends")]
#[command(version)]
struct Cli {
    /// Backend shared library to benchmark (overrides the config file)
    #[arg(long = "backend_lib_path")]
    backend_lib_path: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long = "config_file")]
    config_file: Option<PathBuf>,

    /// Print the default configuration as YAML and exit
    #[arg(long)]
    dump: bool,

    /// Seed for the data generators (overrides the config file)
    #[arg(long = "random_seed")]
    random_seed: Option<u64>,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, conflicts_with = "verbose")]
    silent: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "hemark=debug"
    } else if cli.silent {
        "hemark=error"
    } else {
        "hemark=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().unwrap()),
        )
        .with_target(false)
        .init();

    if cli.dump {
        print!("{}", Config::default().to_yaml());
        return;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    let Some(lib_path) = config.backend_lib_path.clone() else {
        eprintln!("Error: no backend library; pass --backend_lib_path or set it in the config");
        std::process::exit(EXIT_CONFIG_ERROR);
    };

    cancel::install_sigint_handler();

    let backend = match SharedLibBackend::load(&lib_path) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("Error loading backend: {}", err);
            std::process::exit(EXIT_BACKEND_ERROR);
        }
    };
    info!(path = %lib_path.display(), "backend loaded");

    let engine = Engine::new(Arc::new(backend));
    let report_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match engine.run(&config, &report_root) {
        Ok(summary) => {
            println!(
                "{} benchmarks: {} passed, {} failed",
                summary.total,
                summary.passed,
                summary.failures.len()
            );
            if summary.failures.is_empty() {
                std::process::exit(EXIT_SUCCESS);
            }
            std::process::exit(EXIT_VALIDATION_FAILED);
        }
        Err(Error::Cancelled) => {
            eprintln!("Interrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(err @ Error::Config(_)) => {
            eprintln!("Error: {}", err);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(EXIT_BACKEND_ERROR);
        }
    }
}

fn load_config(cli: &Cli) -> hemark::Result<Config> {
    let mut config = match &cli.config_file {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::default(),
    };
    if let Some(path) = &cli.backend_lib_path {
        config.backend_lib_path = Some(path.clone());
    }
    if let Some(seed) = cli.random_seed {
        config.random_seed = Some(seed);
    }
    Ok(config)
}
