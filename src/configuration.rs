//! Config for the evaluation pipeline behaviors.
//!
//! Configuration can be created programmatically using [`Configuration::new()`]
//! or by reading environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional; an unset or unparsable variable falls back to its
//! default.
//!
//! - `BENCH_LOG` — enable logging to a file (default: `false`)
//! - `DATASETS_DIR` — directory containing phase dataset files (default: `datasets`)
//! - `REQUEST_CONNECT_TIMEOUT_MS` — endpoint connect timeout in milliseconds (default: `2000`)
//! - `REQUEST_READ_TIMEOUT_MS` — endpoint read timeout in milliseconds (default: `3000`)
//! - `RUN_TIME_LIMIT_SECS` — wall-clock budget per run before the reaper cuts losses (default: `1200`)
//! - `WORKER_CONCURRENCY` — max concurrent sample workers per batch (default: number of CPUs)
//! - `QUEUE_MAX_BATCH` — max messages per queue batch send (default: `10`)
//! - `MAX_DATASET_ROWS` — cap on rows dispatched per run (default: unlimited)

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the dispatch, worker and finalizer components.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) log: bool,
    pub(crate) datasets_dir: PathBuf,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) run_time_limit: Duration,
    pub(crate) worker_concurrency: usize,
    pub(crate) max_batch_size: usize,
    pub(crate) max_rows: Option<usize>,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Logging to file is disabled.
    /// - Datasets are looked up under `datasets/`.
    /// - Endpoint calls use a 2 s connect timeout and a 3 s read timeout.
    /// - A run is time-boxed to 20 minutes.
    /// - Worker concurrency equals the number of CPUs.
    /// - Queue batches hold at most 10 messages.
    /// - No cap on dataset rows.
    pub fn new() -> Self {
        Self {
            log: false,
            datasets_dir: PathBuf::from("datasets"),
            connect_timeout: Duration::from_millis(2000),
            read_timeout: Duration::from_millis(3000),
            run_time_limit: Duration::from_secs(1200),
            worker_concurrency: num_cpus::get(),
            max_batch_size: 10,
            max_rows: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the recognized variables. Any other
    /// value (including unset) will result in using the default value for
    /// each field.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn parse_usize(var: &str) -> Option<usize> {
            std::env::var(var).ok()?.parse().ok()
        }

        fn parse_duration_ms(var: &str) -> Option<Duration> {
            Some(Duration::from_millis(std::env::var(var).ok()?.parse().ok()?))
        }

        fn parse_duration_secs(var: &str) -> Option<Duration> {
            Some(Duration::from_secs(std::env::var(var).ok()?.parse().ok()?))
        }

        let defaults = Self::new();
        Self {
            log: get_env_flag("BENCH_LOG", false),
            datasets_dir: std::env::var("DATASETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.datasets_dir),
            connect_timeout: parse_duration_ms("REQUEST_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout),
            read_timeout: parse_duration_ms("REQUEST_READ_TIMEOUT_MS")
                .unwrap_or(defaults.read_timeout),
            run_time_limit: parse_duration_secs("RUN_TIME_LIMIT_SECS")
                .unwrap_or(defaults.run_time_limit),
            worker_concurrency: parse_usize("WORKER_CONCURRENCY")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.worker_concurrency),
            max_batch_size: parse_usize("QUEUE_MAX_BATCH")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_batch_size),
            max_rows: parse_usize("MAX_DATASET_ROWS"),
        }
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Set the directory containing phase dataset files.
    pub fn with_datasets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.datasets_dir = dir.into();
        self
    }

    /// Set the endpoint connect timeout.
    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Set the endpoint read timeout.
    pub fn with_read_timeout(mut self, value: Duration) -> Self {
        self.read_timeout = value;
        self
    }

    /// Set the wall-clock budget after which the reaper finalizes a run with
    /// whatever predictions exist.
    pub fn with_run_time_limit(mut self, value: Duration) -> Self {
        self.run_time_limit = value;
        self
    }

    /// Set the maximum number of sample workers running concurrently within
    /// one batch invocation. Values below 1 are treated as 1.
    pub fn with_worker_concurrency(mut self, value: usize) -> Self {
        self.worker_concurrency = value.max(1);
        self
    }

    /// Set the maximum number of messages per queue batch send. Values below
    /// 1 are treated as 1.
    pub fn with_max_batch_size(mut self, value: usize) -> Self {
        self.max_batch_size = value.max(1);
        self
    }

    /// Cap the number of dataset rows dispatched per run.
    pub fn with_max_rows(mut self, value: usize) -> Self {
        self.max_rows = Some(value);
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
