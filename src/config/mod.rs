use std::{
    env,
    str::FromStr,
    time::Duration,
};

const DEFAULT_RUN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_JAVA_MAX_HEAP: &str = "256m";
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1 << 20;

/// Limits and toolchain locations used by the sandbox executor.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub run_timeout: Duration,
    pub compile_timeout: Duration,
    pub java_max_heap: String,
    /// Per-stream cap on captured stdout/stderr.
    pub max_output_bytes: usize,
    pub python_bin: String,
    pub javac_bin: String,
    pub java_bin: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
            compile_timeout: Duration::from_secs(DEFAULT_COMPILE_TIMEOUT_SECS),
            java_max_heap: DEFAULT_JAVA_MAX_HEAP.to_string(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            python_bin: "python3".to_string(),
            javac_bin: "javac".to_string(),
            java_bin: "java".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Missing or unparseable
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RunnerConfig::default();
        let text = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };

        RunnerConfig {
            run_timeout: Duration::from_secs(parse_or(
                lookup("RUN_TIMEOUT_SECS"),
                DEFAULT_RUN_TIMEOUT_SECS,
            )),
            compile_timeout: Duration::from_secs(parse_or(
                lookup("COMPILE_TIMEOUT_SECS"),
                DEFAULT_COMPILE_TIMEOUT_SECS,
            )),
            java_max_heap: text("JAVA_MAX_HEAP", defaults.java_max_heap),
            max_output_bytes: parse_or(lookup("MAX_OUTPUT_BYTES"), DEFAULT_MAX_OUTPUT_BYTES),
            python_bin: text("PYTHON_BIN", defaults.python_bin),
            javac_bin: text("JAVAC_BIN", defaults.javac_bin),
            java_bin: text("JAVA_BIN", defaults.java_bin),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, fallback: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}
