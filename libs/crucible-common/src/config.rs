//! Engine configuration.
//!
//! Every knob the operator may tune lives here: toolchain command and
//! timeout, run-phase resource ceilings, and the work-root directory that
//! per-submission workspaces are created under. All fields default
//! individually so a partial JSON config file is enough.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// C compiler command, resolved via PATH.
    #[serde(default = "default_cc")]
    pub cc: String,
    /// Extra flags appended after source/output. Strict warnings stay on so
    /// compiler stderr gives the learner something to work with.
    #[serde(default = "default_cc_args")]
    pub extra_args: Vec<String>,
    /// Deadline for the compiler subprocess, distinct from the run timeout.
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,
    /// Submissions larger than this are rejected before anything is written.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cc: default_cc(),
            extra_args: default_cc_args(),
            compile_timeout_ms: default_compile_timeout_ms(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

/// Resource ceilings for one sandboxed run. Wall time is the hard deadline;
/// the rest are best-effort OS limits applied where the platform supports
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLimits {
    #[serde(default = "default_wall_time_ms")]
    pub wall_time_ms: u64,
    #[serde(default = "default_cpu_time_secs")]
    pub cpu_time_secs: Option<u64>,
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: Option<u64>,
    #[serde(default = "default_max_processes")]
    pub max_processes: Option<u64>,
    /// Cap on captured bytes per stream; output past the cap is drained and
    /// discarded so a chatty program cannot wedge the pipe.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            wall_time_ms: default_wall_time_ms(),
            cpu_time_secs: default_cpu_time_secs(),
            memory_bytes: default_memory_bytes(),
            max_processes: default_max_processes(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub limits: RunLimits,
    /// Base directory for per-submission workspaces. Defaults to the system
    /// temp directory.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig::default(),
            limits: RunLimits::default(),
            work_root: default_work_root(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }
}

fn default_cc() -> String {
    "gcc".to_string()
}

fn default_cc_args() -> Vec<String> {
    vec![
        "-Wall".to_string(),
        "-Wextra".to_string(),
        "-lpthread".to_string(),
    ]
}

fn default_compile_timeout_ms() -> u64 {
    10_000
}

fn default_max_source_bytes() -> usize {
    64 * 1024
}

fn default_wall_time_ms() -> u64 {
    5_000
}

fn default_cpu_time_secs() -> Option<u64> {
    Some(5)
}

fn default_memory_bytes() -> Option<u64> {
    Some(256 * 1024 * 1024)
}

fn default_max_processes() -> Option<u64> {
    Some(64)
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir()
}
