// Batched command invocation for unbounded file-argument lists.
//
// A hook may target tens of thousands of files; a single invocation would
// blow past the operating system's command-line length ceiling. Arguments are
// greedily packed into batches under the ceiling, every batch runs in input
// order regardless of earlier failures, and the results reduce to one logical
// outcome.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::Result;
use crate::process::{ProcessConfig, ProcessManager};

// Headroom reserved for the shebang/implementation overhead of the spawned
// command line.
const LENGTH_MARGIN: usize = 2048;

static PLATFORM_MAX_LENGTH: Lazy<usize> = Lazy::new(detect_platform_max_length);

#[cfg(unix)]
fn detect_platform_max_length() -> usize {
    let arg_max = unsafe { libc::sysconf(libc::_SC_ARG_MAX) };
    let arg_max = if arg_max > 0 {
        arg_max as usize
    } else {
        1 << 17
    };
    // The environment block counts against ARG_MAX on exec.
    let environ_size: usize = std::env::vars_os()
        .map(|(k, v)| k.len() + v.len() + 2)
        .sum();
    let available = arg_max.saturating_sub(environ_size).saturating_sub(LENGTH_MARGIN);
    available.clamp(1 << 12, 1 << 17)
}

#[cfg(not(unix))]
fn detect_platform_max_length() -> usize {
    // CreateProcess limit, minus headroom.
    (1 << 15) - LENGTH_MARGIN
}

/// Host command-line length ceiling, computed once
pub fn platform_max_length() -> usize {
    *PLATFORM_MAX_LENGTH
}

/// Batching configuration
#[derive(Debug, Clone)]
pub struct XargsConfig {
    /// Maximum serialized length of one invocation (command plus batch)
    pub max_length: usize,
    /// Per-batch execution timeout
    pub timeout: Option<Duration>,
}

impl Default for XargsConfig {
    fn default() -> Self {
        Self {
            max_length: platform_max_length(),
            timeout: None,
        }
    }
}

impl XargsConfig {
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }
}

/// Outcome of one batch invocation
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub exit_code: i32,
    pub output: String,
}

/// Aggregated outcome of a batched run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// 0 if every batch exited 0, otherwise the first non-zero exit code
    pub exit_code: i32,
    /// Per-batch combined output, concatenated in invocation order
    pub output: String,
    /// Number of batches executed
    pub batch_count: usize,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn from_batches(batches: Vec<BatchResult>) -> Self {
        let mut exit_code = 0;
        let mut output = String::new();
        let batch_count = batches.len();
        for batch in batches {
            if exit_code == 0 && batch.exit_code != 0 {
                exit_code = batch.exit_code;
            }
            output.push_str(&batch.output);
        }
        Self {
            exit_code,
            output,
            batch_count,
        }
    }
}

fn serialized_len(token: &str) -> usize {
    // One byte per separating space / terminator.
    token.len() + 1
}

/// Greedily partition `file_args` into batches whose serialized length,
/// together with `command`, stays under `max_length`. Every argument lands in
/// exactly one batch; an argument that alone exceeds the budget gets its own
/// batch rather than being dropped or truncated. Zero arguments yield one
/// empty batch so the command still runs once.
pub fn partition(command: &[String], file_args: &[String], max_length: usize) -> Vec<Vec<String>> {
    let prefix_len: usize = command.iter().map(|t| serialized_len(t)).sum();
    let budget = max_length.saturating_sub(prefix_len).max(1);

    if file_args.is_empty() {
        return vec![Vec::new()];
    }

    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for arg in file_args {
        let cost = serialized_len(arg);
        if !current.is_empty() && current_len + cost > budget {
            batches.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(arg.clone());
        current_len += cost;
        if current_len > budget {
            // Oversized single argument: ship it alone.
            batches.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Run `command` against `file_args`, batched under the length ceiling.
///
/// Batches execute strictly in partition order and all of them run even after
/// a failure, so one run surfaces the full error set. A batch that cannot be
/// started at all (missing executable, spawn failure) is an error and aborts
/// the run; a non-zero exit is a normal outcome folded into the result.
pub async fn run_batched(
    manager: &ProcessManager,
    command: &[String],
    file_args: &[String],
    environment: &HashMap<String, String>,
    working_dir: Option<&Path>,
    config: &XargsConfig,
) -> Result<RunResult> {
    debug_assert!(!command.is_empty());
    let program = &command[0];
    let fixed_args = &command[1..];

    let batches = partition(command, file_args, config.max_length);
    debug!(
        program = %program,
        files = file_args.len(),
        batches = batches.len(),
        max_length = config.max_length,
        "running batched command"
    );

    let mut results = Vec::with_capacity(batches.len());
    for (index, batch) in batches.into_iter().enumerate() {
        let mut process_config = ProcessConfig::new(program.clone())
            .with_args(fixed_args.iter().cloned())
            .with_args(batch)
            .with_environment(environment.clone());
        if let Some(dir) = working_dir {
            process_config = process_config.with_working_dir(dir);
        }
        if let Some(timeout) = config.timeout {
            process_config = process_config.with_timeout(timeout);
        }

        let result = manager.execute_async(process_config).await?;
        if !result.success() {
            debug!(batch = index, exit_code = result.exit_code, "batch failed");
        }
        results.push(BatchResult {
            exit_code: result.exit_code,
            output: result.combined_output(),
        });
    }

    Ok(RunResult::from_batches(results))
}
