// Process execution primitive: run a program with an explicit environment,
// capture output, and report a normal exit code. Failure to start is an error;
// a non-zero exit is not.

use crate::error::{ProcessError, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Process execution configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub inherit_env: bool,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            environment: HashMap::new(),
            timeout: None,
            inherit_env: false,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_environment(mut self, env: HashMap<String, String>) -> Self {
        self.environment = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }
}

/// Result of one completed process invocation
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Captured stdout followed by captured stderr
    pub fn combined_output(&self) -> String {
        let mut output = self.stdout();
        output.push_str(&self.stderr());
        output
    }
}

/// Executes external processes for installers and hook batches
#[derive(Debug, Clone)]
pub struct ProcessManager {
    default_timeout: Duration,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub async fn execute_async(&self, config: ProcessConfig) -> Result<ProcessResult> {
        use std::process::Stdio;
        use tokio::io::AsyncReadExt;
        use tokio::process::Command;
        use tokio::time::timeout;

        let start_time = std::time::Instant::now();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        if !config.inherit_env {
            cmd.env_clear();
        }
        for (key, value) in &config.environment {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Box::new(ProcessError::CommandNotFound {
                    command: config.command.clone(),
                    suggestion: Some(format!(
                        "Install {} or add it to PATH",
                        config.command
                    )),
                })
            } else {
                Box::new(ProcessError::SpawnFailed {
                    command: config.command.clone(),
                    error: e.to_string(),
                })
            }
        })?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let timeout_duration = config.timeout.unwrap_or(self.default_timeout);

        let execution_result = timeout(timeout_duration, async {
            let mut stdout_data = Vec::new();
            let mut stderr_data = Vec::new();

            let stdout_read = async {
                if let Some(stdout) = stdout_pipe.as_mut() {
                    stdout.read_to_end(&mut stdout_data).await.map(|_| ())
                } else {
                    Ok(())
                }
            };
            let stderr_read = async {
                if let Some(stderr) = stderr_pipe.as_mut() {
                    stderr.read_to_end(&mut stderr_data).await.map(|_| ())
                } else {
                    Ok(())
                }
            };
            let (stdout_result, stderr_result) = tokio::join!(stdout_read, stderr_read);
            stdout_result.and(stderr_result).map_err(|e| {
                Box::new(ProcessError::OutputCaptureFailed {
                    message: format!("Failed to read process output: {e}"),
                    command: config.command.clone(),
                })
            })?;

            let exit_status = child.wait().await.map_err(|e| {
                Box::new(ProcessError::ExecutionFailed {
                    command: config.command.clone(),
                    exit_code: None,
                    stderr: format!("Failed to wait for process: {e}"),
                })
            })?;

            Ok::<ProcessResult, Box<ProcessError>>(ProcessResult {
                // A signal-terminated process reports no code; treat it as a
                // plain failure exit.
                exit_code: exit_status.code().unwrap_or(1),
                stdout: stdout_data,
                stderr: stderr_data,
                duration: start_time.elapsed(),
            })
        })
        .await;

        match execution_result {
            Ok(result) => Ok(result?),
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                Err(Box::new(ProcessError::Timeout {
                    command: config.command,
                    duration: timeout_duration,
                })
                .into())
            }
        }
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
