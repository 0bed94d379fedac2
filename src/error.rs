// Error handling framework for henv
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HenvError>;

/// Main error type for henv
#[derive(Debug, Error)]
pub enum HenvError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Environment installation failed: {0}")]
    Install(#[from] Box<InstallError>),

    #[error("Environment health check failed: {0}")]
    Health(#[from] Box<HealthError>),

    #[error("Process execution failed: {0}")]
    Process(#[from] Box<ProcessError>),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] Box<StorageError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Hook and language resolution errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown language: {language}")]
    UnknownLanguage {
        language: String,
        available: Vec<String>,
    },

    #[error("Unknown hook: {hook_id}")]
    UnknownHook {
        hook_id: String,
        available: Vec<String>,
    },

    #[error("Invalid configuration value: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
    },
}

/// External installer errors with captured diagnostics
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Installer exited non-zero for {language}: {command}")]
    InstallerFailed {
        language: String,
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Language {language} does not support version pinning: {version}")]
    VersionNotSupported {
        language: String,
        version: String,
        suggestion: Option<String>,
    },

    #[error("Failed to write default manifest: {path}")]
    ManifestSynthesisFailed { path: PathBuf, error: String },
}

/// Installed-environment verification errors
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Environment directory missing: {path}")]
    EnvironmentMissing { path: PathBuf },

    #[error("Executable not found in environment: {executable}")]
    ExecutableNotFound {
        executable: String,
        search_path: String,
    },
}

/// Process execution errors. A process that started and exited non-zero is a
/// normal run outcome, not one of these.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process spawn failed: {command}")]
    SpawnFailed { command: String, error: String },

    #[error("Command not found: {command}")]
    CommandNotFound {
        command: String,
        suggestion: Option<String>,
    },

    #[error("Output capture failed: {message}")]
    OutputCaptureFailed { message: String, command: String },

    #[error("Process execution failed: {command}")]
    ExecutionFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Process timeout after {duration:?}: {command}")]
    Timeout {
        command: String,
        duration: std::time::Duration,
    },
}

/// Environment cache storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cache directory creation failed: {path}")]
    CacheDirectoryFailed { path: PathBuf, error: String },

    #[error("Install lock acquisition failed: {path}")]
    LockFailed { path: PathBuf, error: String },
}

/// Exit codes for callers embedding henv in a CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const INSTALL_ERROR: i32 = 3;
    pub const HEALTH_ERROR: i32 = 4;
    pub const STORAGE_ERROR: i32 = 8;
    pub const PROCESS_ERROR: i32 = 9;
}

impl HenvError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HenvError::Config(_) => exit_codes::CONFIG_ERROR,
            HenvError::Install(_) => exit_codes::INSTALL_ERROR,
            HenvError::Health(_) => exit_codes::HEALTH_ERROR,
            HenvError::Storage(_) => exit_codes::STORAGE_ERROR,
            HenvError::Process(_) => exit_codes::PROCESS_ERROR,
            HenvError::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
