// henv - reusable isolated hook environments for multi-toolchain runners

pub mod core;
pub mod envcontext;
pub mod error;
pub mod language;
pub mod process;
pub mod repository;
pub mod xargs;

// Re-export main types for easier access
pub use crate::core::Hook;
pub use envcontext::{path_separator, EnvGuard, EnvOp, EnvPatch, Environment};
pub use error::{
    exit_codes, ConfigError, HealthError, HenvError, InstallError, ProcessError, Result,
    StorageError,
};
pub use language::environment::{
    default_cache_root, EnvironmentIdentity, EnvironmentManager, InstalledEnvironment,
};
pub use language::{
    CondaLanguage, InstallContext, Language, SystemLanguage, Toolchain, SUPPORTED_LANGUAGES,
};
pub use process::{ProcessConfig, ProcessManager, ProcessResult};
pub use repository::Repository;
pub use xargs::{platform_max_length, BatchResult, RunResult, XargsConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_constant() {
        assert_eq!(NAME, "henv");
    }

    #[test]
    fn test_description_exists() {
        assert!(DESCRIPTION.contains("hook environments"));
    }
}
