// Language plugin architecture: one toolchain family per variant.
//
// Dispatch is a tagged union over toolchain families with a uniform operation
// surface. Adding a toolchain means adding one variant and its backend; the
// dispatch core never changes.

pub mod base;
pub mod conda;
pub mod environment;
pub mod system;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::envcontext::{EnvPatch, Environment};
use crate::error::{ConfigError, Result};
use crate::process::ProcessManager;
use crate::xargs::{self, RunResult, XargsConfig};

use environment::{EnvironmentIdentity, InstalledEnvironment};

pub use conda::CondaLanguage;
pub use system::SystemLanguage;

/// Language tags with a built-in toolchain backend
pub const SUPPORTED_LANGUAGES: &[&str] = &["conda", "system"];

/// Everything a backend needs to install one environment
pub struct InstallContext<'a> {
    pub identity: &'a EnvironmentIdentity,
    /// Source root holding the toolchain manifest; also the installer's cwd
    pub src_root: &'a Path,
    /// Destination directory for the installed environment
    pub env_root: &'a Path,
    pub process: &'a ProcessManager,
    /// Remove an already-populated destination and reinstall
    pub clean: bool,
}

/// Uniform contract implemented by every toolchain family.
///
/// `install` must be idempotent for an already-populated destination unless
/// `clean` is requested, and must leave a partially-created directory in
/// place on failure so the caller can inspect it. `health_check` is cheap and
/// side-effect free.
#[async_trait]
pub trait Toolchain: Send + Sync {
    fn language_name(&self) -> &'static str;

    /// Version token meaning "defer to the system default" unless the family
    /// supports explicit pinning.
    fn default_version(&self) -> String {
        base::DEFAULT_VERSION.to_string()
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> Result<()>;

    fn health_check(&self, environment: &InstalledEnvironment) -> Result<()>;

    /// Ordered activation patch for an environment rooted at `env_root`
    fn env_patch(&self, env_root: &Path) -> EnvPatch;

    /// Run a hook command under the activated environment, batching file
    /// arguments under the command-length ceiling.
    async fn run_hook(
        &self,
        environment: &InstalledEnvironment,
        command: &[String],
        file_args: &[String],
        working_dir: Option<&Path>,
        process: &ProcessManager,
        config: &XargsConfig,
    ) -> Result<RunResult> {
        let vars = self.activated_vars(&environment.root);
        xargs::run_batched(process, command, file_args, &vars, working_dir, config).await
    }

    /// Process-environment snapshot with the activation patch applied
    fn activated_vars(&self, env_root: &Path) -> HashMap<String, String> {
        let mut env = Environment::from_process();
        let guard = env.apply(&self.env_patch(env_root));
        guard.to_map()
    }
}

/// Tagged union over the built-in toolchain families
#[derive(Debug, Clone)]
pub enum Language {
    Conda(CondaLanguage),
    System(SystemLanguage),
}

impl Language {
    /// Resolve a declared language tag to its toolchain
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "conda" => Ok(Language::Conda(CondaLanguage)),
            "system" => Ok(Language::System(SystemLanguage)),
            _ => Err(Box::new(ConfigError::UnknownLanguage {
                language: name.to_string(),
                available: SUPPORTED_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            })
            .into()),
        }
    }

    fn backend(&self) -> &dyn Toolchain {
        match self {
            Language::Conda(lang) => lang,
            Language::System(lang) => lang,
        }
    }

    pub fn name(&self) -> &'static str {
        self.backend().language_name()
    }

    pub fn default_version(&self) -> String {
        self.backend().default_version()
    }

    pub async fn install(&self, ctx: &InstallContext<'_>) -> Result<()> {
        self.backend().install(ctx).await
    }

    pub fn health_check(&self, environment: &InstalledEnvironment) -> Result<()> {
        self.backend().health_check(environment)
    }

    pub fn env_patch(&self, env_root: &Path) -> EnvPatch {
        self.backend().env_patch(env_root)
    }

    pub async fn run_hook(
        &self,
        environment: &InstalledEnvironment,
        command: &[String],
        file_args: &[String],
        working_dir: Option<&Path>,
        process: &ProcessManager,
        config: &XargsConfig,
    ) -> Result<RunResult> {
        self.backend()
            .run_hook(environment, command, file_args, working_dir, process, config)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_resolution() {
        assert_eq!(Language::from_name("conda").unwrap().name(), "conda");
        assert_eq!(Language::from_name("system").unwrap().name(), "system");
    }

    #[test]
    fn test_unknown_language_lists_available() {
        let err = Language::from_name("fortran").unwrap_err();
        assert!(err.to_string().contains("Unknown language: fortran"));
    }

    #[test]
    fn test_default_version_sentinel() {
        let language = Language::from_name("conda").unwrap();
        assert_eq!(language.default_version(), base::DEFAULT_VERSION);
    }
}
