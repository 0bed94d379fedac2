// Repository façade: resolves each declared hook to its toolchain, drives
// install-then-run against the environment cache, and reports language usage.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::Hook;
use crate::error::{ConfigError, Result};
use crate::language::environment::{EnvironmentIdentity, EnvironmentManager, InstalledEnvironment};
use crate::language::Language;
use crate::process::ProcessManager;
use crate::xargs::{RunResult, XargsConfig};

pub struct Repository {
    /// Source root: manifest location and working directory for hooks
    root: PathBuf,
    hooks: Vec<Hook>,
    env_manager: Arc<EnvironmentManager>,
    process: ProcessManager,
    xargs_config: XargsConfig,
    environments: parking_lot::RwLock<HashMap<String, Arc<InstalledEnvironment>>>,
}

impl Repository {
    pub fn new(
        root: impl Into<PathBuf>,
        hooks: Vec<Hook>,
        env_manager: Arc<EnvironmentManager>,
    ) -> Self {
        Self {
            root: root.into(),
            hooks,
            env_manager,
            process: ProcessManager::new(),
            xargs_config: XargsConfig::default(),
            environments: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    pub fn with_xargs_config(mut self, config: XargsConfig) -> Self {
        self.xargs_config = config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// The set of language tags across all declared hooks
    pub fn languages(&self) -> HashSet<String> {
        self.hooks.iter().map(|h| h.language.clone()).collect()
    }

    fn find_hook(&self, hook_id: &str) -> Result<&Hook> {
        self.hooks.iter().find(|h| h.id == hook_id).ok_or_else(|| {
            Box::new(ConfigError::UnknownHook {
                hook_id: hook_id.to_string(),
                available: self.hooks.iter().map(|h| h.id.clone()).collect(),
            })
            .into()
        })
    }

    async fn ensure_for_hook(&self, hook: &Hook) -> Result<Arc<InstalledEnvironment>> {
        if let Some(environment) = self.environments.read().get(&hook.id) {
            return Ok(environment.clone());
        }
        let language = Language::from_name(&hook.language)?;
        let identity = EnvironmentIdentity::for_hook(&language, hook);
        let environment = self
            .env_manager
            .ensure(&language, &self.root, &identity)
            .await?;
        self.environments
            .write()
            .insert(hook.id.clone(), environment.clone());
        Ok(environment)
    }

    /// Install the environment for every declared hook
    pub async fn install(&self) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = %hook.id, language = %hook.language, "ensuring hook environment");
            self.ensure_for_hook(hook).await?;
        }
        Ok(())
    }

    /// Run one hook against a list of target files
    pub async fn run_hook(&self, hook_id: &str, file_args: &[String]) -> Result<RunResult> {
        let hook = self.find_hook(hook_id)?;
        let language = Language::from_name(&hook.language)?;
        let environment = self.ensure_for_hook(hook).await?;
        language.health_check(&environment)?;

        let files: &[String] = if hook.pass_filenames { file_args } else { &[] };
        debug!(hook = %hook.id, files = files.len(), "running hook");
        language
            .run_hook(
                &environment,
                &hook.command_prefix(),
                files,
                Some(&self.root),
                &self.process,
                &self.xargs_config,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(hooks: Vec<Hook>) -> (tempfile::TempDir, tempfile::TempDir, Repository) {
        let root = tempfile::TempDir::new().unwrap();
        let cache = tempfile::TempDir::new().unwrap();
        let manager = Arc::new(EnvironmentManager::new(cache.path()).unwrap());
        let repo = Repository::new(root.path(), hooks, manager);
        (root, cache, repo)
    }

    #[test]
    fn test_languages_is_the_tag_union() {
        let (_root, _cache, repo) = repository(vec![
            Hook::new("a", "echo", "system"),
            Hook::new("b", "echo", "system"),
            Hook::new("c", "flake8", "conda"),
        ]);
        let languages = repo.languages();
        assert_eq!(languages.len(), 2);
        assert!(languages.contains("system"));
        assert!(languages.contains("conda"));
    }

    #[tokio::test]
    async fn test_unknown_hook_is_a_config_error() {
        let (_root, _cache, repo) = repository(vec![Hook::new("a", "echo", "system")]);
        let err = repo.run_hook("missing", &[]).await.unwrap_err();
        assert!(err.to_string().contains("Unknown hook: missing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_system_hook_with_files() {
        let (_root, _cache, repo) = repository(vec![Hook::new("echo", "echo", "system")]);
        let result = repo
            .run_hook("echo", &["a.py".to_string(), "b.py".to_string()])
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.output, "a.py b.py\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pass_filenames_false_runs_once_without_files() {
        let (_root, _cache, repo) = repository(vec![
            Hook::new("cwd", "pwd", "system").with_pass_filenames(false)
        ]);
        let result = repo
            .run_hook("cwd", &["ignored.py".to_string()])
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(result.batch_count, 1);
        assert!(!result.output.contains("ignored.py"));
    }
}
