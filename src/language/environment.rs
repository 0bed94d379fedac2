// Environment identity and the install-once cache.
//
// An installed environment is keyed by (toolchain family, requested version,
// ordered extra dependencies). Equal identities always map to the same
// directory under the cache root; the manager guarantees at most one install
// per identity in-process, and best-effort across processes through a lock
// file next to the environment.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tracing::{debug, warn};

use super::{base, InstallContext, Language};
use crate::core::Hook;
use crate::error::{Result, StorageError};
use crate::process::ProcessManager;

/// Composite cache key for one installable environment. Immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentIdentity {
    language: String,
    version: String,
    additional_dependencies: Vec<String>,
}

impl EnvironmentIdentity {
    pub fn new(
        language: impl Into<String>,
        version: Option<String>,
        additional_dependencies: Vec<String>,
    ) -> Self {
        Self {
            language: language.into(),
            version: version.unwrap_or_else(|| base::DEFAULT_VERSION.to_string()),
            additional_dependencies,
        }
    }

    /// Identity for a declared hook under its resolved language
    pub fn for_hook(language: &Language, hook: &Hook) -> Self {
        Self::new(
            language.name(),
            hook.language_version.clone(),
            hook.additional_dependencies.clone(),
        )
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn additional_dependencies(&self) -> &[String] {
        &self.additional_dependencies
    }

    /// Deterministic directory name: same identity, same directory;
    /// different dependency sets, different directories.
    pub fn dirname(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.additional_dependencies.hash(&mut hasher);
        format!(
            "{}env-{}-{:x}",
            self.language,
            self.version,
            hasher.finish()
        )
    }
}

/// A materialized environment directory and the identity that produced it
#[derive(Debug, Clone)]
pub struct InstalledEnvironment {
    pub identity: EnvironmentIdentity,
    pub root: PathBuf,
}

impl InstalledEnvironment {
    pub fn bin_dir(&self) -> PathBuf {
        base::bin_dir(&self.root)
    }
}

/// Default cache root under the user cache directory
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("henv")
}

/// Install-once environment cache
pub struct EnvironmentManager {
    cache_root: PathBuf,
    process: ProcessManager,
    install_locks: parking_lot::Mutex<HashMap<EnvironmentIdentity, Arc<tokio::sync::Mutex<()>>>>,
    installed: parking_lot::RwLock<HashMap<EnvironmentIdentity, Arc<InstalledEnvironment>>>,
}

impl EnvironmentManager {
    pub fn new(cache_root: impl Into<PathBuf>) -> Result<Self> {
        let cache_root = cache_root.into();
        std::fs::create_dir_all(&cache_root).map_err(|e| {
            Box::new(StorageError::CacheDirectoryFailed {
                path: cache_root.clone(),
                error: e.to_string(),
            })
        })?;
        Ok(Self {
            cache_root,
            process: ProcessManager::new(),
            install_locks: parking_lot::Mutex::new(HashMap::new()),
            installed: parking_lot::RwLock::new(HashMap::new()),
        })
    }

    pub fn with_default_cache_root() -> Result<Self> {
        Self::new(default_cache_root())
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Canonical on-disk location for an identity
    pub fn environment_path(&self, identity: &EnvironmentIdentity) -> PathBuf {
        self.cache_root.join(identity.dirname())
    }

    fn install_lock(&self, identity: &EnvironmentIdentity) -> Arc<tokio::sync::Mutex<()>> {
        self.install_locks
            .lock()
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Return the installed environment for `identity`, installing it first
    /// if absent. Repeated and concurrent calls for one identity observe a
    /// single install; an existing directory passes a lightweight existence
    /// check and is returned as-is.
    pub async fn ensure(
        &self,
        language: &Language,
        src_root: &Path,
        identity: &EnvironmentIdentity,
    ) -> Result<Arc<InstalledEnvironment>> {
        if let Some(environment) = self.installed.read().get(identity) {
            return Ok(environment.clone());
        }

        let lock = self.install_lock(identity);
        let _guard = lock.lock().await;

        // Another caller may have finished while this one waited.
        if let Some(environment) = self.installed.read().get(identity) {
            return Ok(environment.clone());
        }

        let env_root = self.environment_path(identity);
        if !env_root.exists() {
            let _file_lock = self.acquire_file_lock(identity)?;
            // A sibling process may have installed while the lock was held.
            if !env_root.exists() {
                debug!(
                    language = identity.language(),
                    env = %env_root.display(),
                    "installing environment"
                );
                language
                    .install(&InstallContext {
                        identity,
                        src_root,
                        env_root: &env_root,
                        process: &self.process,
                        clean: false,
                    })
                    .await?;
            }
        }

        let environment = Arc::new(InstalledEnvironment {
            identity: identity.clone(),
            root: env_root,
        });
        self.installed
            .write()
            .insert(identity.clone(), environment.clone());
        Ok(environment)
    }

    // Best-effort cross-process exclusion; in-process exclusion is already
    // guaranteed by the per-identity mutex. The lock releases when the
    // returned handle drops.
    fn acquire_file_lock(&self, identity: &EnvironmentIdentity) -> Result<FileLockGuard> {
        let lock_path = self.cache_root.join(format!(".{}.lock", identity.dirname()));
        let file = File::create(&lock_path).map_err(|e| {
            Box::new(StorageError::LockFailed {
                path: lock_path.clone(),
                error: e.to_string(),
            })
        })?;
        file.lock_exclusive().map_err(|e| {
            Box::new(StorageError::LockFailed {
                path: lock_path.clone(),
                error: e.to_string(),
            })
        })?;
        Ok(FileLockGuard { file, lock_path })
    }
}

struct FileLockGuard {
    file: File,
    lock_path: PathBuf,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.lock_path.display(), error = %e, "failed to release install lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(deps: &[&str]) -> EnvironmentIdentity {
        EnvironmentIdentity::new(
            "conda",
            None,
            deps.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_identity_equality() {
        assert_eq!(identity(&["a", "b"]), identity(&["a", "b"]));
        assert_ne!(identity(&["a"]), identity(&["b"]));
        assert_ne!(
            EnvironmentIdentity::new("conda", Some("default".into()), vec![]),
            EnvironmentIdentity::new("system", Some("default".into()), vec![]),
        );
    }

    #[test]
    fn test_dirname_is_deterministic_and_distinct() {
        assert_eq!(identity(&["a"]).dirname(), identity(&["a"]).dirname());
        assert_ne!(identity(&["a"]).dirname(), identity(&["a", "b"]).dirname());
        assert!(identity(&[]).dirname().starts_with("condaenv-default-"));
    }

    #[test]
    fn test_dependency_order_is_significant() {
        // The dependency list is an ordered set; order changes the key.
        assert_ne!(identity(&["a", "b"]).dirname(), identity(&["b", "a"]).dirname());
    }

    #[tokio::test]
    async fn test_environment_path_stable_across_calls() {
        let cache = tempfile::TempDir::new().unwrap();
        let manager = EnvironmentManager::new(cache.path()).unwrap();
        let id = identity(&["openssl"]);
        assert_eq!(manager.environment_path(&id), manager.environment_path(&id));
        assert_ne!(
            manager.environment_path(&id),
            manager.environment_path(&identity(&[]))
        );
    }

    #[tokio::test]
    async fn test_ensure_system_environment_idempotent() {
        let cache = tempfile::TempDir::new().unwrap();
        let src = tempfile::TempDir::new().unwrap();
        let manager = EnvironmentManager::new(cache.path()).unwrap();
        let language = Language::from_name("system").unwrap();
        let id = EnvironmentIdentity::new("system", None, vec![]);

        let first = manager.ensure(&language, src.path(), &id).await.unwrap();
        let second = manager.ensure(&language, src.path(), &id).await.unwrap();
        assert_eq!(first.root, second.root);
        assert!(first.root.exists());
    }
}
