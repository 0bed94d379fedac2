// Conda toolchain backend.
//
// Environments are created by the `conda` binary (or `mamba`/`micromamba`
// when the corresponding override variable is set) from an `environment.yml`
// at the source root; a minimal default manifest is synthesized when none
// exists. Version pinning is not supported by the conda family.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{base, InstallContext, Toolchain};
use crate::envcontext::EnvPatch;
use crate::error::{HealthError, InstallError, Result};
use crate::process::{ProcessConfig, ProcessManager};

use async_trait::async_trait;

pub const MANIFEST_FILENAME: &str = "environment.yml";

/// Base manifest written when the source root declares no dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondaManifest {
    pub channels: Vec<String>,
    pub dependencies: Vec<String>,
}

impl Default for CondaManifest {
    fn default() -> Self {
        Self {
            channels: vec!["conda-forge".to_string(), "defaults".to_string()],
            dependencies: vec!["openssl".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CondaLanguage;

impl CondaLanguage {
    /// Installer binary, overridable through the environment. A set-but-empty
    /// variable does not count as an override.
    pub fn installer_exe() -> &'static str {
        fn is_set(name: &str) -> bool {
            std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
        }
        if is_set("HENV_USE_MICROMAMBA") {
            "micromamba"
        } else if is_set("HENV_USE_MAMBA") {
            "mamba"
        } else {
            "conda"
        }
    }

    /// Write the default manifest if the source root has none
    pub async fn ensure_manifest(src_root: &Path) -> Result<()> {
        let manifest_path = src_root.join(MANIFEST_FILENAME);
        if manifest_path.exists() {
            return Ok(());
        }
        debug!(path = %manifest_path.display(), "synthesizing default conda manifest");
        let contents = serde_yaml::to_string(&CondaManifest::default()).map_err(|e| {
            Box::new(InstallError::ManifestSynthesisFailed {
                path: manifest_path.clone(),
                error: e.to_string(),
            })
        })?;
        tokio::fs::write(&manifest_path, contents).await.map_err(|e| {
            Box::new(InstallError::ManifestSynthesisFailed {
                path: manifest_path.clone(),
                error: e.to_string(),
            })
        })?;
        Ok(())
    }

    async fn run_installer(
        &self,
        process: &ProcessManager,
        src_root: &Path,
        args: Vec<String>,
    ) -> Result<()> {
        let exe = Self::installer_exe();
        let rendered = format!("{exe} {}", args.join(" "));
        let result = process
            .execute_async(
                ProcessConfig::new(exe)
                    .with_args(args)
                    .with_working_dir(src_root)
                    .with_environment(crate::envcontext::Environment::from_process().to_map()),
            )
            .await?;
        if !result.success() {
            return Err(Box::new(InstallError::InstallerFailed {
                language: self.language_name().to_string(),
                command: rendered,
                exit_code: Some(result.exit_code),
                stdout: result.stdout(),
                stderr: result.stderr(),
            })
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Toolchain for CondaLanguage {
    fn language_name(&self) -> &'static str {
        "conda"
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> Result<()> {
        base::assert_version_default(self.language_name(), ctx.identity.version())?;

        if ctx.env_root.exists() {
            if !ctx.clean {
                debug!(env = %ctx.env_root.display(), "environment already installed");
                return Ok(());
            }
            tokio::fs::remove_dir_all(ctx.env_root).await?;
        }

        Self::ensure_manifest(ctx.src_root).await?;

        let env_root = ctx.env_root.to_string_lossy().into_owned();
        debug!(env = %env_root, installer = Self::installer_exe(), "creating conda environment");
        self.run_installer(
            ctx.process,
            ctx.src_root,
            vec![
                "env".to_string(),
                "create".to_string(),
                "-p".to_string(),
                env_root.clone(),
                "--file".to_string(),
                MANIFEST_FILENAME.to_string(),
            ],
        )
        .await?;

        // Extras go in a second installer call against the created
        // environment so the base install and ad-hoc additions are
        // independently retriable.
        let extras = ctx.identity.additional_dependencies();
        if !extras.is_empty() {
            debug!(env = %env_root, count = extras.len(), "installing additional dependencies");
            let mut args = vec!["install".to_string(), "-p".to_string(), env_root];
            args.extend(extras.iter().cloned());
            self.run_installer(ctx.process, ctx.src_root, args).await?;
        }

        Ok(())
    }

    fn health_check(&self, environment: &super::environment::InstalledEnvironment) -> Result<()> {
        if !environment.root.exists() {
            return Err(Box::new(HealthError::EnvironmentMissing {
                path: environment.root.clone(),
            })
            .into());
        }
        // Every conda-created environment carries a conda-meta directory.
        let meta = environment.root.join("conda-meta");
        if !meta.exists() {
            return Err(Box::new(HealthError::ExecutableNotFound {
                executable: "conda-meta".to_string(),
                search_path: environment.root.display().to_string(),
            })
            .into());
        }
        Ok(())
    }

    fn env_patch(&self, env_root: &Path) -> EnvPatch {
        // PYTHONHOME must be cleared before CONDA_PREFIX is set so the two
        // never coexist while the patch is mid-application.
        let mut patch = EnvPatch::new()
            .unset("PYTHONHOME")
            .unset("VIRTUAL_ENV")
            .set("CONDA_PREFIX", env_root.to_string_lossy())
            .prepend_path("PATH", base::bin_dir(env_root));
        if cfg!(windows) {
            // Executables may also live in the root, Scripts and Library\bin;
            // later prepends land in front, so apply in reverse priority.
            patch = patch
                .prepend_path("PATH", env_root)
                .prepend_path("PATH", env_root.join("Scripts"))
                .prepend_path("PATH", env_root.join("Library").join("bin"));
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envcontext::{EnvOp, Environment};

    #[test]
    fn test_default_manifest_content() {
        let manifest = CondaManifest::default();
        assert_eq!(manifest.channels, vec!["conda-forge", "defaults"]);
        assert_eq!(manifest.dependencies, vec!["openssl"]);
    }

    #[test]
    fn test_env_patch_order() {
        let patch = CondaLanguage.env_patch(Path::new("/envs/x"));
        let names: Vec<&str> = patch.ops().iter().map(|op| op.name()).collect();
        assert_eq!(names[..3], ["PYTHONHOME", "VIRTUAL_ENV", "CONDA_PREFIX"]);
        assert!(names[3..].iter().all(|n| *n == "PATH"));
        assert!(matches!(patch.ops()[0], EnvOp::Unset { .. }));
        assert!(matches!(patch.ops()[1], EnvOp::Unset { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_activation_patch_applied() {
        let mut env = Environment::new();
        env.set("PATH", "/usr/bin");
        env.set("PYTHONHOME", "/opt/python");
        env.set("VIRTUAL_ENV", "/opt/venv");
        {
            let guard = env.apply(&CondaLanguage.env_patch(Path::new("/envs/x")));
            assert_eq!(guard.get("CONDA_PREFIX"), Some("/envs/x"));
            assert_eq!(guard.get("PYTHONHOME"), None);
            assert_eq!(guard.get("VIRTUAL_ENV"), None);
            assert_eq!(guard.get("PATH"), Some("/envs/x/bin:/usr/bin"));
        }
        assert_eq!(env.get("PYTHONHOME"), Some("/opt/python"));
        assert_eq!(env.get("CONDA_PREFIX"), None);
    }

    #[test]
    fn test_manifest_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&CondaManifest::default()).unwrap();
        let parsed: CondaManifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, CondaManifest::default());
    }
}
