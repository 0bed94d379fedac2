// System toolchain backend: hooks run whatever is already on the host PATH.
// There is nothing to install and nothing to activate.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::environment::InstalledEnvironment;
use super::{InstallContext, Toolchain};
use crate::envcontext::EnvPatch;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLanguage;

#[async_trait]
impl Toolchain for SystemLanguage {
    fn language_name(&self) -> &'static str {
        "system"
    }

    async fn install(&self, ctx: &InstallContext<'_>) -> Result<()> {
        // The directory only marks the identity as installed.
        debug!(env = %ctx.env_root.display(), "marking system environment installed");
        tokio::fs::create_dir_all(ctx.env_root).await?;
        Ok(())
    }

    fn health_check(&self, _environment: &InstalledEnvironment) -> Result<()> {
        Ok(())
    }

    fn env_patch(&self, _env_root: &Path) -> EnvPatch {
        EnvPatch::new()
    }
}
