// Shared helpers for toolchain backends

use std::path::{Path, PathBuf};

use crate::envcontext::Environment;
use crate::error::{HealthError, InstallError, Result};

/// Sentinel version meaning "defer to the toolchain's system default"
pub const DEFAULT_VERSION: &str = "default";

/// Reject explicit version pinning for families that cannot honor it
pub fn assert_version_default(language: &str, version: &str) -> Result<()> {
    if version != DEFAULT_VERSION {
        return Err(Box::new(InstallError::VersionNotSupported {
            language: language.to_string(),
            version: version.to_string(),
            suggestion: Some(format!(
                "Remove language_version or set it to '{DEFAULT_VERSION}'"
            )),
        })
        .into());
    }
    Ok(())
}

/// Conventional executable directory of an installed environment
pub fn bin_dir(env_root: &Path) -> PathBuf {
    env_root.join("bin")
}

/// Resolve an executable name on the PATH of an activated environment
pub fn resolve_cmd(name: &str, env: &Environment) -> Result<PathBuf> {
    let search_path = env.get("PATH").unwrap_or("").to_string();
    which::which_in(name, Some(&search_path), ".").map_err(|_| {
        Box::new(HealthError::ExecutableNotFound {
            executable: name.to_string(),
            search_path,
        })
        .into()
    })
}
