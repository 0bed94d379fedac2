// Scoped environment-variable patching for toolchain activation.
//
// Patches never touch the process-global environment. They apply to an owned
// `Environment` value whose map is handed to spawned processes, and every
// application returns a guard that restores the exact prior state on drop.

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// Platform separator for PATH-like variables
pub fn path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

/// A single environment-variable operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOp {
    /// Set `name` to `value`, replacing any current value
    Set { name: String, value: String },
    /// Remove `name` entirely
    Unset { name: String },
    /// Put `value` in front of the current value of `name`, joined with
    /// `separator`. Reads the value as of apply-time, so prepends chain
    /// across composed patches.
    Prepend {
        name: String,
        value: String,
        separator: String,
    },
}

impl EnvOp {
    pub fn name(&self) -> &str {
        match self {
            EnvOp::Set { name, .. } | EnvOp::Unset { name } | EnvOp::Prepend { name, .. } => name,
        }
    }
}

/// An ordered sequence of environment-variable operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPatch {
    ops: Vec<EnvOp>,
}

impl EnvPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(EnvOp::Set {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn unset(mut self, name: impl Into<String>) -> Self {
        self.ops.push(EnvOp::Unset { name: name.into() });
        self
    }

    pub fn prepend(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        self.ops.push(EnvOp::Prepend {
            name: name.into(),
            value: value.into(),
            separator: separator.into(),
        });
        self
    }

    /// Prepend a directory to a PATH-like variable with the platform separator
    pub fn prepend_path(self, name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_string_lossy().into_owned();
        self.prepend(name, dir, path_separator())
    }

    pub fn ops(&self) -> &[EnvOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// An owned snapshot of environment variables
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// An empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.vars.clone()
    }

    /// Apply a patch, returning a guard that restores every touched variable
    /// to its exact prior value (or absence) when dropped. The guard derefs to
    /// `Environment`, so nested applications restore to the intermediate
    /// state, not the original.
    pub fn apply(&mut self, patch: &EnvPatch) -> EnvGuard<'_> {
        let mut saved = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for op in patch.ops() {
            if seen.insert(op.name()) {
                saved.push((op.name().to_string(), self.vars.get(op.name()).cloned()));
            }
        }

        for op in patch.ops() {
            match op {
                EnvOp::Set { name, value } => {
                    self.vars.insert(name.clone(), value.clone());
                }
                EnvOp::Unset { name } => {
                    self.vars.remove(name);
                }
                EnvOp::Prepend {
                    name,
                    value,
                    separator,
                } => {
                    let current = self.vars.get(name).map(String::as_str).unwrap_or("");
                    let new_value = if current.is_empty() {
                        value.clone()
                    } else {
                        format!("{value}{separator}{current}")
                    };
                    self.vars.insert(name.clone(), new_value);
                }
            }
        }

        EnvGuard { env: self, saved }
    }
}

/// Scope guard returned by [`Environment::apply`]
#[derive(Debug)]
pub struct EnvGuard<'a> {
    env: &'a mut Environment,
    saved: Vec<(String, Option<String>)>,
}

impl Deref for EnvGuard<'_> {
    type Target = Environment;

    fn deref(&self) -> &Environment {
        self.env
    }
}

impl DerefMut for EnvGuard<'_> {
    fn deref_mut(&mut self) -> &mut Environment {
        self.env
    }
}

impl Drop for EnvGuard<'_> {
    fn drop(&mut self) {
        for (name, old) in self.saved.drain(..) {
            match old {
                Some(value) => {
                    self.env.vars.insert(name, value);
                }
                None => {
                    self.env.vars.remove(&name);
                }
            }
        }
    }
}
