// Core data structures for henv
use serde::{Deserialize, Serialize};

fn default_pass_filenames() -> bool {
    true
}

/// A configured hook: one command bound to a language toolchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    /// Unique identifier for the hook
    pub id: String,
    /// Human-readable name (optional)
    #[serde(default)]
    pub name: Option<String>,
    /// Command to execute
    pub entry: String,
    /// Fixed leading arguments passed before any filenames
    #[serde(default)]
    pub args: Vec<String>,
    /// Language toolchain tag (selects the plugin)
    pub language: String,
    /// Requested toolchain version, if the family supports pinning
    #[serde(default)]
    pub language_version: Option<String>,
    /// Additional dependencies installed into the environment
    #[serde(default)]
    pub additional_dependencies: Vec<String>,
    /// Whether target filenames are appended to the command
    #[serde(default = "default_pass_filenames")]
    pub pass_filenames: bool,
}

impl Hook {
    pub fn new(
        id: impl Into<String>,
        entry: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            entry: entry.into(),
            args: Vec::new(),
            language: language.into(),
            language_version: None,
            additional_dependencies: Vec::new(),
            pass_filenames: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_language_version(mut self, version: impl Into<String>) -> Self {
        self.language_version = Some(version.into());
        self
    }

    pub fn with_additional_dependencies(mut self, deps: Vec<String>) -> Self {
        self.additional_dependencies = deps;
        self
    }

    pub fn with_pass_filenames(mut self, pass_filenames: bool) -> Self {
        self.pass_filenames = pass_filenames;
        self
    }

    /// Command tokens invoked ahead of any file arguments
    pub fn command_prefix(&self) -> Vec<String> {
        let mut prefix = Vec::with_capacity(1 + self.args.len());
        prefix.push(self.entry.clone());
        prefix.extend(self.args.iter().cloned());
        prefix
    }
}
