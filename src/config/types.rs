//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::xargs::{StdioConfig, XargsOptions};

/// How the CLI splits its standard input into items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Every line is one item.
    Lines,
    /// Every whitespace-separated word is one item.
    #[default]
    Whitespace,
}

/// Settings loaded from the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct XargsConfig {
    /// Command run when none is given. Unset prints the items as-is.
    pub default_command: Option<String>,
    /// How stdin is split into arguments.
    pub split: SplitMode,
    /// Explicit I/O wiring for the child.
    pub stdio: Option<StdioConfig>,
}

impl XargsConfig {
    /// Channel options seeded from this configuration.
    #[must_use]
    pub fn to_options(&self) -> XargsOptions {
        let mut options = XargsOptions::new();
        if let Some(command) = &self.default_command {
            options = options.default_command(command.clone());
        }
        match self.stdio {
            Some(stdio) => options.stdio(stdio),
            None => options,
        }
    }
}
