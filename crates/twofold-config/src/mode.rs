//! Tagged mode and target values.
//!
//! Every mode-dependent decision in the config builders matches exhaustively
//! on these enums instead of branching on a boolean flag, so a missing arm is
//! a compile error rather than a silent default.

use serde::{Deserialize, Serialize};

/// Build mode for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_dev(self) -> bool {
        matches!(self, Mode::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two build outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Browser-executed bundle.
    Client,
    /// Request-handling bundle.
    Server,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Client => "client",
            Target::Server => "server",
        }
    }

    /// Execution environment the bundle is compiled for.
    pub fn platform(self) -> Platform {
        match self {
            Target::Client => Platform::Browser,
            Target::Server => Platform::Node,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target runtime platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Browser,
    Node,
}

/// Environment flags handed to user-supplied template and hook functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvFlags {
    pub dev: bool,
    pub client: bool,
    pub server: bool,
}

impl EnvFlags {
    pub fn new(mode: Mode, target: Target) -> Self {
        Self {
            dev: mode.is_dev(),
            client: matches!(target, Target::Client),
            server: matches!(target, Target::Server),
        }
    }
}
