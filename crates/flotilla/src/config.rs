//! Deployment configuration.

use std::fs;
use std::path::Path;

use flotilla_registry::RegistryError;
use serde::{Deserialize, Serialize};

use crate::error::{bad_value, Result};

/// Default coordinator address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8046";

/// Default namespace root the registry tree is mounted under.
pub const DEFAULT_ROOT: &str = "/flotilla";

/// Configuration for a host participating in the fleet.
///
/// Host identity is a self-declared string; the library performs no
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator address to dial.
    pub addr: String,

    /// Namespace root the registry tree is mounted under.
    pub root: String,

    /// This host's identity, used for ticket and instance claims.
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            root: DEFAULT_ROOT.to_owned(),
            host: "localhost".to_owned(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(RegistryError::from)?;
        toml::from_str(&content).map_err(|e| bad_value(format!("config parse failed: {e}")))
    }

    /// Saves configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| bad_value(format!("config encode failed: {e}")))?;
        fs::write(path, content).map_err(RegistryError::from)?;
        Ok(())
    }
}
