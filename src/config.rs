//! config.rs
//! Runtime settings for a `World`, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use self::error::ConfigError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ConfigError {
        #[error("Could not read config: {0}")]
        Io(#[from] std::io::Error),
        #[error("Invalid config: {0}")]
        Parse(#[from] serde_json::Error),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seeds the world's RNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Map positive and unit-interval variables to the real line.
    pub transform_constrained: bool,
    /// Nested generating-function calls allowed before giving up.
    pub max_depth: usize,
}

impl Default for WorldConfig {
    fn default() -> Self { Self { seed: None, transform_constrained: false, max_depth: 256 } }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> { Ok(serde_json::from_str(json)?) }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
