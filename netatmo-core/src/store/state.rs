use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use super::write_atomic;

/// `station:module:type:metric` -> last recorded value.
pub type StateMap = BTreeMap<String, f64>;

/// JSON file holding the previous value of every sensor metric seen so far.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the map back. A missing file is an empty state.
    pub fn load(&self) -> Result<StateMap> {
        if !self.path.exists() {
            return Ok(StateMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        Ok(state)
    }

    pub fn save(&self, state: &StateMap) -> Result<()> {
        let json = serde_json::to_vec(state).context("Failed to serialize state")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))
    }
}
