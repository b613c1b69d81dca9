use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use super::write_atomic;

/// A `KEY=value` settings file (the `.env` the credentials are loaded from).
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All `KEY=value` entries, parsed with dotenv quoting rules.
    ///
    /// A missing file yields no entries.
    pub fn read_vars(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let entries = dotenvy::from_path_iter(&self.path)
            .with_context(|| format!("Failed to open settings file: {}", self.path.display()))?;

        entries
            .map(|entry| {
                entry.with_context(|| {
                    format!("Failed to parse settings file: {}", self.path.display())
                })
            })
            .collect()
    }

    /// Overwrite the first `key=` line in place, or append one.
    pub fn upsert(&self, key: &str, value: &str) -> Result<()> {
        let prefix = format!("{key}=");
        let entry = format!("{key}={value}");

        let mut lines = self.read_lines()?;
        match lines.iter_mut().find(|line| line.starts_with(&prefix)) {
            Some(line) => *line = entry,
            None => lines.push(entry),
        }

        let mut contents = lines.join("\n");
        contents.push('\n');

        write_atomic(&self.path, contents.as_bytes())
            .with_context(|| format!("Could not update {key} in {}", self.path.display()))
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {}", self.path.display()))?;

        Ok(contents.lines().map(str::to_string).collect())
    }
}
