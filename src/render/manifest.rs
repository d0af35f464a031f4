//! Bundle manifest: module identifier → ordered asset paths.
//!
//! Written by the bundler, read once per renderer construction.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    bundles: FxHashMap<String, Vec<String>>,
}

impl Manifest {
    /// Read and parse the manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid manifest {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Assets for a bundle id, in manifest order.
    ///
    /// Unknown identifiers resolve to no assets rather than an error.
    pub fn assets(&self, id: &str) -> &[String] {
        self.bundles.get(id).map_or(&[], Vec::as_slice)
    }

    /// Every bundle identifier in the manifest.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }
}
