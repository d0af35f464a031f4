//! Project configuration (`skein.toml`).
//!
//! All sections are optional; defaults match a conventional bundler
//! layout with artifacts under `build/`.
//!
//! ```toml
//! [serve]
//! port = 3000
//!
//! [build]
//! dir = "build"
//! entry = "entry"
//!
//! [compiler]
//! command = ["npm", "run", "watch"]
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::render::BuildArtifacts;

/// Root configuration structure representing skein.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serve: ServeConfig,
    pub build: BuildConfig,
    pub compiler: CompilerConfig,
    pub fetch: FetchConfig,
}

/// `[serve]`: development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind (`0.0.0.0` for LAN access).
    pub interface: IpAddr,
    /// HTTP port number.
    pub port: u16,
    /// Live-reload WebSocket port.
    pub ws_port: u16,
    /// URL prefix under which bundler assets are served.
    pub static_prefix: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            ws_port: 35729,
            static_prefix: "/static/".to_string(),
        }
    }
}

/// `[build]`: artifact locations and build output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory the bundler writes into (watched in dev mode).
    pub dir: PathBuf,
    /// HTML template with `%skein.head%` / `%skein.html%` slots.
    pub template: PathBuf,
    /// Server-side renderer bundle.
    pub bundle: PathBuf,
    /// Bundle manifest (module id → asset paths).
    pub manifest: PathBuf,
    /// Static assets directory served under `static_prefix`.
    pub static_dir: PathBuf,
    /// Manifest identifier of the entry bundle.
    pub entry: String,
    /// Output directory for `skein build`.
    pub output: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("build"),
            template: PathBuf::from("build/template.html"),
            bundle: PathBuf::from("build/server/ssr.js"),
            manifest: PathBuf::from("build/manifest.json"),
            static_dir: PathBuf::from("build/static"),
            entry: "entry".to_string(),
            output: PathBuf::from("dist"),
        }
    }
}

/// `[compiler]`: the external bundler process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Command emitting one JSON event per stdout line. Empty: fall
    /// back to watching the build directory.
    pub command: Vec<String>,
}

/// `[fetch]`: remote data endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// GraphQL endpoint the SSR bundle queries.
    pub uri: Option<String>,
}

impl Config {
    /// Load from a config file, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            crate::debug!("config"; "{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let (config, unknown) = Self::parse_with_ignored(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;

        for key in &unknown {
            crate::log!("config"; "unknown key `{key}` ignored");
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Artifact paths for renderer construction.
    pub fn artifacts(&self) -> BuildArtifacts {
        BuildArtifacts {
            template: self.build.template.clone(),
            bundle: self.build.bundle.clone(),
            manifest: self.build.manifest.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let (config, unknown) = Config::parse_with_ignored("").unwrap();
        assert!(unknown.is_empty());
        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.build.entry, "entry");
        assert!(config.compiler.command.is_empty());
        assert!(config.fetch.uri.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let (config, _) = Config::parse_with_ignored(
            r#"
            [serve]
            interface = "0.0.0.0"
            port = 8080

            [build]
            dir = "out"
            entry = "client"

            [compiler]
            command = ["npm", "run", "watch"]
            "#,
        )
        .unwrap();

        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.build.dir, PathBuf::from("out"));
        assert_eq!(config.build.entry, "client");
        assert_eq!(config.compiler.command, ["npm", "run", "watch"]);
        // Unset sections keep defaults.
        assert_eq!(config.serve.ws_port, 35729);
    }

    #[test]
    fn test_unknown_keys_collected() {
        let (_, unknown) =
            Config::parse_with_ignored("[serve]\nport = 1234\ntypo_key = true").unwrap();
        assert_eq!(unknown, ["serve.typo_key"]);
    }
}
