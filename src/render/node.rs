//! Node subprocess renderer backend.
//!
//! The compiled SSR bundle is JavaScript, so rendering shells out to
//! `node` with the bundle path and the requested route, and reads one
//! JSON document back on stdout:
//!
//! ```json
//! {
//!   "routeId": "routes/about",
//!   "head": "<title>About</title>",
//!   "body": "<div>…</div>",
//!   "fetches": [{"query": "…", "variables": {}, "result": {}}]
//! }
//! ```
//!
//! Reported fetches are applied to the request cache so they surface as
//! preload hints.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use super::{AppRender, RenderError, SsrApp};
use crate::fetch::DataFetchCache;

pub struct NodeApp {
    node: PathBuf,
    bundle: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRender {
    route_id: String,
    #[serde(default)]
    head: String,
    body: String,
    #[serde(default)]
    fetches: Vec<ReportedFetch>,
}

#[derive(Debug, Deserialize)]
struct ReportedFetch {
    query: String,
    #[serde(default)]
    variables: Value,
    result: Value,
}

impl NodeApp {
    /// Bind to the SSR bundle, resolving `node` from PATH once.
    pub fn new(bundle: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let node = which::which("node").context("node executable not found in PATH")?;
        Ok(Arc::new(Self {
            node,
            bundle: bundle.into(),
        }))
    }
}

impl SsrApp for NodeApp {
    fn render(&self, route: &str, cache: &mut DataFetchCache) -> Result<AppRender, RenderError> {
        let output = Command::new(&self.node)
            .arg(&self.bundle)
            .arg("--route")
            .arg(route)
            .output()?;

        if !output.status.success() {
            return Err(RenderError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let render: NodeRender = serde_json::from_slice(&output.stdout)
            .map_err(|e| RenderError::Failed(format!("invalid render output: {e}")))?;

        for fetch in &render.fetches {
            cache.set(&fetch.query, &fetch.variables, fetch.result.clone());
        }

        Ok(AppRender {
            route_id: render.route_id,
            head: render.head,
            body: render.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_output_shape() {
        let render: NodeRender = serde_json::from_str(
            r#"{
                "routeId": "routes/about",
                "body": "<div>about</div>",
                "fetches": [{"query": "q", "result": {"ok": true}}]
            }"#,
        )
        .unwrap();

        assert_eq!(render.route_id, "routes/about");
        assert!(render.head.is_empty());
        assert_eq!(render.fetches.len(), 1);
        assert!(render.fetches[0].variables.is_null());
    }
}
