//! Server-side rendering.
//!
//! A [`Renderer`] is an immutable value bound to one build artifact
//! (template + bundle + manifest). The dev server replaces it wholesale
//! on every reload; it is never mutated in place. The component runtime
//! itself is external, behind the [`SsrApp`] seam.

mod manifest;
mod node;
pub mod preload;

pub use manifest::Manifest;
pub use node::NodeApp;
pub use preload::Preload;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::fetch::DataFetchCache;

/// Marker in the template replaced with preload links + app head markup.
const HEAD_SLOT: &str = "%skein.head%";
/// Marker in the template replaced with the rendered app markup.
const BODY_SLOT: &str = "%skein.html%";

/// Paths to the artifacts one build produces. The paths are fixed per
/// process; their contents change build to build.
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub template: PathBuf,
    pub bundle: PathBuf,
    pub manifest: PathBuf,
}

impl BuildArtifacts {
    pub fn all_exist(&self) -> bool {
        self.template.exists() && self.bundle.exists() && self.manifest.exists()
    }
}

/// A single render invocation failed. Affects only that request; the
/// server's renderer binding is untouched.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the application bundle produced for one route.
#[derive(Debug)]
pub struct AppRender {
    /// Resolved route identifier, used for the manifest lookup.
    pub route_id: String,
    /// Markup for the document head (title, meta, …).
    pub head: String,
    /// Rendered application markup.
    pub body: String,
}

/// The compiled application bundle. The actual component runtime lives
/// behind this seam; it populates the request cache for every data
/// fetch it performs.
pub trait SsrApp: Send + Sync {
    fn render(&self, route: &str, cache: &mut DataFetchCache) -> Result<AppRender, RenderError>;
}

/// Rendered page plus its preload dependencies.
#[derive(Debug)]
pub struct RenderOutput {
    pub html: String,
    /// Every preload href in emission order, for Link headers or h2 push.
    pub dependencies: Vec<String>,
}

/// Immutable renderer bound to one build artifact.
pub struct Renderer {
    template: String,
    manifest: Manifest,
    entry_id: String,
    static_prefix: String,
    app: Arc<dyn SsrApp>,
}

impl Renderer {
    /// Read template and manifest from disk and bind the app bundle.
    ///
    /// Called once per build (first ready and every reload); the result
    /// replaces the previous renderer atomically.
    pub fn load(
        artifacts: &BuildArtifacts,
        entry_id: &str,
        static_prefix: &str,
        app: Arc<dyn SsrApp>,
    ) -> Result<Self> {
        let template = fs::read_to_string(&artifacts.template)
            .with_context(|| format!("failed to read template {}", artifacts.template.display()))?;
        let manifest = Manifest::load(&artifacts.manifest)?;

        Ok(Self {
            template,
            manifest,
            entry_id: entry_id.to_string(),
            static_prefix: static_prefix.to_string(),
            app,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Render one route against the given request cache.
    ///
    /// Preload order: entry bundle assets, route bundle assets, then
    /// cache-observed data fetches; deduplicated by href with the first
    /// occurrence winning.
    pub fn render(
        &self,
        route: &str,
        cache: &mut DataFetchCache,
    ) -> Result<RenderOutput, RenderError> {
        let app = self.app.render(route, cache)?;

        let mut preloads = preload::from_manifest(
            &self.manifest,
            [self.entry_id.as_str(), app.route_id.as_str()],
            &self.static_prefix,
        );
        preloads.extend(cache.preloads());
        let preloads = preload::dedupe(preloads);

        let head = format!("{}{}", preload::render_links(&preloads), app.head);
        let html = self
            .template
            .replacen(HEAD_SLOT, &head, 1)
            .replacen(BODY_SLOT, &app.body, 1);

        Ok(RenderOutput {
            html,
            dependencies: preloads.into_iter().map(|p| p.href).collect(),
        })
    }
}
