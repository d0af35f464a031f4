//! `skein build`: terminal pipeline.
//!
//! One renderer construction, then every route rendered to static HTML
//! in parallel, each against its own empty cache so routes never
//! observe each other's fetches. Routes are derived from the manifest:
//! every bundle identifier except the entry is a page.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;

use crate::config::Config;
use crate::fetch::DataFetchCache;
use crate::render::{NodeApp, RenderOutput, Renderer};
use crate::log;

pub fn run(config: &Config, output: Option<&Path>) -> Result<()> {
    let output = output.unwrap_or(&config.build.output);

    if output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("failed to clean {}", output.display()))?;
    }
    fs::create_dir_all(output)?;

    let app = NodeApp::new(&config.build.bundle)?;
    let renderer = Renderer::load(
        &config.artifacts(),
        &config.build.entry,
        &config.serve.static_prefix,
        app,
    )?;

    let routes = routes_from_manifest(&renderer, &config.build.entry);
    if routes.is_empty() {
        bail!("manifest declares no routes besides the entry bundle");
    }
    log!("build"; "rendering {} routes", routes.len());

    let base = DataFetchCache::new();
    let failures: Vec<(String, anyhow::Error)> = routes
        .par_iter()
        .filter_map(|route| {
            let mut cache = base.clone();
            let result = renderer
                .render(route, &mut cache)
                .map_err(anyhow::Error::from)
                .and_then(|out| write_page(output, route, &out));
            result.err().map(|e| (route.clone(), e))
        })
        .collect();

    for (route, e) in &failures {
        log!("error"; "{route}: {e:#}");
    }
    if !failures.is_empty() {
        bail!("{} of {} routes failed", failures.len(), routes.len());
    }

    copy_static_assets(&config.build.static_dir, output, &config.serve.static_prefix)?;

    log!("build"; "wrote {} pages to {}", routes.len(), output.display());
    Ok(())
}

/// Derive the route list from manifest identifiers.
///
/// Identifiers are route ids (`index`, `about`, `blog/post`); the entry
/// bundle is excluded. `index` maps to `/`, everything else to `/<id>`.
fn routes_from_manifest(renderer: &Renderer, entry_id: &str) -> Vec<String> {
    let mut routes: Vec<String> = renderer
        .manifest()
        .ids()
        .filter(|id| *id != entry_id)
        .map(route_for_id)
        .collect();
    routes.sort();
    routes
}

fn route_for_id(id: &str) -> String {
    let id = id.trim_start_matches('/');
    if id == "index" {
        "/".to_string()
    } else {
        format!("/{id}")
    }
}

/// Write a rendered page as `<route>/index.html`.
fn write_page(output: &Path, route: &str, out: &RenderOutput) -> Result<()> {
    let dir = output.join(route.trim_start_matches('/'));
    fs::create_dir_all(&dir)?;
    let path = dir.join("index.html");
    fs::write(&path, &out.html).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Copy the bundler's static output under the same prefix pages link to.
fn copy_static_assets(static_dir: &Path, output: &Path, static_prefix: &str) -> Result<()> {
    if !static_dir.is_dir() {
        return Ok(());
    }
    let dest = output.join(static_prefix.trim_matches('/'));
    copy_dir_all(static_dir, &dest)
}

fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_for_id() {
        assert_eq!(route_for_id("index"), "/");
        assert_eq!(route_for_id("about"), "/about");
        assert_eq!(route_for_id("blog/post"), "/blog/post");
        assert_eq!(route_for_id("/about"), "/about");
    }

    #[test]
    fn test_copy_dir_all() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();
        fs::write(src.path().join("a.js"), "a").unwrap();
        fs::write(src.path().join("nested/b.js"), "b").unwrap();

        let dest = tempfile::tempdir().unwrap();
        copy_dir_all(src.path(), &dest.path().join("static")).unwrap();

        assert!(dest.path().join("static/a.js").is_file());
        assert!(dest.path().join("static/nested/b.js").is_file());
    }
}
