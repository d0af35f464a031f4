//! Preload hint aggregation.
//!
//! A render's preload set merges manifest-declared bundle assets with
//! the data fetches the request cache observed. Deduplication is by
//! href, first occurrence wins, overall order preserved. Manifest
//! entries come first, so on collision their attributes are
//! authoritative.

use rustc_hash::FxHashSet;

use super::Manifest;

/// One `<link rel="preload">` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preload {
    pub href: String,
    /// Value for the `as` attribute ("script", "fetch", …).
    pub kind: &'static str,
    pub crossorigin: bool,
}

/// Map manifest bundle assets to preload descriptors.
///
/// `ids` is visited in order (entry bundle first, route bundle second);
/// each relative asset path is rooted at `static_prefix`.
pub fn from_manifest<'a>(
    manifest: &Manifest,
    ids: impl IntoIterator<Item = &'a str>,
    static_prefix: &str,
) -> Vec<Preload> {
    let mut preloads = Vec::new();
    for id in ids {
        for path in manifest.assets(id) {
            preloads.push(Preload {
                href: format!("{static_prefix}{path}"),
                kind: "script",
                crossorigin: true,
            });
        }
    }
    preloads
}

/// Deduplicate by href, keeping the first occurrence and its order.
pub fn dedupe(preloads: Vec<Preload>) -> Vec<Preload> {
    let mut seen = FxHashSet::default();
    preloads
        .into_iter()
        .filter(|p| seen.insert(p.href.clone()))
        .collect()
}

/// Render descriptors to markup: one self-closing link tag each.
/// Boolean attributes are emitted bare, the rest as `name="value"`.
pub fn render_links(preloads: &[Preload]) -> String {
    let mut out = String::new();
    for p in preloads {
        if p.crossorigin {
            out.push_str(&format!(
                r#"<link rel="preload" href="{}" as="{}" crossorigin />"#,
                p.href, p.kind
            ));
        } else {
            out.push_str(&format!(
                r#"<link rel="preload" href="{}" as="{}" />"#,
                p.href, p.kind
            ));
        }
    }
    out
}
