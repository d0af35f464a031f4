//! HTTP response construction.

use std::fs;
use std::path::{Component, Path};

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

use crate::render::{RenderError, RenderOutput};
use crate::utils::mime;
use crate::utils::mime::types::{HTML, PLAIN};

/// Respond with a rendered page, one `Link: rel=preload` header per
/// dependency for downstream h2 push.
pub fn page(request: Request, output: RenderOutput) -> Result<()> {
    let mut response = Response::from_data(output.html.into_bytes())
        .with_status_code(StatusCode(200))
        .with_header(make_header("Content-Type", HTML));

    for href in &output.dependencies {
        if let Ok(header) = Header::from_bytes("Link", format!("<{href}>; rel=preload").as_bytes())
        {
            response.add_header(header);
        }
    }

    request.respond(response)?;
    Ok(())
}

/// 503 before the first successful build.
pub fn not_ready(request: Request) -> Result<()> {
    send_body(
        request,
        503,
        PLAIN,
        b"503 Service Unavailable - waiting for first build".to_vec(),
    )
}

/// 503 during shutdown.
pub fn unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

/// 500 for a failed render. Scoped to this request; the server keeps
/// serving the bound renderer.
pub fn render_error(request: Request, error: &RenderError) -> Result<()> {
    let error_text = error.to_string();
    let msg = crate::utils::html::escape(&error_text);
    let body = format!("<html><body><h1>Render Error</h1><pre>{msg}</pre></body></html>");
    send_body(request, 500, HTML, body.into_bytes())
}

/// Serve a file from the static asset directory.
pub fn static_file(request: Request, static_dir: &Path, rel: &str) -> Result<()> {
    let Some(path) = resolve_static(static_dir, rel) else {
        return send_body(request, 404, PLAIN, b"404 Not Found".to_vec());
    };

    match fs::read(&path) {
        Ok(body) => send_body(request, 200, mime::from_path(&path), body),
        Err(_) => send_body(request, 404, PLAIN, b"404 Not Found".to_vec()),
    }
}

/// Join a request path onto the static dir, rejecting traversal.
fn resolve_static(static_dir: &Path, rel: &str) -> Option<std::path::PathBuf> {
    let rel = Path::new(rel.trim_start_matches('/'));
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    let path = static_dir.join(rel);
    path.is_file().then_some(path)
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header")
}
