//! Development server.
//!
//! Serves rendered pages with the currently bound renderer, static
//! assets from the bundler output, and pushes build-status
//! notifications to live-reload clients.
//!
//! Concurrency model: the renderer is the only shared mutable surface
//! and is replaced with a single atomic pointer swap; every request
//! takes a snapshot once and renders against its own clone of the base
//! data-fetch cache. No other locking is needed.

mod response;
pub mod ws;

pub use ws::{ClientPool, start_ws_server};

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use thiserror::Error;
use tiny_http::{Request, Server};

use crate::event::CompileEvent;
use crate::fetch::DataFetchCache;
use crate::render::{RenderError, RenderOutput, Renderer};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Errors the request handler maps onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ServeError {
    /// No renderer bound yet: the first build is still compiling.
    #[error("server is not ready yet")]
    NotReady,
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub struct DevServer {
    server: Arc<Server>,
    addr: SocketAddr,
    /// Current renderer. None until the first successful build; swapped
    /// atomically, requests snapshot it once at start.
    renderer: ArcSwapOption<Renderer>,
    /// Baseline cache cloned into every request.
    base_cache: Mutex<DataFetchCache>,
    clients: ClientPool,
    static_dir: PathBuf,
    static_prefix: String,
}

impl DevServer {
    /// Bind the HTTP listener with port retry. Does not start the
    /// request loop, so the caller can respond 503 while the first
    /// build runs.
    pub fn bind(
        interface: IpAddr,
        base_port: u16,
        static_dir: PathBuf,
        static_prefix: String,
    ) -> Result<Arc<Self>> {
        let (server, addr) = bind_with_retry(interface, base_port)?;

        Ok(Arc::new(Self {
            server: Arc::new(server),
            addr,
            renderer: ArcSwapOption::const_empty(),
            base_cache: Mutex::new(DataFetchCache::new()),
            clients: ClientPool::new(),
            static_dir,
            static_prefix,
        }))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Underlying HTTP handle, for shutdown registration.
    pub fn http(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Live-reload client pool, for the WebSocket acceptor.
    pub fn clients(&self) -> ClientPool {
        self.clients.clone()
    }

    /// First-time renderer binding. Page requests 503 until this runs.
    pub fn ready(&self, renderer: Renderer) {
        debug_assert!(self.renderer.load().is_none(), "ready() called twice");
        self.set_renderer(renderer);
    }

    /// Atomic renderer replacement. In-flight renders keep the snapshot
    /// they loaded; only renders started after this observe the swap.
    pub fn set_renderer(&self, renderer: Renderer) {
        self.renderer.store(Some(Arc::new(renderer)));
    }

    pub fn is_ready(&self) -> bool {
        self.renderer.load().is_some()
    }

    /// Reset the baseline cache: clean slate for a new build.
    pub fn reset_cache(&self) {
        self.base_cache.lock().clear();
    }

    /// Broadcast a build notification to all live-reload clients.
    /// Best-effort: disconnected clients are dropped silently.
    pub fn send(&self, event: &CompileEvent) {
        self.clients.broadcast(&event.to_json());
    }

    /// Blocking request loop on a small worker pool, so a slow render
    /// never blocks other requests.
    pub fn run(self: &Arc<Self>) {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .expect("failed to create thread pool");

        for request in self.server.incoming_requests() {
            let server = Arc::clone(self);
            pool.spawn(move || {
                if let Err(e) = server.handle_request(request) {
                    crate::log!("serve"; "request error: {e}");
                }
            });
        }
    }

    fn handle_request(&self, request: Request) -> Result<()> {
        if crate::core::is_shutdown() {
            return response::unavailable(request);
        }

        let url = request.url().to_string();
        let path = url.split(['?', '#']).next().unwrap_or(&url);

        if let Some(rel) = path.strip_prefix(self.static_prefix.as_str()) {
            return response::static_file(request, &self.static_dir, rel);
        }

        match self.render_page(path) {
            Ok(output) => response::page(request, output),
            Err(ServeError::NotReady) => response::not_ready(request),
            Err(ServeError::Render(e)) => {
                crate::log!("serve"; "render failed for {path}: {e}");
                response::render_error(request, &e)
            }
        }
    }

    /// Render one page against a renderer snapshot and an isolated
    /// clone of the base cache.
    pub fn render_page(&self, route: &str) -> Result<RenderOutput, ServeError> {
        let Some(renderer) = self.renderer.load_full() else {
            return Err(ServeError::NotReady);
        };

        // Clone under the lock, render outside it.
        let mut cache = self.base_cache.lock().clone();
        Ok(renderer.render(route, &mut cache)?)
    }
}

/// Bind to the interface and port, with automatic port retry.
fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    crate::log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{StubApp, write_artifacts};
    use serde_json::json;
    use std::net::Ipv4Addr;

    const TEMPLATE: &str = "<html><head>%skein.head%</head><body>%skein.html%</body></html>";

    fn test_server() -> Arc<DevServer> {
        DevServer::bind(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            PathBuf::from("/nonexistent"),
            "/static/".to_string(),
        )
        .unwrap()
    }

    fn test_renderer(dir: &std::path::Path, body: &'static str) -> Renderer {
        let artifacts = write_artifacts(dir, TEMPLATE, r#"{"entry": ["entry.js"]}"#);
        Renderer::load(
            &artifacts,
            "entry",
            "/static/",
            Arc::new(StubApp::plain("routes/home", body)),
        )
        .unwrap()
    }

    #[test]
    fn test_request_before_ready_is_not_ready() {
        let server = test_server();
        assert!(!server.is_ready());
        assert!(matches!(
            server.render_page("/"),
            Err(ServeError::NotReady)
        ));
    }

    #[test]
    fn test_render_after_ready() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server();
        server.ready(test_renderer(dir.path(), "<p>v1</p>"));

        let output = server.render_page("/").unwrap();
        assert!(output.html.contains("<p>v1</p>"));
        assert_eq!(output.dependencies, ["/static/entry.js"]);
    }

    #[test]
    fn test_swap_is_snapshot_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server();
        server.ready(test_renderer(dir.path(), "<p>v1</p>"));

        // A render that began before the swap keeps its snapshot.
        let snapshot = server.renderer.load_full().unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        server.set_renderer(test_renderer(dir2.path(), "<p>v2</p>"));

        let mut cache = DataFetchCache::new();
        let stale = snapshot.render("/", &mut cache).unwrap();
        assert!(stale.html.contains("<p>v1</p>"));

        let fresh = server.render_page("/").unwrap();
        assert!(fresh.html.contains("<p>v2</p>"));
    }

    #[test]
    fn test_concurrent_requests_do_not_share_cache_writes() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = write_artifacts(dir.path(), TEMPLATE, r#"{"entry": ["entry.js"]}"#);

        // Route A caches a fetch; route B performs none. B must never
        // see A's entry as a preload.
        let app = Arc::new(RouteSensitiveApp);
        let renderer = Renderer::load(&artifacts, "entry", "/static/", app).unwrap();

        let server = test_server();
        server.ready(renderer);
        let server_a = Arc::clone(&server);
        let server_b = Arc::clone(&server);

        let a = std::thread::spawn(move || {
            for _ in 0..50 {
                let output = server_a.render_page("/a").unwrap();
                assert_eq!(output.dependencies.len(), 2);
            }
        });
        let b = std::thread::spawn(move || {
            for _ in 0..50 {
                let output = server_b.render_page("/b").unwrap();
                assert_eq!(output.dependencies, ["/static/entry.js"]);
            }
        });
        a.join().unwrap();
        b.join().unwrap();

        // The base cache stayed pristine throughout.
        assert!(server.base_cache.lock().is_empty());
    }

    struct RouteSensitiveApp;

    impl crate::render::SsrApp for RouteSensitiveApp {
        fn render(
            &self,
            route: &str,
            cache: &mut DataFetchCache,
        ) -> Result<crate::render::AppRender, RenderError> {
            if route == "/a" {
                cache.set("query X", &json!({"id": 1}), json!({"data": "a"}));
            }
            Ok(crate::render::AppRender {
                route_id: "routes/home".to_string(),
                head: String::new(),
                body: format!("<p>{route}</p>"),
            })
        }
    }

    #[test]
    fn test_reset_cache_clears_baseline() {
        let server = test_server();
        server.base_cache.lock().set("q", &json!({}), json!(1));
        server.reset_cache();
        assert!(server.base_cache.lock().is_empty());
    }

    #[test]
    fn test_http_503_before_ready() {
        use std::io::{Read, Write};

        let server = test_server();
        let addr = server.addr();
        let loop_server = Arc::clone(&server);
        std::thread::spawn(move || loop_server.run());

        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        assert!(response.starts_with("HTTP/1.1 503"));

        server.http().unblock();
    }
}
