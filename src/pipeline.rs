//! Serve pipeline: drives the dev server from compile events.
//!
//! Consumes the compiler's event stream in emission order, one event at
//! a time, and executes the state machine's transitions: bind the first
//! renderer, swap it on reload, notify live-reload clients. The loop
//! runs for the process lifetime and ends only when the event source
//! terminates or shutdown is requested.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::{CompileEvent, EventMachine, Transition};
use crate::render::{BuildArtifacts, Renderer, SsrApp};
use crate::serve::DevServer;

pub struct Pipeline {
    rx: mpsc::Receiver<CompileEvent>,
    server: Arc<DevServer>,
    artifacts: BuildArtifacts,
    entry_id: String,
    static_prefix: String,
    app: Arc<dyn SsrApp>,
    machine: EventMachine,
}

impl Pipeline {
    pub fn new(
        rx: mpsc::Receiver<CompileEvent>,
        server: Arc<DevServer>,
        artifacts: BuildArtifacts,
        entry_id: String,
        static_prefix: String,
        app: Arc<dyn SsrApp>,
    ) -> Self {
        Self {
            rx,
            server,
            artifacts,
            entry_id,
            static_prefix,
            app,
            machine: EventMachine::new(),
        }
    }

    /// Run until the event source closes or shutdown is requested.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    let Some(event) = event else {
                        crate::log!("serve"; "compiler event stream ended");
                        break;
                    };
                    self.handle(&event);
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    if crate::core::is_shutdown() {
                        break;
                    }
                }
            }
        }
    }

    /// Execute one event's transition. Synchronous: the next event is
    /// not processed before this returns, so the renderer swap is never
    /// interleaved with another event's side effects.
    fn handle(&mut self, event: &CompileEvent) {
        match self.machine.handle(event) {
            Transition::Start => match self.load_renderer() {
                Ok(renderer) => {
                    self.server.ready(renderer);
                    self.server.reset_cache();
                    crate::log!("serve"; "ready at http://{}", self.server.addr());
                    self.server.send(&CompileEvent::Ready);
                }
                Err(e) => {
                    // Stay 503; the next successful build binds via Swap.
                    crate::log!("error"; "failed to load renderer: {e:#}");
                    self.server.send(&CompileEvent::Error {
                        error: format!("{e:#}"),
                    });
                }
            },
            Transition::Swap => match self.load_renderer() {
                Ok(renderer) => {
                    self.server.set_renderer(renderer);
                    self.server.reset_cache();
                    crate::log!("serve"; "compilation succeeded, reloading clients");
                    self.server.send(event);
                }
                Err(e) => {
                    // Keep serving the last good build.
                    crate::log!("error"; "failed to load renderer: {e:#}");
                    self.server.send(&CompileEvent::Error {
                        error: format!("{e:#}"),
                    });
                }
            },
            Transition::Notify => {
                match event {
                    CompileEvent::Compile => {
                        crate::log!("serve"; "change detected, compiling...");
                    }
                    CompileEvent::Error { error } => {
                        crate::log!("error"; "compilation failed: {error}");
                    }
                    _ => {}
                }
                self.server.send(event);
            }
            Transition::LogOnly => match event {
                CompileEvent::Compile => crate::log!("serve"; "compiling..."),
                CompileEvent::Error { error } => {
                    crate::log!("error"; "compilation failed: {error}");
                }
                _ => crate::debug!("serve"; "ignoring {event:?} before first ready"),
            },
        }
    }

    fn load_renderer(&self) -> anyhow::Result<Renderer> {
        Renderer::load(
            &self.artifacts,
            &self.entry_id,
            &self.static_prefix,
            Arc::clone(&self.app),
        )
    }
}
