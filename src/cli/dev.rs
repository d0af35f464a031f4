//! `skein dev`: wire up the reactive compile/serve pipeline.
//!
//! The HTTP server binds immediately so early requests get a 503
//! instead of a connection error; the event pipeline runs on a tokio
//! runtime in a background thread while the main thread owns the
//! blocking request loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use crossbeam::channel;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::event::{self, CompileEvent};
use crate::pipeline::Pipeline;
use crate::render::NodeApp;
use crate::serve::{DevServer, start_ws_server};
use crate::{core, debug, log};

const CHANNEL_BUFFER: usize = 32;

pub fn run(config: &Config) -> Result<()> {
    let server = DevServer::bind(
        config.serve.interface,
        config.serve.port,
        config.build.static_dir.clone(),
        config.serve.static_prefix.clone(),
    )?;
    log!("serve"; "http://{}", server.addr());

    let (shutdown_tx, _shutdown_rx) = channel::unbounded::<()>();
    core::register_server(server.http(), shutdown_tx);

    let ws_port = start_ws_server(config.serve.ws_port, server.clients())?;
    debug!("reload"; "ws://localhost:{ws_port}");

    let (events_tx, events_rx) = mpsc::channel::<CompileEvent>(CHANNEL_BUFFER);
    spawn_event_source(config, events_tx)?;

    let app = NodeApp::new(&config.build.bundle)?;
    let pipeline = Pipeline::new(
        events_rx,
        Arc::clone(&server),
        config.artifacts(),
        config.build.entry.clone(),
        config.serve.static_prefix.clone(),
        app,
    );
    let pipeline_handle = spawn_pipeline(pipeline);

    server.run();
    wait_for_shutdown(pipeline_handle);
    Ok(())
}

/// Start the compile event source: the configured compiler process, or
/// the artifact watcher when no command is set.
fn spawn_event_source(config: &Config, tx: mpsc::Sender<CompileEvent>) -> Result<()> {
    if config.compiler.command.is_empty() {
        debug!("watch"; "no compiler command, watching {}", config.build.dir.display());
        event::spawn_artifact_watcher(&config.build.dir, config.artifacts(), tx)
    } else {
        event::spawn_compiler_process(&config.compiler.command, tx)
    }
}

/// Run the pipeline on its own tokio runtime.
fn spawn_pipeline(pipeline: Pipeline) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("failed to create tokio runtime");
        rt.block_on(pipeline.run());
    })
}

/// Wait for the pipeline to stop gracefully (max 2 seconds).
fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(std::time::Duration::from_millis(50));
    }
}
