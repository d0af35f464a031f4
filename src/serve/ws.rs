//! Live-reload push channel.
//!
//! Browser clients connect over WebSocket on a dedicated port and
//! receive build-status notifications. Delivery is best-effort: a
//! client whose socket write fails is dropped from the pool, never
//! failing the broadcast for the others.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

/// Maximum port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Shared set of connected live-reload clients.
#[derive(Clone, Default)]
pub struct ClientPool {
    clients: Arc<Mutex<Vec<WebSocket<TcpStream>>>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, ws: WebSocket<TcpStream>) {
        self.clients.lock().push(ws);
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Fan out a payload to every client, dropping the disconnected.
    pub fn broadcast(&self, payload: &str) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("reload"; "no clients connected");
            return;
        }

        let count = clients.len();
        clients.retain_mut(|ws| match ws.send(Message::Text(payload.into())) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("reload"; "client disconnected: {e}");
                false
            }
        });
        crate::debug!("reload"; "broadcast to {count} clients");
    }

    /// Close every connection (shutdown path).
    pub fn close_all(&self) {
        let mut clients = self.clients.lock();
        for mut ws in clients.drain(..) {
            let _ = ws.close(None);
        }
    }
}

/// Start the WebSocket listener and accept clients on a background
/// thread. Returns the actual port (may differ from `base_port` after
/// retry).
pub fn start_ws_server(base_port: u16, pool: ClientPool) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    std::thread::spawn(move || {
        loop {
            if crate::core::is_shutdown() {
                pool.close_all();
                break;
            }

            match listener.accept() {
                Ok((stream, addr)) => {
                    crate::debug!("reload"; "client connected: {addr}");

                    // Handshake and writes use blocking I/O.
                    let _ = stream.set_nonblocking(false);
                    match tungstenite::accept(stream) {
                        Ok(ws) => pool.add(ws),
                        Err(e) => {
                            crate::debug!("reload"; "handshake failed: {e}");
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
                Err(e) => {
                    crate::log!("reload"; "accept error: {e}");
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
        }
    });

    Ok(actual_port)
}

/// Try binding to a port, retrying with incremented port if in use.
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(format!("127.0.0.1:{}", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_with_no_clients_is_noop() {
        let pool = ClientPool::new();
        pool.broadcast(r#"{"type":"ReloadEvent"}"#);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_port_retry_on_conflict() {
        // Occupy a port, then ask for it: the listener must land on a
        // nearby port instead of failing.
        let (occupied, base_port) = try_bind_port(39200, 10).unwrap();
        let (_listener, port) = try_bind_port(base_port, 10).unwrap();
        assert_ne!(port, base_port);
        drop(occupied);
    }
}
