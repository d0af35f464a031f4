//! Compile event state machine.
//!
//! Two states: waiting for the first successful build, then serving for
//! the rest of the process lifetime. The machine performs no side effects
//! itself; `handle` returns the `Transition` the pipeline must execute.
//! Events are consumed strictly in emission order, one at a time.

use super::CompileEvent;

/// Serve pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeState {
    /// No build artifact exists yet; page requests get 503.
    WaitingForFirstReady,
    /// A renderer is bound; reloads swap it in place.
    Serving,
}

/// What the pipeline must do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Bind the initial renderer and notify clients. Happens once.
    Start,
    /// Replace the bound renderer and notify clients.
    Swap,
    /// Notify clients only; the renderer binding is untouched.
    Notify,
    /// Log only; no server exists yet to notify.
    LogOnly,
}

/// The event state machine. One instance per serve pipeline.
#[derive(Debug)]
pub struct EventMachine {
    state: ServeState,
}

impl EventMachine {
    pub fn new() -> Self {
        Self {
            state: ServeState::WaitingForFirstReady,
        }
    }

    pub fn state(&self) -> ServeState {
        self.state
    }

    /// Advance the machine with the next event.
    ///
    /// Error events never change state: the last good build keeps
    /// serving. A redundant `Ready` while serving is treated as a swap;
    /// a `Reload` before the first `Ready` is dropped (there is no
    /// artifact to load yet).
    pub fn handle(&mut self, event: &CompileEvent) -> Transition {
        match (self.state, event) {
            (ServeState::WaitingForFirstReady, CompileEvent::Ready) => {
                self.state = ServeState::Serving;
                Transition::Start
            }
            (ServeState::WaitingForFirstReady, _) => Transition::LogOnly,
            (ServeState::Serving, CompileEvent::Ready | CompileEvent::Reload) => Transition::Swap,
            (ServeState::Serving, CompileEvent::Compile | CompileEvent::Error { .. }) => {
                Transition::Notify
            }
        }
    }
}

impl Default for EventMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err() -> CompileEvent {
        CompileEvent::Error {
            error: "syntax error".into(),
        }
    }

    #[test]
    fn test_starts_exactly_once() {
        // Any amount of compile/error chatter before the first ready is
        // log-only; the first ready starts the server, later readies swap.
        let mut machine = EventMachine::new();

        for _ in 0..3 {
            assert_eq!(machine.handle(&CompileEvent::Compile), Transition::LogOnly);
            assert_eq!(machine.handle(&err()), Transition::LogOnly);
        }
        assert_eq!(machine.state(), ServeState::WaitingForFirstReady);

        assert_eq!(machine.handle(&CompileEvent::Ready), Transition::Start);
        assert_eq!(machine.state(), ServeState::Serving);

        assert_eq!(machine.handle(&CompileEvent::Ready), Transition::Swap);
        assert_eq!(machine.handle(&CompileEvent::Reload), Transition::Swap);
    }

    #[test]
    fn test_reload_before_ready_is_dropped() {
        let mut machine = EventMachine::new();
        assert_eq!(machine.handle(&CompileEvent::Reload), Transition::LogOnly);
        assert_eq!(machine.state(), ServeState::WaitingForFirstReady);
    }

    #[test]
    fn test_errors_never_change_state() {
        let mut machine = EventMachine::new();
        machine.handle(&CompileEvent::Ready);

        assert_eq!(machine.handle(&err()), Transition::Notify);
        assert_eq!(machine.state(), ServeState::Serving);

        // Still swaps normally after an error.
        assert_eq!(machine.handle(&CompileEvent::Reload), Transition::Swap);
    }

    #[test]
    fn test_compile_while_serving_notifies_only() {
        let mut machine = EventMachine::new();
        machine.handle(&CompileEvent::Ready);
        assert_eq!(machine.handle(&CompileEvent::Compile), Transition::Notify);
        assert_eq!(machine.state(), ServeState::Serving);
    }
}
