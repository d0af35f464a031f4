//! Compile event protocol.
//!
//! Events flow from the compiler (a child process or the artifact
//! watcher) into the serve pipeline. The wire shape is identical to the
//! notification pushed to live-reload clients, so one enum covers both
//! directions of the protocol.

mod machine;
mod process;
mod watch;

pub use machine::{EventMachine, ServeState, Transition};
pub use process::spawn_compiler_process;
pub use watch::spawn_artifact_watcher;

use serde::{Deserialize, Serialize};

/// One compile lifecycle event.
///
/// Wire format: `{"type":"CompileEvent"}`, `{"type":"ErrorEvent","error":…}`,
/// `{"type":"ReadyEvent"}`, `{"type":"ReloadEvent"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompileEvent {
    /// A compilation started.
    #[serde(rename = "CompileEvent")]
    Compile,

    /// Compilation failed. Non-fatal: the previous build stays active.
    #[serde(rename = "ErrorEvent")]
    Error { error: String },

    /// The first build artifact is available.
    #[serde(rename = "ReadyEvent")]
    Ready,

    /// A fresh build artifact replaced the previous one.
    #[serde(rename = "ReloadEvent")]
    Reload,
}

impl CompileEvent {
    /// Serialize to the JSON wire shape.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"CompileEvent"}"#.to_string())
    }

    /// Parse from the JSON wire shape.
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(CompileEvent::Ready.to_json(), r#"{"type":"ReadyEvent"}"#);
        assert_eq!(CompileEvent::Reload.to_json(), r#"{"type":"ReloadEvent"}"#);

        let err = CompileEvent::Error {
            error: "module not found".into(),
        };
        assert_eq!(
            err.to_json(),
            r#"{"type":"ErrorEvent","error":"module not found"}"#
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let parsed = CompileEvent::from_json(r#"{"type":"ErrorEvent","error":"boom"}"#).unwrap();
        assert_eq!(
            parsed,
            CompileEvent::Error {
                error: "boom".into()
            }
        );

        assert_eq!(
            CompileEvent::from_json(r#"{"type":"CompileEvent"}"#),
            Some(CompileEvent::Compile)
        );
        assert_eq!(CompileEvent::from_json("webpack 5.90 compiled"), None);
    }
}
