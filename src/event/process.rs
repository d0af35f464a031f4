//! Compiler child process event source.
//!
//! The bundler runs as a child process and reports lifecycle events as
//! one JSON object per stdout line (the same shape pushed to clients).
//! Lines that do not parse as events are the compiler's own output and
//! are forwarded to the terminal untouched.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::CompileEvent;

/// Spawn the compiler command and feed its event stream into `tx`.
///
/// The reader thread drops `tx` when the process closes stdout, which
/// the pipeline observes as source termination.
pub fn spawn_compiler_process(command: &[String], tx: mpsc::Sender<CompileEvent>) -> Result<()> {
    let (program, args) = command
        .split_first()
        .context("compiler command is empty")?;

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start compiler `{program}`"))?;

    let stdout = child
        .stdout
        .take()
        .context("compiler stdout unavailable")?;

    std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            let Ok(line) = line else { break };

            match CompileEvent::from_json(line.trim()) {
                Some(event) => {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                // Plain compiler output, pass through.
                None => println!("{line}"),
            }
        }

        crate::debug!("compiler"; "event stream ended");
        let _ = child.wait();
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_parsed_from_stdout() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            concat!(
                r#"echo '{"type":"CompileEvent"}'; "#,
                "echo 'plain build output'; ",
                r#"echo '{"type":"ReadyEvent"}'"#
            )
            .to_string(),
        ];

        let (tx, mut rx) = mpsc::channel(8);
        spawn_compiler_process(&command, tx).unwrap();

        assert_eq!(rx.recv().await, Some(CompileEvent::Compile));
        assert_eq!(rx.recv().await, Some(CompileEvent::Ready));
        // Stream ends, sender dropped.
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_empty_command_rejected() {
        let (tx, _rx) = mpsc::channel(1);
        assert!(spawn_compiler_process(&[], tx).is_err());
    }
}
