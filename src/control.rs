//! Input sources feeding the display event channel: the line-delimited JSON
//! control socket and the interactive console.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use config_model::ControlCommand;
use crossbeam_channel::Sender;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{BoothEvent, TouchZone};

/// Decode one control socket line. Blank lines are skipped.
pub fn parse_control_line(line: &str, window: [u32; 2]) -> Result<Option<BoothEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let command: ControlCommand =
        serde_json::from_str(line).with_context(|| format!("invalid control command {line:?}"))?;
    BoothEvent::from_command(&command, window).map(Some)
}

/// Decode one console line: a zone name or one of the button shortcuts.
pub fn parse_console_line(line: &str) -> Result<Option<BoothEvent>> {
    let event = match line.trim().to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "c" | "capture" => BoothEvent::Capture,
        "p" | "print" => BoothEvent::Print,
        "q" | "quit" => BoothEvent::Quit,
        other => match TouchZone::from_str(other) {
            Ok(zone) => BoothEvent::Touch(zone),
            Err(_) => bail!("unknown console input {other:?}"),
        },
    };
    Ok(Some(event))
}

/// Accept control clients on `path` until `cancel` fires.
pub async fn serve_socket(
    path: PathBuf,
    window: [u32; 2],
    events: Sender<BoothEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = bind(&path)?;
    info!(socket = %path.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let events = events.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_client(stream, window, events).await {
                            warn!("control client failed: {err:#}");
                        }
                    });
                }
                Err(err) => warn!("control socket accept failed: {err}"),
            },
        }
    }

    if let Err(err) = std::fs::remove_file(&path) {
        debug!("could not remove control socket: {err}");
    }
    Ok(())
}

fn bind(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    // A socket left behind by a crashed run blocks the bind.
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("failed to bind {}", path.display()))
}

async fn handle_client(
    stream: UnixStream,
    window: [u32; 2],
    events: Sender<BoothEvent>,
) -> Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_control_line(&line, window) {
            Ok(Some(event)) => {
                debug!(?event, "control event");
                events.send(event).context("booth event channel closed")?;
            }
            Ok(None) => {}
            Err(err) => warn!("ignoring control line: {err:#}"),
        }
    }
    Ok(())
}

/// Read console lines from stdin until EOF; EOF cancels the booth.
pub fn read_console(events: Sender<BoothEvent>, cancel: CancellationToken) {
    info!("console input enabled: type a zone name, capture, print or quit");
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("stdin read failed: {err}");
                break;
            }
        };
        match parse_console_line(&line) {
            Ok(Some(event)) => {
                if events.send(event).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => warn!("{err:#}"),
        }
    }
    info!("stdin closed; initiating shutdown");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn control_lines_map_to_events() {
        let window = [800, 480];
        assert_eq!(
            parse_control_line(r#"{"command":"capture"}"#, window).unwrap(),
            Some(BoothEvent::Capture)
        );
        assert_eq!(
            parse_control_line(r#"{"command":"touch","zone":"bottom-left"}"#, window).unwrap(),
            Some(BoothEvent::Touch(TouchZone::BottomLeft))
        );
        assert_eq!(parse_control_line("   ", window).unwrap(), None);
        assert!(parse_control_line(r#"{"command":"dance"}"#, window).is_err());
    }

    #[test]
    fn console_accepts_shortcuts_and_zone_names() {
        assert_eq!(parse_console_line("q").unwrap(), Some(BoothEvent::Quit));
        assert_eq!(parse_console_line("Print").unwrap(), Some(BoothEvent::Print));
        assert_eq!(
            parse_console_line("center_right").unwrap(),
            Some(BoothEvent::Touch(TouchZone::CenterRight))
        );
        assert!(parse_console_line("somewhere").is_err());
    }

    #[tokio::test]
    async fn socket_forwards_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("control.sock");
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve_socket(path.clone(), [800, 480], tx, cancel.clone()));

        let mut client = None;
        for _ in 0..50 {
            if let Ok(stream) = UnixStream::connect(&path).await {
                client = Some(stream);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let mut client = client.expect("control socket never came up");
        client
            .write_all(b"{\"command\":\"print\"}\nnot json\n{\"command\":\"quit\"}\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let first = tokio::task::spawn_blocking(move || {
            let a = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            let b = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            (a, b)
        })
        .await
        .unwrap();
        assert_eq!(first, (BoothEvent::Print, BoothEvent::Quit));

        cancel.cancel();
        server.await.unwrap().unwrap();
        assert!(!path.exists());
    }
}
