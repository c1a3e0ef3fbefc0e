use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::{Command, Reply};
use crate::error::AppError;
use crate::roles::{find_role, roles};
use crate::session::SessionManager;
use crate::storage::TreeRecord;

/// JSON-lines server: requests on one stream, replies and events on another.
#[derive(Clone)]
pub struct StdioServer {
    sessions: Arc<SessionManager>,
}

impl StdioServer {
    /// Create a server over a session manager.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Serve stdin/stdout until stdin reaches EOF.
    pub async fn run(&self) -> io::Result<()> {
        info!("Decision tree server starting...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve arbitrary streams until `reader` reaches EOF.
    ///
    /// Requests are handled one at a time in arrival order. Every reply and
    /// every session event is written as one JSON line; events are written
    /// as they arrive, interleaved with replies.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(writer, out_rx));
        let pump = tokio::spawn(pump_events(self.sessions.subscribe(), out_tx.clone()));

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");
            let reply = self.handle_line(trimmed).await;

            match serde_json::to_string(&reply) {
                Ok(json) => {
                    debug!(response = %json, "Sending response");
                    if out_tx.send(json).is_err() {
                        break;
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize reply"),
            }
        }

        info!("EOF received, shutting down");
        pump.abort();
        let _ = pump.await;
        drop(out_tx);

        writer_task.await.map_err(io::Error::other)?
    }

    /// Parse and handle one request line.
    pub async fn handle_line(&self, line: &str) -> Reply {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => {
                error!(error = %e, "Failed to parse request");
                let err = AppError::Protocol {
                    message: format!("Parse error: {}", e),
                };
                Reply::error(err.to_string())
            }
        }
    }

    async fn handle_command(&self, command: Command) -> Reply {
        match command {
            Command::Generate { role, query, mode } => {
                // Built-in roles are matched loosely and sent with their exact name.
                let role = match find_role(&role) {
                    Some(preset) => preset.name.to_string(),
                    None => role,
                };
                let session_id = self.sessions.start(role, query, mode).await;
                Reply::Started { session_id }
            }
            Command::Expand {
                role,
                query,
                answer_id,
                session_id,
            } => match self
                .sessions
                .spawn_expand(session_id, role, query, answer_id)
                .await
            {
                Ok(session_id) => Reply::Expanding { session_id },
                Err(e) => {
                    warn!(error = %e, "Expansion request rejected");
                    Reply::error(AppError::from(e).to_string())
                }
            },
            Command::Roles => Reply::Roles {
                roles: roles().to_vec(),
            },
            Command::Tree { session_id } => {
                match self.sessions.snapshot(session_id.as_ref()).await {
                    Ok(tree) => Reply::Tree {
                        record: TreeRecord::from_tree(&tree),
                    },
                    Err(e) => Reply::error(AppError::from(e).to_string()),
                }
            }
        }
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

async fn pump_events(
    mut events: broadcast::Receiver<crate::session::SessionEvent>,
    out: mpsc::UnboundedSender<String>,
) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    if out.send(json).is_err() {
                        break;
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
