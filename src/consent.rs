//! Interactive consent surfaces for approval-gated operations.
//!
//! A [`ConsentSurface`] shows a pending operation to the user and reports the
//! decision. It may never answer; the [`OperationGuard`](crate::guard::OperationGuard)
//! timeout is authoritative.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};

use crate::guard::ApprovalRequest;

#[async_trait]
pub trait ConsentSurface: Send + Sync {
    /// Present the request and return `true` to approve, `false` to deny.
    async fn present(&self, request: &ApprovalRequest) -> bool;
}

/// Rejects every request. Used when no interactive surface is attached.
pub struct DenyAll;

#[async_trait]
impl ConsentSurface for DenyAll {
    async fn present(&self, request: &ApprovalRequest) -> bool {
        tracing::info!(
            id = %request.id,
            tool = %request.operation.tool,
            "no consent surface attached, denying"
        );
        false
    }
}

/// Prompts on the server's own terminal, one request at a time.
///
/// Stdin is read by a single dedicated thread feeding a channel, so a prompt
/// abandoned by the guard never leaves a blocked read behind to swallow the
/// next answer.
pub struct ConsoleConsent {
    answers: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl ConsoleConsent {
    /// Reads answers from stdin. The reader thread starts on the first prompt.
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(None),
        }
    }

    /// Reads answers from `lines` instead of stdin.
    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            answers: Mutex::new(Some(lines)),
        }
    }
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("notegate-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        // The sender is gone with the closure, so every prompt denies.
        tracing::error!(error = %e, "failed to start the stdin reader");
    }
    rx
}

impl Default for ConsoleConsent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsentSurface for ConsoleConsent {
    async fn present(&self, request: &ApprovalRequest) -> bool {
        let mut slot = self.answers.lock().await;
        let answers = slot.get_or_insert_with(spawn_stdin_reader);

        // Lines typed while no prompt was showing answer nothing.
        while answers.try_recv().is_ok() {}

        let op = &request.operation;
        let prompt = format!(
            "\n[notegate] Agent requests '{}'{}{}\n  client: {}\n  approve? [y/N] ",
            op.tool,
            op.path
                .as_deref()
                .map(|p| format!(" on '{p}'"))
                .unwrap_or_default(),
            op.action
                .as_deref()
                .map(|a| format!(" ({a})"))
                .unwrap_or_default(),
            op.client_id.as_deref().unwrap_or("unknown"),
        );

        let mut stderr = tokio::io::stderr();
        if stderr.write_all(prompt.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return false;
        }

        match answers.recv().await {
            Some(line) => parse_answer(&line),
            None => false,
        }
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Build the consent surface named in config.
pub fn from_config(name: &str) -> anyhow::Result<std::sync::Arc<dyn ConsentSurface>> {
    match name {
        "console" => Ok(std::sync::Arc::new(ConsoleConsent::new())),
        "deny" => Ok(std::sync::Arc::new(DenyAll)),
        other => anyhow::bail!("unknown consent surface: {other}. Supported: console, deny"),
    }
}
