//! Vault search via an external indexer process.
//!
//! [`SearchBackend`] is what the tool layer consumes. [`CliSearch`] drives a
//! search executable whose location is resolved once from configuration and
//! injected; it is always run with an argument vector, never through a shell.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::SearchConfig;
use crate::error::SearchError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Semantic,
    Keyword,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
        }
    }

    fn subcommand(&self) -> &'static str {
        match self {
            Self::Hybrid => "query",
            Self::Semantic => "vsearch",
            Self::Keyword => "search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(alias = "file")]
    pub path: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub title: String,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Build or refresh the index. Idempotent and potentially slow.
    async fn index(&self) -> Result<(), SearchError>;

    async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

pub struct CliSearch {
    executable: Option<PathBuf>,
    search_timeout: Duration,
    index_timeout: Duration,
}

impl CliSearch {
    pub fn new(executable: Option<PathBuf>, search_timeout: Duration, index_timeout: Duration) -> Self {
        Self {
            executable,
            search_timeout,
            index_timeout,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.resolved_executable(),
            Duration::from_secs(config.search_timeout_secs),
            Duration::from_secs(config.index_timeout_secs),
        )
    }

    pub fn executable(&self) -> Option<&PathBuf> {
        self.executable.as_ref()
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Vec<u8>, SearchError> {
        let exe = self.executable.as_ref().ok_or(SearchError::Unavailable)?;

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(exe = %exe.display(), ?args, "running search process");
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SearchError::Unavailable
            } else {
                SearchError::Failed(format!("failed to start {}: {e}", exe.display()))
            }
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| SearchError::Timeout(timeout.as_secs()))?
            .map_err(|e| SearchError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SearchError::Failed(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SearchBackend for CliSearch {
    async fn is_available(&self) -> bool {
        match &self.executable {
            Some(exe) => tokio::fs::metadata(exe)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    async fn index(&self) -> Result<(), SearchError> {
        if !self.is_available().await {
            return Err(SearchError::Unavailable);
        }
        self.run(&["update"], self.index_timeout).await?;
        tracing::info!("search index updated");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if !self.is_available().await {
            return Err(SearchError::Unavailable);
        }
        let limit = limit.to_string();
        let stdout = self
            .run(
                &[mode.subcommand(), "--json", "-n", &limit, "--", query],
                self.search_timeout,
            )
            .await?;
        parse_hits(&stdout)
    }
}

fn parse_hits(stdout: &[u8]) -> Result<Vec<SearchHit>, SearchError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).map_err(|e| SearchError::Parse(e.to_string()))
}
