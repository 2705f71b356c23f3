//! Error types.
//!
//! Protocol failures never reach these types; they are answered with HTTP
//! status codes by the server. Everything here surfaces to the agent as an
//! `isError` tool result.

use thiserror::Error;

use crate::security::PathRejection;

/// Failure of a note store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note not found: {0}")]
    NotFound(String),

    #[error("note already exists: {0}")]
    AlreadyExists(String),

    /// The store's own containment check failed.
    #[error("refusing to access a location outside the vault: {0}")]
    OutsideRoot(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the search subprocess.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(
        "search is not available: no search executable is configured or it was not found. \
         Install a compatible search CLI (such as qmd), index the vault \
         with `notegate index`, and set `search.executable` in ~/.notegate/config.toml \
         (or NOTEGATE_SEARCH_BIN) to its absolute path"
    )]
    Unavailable,

    #[error("search timed out after {0}s")]
    Timeout(u64),

    #[error("search process failed: {0}")]
    Failed(String),

    #[error("could not parse search output: {0}")]
    Parse(String),
}

/// Failure of a task store operation.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid task id '{0}': expected '<note path>:<line>'")]
    InvalidId(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already completed: {0}")]
    AlreadyCompleted(String),

    #[error("task description must not be empty")]
    EmptyDescription,

    /// A task is exactly one markdown line.
    #[error("task {0} must not contain line breaks")]
    LineBreak(&'static str),

    #[error(transparent)]
    Path(#[from] PathRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Application-level failure of a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: PathRejection },

    /// The user said no.
    #[error("operation denied by user")]
    Denied,

    #[error("operation denied: approval timed out after {0}s")]
    ApprovalTimedOut(u64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn invalid_path(path: &str, reason: PathRejection) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }

    /// True when the failure is a consent decision rather than a broken collaborator.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Denied | Self::ApprovalTimedOut(_))
    }

    /// Stable machine-readable category for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::InvalidPath { .. } => "invalid_path",
            Self::Denied => "denied",
            Self::ApprovalTimedOut(_) => "approval_timeout",
            Self::Store(_) => "store_error",
            Self::Search(SearchError::Unavailable) => "search_unavailable",
            Self::Search(_) => "search_error",
            Self::Task(_) => "task_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Failure to start or stop the control server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("server task failed: {0}")]
    Task(String),
}
