//! In-memory audit trail of tool calls, resource reads, and approval decisions.
//!
//! [`AuditLogger`] keeps a bounded, insertion-ordered ring of [`AuditEntry`]
//! records for the lifetime of the process. Nothing is persisted; when the ring
//! is full the oldest entries are dropped first.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;
use crate::guard::Operation;

/// Kind of security-relevant action an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ToolCall,
    ResourceRead,
    ApprovalRequest,
    ApprovalResponse,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::ResourceRead => "resource_read",
            Self::ApprovalRequest => "approval_request",
            Self::ApprovalResponse => "approval_response",
        }
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit record before it is stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub kind: AuditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// An immutable, timestamped audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

pub struct AuditLogger {
    enabled: bool,
    debug: bool,
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLogger {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            enabled: config.enabled,
            debug: config.debug,
            capacity: config.capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stamp and append an event. No-op when auditing is disabled.
    pub fn log(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }

        if self.debug {
            tracing::info!(
                target: "notegate::audit",
                kind = %event.kind,
                tool = event.tool.as_deref().unwrap_or("-"),
                path = event.path.as_deref().unwrap_or("-"),
                success = event.success,
                error = event.error.as_deref().unwrap_or(""),
                "audit"
            );
        }

        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
        };
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn log_tool_call(
        &self,
        tool: &str,
        path: Option<&str>,
        client_id: Option<&str>,
        outcome: Result<(), &str>,
    ) {
        self.log(AuditEvent {
            kind: AuditKind::ToolCall,
            tool: Some(tool.to_string()),
            path: path.map(str::to_string),
            client_id: client_id.map(str::to_string),
            success: outcome.is_ok(),
            error: outcome.err().map(str::to_string),
            details: None,
        });
    }

    pub fn log_resource_read(&self, path: &str, client_id: Option<&str>, outcome: Result<(), &str>) {
        self.log(AuditEvent {
            kind: AuditKind::ResourceRead,
            tool: None,
            path: Some(path.to_string()),
            client_id: client_id.map(str::to_string),
            success: outcome.is_ok(),
            error: outcome.err().map(str::to_string),
            details: None,
        });
    }

    pub fn log_approval_request(&self, approval_id: &str, operation: &Operation) {
        self.log(AuditEvent {
            kind: AuditKind::ApprovalRequest,
            tool: Some(operation.tool.clone()),
            path: operation.path.clone(),
            client_id: operation.client_id.clone(),
            success: true,
            error: None,
            details: Some(serde_json::json!({
                "approvalId": approval_id,
                "action": operation.action,
            })),
        });
    }

    pub fn log_approval_response(
        &self,
        approval_id: &str,
        operation: &Operation,
        approved: bool,
        reason: &str,
    ) {
        self.log(AuditEvent {
            kind: AuditKind::ApprovalResponse,
            tool: Some(operation.tool.clone()),
            path: operation.path.clone(),
            client_id: operation.client_id.clone(),
            success: approved,
            error: (!approved).then(|| format!("operation denied: {reason}")),
            details: Some(serde_json::json!({
                "approvalId": approval_id,
                "outcome": reason,
            })),
        });
    }

    /// The last `n` entries, most recent last.
    pub fn get_recent(&self, n: usize) -> Vec<AuditEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// The last `n` entries for `tool`, most recent last.
    pub fn get_for_tool(&self, tool: &str, n: usize) -> Vec<AuditEntry> {
        let entries = self.lock();
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| e.event.tool.as_deref() == Some(tool))
            .take(n)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    /// Serialize the whole buffer as a JSON array.
    pub fn export(&self) -> serde_json::Result<String> {
        let entries = self.lock();
        serde_json::to_string_pretty(&*entries)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AuditEntry>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
