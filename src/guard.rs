//! Approval workflow for mutating operations.
//!
//! [`OperationGuard`] decides whether an [`Operation`] needs user consent and, if
//! so, parks the caller until the consent surface answers or the approval window
//! closes. Timeouts deny.
//!
//! Each pending request lives in a registry keyed by a fresh correlation id.
//! Removing the entry is the linearization point: whichever of the consent
//! task, the timer, an explicit [`OperationGuard::respond`], or
//! [`OperationGuard::cancel_all`] removes it first resolves the request, and the
//! rest find nothing and do nothing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::consent::ConsentSurface;
use crate::error::ToolError;

/// Tools that mutate the vault and therefore may need consent.
pub const MUTATING_TOOLS: &[&str] = &["write_note", "add_task", "complete_task"];

/// The audit/approval unit derived from a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Operation {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            path: None,
            action: None,
            timestamp: Utc::now(),
            client_id: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_client(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn is_mutating(&self) -> bool {
        MUTATING_TOOLS.contains(&self.tool.as_str())
    }
}

/// What the consent surface is shown.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub operation: Operation,
}

/// Terminal state of a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Approved,
    Denied,
    TimedOut,
}

impl ApprovalOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::TimedOut => "timed_out",
        }
    }
}

struct PendingApproval {
    operation: Operation,
    responder: oneshot::Sender<ApprovalOutcome>,
    timer: JoinHandle<()>,
    consent: JoinHandle<()>,
}

struct PendingRegistry {
    entries: Mutex<HashMap<Uuid, PendingApproval>>,
    audit: Arc<AuditLogger>,
}

impl PendingRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, PendingApproval>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve `id` if it is still pending. Returns `false` when someone else won.
    fn resolve(&self, id: Uuid, outcome: ApprovalOutcome, reason: &str) -> bool {
        let Some(entry) = self.lock().remove(&id) else {
            return false;
        };
        self.finish(id, entry, outcome, reason);
        true
    }

    fn finish(&self, id: Uuid, entry: PendingApproval, outcome: ApprovalOutcome, reason: &str) {
        entry.timer.abort();
        entry.consent.abort();

        tracing::info!(
            id = %id,
            tool = %entry.operation.tool,
            outcome = outcome.as_str(),
            "approval resolved"
        );
        self.audit.log_approval_response(
            &id.to_string(),
            &entry.operation,
            outcome.is_approved(),
            reason,
        );
        // The caller may have gone away; nothing to do then.
        let _ = entry.responder.send(outcome);
    }
}

#[derive(Clone)]
pub struct OperationGuard {
    require_approval: bool,
    timeout: Duration,
    consent: Arc<dyn ConsentSurface>,
    registry: Arc<PendingRegistry>,
}

impl OperationGuard {
    pub fn new(
        require_approval: bool,
        timeout: Duration,
        consent: Arc<dyn ConsentSurface>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            require_approval,
            timeout,
            consent,
            registry: Arc::new(PendingRegistry {
                entries: Mutex::new(HashMap::new()),
                audit,
            }),
        }
    }

    pub fn requires_approval(&self, operation: &Operation) -> bool {
        self.require_approval && operation.is_mutating()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.registry.lock().keys().copied().collect()
    }

    /// Ask for consent and wait for the first of: user decision, timeout, cancellation.
    pub async fn request_approval(&self, operation: Operation) -> ApprovalOutcome {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        self.registry
            .audit
            .log_approval_request(&id.to_string(), &operation);
        tracing::info!(
            id = %id,
            tool = %operation.tool,
            path = operation.path.as_deref().unwrap_or("-"),
            "approval requested"
        );

        {
            // Hold the registry lock while arming tasks so neither can resolve
            // before the entry exists.
            let mut entries = self.registry.lock();

            let registry = Arc::clone(&self.registry);
            let timeout = self.timeout;
            let timer = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                registry.resolve(id, ApprovalOutcome::TimedOut, "timed_out");
            });

            let registry = Arc::clone(&self.registry);
            let consent = Arc::clone(&self.consent);
            let request = ApprovalRequest {
                id,
                operation: operation.clone(),
            };
            let consent_task = tokio::spawn(async move {
                let approved = consent.present(&request).await;
                let outcome = if approved {
                    ApprovalOutcome::Approved
                } else {
                    ApprovalOutcome::Denied
                };
                registry.resolve(id, outcome, outcome.as_str());
            });

            entries.insert(
                id,
                PendingApproval {
                    operation,
                    responder: tx,
                    timer,
                    consent: consent_task,
                },
            );
        }

        rx.await.unwrap_or(ApprovalOutcome::Denied)
    }

    /// Deliver an explicit user decision. Returns `false` if `id` is no longer pending.
    pub fn respond(&self, id: Uuid, approved: bool) -> bool {
        let outcome = if approved {
            ApprovalOutcome::Approved
        } else {
            ApprovalOutcome::Denied
        };
        self.registry.resolve(id, outcome, outcome.as_str())
    }

    /// Run `action` once the operation is cleared. Denials and timeouts never run it.
    pub async fn execute_with_approval<T, F, Fut>(
        &self,
        operation: Operation,
        action: F,
    ) -> Result<T, ToolError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ToolError>>,
    {
        if !self.requires_approval(&operation) {
            return action().await;
        }

        match self.request_approval(operation).await {
            ApprovalOutcome::Approved => action().await,
            ApprovalOutcome::Denied => Err(ToolError::Denied),
            ApprovalOutcome::TimedOut => Err(ToolError::ApprovalTimedOut(self.timeout.as_secs())),
        }
    }

    /// Force-deny every pending approval. Returns how many were resolved.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(Uuid, PendingApproval)> = self.registry.lock().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            self.registry
                .finish(id, entry, ApprovalOutcome::Denied, "cancelled");
        }
        if count > 0 {
            tracing::warn!(count, "cancelled pending approvals");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mutating_tools_are_gated() {
        for tool in MUTATING_TOOLS {
            assert!(Operation::new(*tool).is_mutating());
        }
        for tool in ["read_note", "search_vault", "list_notes", "list_tasks"] {
            assert!(!Operation::new(tool).is_mutating());
        }
    }

    #[test]
    fn operation_serializes_camel_case() {
        let op = Operation::new("write_note")
            .with_path("a.md")
            .with_action("create")
            .with_client(Some("127.0.0.1".into()));
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["tool"], "write_note");
        assert_eq!(json["clientId"], "127.0.0.1");
        assert_eq!(json["action"], "create");
    }
}
