pub mod add_task;
pub mod complete_task;
pub mod list_notes;
pub mod list_tasks;
pub mod read_note;
pub mod search_vault;
pub mod write_note;

use std::sync::Arc;

use add_task::AddTaskParams;
use complete_task::CompleteTaskParams;
use list_notes::ListNotesParams;
use list_tasks::ListTasksParams;
use read_note::ReadNoteParams;
use schemars::JsonSchema;
use search_vault::SearchVaultParams;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use write_note::{WriteMode, WriteNoteParams};

use crate::audit::AuditLogger;
use crate::error::{SearchError, ToolError};
use crate::guard::{Operation, OperationGuard};
use crate::search::SearchBackend;
use crate::security::{PathValidator, ValidatedPath};
use crate::store::NoteStore;
use crate::tasks::{parse::parse_task_id, NewTask, TaskFilter, TaskStore};

const MAX_SEARCH_LIMIT: usize = 50;
const DEFAULT_TASK_LIMIT: usize = 50;
const MAX_TASK_LIMIT: usize = 500;

/// The external stores the tools operate on.
#[derive(Clone)]
pub struct Collaborators {
    pub notes: Arc<dyn NoteStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub search: Arc<dyn SearchBackend>,
}

/// A parsed tool invocation. Arguments are checked against the tool's record once, here.
#[derive(Debug)]
pub enum ToolCall {
    ReadNote(ReadNoteParams),
    WriteNote(WriteNoteParams),
    SearchVault(SearchVaultParams),
    ListNotes(ListNotesParams),
    ListTasks(ListTasksParams),
    AddTask(AddTaskParams),
    CompleteTask(CompleteTaskParams),
}

impl ToolCall {
    pub fn parse(tool: &str, arguments: Value) -> Result<Self, ToolError> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        match tool {
            "read_note" => args(tool, arguments).map(Self::ReadNote),
            "write_note" => args(tool, arguments).map(Self::WriteNote),
            "search_vault" => args(tool, arguments).map(Self::SearchVault),
            "list_notes" => args(tool, arguments).map(Self::ListNotes),
            "list_tasks" => args(tool, arguments).map(Self::ListTasks),
            "add_task" => args(tool, arguments).map(Self::AddTask),
            "complete_task" => args(tool, arguments).map(Self::CompleteTask),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadNote(_) => "read_note",
            Self::WriteNote(_) => "write_note",
            Self::SearchVault(_) => "search_vault",
            Self::ListNotes(_) => "list_notes",
            Self::ListTasks(_) => "list_tasks",
            Self::AddTask(_) => "add_task",
            Self::CompleteTask(_) => "complete_task",
        }
    }
}

fn args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// One entry of `GET /mcp/tools`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

fn definition<T: JsonSchema>(name: &'static str, description: &'static str) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        input_schema: schemars::schema_for!(T).to_value(),
    }
}

/// The static tool catalogue.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        definition::<ReadNoteParams>("read_note", "Read the markdown content of a note in the vault."),
        definition::<WriteNoteParams>(
            "write_note",
            "Create, overwrite, or append to a note. May require user approval.",
        ),
        definition::<SearchVaultParams>(
            "search_vault",
            "Search the vault. Modes: hybrid (default), semantic, keyword.",
        ),
        definition::<ListNotesParams>("list_notes", "List notes in a folder, optionally recursively and with metadata."),
        definition::<ListTasksParams>(
            "list_tasks",
            "List checkbox tasks across the vault, filtered by status and due date.",
        ),
        definition::<AddTaskParams>("add_task", "Add a task to a note. May require user approval."),
        definition::<CompleteTaskParams>(
            "complete_task",
            "Mark a task as completed by id. May require user approval.",
        ),
    ]
}

/// One block of tool output.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// The `{content, isError?}` envelope returned for every tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<Content>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content {
                kind: "text",
                text: text.into(),
            }],
            is_error: false,
            error_code: None,
        }
    }

    pub fn error(error: &ToolError) -> Self {
        Self {
            content: vec![Content {
                kind: "text",
                text: error.to_string(),
            }],
            is_error: true,
            error_code: Some(error.code()),
        }
    }
}

impl From<Result<String, ToolError>> for ToolResponse {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => Self::text(text),
            Err(e) => Self::error(&e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub default_search_limit: usize,
    pub task_note: String,
}

/// Executes tool calls against the collaborators, enforcing path validation,
/// approval gating, and audit logging.
#[derive(Clone)]
pub struct VaultTools {
    collaborators: Collaborators,
    validator: PathValidator,
    guard: OperationGuard,
    audit: Arc<AuditLogger>,
    settings: Arc<ToolSettings>,
}

impl VaultTools {
    pub fn new(
        collaborators: Collaborators,
        validator: PathValidator,
        guard: OperationGuard,
        audit: Arc<AuditLogger>,
        settings: ToolSettings,
    ) -> Self {
        Self {
            collaborators,
            validator,
            guard,
            audit,
            settings: Arc::new(settings),
        }
    }

    /// Run one tool call. Always produces exactly one `tool_call` audit entry.
    pub async fn call(&self, tool: &str, arguments: Value, client_id: Option<&str>) -> ToolResponse {
        let target = audit_target(&arguments);
        tracing::info!(
            tool,
            path = target.as_deref().unwrap_or("-"),
            client = client_id.unwrap_or("-"),
            "tool call"
        );

        let result = match ToolCall::parse(tool, arguments) {
            Ok(call) => self.dispatch(call, client_id).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => self
                .audit
                .log_tool_call(tool, target.as_deref(), client_id, Ok(())),
            Err(e) => {
                if e.is_denial() {
                    tracing::info!(tool, error = %e, "tool call denied");
                } else {
                    tracing::warn!(tool, error = %e, "tool call failed");
                }
                let message = e.to_string();
                self.audit
                    .log_tool_call(tool, target.as_deref(), client_id, Err(&message));
            }
        }

        result.into()
    }

    /// Read a note as a resource. Logs a `resource_read` audit entry.
    pub async fn read_resource(
        &self,
        raw_path: &str,
        client_id: Option<&str>,
    ) -> Result<(ValidatedPath, String), ToolError> {
        let result = async {
            let path = self.file_path(raw_path)?;
            let text = self.collaborators.notes.read(&path).await?;
            Ok::<_, ToolError>((path, text))
        }
        .await;

        match &result {
            Ok((path, _)) => self
                .audit
                .log_resource_read(path.as_str(), client_id, Ok(())),
            Err(e) => {
                let message = e.to_string();
                self.audit.log_resource_read(raw_path, client_id, Err(&message));
            }
        }
        result
    }

    async fn dispatch(&self, call: ToolCall, client_id: Option<&str>) -> Result<String, ToolError> {
        let client = client_id.map(str::to_string);
        match call {
            ToolCall::ReadNote(p) => self.read_note(p).await,
            ToolCall::WriteNote(p) => self.write_note(p, client).await,
            ToolCall::SearchVault(p) => self.search_vault(p).await,
            ToolCall::ListNotes(p) => self.list_notes(p).await,
            ToolCall::ListTasks(p) => self.list_tasks(p).await,
            ToolCall::AddTask(p) => self.add_task(p, client).await,
            ToolCall::CompleteTask(p) => self.complete_task(p, client).await,
        }
    }

    fn file_path(&self, raw: &str) -> Result<ValidatedPath, ToolError> {
        self.validator
            .validate_with_extension(raw, true)
            .map_err(|reason| ToolError::invalid_path(raw, reason))
    }

    async fn read_note(&self, params: ReadNoteParams) -> Result<String, ToolError> {
        let path = self.file_path(&params.path)?;
        Ok(self.collaborators.notes.read(&path).await?)
    }

    async fn write_note(
        &self,
        params: WriteNoteParams,
        client: Option<String>,
    ) -> Result<String, ToolError> {
        let path = self.file_path(&params.path)?;
        let mode = params.mode;
        let operation = Operation::new("write_note")
            .with_path(path.as_str())
            .with_action(mode.as_str())
            .with_client(client);

        let notes = Arc::clone(&self.collaborators.notes);
        let target = path.clone();
        let content = params.content;
        let bytes = self
            .guard
            .execute_with_approval(operation, move || async move {
                let written = match mode {
                    WriteMode::Create => {
                        notes.create(&target, &content).await?;
                        content.len()
                    }
                    WriteMode::Overwrite => {
                        notes.write(&target, &content).await?;
                        content.len()
                    }
                    WriteMode::Append => {
                        let mut existing = if notes.exists(&target).await? {
                            notes.read(&target).await?
                        } else {
                            String::new()
                        };
                        if !existing.is_empty() && !existing.ends_with('\n') {
                            existing.push('\n');
                        }
                        existing.push_str(&content);
                        notes.write(&target, &existing).await?;
                        existing.len()
                    }
                };
                Ok::<usize, ToolError>(written)
            })
            .await?;

        tracing::info!(path = %path, mode = mode.as_str(), bytes, "note written");
        Ok(json!({ "path": path, "mode": mode.as_str(), "bytes": bytes }).to_string())
    }

    async fn search_vault(&self, params: SearchVaultParams) -> Result<String, ToolError> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: "search_vault".into(),
                message: "query must not be empty".into(),
            });
        }
        let limit = params
            .limit
            .unwrap_or(self.settings.default_search_limit)
            .clamp(1, MAX_SEARCH_LIMIT);

        let search = &self.collaborators.search;
        if !search.is_available().await {
            return Err(SearchError::Unavailable.into());
        }
        let hits = search.search(query, params.mode, limit).await?;

        Ok(json!({
            "query": query,
            "mode": params.mode.as_str(),
            "count": hits.len(),
            "results": hits,
        })
        .to_string())
    }

    async fn list_notes(&self, params: ListNotesParams) -> Result<String, ToolError> {
        let raw = params.folder.as_deref().unwrap_or("");
        let folder = self
            .validator
            .validate_folder(raw)
            .map_err(|reason| ToolError::invalid_path(raw, reason))?;
        let recursive = params.recursive.unwrap_or(true);
        let prefix = folder.as_ref().map(|f| format!("{f}/"));

        let notes: Vec<String> = self
            .collaborators
            .notes
            .list_markdown_files()
            .await?
            .into_iter()
            .filter(|file| {
                let rest = match &prefix {
                    Some(prefix) => match file.strip_prefix(prefix.as_str()) {
                        Some(rest) => rest,
                        None => return false,
                    },
                    None => file.as_str(),
                };
                recursive || !rest.contains('/')
            })
            .collect();

        let listing = if params.include_metadata.unwrap_or(false) {
            let mut entries = Vec::with_capacity(notes.len());
            for note in &notes {
                let Ok(path) = self.validator.validate(note) else {
                    continue;
                };
                let meta = self.collaborators.notes.metadata(&path).await?;
                entries.push(json!({
                    "path": path,
                    "size": meta.size,
                    "modified": meta.modified,
                }));
            }
            Value::Array(entries)
        } else {
            json!(notes)
        };

        Ok(json!({
            "folder": folder.as_ref().map(ValidatedPath::as_str).unwrap_or(""),
            "count": notes.len(),
            "notes": listing,
        })
        .to_string())
    }

    async fn list_tasks(&self, params: ListTasksParams) -> Result<String, ToolError> {
        let filter = TaskFilter {
            status: params.status,
            overdue: params.overdue.unwrap_or(false),
            due_before: params.due_before,
            due_after: params.due_after,
            limit: params
                .limit
                .unwrap_or(DEFAULT_TASK_LIMIT)
                .clamp(1, MAX_TASK_LIMIT),
            today: None,
        };
        let tasks = self.collaborators.tasks.query(&filter).await?;
        Ok(json!({ "count": tasks.len(), "tasks": tasks }).to_string())
    }

    async fn add_task(&self, params: AddTaskParams, client: Option<String>) -> Result<String, ToolError> {
        let raw = params
            .note_path
            .clone()
            .unwrap_or_else(|| self.settings.task_note.clone());
        let path = self.file_path(&raw)?;
        if params.description.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: "add_task".into(),
                message: "description must not be empty".into(),
            });
        }
        let new_task = NewTask {
            description: params.description,
            due: params.due,
            priority: params.priority,
            tags: params.tags,
        };
        if let Some(field) = new_task.line_break_field() {
            return Err(ToolError::InvalidArguments {
                tool: "add_task".into(),
                message: format!("{field} must be a single line"),
            });
        }

        let operation = Operation::new("add_task")
            .with_path(path.as_str())
            .with_action("add")
            .with_client(client);
        let tasks = Arc::clone(&self.collaborators.tasks);
        let task = self
            .guard
            .execute_with_approval(operation, move || async move {
                Ok::<_, ToolError>(tasks.add(new_task, &path).await?)
            })
            .await?;

        serde_json::to_string(&task).map_err(|e| ToolError::Internal(format!("serialization failed: {e}")))
    }

    async fn complete_task(
        &self,
        params: CompleteTaskParams,
        client: Option<String>,
    ) -> Result<String, ToolError> {
        let (raw_path, line) =
            parse_task_id(&params.task_id).ok_or_else(|| ToolError::InvalidArguments {
                tool: "complete_task".into(),
                message: format!("task_id '{}' is not of the form '<note path>:<line>'", params.task_id),
            })?;
        let path = self.file_path(raw_path)?;

        let operation = Operation::new("complete_task")
            .with_path(path.as_str())
            .with_action("complete")
            .with_client(client);
        let tasks = Arc::clone(&self.collaborators.tasks);
        let task_id = format!("{path}:{line}");
        let task = self
            .guard
            .execute_with_approval(operation, move || async move {
                Ok::<_, ToolError>(tasks.complete(&task_id).await?)
            })
            .await?;

        serde_json::to_string(&task).map_err(|e| ToolError::Internal(format!("serialization failed: {e}")))
    }
}

/// The path-like argument of a call, recorded in the audit trail even when the call fails.
fn audit_target(arguments: &Value) -> Option<String> {
    ["path", "note_path", "folder", "task_id"]
        .iter()
        .find_map(|key| arguments.get(key))
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
}
