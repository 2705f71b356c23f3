//! Task tracking on top of the note store.
//!
//! Tasks are markdown checkbox lines inside notes. [`MarkdownTaskStore`] scans
//! the vault through a [`NoteStore`], so every read and write it performs goes
//! through the same validated-path discipline as the note tools.

pub mod parse;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::TaskError;
use crate::security::{PathValidator, ValidatedPath};
use crate::store::NoteStore;

pub use types::{NewTask, StatusFilter, Task, TaskFilter, TaskPriority, TaskStatus};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn query(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError>;

    /// Append `task` to the note at `note_path`, creating the note if needed.
    async fn add(&self, task: NewTask, note_path: &ValidatedPath) -> Result<Task, TaskError>;

    /// Mark the open task `<note path>:<line>` completed. The note path is held
    /// to the same extension allow-list as the note tools.
    async fn complete(&self, task_id: &str) -> Result<Task, TaskError>;
}

pub struct MarkdownTaskStore {
    notes: Arc<dyn NoteStore>,
    validator: PathValidator,
}

impl MarkdownTaskStore {
    pub fn new(notes: Arc<dyn NoteStore>, validator: PathValidator) -> Self {
        Self { notes, validator }
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

#[async_trait]
impl TaskStore for MarkdownTaskStore {
    async fn query(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let mut found = Vec::new();
        for file in self.notes.list_markdown_files().await? {
            let Ok(path) = self.validator.validate(&file) else {
                continue;
            };
            let content = self.notes.read(&path).await?;
            found.extend(
                content
                    .lines()
                    .enumerate()
                    .filter_map(|(i, line)| parse::parse_task_line(line, path.as_str(), i + 1))
                    .filter(|task| filter.matches(task)),
            );
        }

        // Soonest due first, undated last; stable within a note.
        found.sort_by(|a, b| match (a.due, b.due) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        if filter.limit > 0 {
            found.truncate(filter.limit);
        }
        Ok(found)
    }

    async fn add(&self, task: NewTask, note_path: &ValidatedPath) -> Result<Task, TaskError> {
        if task.description.trim().is_empty() {
            return Err(TaskError::EmptyDescription);
        }
        if let Some(field) = task.line_break_field() {
            return Err(TaskError::LineBreak(field));
        }

        let existing = if self.notes.exists(note_path).await? {
            self.notes.read(note_path).await?
        } else {
            String::new()
        };

        let line = parse::format_task(&task);
        let mut content = existing;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        let line_no = content.lines().count() + 1;
        content.push_str(&line);
        content.push('\n');

        self.notes.write(note_path, &content).await?;
        tracing::info!(path = %note_path, line = line_no, "task added");

        parse::parse_task_line(&line, note_path.as_str(), line_no)
            .ok_or(TaskError::EmptyDescription)
    }

    async fn complete(&self, task_id: &str) -> Result<Task, TaskError> {
        let (raw_path, line_no) =
            parse::parse_task_id(task_id).ok_or_else(|| TaskError::InvalidId(task_id.into()))?;
        let path = self.validator.validate_with_extension(raw_path, true)?;

        let content = self.notes.read(&path).await?;
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let line = lines
            .get(line_no - 1)
            .ok_or_else(|| TaskError::NotFound(task_id.into()))?;

        let task = parse::parse_task_line(line, path.as_str(), line_no)
            .ok_or_else(|| TaskError::NotFound(task_id.into()))?;
        if task.status == TaskStatus::Completed {
            return Err(TaskError::AlreadyCompleted(task_id.into()));
        }

        let updated = parse::complete_line(line, Self::today())
            .ok_or_else(|| TaskError::NotFound(task_id.into()))?;
        lines[line_no - 1] = updated.clone();

        let mut new_content = lines.join("\n");
        if content.ends_with('\n') {
            new_content.push('\n');
        }
        self.notes.write(&path, &new_content).await?;
        tracing::info!(id = %task_id, "task completed");

        parse::parse_task_line(&updated, path.as_str(), line_no)
            .ok_or_else(|| TaskError::NotFound(task_id.into()))
    }
}
