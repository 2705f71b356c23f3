//! Task records and queries.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn marker(&self) -> &'static str {
        match self {
            Self::High => "⏫",
            Self::Medium => "🔼",
            Self::Low => "🔽",
        }
    }
}

/// A checkbox task found in (or destined for) a note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// `<note path>:<1-based line>`.
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub path: String,
    pub line: usize,
}

/// A task to be created.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub description: String,
    pub due: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub tags: Vec<String>,
}

impl NewTask {
    /// The first field that would spill onto another line of the note, if any.
    pub fn line_break_field(&self) -> Option<&'static str> {
        let breaks = |s: &str| s.contains(['\n', '\r']);
        if breaks(&self.description) {
            Some("description")
        } else if self.tags.iter().any(|t| breaks(t)) {
            Some("tags")
        } else {
            None
        }
    }
}

/// Which tasks `list_tasks` returns, by completion state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    Open,
    Completed,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: StatusFilter,
    /// Only open tasks due strictly before `today`.
    pub overdue: bool,
    pub due_before: Option<NaiveDate>,
    pub due_after: Option<NaiveDate>,
    pub limit: usize,
    pub today: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let status_ok = match self.status {
            StatusFilter::Open => task.status == TaskStatus::Open,
            StatusFilter::Completed => task.status == TaskStatus::Completed,
            StatusFilter::All => true,
        };
        if !status_ok {
            return false;
        }
        if self.overdue {
            let today = self
                .today
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            match task.due {
                Some(due) if task.status == TaskStatus::Open && due < today => {}
                _ => return false,
            }
        }
        if let Some(before) = self.due_before {
            if !task.due.is_some_and(|d| d <= before) {
                return false;
            }
        }
        if let Some(after) = self.due_after {
            if !task.due.is_some_and(|d| d >= after) {
                return false;
            }
        }
        true
    }
}
