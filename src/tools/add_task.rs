//! MCP `add_task` tool parameter definition.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tasks::TaskPriority;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddTaskParams {
    #[schemars(description = "What needs to be done")]
    pub description: String,

    #[schemars(description = "Note to append the task to. Defaults to the configured task note.")]
    pub note_path: Option<String>,

    #[schemars(description = "Due date (YYYY-MM-DD)")]
    pub due: Option<NaiveDate>,

    #[schemars(description = "'low', 'medium', or 'high'")]
    pub priority: Option<TaskPriority>,

    #[schemars(description = "Tags without the leading '#'")]
    #[serde(default)]
    pub tags: Vec<String>,
}
