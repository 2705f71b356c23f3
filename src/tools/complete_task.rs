//! MCP `complete_task` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompleteTaskParams {
    #[schemars(description = "Task id as returned by list_tasks, e.g. 'Tasks.md:12'")]
    pub task_id: String,
}
