//! MCP `list_tasks` tool parameter definition.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tasks::StatusFilter;

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListTasksParams {
    #[schemars(description = "'open' (default), 'completed', or 'all'")]
    #[serde(default)]
    pub status: StatusFilter,

    #[schemars(description = "Only open tasks whose due date has passed")]
    pub overdue: Option<bool>,

    #[schemars(description = "Only tasks due on or before this date (YYYY-MM-DD)")]
    pub due_before: Option<NaiveDate>,

    #[schemars(description = "Only tasks due on or after this date (YYYY-MM-DD)")]
    pub due_after: Option<NaiveDate>,

    #[schemars(description = "Maximum number of tasks (1-500). Defaults to 50.")]
    pub limit: Option<usize>,
}
