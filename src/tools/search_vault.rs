//! MCP `search_vault` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::search::SearchMode;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchVaultParams {
    #[schemars(description = "Natural language or keyword query")]
    pub query: String,

    #[schemars(description = "'hybrid' (default), 'semantic', or 'keyword'")]
    #[serde(default)]
    pub mode: SearchMode,

    #[schemars(description = "Maximum number of results (1-50). Defaults to 10.")]
    pub limit: Option<usize>,
}
