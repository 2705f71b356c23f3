//! MCP `read_note` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReadNoteParams {
    #[schemars(description = "Vault-relative path of the note, e.g. 'Projects/plan.md'. '.md' is added if missing.")]
    pub path: String,
}
