//! MCP `list_notes` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListNotesParams {
    #[schemars(description = "Vault-relative folder to list. Omit or leave empty for the vault root.")]
    pub folder: Option<String>,

    #[schemars(description = "Include notes in subfolders. Defaults to true.")]
    pub recursive: Option<bool>,

    #[schemars(description = "Include size and modification time for each note. Defaults to false.")]
    pub include_metadata: Option<bool>,
}
