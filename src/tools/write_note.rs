//! MCP `write_note` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How `write_note` treats an existing note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Fail if the note already exists.
    #[default]
    Create,
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Overwrite => "overwrite",
            Self::Append => "append",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WriteNoteParams {
    #[schemars(description = "Vault-relative path of the note. '.md' is added if missing.")]
    pub path: String,

    #[schemars(description = "Markdown content to write")]
    pub content: String,

    #[schemars(
        description = "'create' (fail if the note exists, default), 'overwrite' (replace), or 'append' (add to the end)"
    )]
    #[serde(default)]
    pub mode: WriteMode,
}
