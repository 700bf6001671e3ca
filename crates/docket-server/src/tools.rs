//! Built-in tools over the document store.

use crate::error::ToolError;
use crate::store::DocumentStore;
use docket_proto::ToolDescriptor;
use serde::Deserialize;
use serde_json::Value;

/// A named operation over the document store.
///
/// Handlers are plain functions of (store, arguments); the registry owns
/// the name lookup and the server layer owns error encoding.
pub trait ToolHandler: Send + Sync {
    /// The unique tool name clients call this by.
    fn name(&self) -> &str;

    /// Name, description, and input schema for `tools/list`.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute against the store, returning the result text.
    fn call(&self, store: &mut DocumentStore, arguments: &Value) -> Result<String, ToolError>;
}

fn parse_input<T: serde::de::DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone()).map_err(|e| ToolError::InvalidInput {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// `read_doc_contents` — returns a document's text verbatim.
pub struct ReadDocTool;

#[derive(Deserialize)]
struct ReadDocInput {
    doc_id: String,
}

impl ToolHandler for ReadDocTool {
    fn name(&self) -> &str {
        "read_doc_contents"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "read_doc_contents".to_string(),
            description: Some(
                "Read the contents of a document and return it as a string.".to_string(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["doc_id"],
                "properties": {
                    "doc_id": {
                        "type": "string",
                        "description": "The ID of the document to read."
                    }
                }
            }),
        }
    }

    fn call(&self, store: &mut DocumentStore, arguments: &Value) -> Result<String, ToolError> {
        let input: ReadDocInput = parse_input(self.name(), arguments)?;
        Ok(store.read(&input.doc_id)?.to_string())
    }
}

/// `edit_document` — exact-match substring replacement in one document.
pub struct EditDocTool;

#[derive(Deserialize)]
struct EditDocInput {
    doc_id: String,
    old_string: String,
    new_string: String,
}

impl ToolHandler for EditDocTool {
    fn name(&self) -> &str {
        "edit_document"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "edit_document".to_string(),
            description: Some(
                "Edit a document by replacing a string in the documents content with a new string."
                    .to_string(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["doc_id", "old_string", "new_string"],
                "properties": {
                    "doc_id": {
                        "type": "string",
                        "description": "ID of the document that will be edited."
                    },
                    "old_string": {
                        "type": "string",
                        "description": "The text to replace. Must match exactly, including white space."
                    },
                    "new_string": {
                        "type": "string",
                        "description": "The new text to insert in place of old text."
                    }
                }
            }),
        }
    }

    fn call(&self, store: &mut DocumentStore, arguments: &Value) -> Result<String, ToolError> {
        let input: EditDocInput = parse_input(self.name(), arguments)?;
        store.edit(&input.doc_id, &input.old_string, &input.new_string)?;
        Ok(format!("Edited {}.", input.doc_id))
    }
}
