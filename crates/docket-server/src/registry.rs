//! Tool registry for name-based dispatch.
//!
//! Built once at startup; the tool set never changes while serving.

use crate::error::ToolError;
use crate::store::DocumentStore;
use crate::tools::{EditDocTool, ReadDocTool, ToolHandler};
use docket_proto::ToolDescriptor;
use serde_json::Value;
use std::collections::HashMap;

/// Registry of available tools, supporting name-based dispatch.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the built-in document tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadDocTool));
        registry.register(Box::new(EditDocTool));
        registry
    }

    /// Register a tool in the registry.
    pub fn register(&mut self, tool: Box<dyn ToolHandler>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get all tool descriptors for `tools/list`.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool by name against the store.
    pub fn dispatch(
        &self,
        name: &str,
        store: &mut DocumentStore,
        arguments: &Value,
    ) -> Result<String, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unknown {
            name: name.to_string(),
        })?;
        tool.call(store, arguments)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
