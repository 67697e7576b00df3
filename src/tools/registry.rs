use std::collections::HashSet;

use serde_json::Value;

use super::definition::ToolDefinition;
use crate::config::HrApiConfig;
use crate::error::DefinitionError;

/// Ordered catalog of the agent's tools. Order is preserved into the
/// deployed manifest.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Duplicates are accepted here and rejected by
    /// [`validate`](Self::validate).
    pub fn add(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// All function declarations for the model.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools.iter().map(ToolDefinition::schema).collect()
    }

    /// Schema for a specific tool by name.
    pub fn schema(&self, name: &str) -> Option<Value> {
        self.get(name).map(ToolDefinition::schema)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Declarations plus HTTP bindings, ready for the hosted runtime.
    pub fn manifest(&self, hr: &HrApiConfig) -> Vec<Value> {
        self.tools.iter().map(|t| t.manifest(hr)).collect()
    }

    /// Names are unique and every tool's parameters match its body.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name) {
                return Err(DefinitionError::DuplicateTool(tool.name.to_string()));
            }
            tool.validate()?;
        }
        Ok(())
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
