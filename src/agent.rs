use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::DefinitionError;
use crate::prompt::system_instruction;
use crate::tools::{hr_tools, ToolRegistry};

pub const AGENT_NAME: &str = "darwinbox_hr_agent";

/// Instruction plus ordered tools. Built once per deployment.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub model: String,
    pub instruction: String,
    pub tools: ToolRegistry,
}

impl AgentDefinition {
    /// The Darwinbox HR agent for the given configuration.
    pub fn darwinbox(config: &Config, today: NaiveDate) -> Self {
        Self {
            name: AGENT_NAME.into(),
            model: config.model.clone(),
            instruction: system_instruction(today),
            tools: hr_tools(),
        }
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.tools.validate()
    }

    /// The `agent.json` document staged for the hosted runtime.
    pub fn manifest(&self, config: &Config) -> Value {
        json!({
            "name": self.name,
            "model": self.model,
            "instruction": self.instruction,
            "tools": self.tools.manifest(&config.hr),
        })
    }
}
