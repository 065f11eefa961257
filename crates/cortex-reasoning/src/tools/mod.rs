mod arithmetic;
mod datetime;
mod json_tool;
mod library_search;
mod memory_search;
mod sandbox_exec;
mod string_utils;
mod web_search;

pub use arithmetic::ArithmeticTool;
pub use datetime::DatetimeTool;
pub use json_tool::JsonTool;
pub use library_search::LibrarySearchTool;
pub use memory_search::MemorySearchTool;
pub use sandbox_exec::SandboxExecTool;
pub use string_utils::StringUtilsTool;
pub use web_search::WebSearchTool;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cortex_memory::MemoryStore;

use crate::error::{ReasoningError, Result};
use crate::recursive::RecursiveReadTool;
use crate::sandbox::SandboxClient;

/// A callable the ReAct loop can invoke by name. Tools validate their own
/// input and report failure as a plain string rather than an error type —
/// the agent loop treats every observation, success or failure, the same way.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(&self, input: &str) -> String;
}

/// A name-keyed set of tools. Built once per agent run via
/// [`ToolRegistryBuilder`], which rejects duplicate names so two tools never
/// silently shadow each other.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Human-readable `- name: description` listing, one line per tool in
    /// registration order, for embedding in a ReAct system preamble.
    pub fn prompt_listing(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Observation text for an `Action:` naming a tool that isn't registered.
    pub fn unknown_tool_message(&self, requested: &str) -> String {
        format!(
            "error: no tool named '{requested}'. Available tools: {}",
            self.order.join(", ")
        )
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ReasoningError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            order: self.order,
        }
    }
}

/// The tool set behind `/agent`: general-purpose utilities plus episodic
/// memory search, with no code execution or outbound network access.
pub fn build_basic_tools(memory: Arc<MemoryStore>) -> Result<ToolRegistry> {
    ToolRegistry::builder()
        .register(Arc::new(ArithmeticTool))?
        .register(Arc::new(StringUtilsTool))?
        .register(Arc::new(JsonTool))?
        .register(Arc::new(DatetimeTool))?
        .register(Arc::new(MemorySearchTool::new(memory)))
        .map(ToolRegistryBuilder::build)
}

/// The tool set behind `/agent/advanced`: the basic set plus sandboxed code
/// execution, web search, the document library, and recursive reading of
/// corpora too large for a single context window.
pub fn build_advanced_tools(
    memory: Arc<MemoryStore>,
    gateway: Arc<cortex_inference::Gateway>,
    sandbox: Arc<SandboxClient>,
    sandbox_timeout: Duration,
    web_search_providers: Vec<String>,
    agent_max_steps: usize,
) -> Result<ToolRegistry> {
    ToolRegistry::builder()
        .register(Arc::new(ArithmeticTool))?
        .register(Arc::new(StringUtilsTool))?
        .register(Arc::new(JsonTool))?
        .register(Arc::new(DatetimeTool))?
        .register(Arc::new(MemorySearchTool::new(memory.clone())))?
        .register(Arc::new(LibrarySearchTool::new(memory)))?
        .register(Arc::new(SandboxExecTool::new(
            sandbox.clone(),
            sandbox_timeout,
        )))?
        .register(Arc::new(WebSearchTool::new(web_search_providers)))?
        .register(Arc::new(RecursiveReadTool::new(
            gateway,
            sandbox,
            sandbox_timeout,
            agent_max_steps,
        )))
        .map(ToolRegistryBuilder::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        async fn invoke(&self, input: &str) -> String {
            input.to_string()
        }
    }

    #[test]
    fn builder_rejects_duplicate_names() {
        let result = ToolRegistry::builder()
            .register(Arc::new(Echo))
            .unwrap()
            .register(Arc::new(Echo));
        assert!(matches!(result, Err(ReasoningError::DuplicateTool(name)) if name == "echo"));
    }

    #[test]
    fn unknown_tool_message_lists_registered_names() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Echo))
            .unwrap()
            .build();
        let message = registry.unknown_tool_message("bogus");
        assert!(message.contains("bogus"));
        assert!(message.contains("echo"));
    }
}
