//! The recursive agent (RLM): a ReAct agent restricted to a single
//! `CodeExecution` tool that runs in the sandbox with the corpus injected
//! as a `CORPUS` variable, for answering questions about text too large to
//! fit in a single context window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cortex_inference::Gateway;
use serde_json::Value;

use crate::react::{AgentResult, ReactAgent};
use crate::sandbox::SandboxClient;
use crate::tools::{Tool, ToolRegistry};

const RLM_SYSTEM_PROMPT: &str = "You are a recursive reading agent. The text you need is too \
large to read directly, so it is not in your context — it lives in a Python sandbox variable \
named CORPUS. Use the CodeExecution tool to inspect it: slice it, search it, or chunk it and \
call ask_llm(prompt) on each chunk to summarize recursively. Never try to print the entire \
corpus at once. Work step by step:\n\
Thought: what do I need to find out\n\
Action: CodeExecution\n\
Action Input: Python code operating on CORPUS, printing only what you need to see\n\
Observation: (the sandbox's output is provided here)\n\
...repeat as needed...\n\
Thought: I have enough to answer\n\
Final Answer: the answer to the original question";

const DEFAULT_RLM_MAX_STEPS: usize = 10;
const CORPUS_KEY: &str = "CORPUS";

struct CorpusExecutionTool {
    client: Arc<SandboxClient>,
    corpus: String,
    timeout: Duration,
}

#[async_trait]
impl Tool for CorpusExecutionTool {
    fn name(&self) -> &str {
        "CodeExecution"
    }

    fn description(&self) -> &str {
        "Execute Python code. Variable 'CORPUS' holds the text. Function 'ask_llm(prompt)' is available."
    }

    async fn invoke(&self, input: &str) -> String {
        if input.trim().is_empty() {
            return "error: no code provided".to_string();
        }
        let mut context = HashMap::new();
        context.insert(CORPUS_KEY.to_string(), Value::String(self.corpus.clone()));

        match self.client.execute(input, context, self.timeout).await {
            Ok(outcome) => {
                let mut text = String::new();
                if let Some(result) = outcome.result.as_ref().filter(|r| !r.is_empty()) {
                    text.push_str(&format!("Output:\n{result}"));
                }
                if let Some(error) = outcome.error.as_ref().filter(|e| !e.is_empty()) {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&format!("Errors:\n{error}"));
                }
                if text.is_empty() {
                    "Code executed with no output.".to_string()
                } else {
                    text
                }
            }
            Err(e) => format!("Sandbox Error: {e}"),
        }
    }
}

/// Solves `question` over `corpus` by running a ReAct loop restricted to
/// the `CodeExecution` tool.
pub async fn solve_recursive(
    gateway: &Gateway,
    sandbox: Arc<SandboxClient>,
    question: &str,
    corpus: String,
    max_steps: usize,
) -> AgentResult {
    let tool: Arc<dyn Tool> = Arc::new(CorpusExecutionTool {
        client: sandbox,
        corpus,
        timeout: Duration::from_secs(45),
    });

    let registry = match ToolRegistry::builder().register(tool) {
        Ok(builder) => builder.build(),
        Err(e) => {
            return AgentResult {
                answer: String::new(),
                total_steps: 0,
                steps: Vec::new(),
                success: false,
                error: Some(e.to_string()),
            };
        }
    };

    let agent = ReactAgent::new(gateway, &registry).with_max_steps(max_steps);
    agent.solve_with_preamble(question, RLM_SYSTEM_PROMPT).await
}

/// Standard tool that spawns a nested recursive agent over a caller-supplied
/// corpus. Input: JSON `{"question": "...", "corpus": "..."}`. Kept acyclic
/// at the type level — this holds only a `Gateway` and a `SandboxClient`,
/// never the orchestrator's own state.
pub struct RecursiveReadTool {
    gateway: Arc<Gateway>,
    sandbox: Arc<SandboxClient>,
    #[allow(dead_code)]
    sandbox_timeout: Duration,
    max_steps: usize,
}

impl RecursiveReadTool {
    pub fn new(
        gateway: Arc<Gateway>,
        sandbox: Arc<SandboxClient>,
        sandbox_timeout: Duration,
        max_steps: usize,
    ) -> Self {
        Self {
            gateway,
            sandbox,
            sandbox_timeout,
            max_steps,
        }
    }
}

#[async_trait]
impl Tool for RecursiveReadTool {
    fn name(&self) -> &str {
        "recursive_read"
    }

    fn description(&self) -> &str {
        "Answer a question about a corpus too large to read directly, by spawning a nested \
         recursive agent. Input: JSON {\"question\": ..., \"corpus\": ...}."
    }

    async fn invoke(&self, input: &str) -> String {
        let parsed: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(e) => {
                return format!(
                    "error: expected JSON {{\"question\": ..., \"corpus\": ...}}: {e}"
                )
            }
        };
        let Some(question) = parsed.get("question").and_then(Value::as_str) else {
            return "error: missing 'question' field".to_string();
        };
        let Some(corpus) = parsed.get("corpus").and_then(Value::as_str) else {
            return "error: missing 'corpus' field".to_string();
        };

        let result = solve_recursive(
            &self.gateway,
            self.sandbox.clone(),
            question,
            corpus.to_string(),
            self.max_steps,
        )
        .await;

        if result.success {
            result.answer
        } else {
            format!(
                "error: recursive agent failed: {}",
                result.error.unwrap_or_default()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rlm_preamble_mentions_code_execution() {
        assert!(RLM_SYSTEM_PROMPT.contains("CodeExecution"));
        assert!(RLM_SYSTEM_PROMPT.contains("CORPUS"));
    }
}
