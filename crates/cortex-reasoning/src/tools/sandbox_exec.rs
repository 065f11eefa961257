use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::Tool;
use crate::sandbox::{SandboxClient, SandboxOutcome};

/// Runs Python in the sandboxed execution collaborator. Input is the code
/// to run; no variables are injected (unlike the recursive agent's
/// `CodeExecution` tool, which seeds `CORPUS`).
pub struct SandboxExecTool {
    client: Arc<SandboxClient>,
    timeout: Duration,
}

impl SandboxExecTool {
    pub fn new(client: Arc<SandboxClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Tool for SandboxExecTool {
    fn name(&self) -> &str {
        "sandbox_python"
    }

    fn description(&self) -> &str {
        "Execute Python code in a sandboxed interpreter and return its output. Input: the code to run."
    }

    async fn invoke(&self, input: &str) -> String {
        if input.trim().is_empty() {
            return "error: no code provided".to_string();
        }
        match self
            .client
            .execute(input, HashMap::new(), self.timeout)
            .await
        {
            Ok(outcome) => format_outcome(&outcome),
            Err(e) => format!("error: sandbox call failed: {e}"),
        }
    }
}

fn format_outcome(outcome: &SandboxOutcome) -> String {
    if outcome.success {
        outcome
            .result
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "(no output)".to_string())
    } else {
        format!(
            "error: {}",
            outcome
                .error
                .clone()
                .unwrap_or_else(|| "sandbox execution failed".to_string())
        )
    }
}
