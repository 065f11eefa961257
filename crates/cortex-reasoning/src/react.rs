//! Native ReAct loop: Thought / Action / Action Input / Observation, parsed
//! directly out of plain-text model output rather than a JSON-schema
//! tool-calling API. `Observation:` is passed as a stop sequence so the
//! model never hallucinates the tool's output itself.

use std::sync::Arc;

use cortex_inference::{Gateway, Message, Role};
use cortex_surprise::CaptureStream;
use serde::Serialize;

use crate::tools::ToolRegistry;

const DEFAULT_MAX_STEPS: usize = 10;
const STEP_TEMPERATURE: f64 = 0.2;
const STEP_MAX_TOKENS: u32 = 512;
const OBSERVATION_STOP: &str = "Observation:";
const FINAL_ANSWER_ACTION: &str = "Final Answer";

/// One Thought/Action/Action Input/Observation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub step_number: usize,
    pub thought: String,
    pub action: Option<String>,
    pub action_input: Option<String>,
    pub observation: Option<String>,
}

/// Outcome of a full `solve` call.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    pub total_steps: usize,
    pub success: bool,
    pub error: Option<String>,
}

/// Drives the Thought/Action/Observation cycle against a tool registry
/// until a `Final Answer` is produced or the step budget is exhausted.
pub struct ReactAgent<'a> {
    gateway: &'a Gateway,
    tools: &'a ToolRegistry,
    max_steps: usize,
    capture: Option<Arc<CaptureStream>>,
}

impl<'a> ReactAgent<'a> {
    pub fn new(gateway: &'a Gateway, tools: &'a ToolRegistry) -> Self {
        Self {
            gateway,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
            capture: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// On success, the trace is summarized into one line and appended here
    /// as procedural memory.
    pub fn with_capture(mut self, capture: Arc<CaptureStream>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub async fn solve(&self, question: &str) -> AgentResult {
        self.solve_with_preamble(question, &default_preamble(self.tools))
            .await
    }

    pub async fn solve_with_preamble(&self, question: &str, preamble: &str) -> AgentResult {
        let mut steps: Vec<AgentStep> = Vec::new();

        for step_number in 1..=self.max_steps {
            let prompt = build_prompt(question, &steps);
            let messages = vec![Message {
                role: Role::User,
                content: prompt,
            }];

            let routed = match self
                .gateway
                .chat_raw(
                    preamble,
                    messages,
                    STEP_TEMPERATURE,
                    STEP_MAX_TOKENS,
                    Some(vec![OBSERVATION_STOP.to_string()]),
                )
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    return AgentResult {
                        answer: String::new(),
                        total_steps: steps.len(),
                        steps,
                        success: false,
                        error: Some(e.to_string()),
                    };
                }
            };

            let mut step = parse_step(&routed.response.content, step_number);

            if is_final_answer(&step) {
                let answer = step.action_input.clone().unwrap_or_default();
                steps.push(step);
                self.record_success(question, &answer);
                return AgentResult {
                    answer,
                    total_steps: steps.len(),
                    steps,
                    success: true,
                    error: None,
                };
            }

            match step.action.clone() {
                Some(action_name) => {
                    let observation = match self.tools.get(&action_name) {
                        Some(tool) => tool.invoke(&step.action_input.clone().unwrap_or_default()).await,
                        None => self.tools.unknown_tool_message(&action_name),
                    };
                    step.observation = Some(observation);
                }
                None => {
                    step.observation = Some(
                        "No action was specified. Respond with 'Action: <tool>' and \
                         'Action Input: <input>', or 'Final Answer: <answer>'."
                            .to_string(),
                    );
                }
            }
            steps.push(step);
        }

        AgentResult {
            answer: String::new(),
            total_steps: steps.len(),
            steps,
            success: false,
            error: Some(format!(
                "step budget of {} exhausted without a final answer",
                self.max_steps
            )),
        }
    }

    fn record_success(&self, question: &str, answer: &str) {
        if let Some(capture) = &self.capture {
            let summary = format!("Solved via tool use: {question} -> {answer}");
            capture.append(&summary, serde_json::json!({ "source": "react_agent" }));
        }
    }
}

pub fn default_preamble(tools: &ToolRegistry) -> String {
    format!(
        "You are a ReAct agent. Solve the problem by alternating Thought, Action, and \
         Observation steps.\n\n\
         Available tools:\n{}\n\n\
         Respond in exactly this format:\n\
         Thought: <your reasoning>\n\
         Action: <tool name>\n\
         Action Input: <input to the tool>\n\n\
         Once you have enough information, respond instead with:\n\
         Thought: <your reasoning>\n\
         Final Answer: <the answer>\n\n\
         Never write an Observation yourself — it is provided after your action runs.",
        tools.prompt_listing()
    )
}

fn build_prompt(question: &str, steps: &[AgentStep]) -> String {
    let mut out = format!("Question: {question}\n");
    for step in steps {
        out.push_str(&format!("\nThought: {}", step.thought));
        if let Some(action) = &step.action {
            out.push_str(&format!("\nAction: {action}"));
        }
        if let Some(input) = &step.action_input {
            out.push_str(&format!("\nAction Input: {input}"));
        }
        if let Some(observation) = &step.observation {
            out.push_str(&format!("\nObservation: {observation}"));
        }
    }
    out.push_str("\nThought:");
    out
}

fn is_final_answer(step: &AgentStep) -> bool {
    step.action.as_deref() == Some(FINAL_ANSWER_ACTION)
}

fn parse_step(response: &str, step_number: usize) -> AgentStep {
    let thought = extract_thought(response);

    if let Some(final_answer) = extract_field(response, "Final Answer:", &[]) {
        return AgentStep {
            step_number,
            thought,
            action: Some(FINAL_ANSWER_ACTION.to_string()),
            action_input: Some(final_answer),
            observation: None,
        };
    }

    let action = extract_field(
        response,
        "Action:",
        &["Action Input:", "Observation:", "Final Answer:"],
    );
    let action_input = extract_field(response, "Action Input:", &["Observation:", "Final Answer:"]);

    AgentStep {
        step_number,
        thought,
        action,
        action_input,
        observation: None,
    }
}

fn extract_thought(text: &str) -> String {
    let action_pos = text.find("Action:");
    let final_pos = text.find("Final Answer:");
    let cut = match (action_pos, final_pos) {
        (Some(a), Some(f)) => a.min(f),
        (Some(a), None) => a,
        (None, Some(f)) => f,
        (None, None) => text.len(),
    };
    text[..cut].trim_start_matches("Thought:").trim().to_string()
}

fn extract_field(text: &str, marker: &str, next_markers: &[&str]) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = next_markers
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thought_action_and_input() {
        let response = "I should look this up.\nAction: memory_search\nAction Input: rust async";
        let step = parse_step(response, 1);
        assert_eq!(step.thought, "I should look this up.");
        assert_eq!(step.action.as_deref(), Some("memory_search"));
        assert_eq!(step.action_input.as_deref(), Some("rust async"));
        assert!(!is_final_answer(&step));
    }

    #[test]
    fn parses_final_answer() {
        let response = "I now know the answer.\nFinal Answer: 405";
        let step = parse_step(response, 2);
        assert!(is_final_answer(&step));
        assert_eq!(step.action_input.as_deref(), Some("405"));
    }

    #[test]
    fn missing_action_leaves_fields_empty() {
        let response = "Just thinking out loud with no action yet.";
        let step = parse_step(response, 1);
        assert!(step.action.is_none());
        assert!(step.action_input.is_none());
    }

    #[test]
    fn build_prompt_includes_prior_steps() {
        let steps = vec![AgentStep {
            step_number: 1,
            thought: "t1".to_string(),
            action: Some("memory_search".to_string()),
            action_input: Some("q".to_string()),
            observation: Some("obs1".to_string()),
        }];
        let prompt = build_prompt("what happened?", &steps);
        assert!(prompt.contains("Observation: obs1"));
        assert!(prompt.trim_end().ends_with("Thought:"));
    }
}
