//! Chain-of-Verification: draft an answer, plan verification questions,
//! answer each independently of the draft, then revise in light of what the
//! independent answers turned up.

use cortex_inference::{Gateway, Message, ProviderError, Role};
use serde::Serialize;

const DRAFT_SYSTEM: &str = "You are a helpful assistant. Answer the user's question directly and concisely.";
const PLAN_SYSTEM: &str =
    "You write verification questions that check the factual claims in a draft answer.";
const VERIFY_SYSTEM: &str = "Answer the question directly and factually, in one or two sentences.";
const REVISE_SYSTEM: &str =
    "You revise a draft answer in light of independent verification results.";

const DRAFT_MAX_TOKENS: u32 = 512;
const PLAN_MAX_TOKENS: u32 = 256;
const VERIFY_MAX_TOKENS: u32 = 200;
const REVISE_MAX_TOKENS: u32 = 512;
const MAX_QUESTIONS: usize = 3;

/// One verification question paired with its independently-obtained answer.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationQa {
    pub question: String,
    pub answer: String,
}

/// The full trace of a verification run, returned to the caller so the
/// `/verify` endpoint can show its work rather than just the final answer.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub draft: String,
    pub questions: Vec<String>,
    pub verification_qa: Vec<VerificationQa>,
    pub final_response: String,
    pub revised: bool,
}

/// Runs the four-step chain: draft, plan questions, answer them
/// independently, revise. Each step is a separate `chat_raw` call so that
/// earlier steps' context never leaks into the independent answers.
pub async fn verify(gateway: &Gateway, prompt: &str) -> Result<VerificationResult, ProviderError> {
    let draft = draft_response(gateway, prompt).await?;
    let questions = plan_questions(gateway, prompt, &draft).await?;

    let mut verification_qa = Vec::with_capacity(questions.len());
    for question in &questions {
        let answer = answer_independently(gateway, question).await?;
        verification_qa.push(VerificationQa {
            question: question.clone(),
            answer,
        });
    }

    let final_response = revise(gateway, prompt, &draft, &verification_qa).await?;
    let revised = normalize(&final_response) != normalize(&draft);

    Ok(VerificationResult {
        draft,
        questions,
        verification_qa,
        final_response,
        revised,
    })
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn draft_response(gateway: &Gateway, prompt: &str) -> Result<String, ProviderError> {
    let messages = vec![Message {
        role: Role::User,
        content: prompt.to_string(),
    }];
    let routed = gateway
        .chat_raw(DRAFT_SYSTEM, messages, 0.7, DRAFT_MAX_TOKENS, None)
        .await?;
    Ok(routed.response.content.trim().to_string())
}

async fn plan_questions(
    gateway: &Gateway,
    prompt: &str,
    draft: &str,
) -> Result<Vec<String>, ProviderError> {
    let ask = format!(
        "Given this question and answer, generate 2-3 specific verification questions \
         that would check whether the answer is factually correct.\n\n\
         Question: {prompt}\nAnswer: {draft}\n\n\
         Respond with one question per line, numbered.\nVerification questions:"
    );
    let messages = vec![Message {
        role: Role::User,
        content: ask,
    }];
    let routed = gateway
        .chat_raw(PLAN_SYSTEM, messages, 0.3, PLAN_MAX_TOKENS, None)
        .await?;
    Ok(parse_questions(&routed.response.content))
}

fn parse_questions(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let looks_like_item = line
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || c == '-')
            .unwrap_or(false);
        if !looks_like_item {
            continue;
        }
        let cleaned = line
            .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-' || c == ' ')
            .trim();
        if !cleaned.is_empty() {
            out.push(cleaned.to_string());
        }
        if out.len() == MAX_QUESTIONS {
            break;
        }
    }
    out
}

async fn answer_independently(gateway: &Gateway, question: &str) -> Result<String, ProviderError> {
    let messages = vec![Message {
        role: Role::User,
        content: question.to_string(),
    }];
    let routed = gateway
        .chat_raw(VERIFY_SYSTEM, messages, 0.3, VERIFY_MAX_TOKENS, None)
        .await?;
    Ok(routed.response.content.trim().to_string())
}

async fn revise(
    gateway: &Gateway,
    prompt: &str,
    draft: &str,
    qa: &[VerificationQa],
) -> Result<String, ProviderError> {
    let verification_text = qa
        .iter()
        .map(|pair| format!("Q: {}\nA: {}", pair.question, pair.answer))
        .collect::<Vec<_>>()
        .join("\n");
    let ask = format!(
        "Review this answer in light of independent verification. If the verification reveals \
         any errors or inconsistencies, provide a corrected answer; if the answer already holds \
         up, return it unchanged.\n\n\
         Original question: {prompt}\nOriginal answer: {draft}\n\n\
         Verification results:\n{verification_text}\n\n\
         Final answer:"
    );
    let messages = vec![Message {
        role: Role::User,
        content: ask,
    }];
    let routed = gateway
        .chat_raw(REVISE_SYSTEM, messages, 0.5, REVISE_MAX_TOKENS, None)
        .await?;
    Ok(routed.response.content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_questions_strips_numbering() {
        let text = "1. Is the capital of France Paris?\n2) What year did it move?\n- A bullet one too.";
        let parsed = parse_questions(text);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], "Is the capital of France Paris?");
        assert_eq!(parsed[2], "A bullet one too.");
    }

    #[test]
    fn parse_questions_caps_at_max() {
        let text = "1. one\n2. two\n3. three\n4. four";
        assert_eq!(parse_questions(text).len(), MAX_QUESTIONS);
    }

    #[test]
    fn parse_questions_ignores_non_item_lines() {
        let text = "Here are some questions:\n1. real one\nthanks!";
        let parsed = parse_questions(text);
        assert_eq!(parsed, vec!["real one".to_string()]);
    }

    #[test]
    fn normalize_collapses_whitespace_differences() {
        assert_eq!(normalize("hello   world\n"), normalize("hello world"));
    }
}
