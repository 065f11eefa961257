use async_trait::async_trait;

use super::Tool;

/// General string manipulation. Input format is `<op>: <text>`.
pub struct StringUtilsTool;

#[async_trait]
impl Tool for StringUtilsTool {
    fn name(&self) -> &str {
        "string_utils"
    }

    fn description(&self) -> &str {
        "String utilities. Input: '<op>: <text>' where op is one of upper, lower, reverse, length, trim, title_case."
    }

    async fn invoke(&self, input: &str) -> String {
        let Some((op, text)) = input.split_once(':') else {
            return "error: expected '<op>: <text>', e.g. 'upper: hello'".to_string();
        };
        let op = op.trim().to_ascii_lowercase();
        let text = text.trim();
        match op.as_str() {
            "upper" => text.to_uppercase(),
            "lower" => text.to_lowercase(),
            "reverse" => text.chars().rev().collect(),
            "length" => text.chars().count().to_string(),
            "trim" => text.trim().to_string(),
            "title_case" => title_case(text),
            other => format!(
                "error: unknown operation '{other}'. Supported: upper, lower, reverse, length, trim, title_case"
            ),
        }
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uppercases_text() {
        let tool = StringUtilsTool;
        assert_eq!(tool.invoke("upper: hello world").await, "HELLO WORLD");
    }

    #[tokio::test]
    async fn title_cases_text() {
        let tool = StringUtilsTool;
        assert_eq!(tool.invoke("title_case: the rust book").await, "The Rust Book");
    }

    #[tokio::test]
    async fn reports_unknown_operation() {
        let tool = StringUtilsTool;
        assert!(tool.invoke("shout: hi").await.starts_with("error:"));
    }

    #[tokio::test]
    async fn reports_missing_separator() {
        let tool = StringUtilsTool;
        assert!(tool.invoke("hello world").await.starts_with("error:"));
    }
}
