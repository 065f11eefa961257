use async_trait::async_trait;
use chrono::Utc;

use super::Tool;

/// Reports the current UTC date and time. Input is an optional `strftime`
/// format string; empty input yields RFC 3339.
pub struct DatetimeTool;

#[async_trait]
impl Tool for DatetimeTool {
    fn name(&self) -> &str {
        "datetime"
    }

    fn description(&self) -> &str {
        "Report the current UTC date and time. Input: an optional strftime format string (default RFC 3339)."
    }

    async fn invoke(&self, input: &str) -> String {
        let now = Utc::now();
        let format = input.trim();
        if format.is_empty() {
            now.to_rfc3339()
        } else {
            now.format(format).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_format_is_rfc3339() {
        let tool = DatetimeTool;
        let out = tool.invoke("").await;
        assert!(chrono::DateTime::parse_from_rfc3339(&out).is_ok());
    }

    #[tokio::test]
    async fn honors_custom_format() {
        let tool = DatetimeTool;
        let out = tool.invoke("%Y").await;
        assert_eq!(out.len(), 4);
    }
}
