use async_trait::async_trait;
use serde_json::Value;

use super::Tool;

/// Parses JSON and optionally extracts a dotted field path. Input:
/// `<json> | <dotted.path>`, where the path segment is optional.
pub struct JsonTool;

#[async_trait]
impl Tool for JsonTool {
    fn name(&self) -> &str {
        "json"
    }

    fn description(&self) -> &str {
        "Parse JSON and optionally extract a field. Input: '<json> | <dotted.path>' (the path is optional)."
    }

    async fn invoke(&self, input: &str) -> String {
        let (json_part, path) = match input.split_once('|') {
            Some((j, p)) => (j.trim(), Some(p.trim()).filter(|p| !p.is_empty())),
            None => (input.trim(), None),
        };

        let value: Value = match serde_json::from_str(json_part) {
            Ok(v) => v,
            Err(e) => return format!("error: invalid JSON: {e}"),
        };

        match path {
            None => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            Some(path) => match extract_path(&value, path) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => format!("error: path '{path}' not found"),
            },
        }
    }
}

fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(segment)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_nested_field() {
        let tool = JsonTool;
        let out = tool.invoke(r#"{"a":{"b":5}} | a.b"#).await;
        assert_eq!(out, "5");
    }

    #[tokio::test]
    async fn extracts_array_index() {
        let tool = JsonTool;
        let out = tool.invoke(r#"{"items":["x","y"]} | items.1"#).await;
        assert_eq!(out, "y");
    }

    #[tokio::test]
    async fn pretty_prints_with_no_path() {
        let tool = JsonTool;
        let out = tool.invoke(r#"{"a":1}"#).await;
        assert!(out.contains("\"a\""));
    }

    #[tokio::test]
    async fn reports_invalid_json() {
        let tool = JsonTool;
        assert!(tool.invoke("not json").await.starts_with("error:"));
    }
}
