use thiserror::Error;

/// Broad classification used to pick HTTP status codes and operator messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Model,
    Network,
    Validation,
    Resource,
    Permission,
    Configuration,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Model => "model",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error)]
pub enum CortexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Collaborator unreachable ({collaborator}): {message}")]
    CollaboratorUnreachable {
        collaborator: String,
        message: String,
    },

    #[error("Model provider error: {0}")]
    Model(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CortexError {
    /// Short machine-readable code, mirrored in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CortexError::Config(_) => "CONFIG_ERROR",
            CortexError::Validation { .. } => "VALIDATION_ERROR",
            CortexError::RateLimited => "RATE_LIMITED",
            CortexError::CollaboratorUnreachable { .. } => "COLLABORATOR_UNREACHABLE",
            CortexError::Model(_) => "MODEL_ERROR",
            CortexError::Database(_) => "DATABASE_ERROR",
            CortexError::Serialization(_) => "SERIALIZATION_ERROR",
            CortexError::Io(_) => "IO_ERROR",
            CortexError::PermissionDenied(_) => "PERMISSION_DENIED",
            CortexError::NotFound(_) => "NOT_FOUND",
            CortexError::Timeout { .. } => "TIMEOUT",
            CortexError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CortexError::Config(_) => ErrorCategory::Configuration,
            CortexError::Validation { .. } => ErrorCategory::Validation,
            CortexError::RateLimited => ErrorCategory::Resource,
            CortexError::CollaboratorUnreachable { .. } => ErrorCategory::Resource,
            CortexError::Model(_) => ErrorCategory::Model,
            CortexError::Database(_) => ErrorCategory::Resource,
            CortexError::Serialization(_) => ErrorCategory::Unknown,
            CortexError::Io(_) => ErrorCategory::Resource,
            CortexError::PermissionDenied(_) => ErrorCategory::Permission,
            CortexError::NotFound(_) => ErrorCategory::Validation,
            CortexError::Timeout { .. } => ErrorCategory::Network,
            CortexError::Internal(_) => ErrorCategory::Unknown,
        }
    }

    /// Ordered recovery steps aimed at an operator, not the end user.
    pub fn recovery_steps(&self) -> Vec<&'static str> {
        match self {
            CortexError::Config(_) => vec![
                "check cortex.toml for missing or malformed fields",
                "check CORTEX_* environment overrides",
            ],
            CortexError::CollaboratorUnreachable { .. } => vec![
                "confirm the collaborator process is running",
                "check the configured base URL and port",
                "retry once the collaborator reports healthy on /health",
            ],
            CortexError::Model(_) => vec![
                "check provider API key and base URL",
                "check whether a fallback backend is configured",
            ],
            CortexError::Database(_) => {
                vec!["check disk space and file permissions on the data directory"]
            }
            CortexError::RateLimited => vec!["retry after the rate limit window elapses"],
            CortexError::Timeout { .. } => vec![
                "check collaborator latency",
                "raise the configured timeout if this is expected under load",
            ],
            _ => vec![],
        }
    }

    /// Multi-line ASCII-boxed form, meant for logs.
    pub fn to_log_format(&self) -> String {
        let header = format!("{} [{}]", self.category().as_str(), self.code());
        let body = self.to_string();
        let steps = self.recovery_steps();
        let width = [header.len(), body.len()]
            .into_iter()
            .chain(steps.iter().map(|s| s.len() + 2))
            .max()
            .unwrap_or(20)
            + 2;
        let mut out = String::new();
        out.push_str(&format!("┌{}┐\n", "─".repeat(width)));
        out.push_str(&format!("│ {:<width$}│\n", header, width = width - 1));
        out.push_str(&format!("├{}┤\n", "─".repeat(width)));
        out.push_str(&format!("│ {:<width$}│\n", body, width = width - 1));
        if !steps.is_empty() {
            out.push_str(&format!("├{}┤\n", "─".repeat(width)));
            for step in steps {
                let line = format!("- {}", step);
                out.push_str(&format!("│ {:<width$}│\n", line, width = width - 1));
            }
        }
        out.push_str(&format!("└{}┘", "─".repeat(width)));
        out
    }

    /// Single-line form, meant for API error bodies.
    pub fn to_one_line(&self) -> String {
        format!("[{}/{}] {}", self.category().as_str(), self.code(), self)
    }
}

pub type Result<T> = std::result::Result<T, CortexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_expectation() {
        let e = CortexError::CollaboratorUnreachable {
            collaborator: "inference".into(),
            message: "connection refused".into(),
        };
        assert_eq!(e.category(), ErrorCategory::Resource);
        assert_eq!(e.code(), "COLLABORATOR_UNREACHABLE");
        assert!(!e.recovery_steps().is_empty());
    }

    #[test]
    fn one_line_contains_category_and_code() {
        let line = CortexError::RateLimited.to_one_line();
        assert!(line.contains("resource"));
        assert!(line.contains("RATE_LIMITED"));
    }

    #[test]
    fn log_format_is_boxed() {
        let e = CortexError::Config("missing field `gateway.port`".into());
        let boxed = e.to_log_format();
        assert!(boxed.starts_with('┌'));
        assert!(boxed.trim_end().ends_with('┘'));
        assert!(boxed.contains("missing field"));
    }
}
