pub mod cov;
pub mod error;
pub mod react;
pub mod recursive;
pub mod sandbox;
pub mod tools;

pub use cov::{verify, VerificationQa, VerificationResult};
pub use error::{ReasoningError, Result};
pub use react::{AgentResult, AgentStep, ReactAgent};
pub use recursive::solve_recursive;
pub use sandbox::{SandboxClient, SandboxOutcome};
pub use tools::{build_advanced_tools, build_basic_tools, Tool, ToolRegistry};
