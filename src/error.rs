use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("external tool '{tool}' exceeded its execution bound")]
    Timeout { tool: String },
    #[error("expected pattern missing in tool output: {0}")]
    Parse(String),
}
