// Tue Jan 20 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("call site in {caller} at instruction {instr_index} has no resolvable callee")]
    MalformedCallSite { caller: String, instr_index: usize },
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
