use serde::Serialize;
use thiserror::Error;

/// Errors raised by the registration API. These are the only errors a caller
/// of the command handler ever sees as `Err`; everything reachable from user
/// input resolves to an [`InteractiveResponse`](crate::model::InteractiveResponse).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum RegistryError {
    #[error("Command \"{trigger}\" already exists.")]
    DuplicateCommand { trigger: String },
    #[error("Command \"{trigger}\" does not exist.")]
    UnknownCommand { trigger: String },
    #[error("Invalid command \"{trigger}\": {reason}")]
    InvalidCommand { trigger: String, reason: String },
}

/// Failure talking to the external intent resolver. Never surfaced past the
/// handler: every variant degrades to "no match".
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no intent endpoint configured")]
    NotConfigured,
    #[error("intent request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("intent service returned HTTP {0}")]
    Status(u16),
    #[error("malformed intent response: {0}")]
    Malformed(String),
}

/// Errors while loading or saving an assistant configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<RegistryError> for ConfigError {
    fn from(e: RegistryError) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}
