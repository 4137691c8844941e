use tracing::info;

use crate::model::InteractiveResponse;

pub const DEFAULT_FALLBACK_MESSAGE: &str = "Sorry, I didn\u{2019}t understand that.";

/// What gets said when no command matches.
#[derive(Debug, Clone)]
pub struct FallbackHandler {
    message: String,
}

impl Default for FallbackHandler {
    fn default() -> Self {
        Self {
            message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl FallbackHandler {
    pub fn new(message: Option<&str>) -> Self {
        let mut handler = Self::default();
        if let Some(m) = message {
            handler.set_message(m);
        }
        handler
    }

    /// Blank messages are ignored.
    pub fn set_message(&mut self, message: &str) {
        if !message.trim().is_empty() {
            self.message = message.to_string();
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn handle(&self, input: &str) -> InteractiveResponse {
        info!(input = %input.trim(), "no command matched");
        InteractiveResponse::error(self.message.clone())
    }
}
