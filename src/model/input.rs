use serde::{Deserialize, Serialize};

use super::command::Params;

/// Structured input produced by deterministic UI actions (buttons, form
/// submissions, programmatic runs). Resolved by command id, never by intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    pub command_id: String,
    #[serde(default)]
    pub params: Params,
    /// `Some(true)` is the explicit affirmative a critical command waits for;
    /// `Some(false)` cancels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    /// Issued with the Yes option of a `confirm` response. A critical command
    /// runs only when it matches the command id and params being submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,
}

impl CommandPayload {
    pub fn new(command_id: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            params: Params::new(),
            confirmed: None,
            confirmation_token: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = Some(confirmed);
        self
    }
}

/// Free text or a structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandInput {
    Text(String),
    Payload(CommandPayload),
}

impl From<&str> for CommandInput {
    fn from(s: &str) -> Self {
        CommandInput::Text(s.to_string())
    }
}

impl From<String> for CommandInput {
    fn from(s: String) -> Self {
        CommandInput::Text(s)
    }
}

impl From<CommandPayload> for CommandInput {
    fn from(p: CommandPayload) -> Self {
        CommandInput::Payload(p)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn untagged_input_accepts_text_or_payload() {
        let text: CommandInput = serde_json::from_str("\"book appointment\"").unwrap();
        assert_eq!(text, CommandInput::Text("book appointment".to_string()));

        let payload: CommandInput = serde_json::from_value(serde_json::json!({
            "commandId": "book_appointment",
            "params": { "service": "toyota limited" }
        }))
        .unwrap();
        match payload {
            CommandInput::Payload(p) => {
                assert_eq!(p.command_id, "book_appointment");
                assert_eq!(p.params["service"], "toyota limited");
                assert_eq!(p.confirmed, None);
                assert_eq!(p.confirmation_token, None);
            }
            CommandInput::Text(_) => panic!("expected payload"),
        }
    }
}
