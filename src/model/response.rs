use serde::{Deserialize, Serialize};

use super::command::Params;
use super::input::CommandPayload;
use super::parameter::Parameter;

/// A selectable choice rendered for `ambiguous` and `confirm` responses.
/// Selecting it resubmits [`InteractiveOption::to_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveOption {
    pub label: String,
    /// Structured value to submit; falls back to the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    /// Accumulated parameter values carried through the choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    /// Set on confirm/cancel choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    /// Set on the Yes choice of a `confirm` response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,
}

impl InteractiveOption {
    /// A choice that runs `command_id`.
    pub fn command(label: impl Into<String>, command_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
            command_id: Some(command_id.into()),
            params: None,
            confirmed: None,
            confirmation_token: None,
        }
    }

    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.label)
    }

    /// The structured payload that selecting this option submits, if the
    /// option targets a command.
    pub fn to_payload(&self) -> Option<CommandPayload> {
        let command_id = self.command_id.clone()?;
        Some(CommandPayload {
            command_id,
            params: self.params.clone().unwrap_or_default(),
            confirmed: self.confirmed,
            confirmation_token: self.confirmation_token.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Success,
    Error,
    Question,
    Suggestion,
    Form,
    Ambiguous,
    Confirm,
}

/// The single contract exposed to callers. `fields` exists only on `form`,
/// `options` only on `ambiguous` and `confirm`; the variants enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InteractiveResponse {
    Success {
        message: String,
    },
    Error {
        message: String,
    },
    Question {
        message: String,
    },
    Suggestion {
        message: String,
    },
    Form {
        message: String,
        /// Command the form completes; resubmit with this id.
        #[serde(
            rename = "commandId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        command_id: Option<String>,
        /// Values already collected and valid.
        #[serde(default, skip_serializing_if = "Params::is_empty")]
        values: Params,
        fields: Vec<Parameter>,
    },
    Ambiguous {
        message: String,
        options: Vec<InteractiveOption>,
    },
    Confirm {
        message: String,
        options: Vec<InteractiveOption>,
    },
}

impl InteractiveResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn question(message: impl Into<String>) -> Self {
        Self::Question {
            message: message.into(),
        }
    }

    pub fn suggestion(message: impl Into<String>) -> Self {
        Self::Suggestion {
            message: message.into(),
        }
    }

    pub fn form(message: impl Into<String>, fields: Vec<Parameter>) -> Self {
        Self::Form {
            message: message.into(),
            command_id: None,
            values: Params::new(),
            fields,
        }
    }

    /// A form bound to a command, carrying the values gathered so far.
    pub fn form_for(
        command_id: impl Into<String>,
        values: Params,
        message: impl Into<String>,
        fields: Vec<Parameter>,
    ) -> Self {
        Self::Form {
            message: message.into(),
            command_id: Some(command_id.into()),
            values,
            fields,
        }
    }

    pub fn ambiguous(message: impl Into<String>, options: Vec<InteractiveOption>) -> Self {
        Self::Ambiguous {
            message: message.into(),
            options,
        }
    }

    pub fn confirm(message: impl Into<String>, options: Vec<InteractiveOption>) -> Self {
        Self::Confirm {
            message: message.into(),
            options,
        }
    }

    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::Success { .. } => ResponseKind::Success,
            Self::Error { .. } => ResponseKind::Error,
            Self::Question { .. } => ResponseKind::Question,
            Self::Suggestion { .. } => ResponseKind::Suggestion,
            Self::Form { .. } => ResponseKind::Form,
            Self::Ambiguous { .. } => ResponseKind::Ambiguous,
            Self::Confirm { .. } => ResponseKind::Confirm,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message }
            | Self::Error { message }
            | Self::Question { message }
            | Self::Suggestion { message }
            | Self::Form { message, .. }
            | Self::Ambiguous { message, .. }
            | Self::Confirm { message, .. } => message,
        }
    }

    pub fn fields(&self) -> Option<&[Parameter]> {
        match self {
            Self::Form { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// For a bound form, the payload to resubmit once `answers` fill the
    /// missing fields.
    pub fn form_payload(&self, answers: Params) -> Option<CommandPayload> {
        match self {
            Self::Form {
                command_id: Some(command_id),
                values,
                ..
            } => {
                let mut params = values.clone();
                params.extend(answers);
                Some(CommandPayload::new(command_id.clone()).with_params(params))
            }
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[InteractiveOption]> {
        match self {
            Self::Ambiguous { options, .. } | Self::Confirm { options, .. } => Some(options),
            _ => None,
        }
    }

    /// `success` and `error` end a dialog; the caller drops its context.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}
