//! Caller-side conversation state.
//!
//! The engine keeps nothing between calls. A [`DialogContext`] holds the
//! command id and the values collected so far while a form is open;
//! [`Session`] layers the activation phrase and pending choices on top, the
//! way a chat or voice front end drives the handler.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::confirm::CANCELLED_MESSAGE;
use crate::handler::CommandHandler;
use crate::model::{
    CommandPayload, FileDelivery, InteractiveOption, InteractiveResponse, Parameter, ParameterKind,
    Params,
};
use crate::registry::normalize;

pub const DEFAULT_INTRO: &str = "How can I help you?";
const CANCEL_WORDS: [&str; 3] = ["cancel", "stop", "never mind"];

/// The (command id, accumulated values) pair resubmitted until the engine
/// answers `success` or `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogContext {
    pub command_id: String,
    pub values: Params,
    /// Fields the last form asked for.
    pub fields: Vec<Parameter>,
}

impl DialogContext {
    /// Only a form bound to a command opens a dialog.
    pub fn from_response(response: &InteractiveResponse) -> Option<Self> {
        match response {
            InteractiveResponse::Form {
                command_id: Some(command_id),
                values,
                fields,
                ..
            } => Some(Self {
                command_id: command_id.clone(),
                values: values.clone(),
                fields: fields.clone(),
            }),
            _ => None,
        }
    }

    pub fn next_field(&self) -> Option<&Parameter> {
        self.fields.first()
    }

    /// Record a typed answer for `name`. Unknown names are kept verbatim.
    pub fn answer(&mut self, name: &str, raw: &str) {
        let value = match self.fields.iter().find(|p| p.name == name) {
            Some(param) => coerce_answer(param, raw),
            None => Value::String(raw.trim().to_string()),
        };
        self.values.insert(name.to_string(), value);
    }

    pub fn merge(&mut self, answers: Params) {
        self.values.extend(answers);
    }

    pub fn to_payload(&self) -> CommandPayload {
        CommandPayload::new(self.command_id.clone()).with_params(self.values.clone())
    }
}

/// Turn what a user typed into the JSON shape the validator expects for
/// `param`. Blank input becomes `null` so it counts as missing.
pub fn coerce_answer(param: &Parameter, raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Null;
    }
    match &param.kind {
        ParameterKind::Number(_) => {
            if let Ok(i) = text.parse::<i64>() {
                Value::from(i)
            } else if let Some(n) = text.parse::<f64>().ok().filter(|n| n.is_finite()) {
                Value::from(n)
            } else {
                Value::String(text.to_string())
            }
        }
        ParameterKind::Select(spec) => spec
            .options
            .iter()
            .find(|o| o.value == text || o.label.eq_ignore_ascii_case(text))
            .map_or_else(|| Value::String(text.to_string()), |o| Value::String(o.value.clone())),
        ParameterKind::File(spec) if spec.delivery == FileDelivery::File && !text.starts_with('{') => {
            let name = Path::new(text)
                .file_name()
                .map_or_else(|| text.to_string(), |n| n.to_string_lossy().into_owned());
            serde_json::json!({ "name": name, "path": text })
        }
        ParameterKind::File(_) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        }
        ParameterKind::String(_) | ParameterKind::Date(_) => Value::String(text.to_string()),
    }
}

// ── Session ─────────────────────────────────────────────────────

/// Outcome of one user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Not yet activated and the input was not the activation phrase.
    Ignored,
    /// The activation phrase was heard; carries the intro message.
    Activated(String),
    Response(InteractiveResponse),
}

#[derive(Debug, Clone)]
enum Pending {
    Form(DialogContext),
    Choice(Vec<InteractiveOption>),
}

pub struct Session {
    handler: Arc<CommandHandler>,
    activation: Option<String>,
    intro: String,
    active: bool,
    pending: Option<Pending>,
}

impl Session {
    pub fn new(handler: Arc<CommandHandler>) -> Self {
        Self {
            handler,
            activation: None,
            intro: DEFAULT_INTRO.to_string(),
            active: true,
            pending: None,
        }
    }

    /// Require `phrase` before anything else is processed. Blank phrases are
    /// ignored.
    pub fn with_activation(mut self, phrase: &str, intro: Option<&str>) -> Self {
        if !phrase.trim().is_empty() {
            self.activation = Some(normalize(phrase));
            self.active = false;
        }
        if let Some(intro) = intro.filter(|i| !i.trim().is_empty()) {
            self.intro = intro.to_string();
        }
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The open form, if any.
    pub fn dialog(&self) -> Option<&DialogContext> {
        match &self.pending {
            Some(Pending::Form(ctx)) => Some(ctx),
            _ => None,
        }
    }

    pub fn pending_options(&self) -> Option<&[InteractiveOption]> {
        match &self.pending {
            Some(Pending::Choice(options)) => Some(options),
            _ => None,
        }
    }

    pub async fn submit_text(&mut self, text: &str) -> Turn {
        let normalized = normalize(text);
        if !self.active {
            if self.activation.as_deref() == Some(normalized.as_str()) {
                self.active = true;
                return Turn::Activated(self.intro.clone());
            }
            return Turn::Ignored;
        }
        if self.pending.is_some() && CANCEL_WORDS.contains(&normalized.as_str()) {
            return Turn::Response(self.cancel());
        }

        match self.pending.take() {
            Some(Pending::Form(mut ctx)) => {
                if let Some(name) = ctx.next_field().map(|p| p.name.clone()) {
                    ctx.answer(&name, text);
                }
                let response = self.handler.execute_command(ctx.to_payload()).await;
                Turn::Response(self.track(response))
            }
            Some(Pending::Choice(options)) => match pick(&options, &normalized) {
                Some(option) => Turn::Response(self.choose(&option).await),
                None => Turn::Response(self.run(text).await),
            },
            None => Turn::Response(self.run(text).await),
        }
    }

    /// Answer an open form in one go (e.g. a rendered form submitted whole).
    pub async fn submit_answers(&mut self, answers: Params) -> InteractiveResponse {
        match self.pending.take() {
            Some(Pending::Form(mut ctx)) => {
                ctx.merge(answers);
                let response = self.handler.execute_command(ctx.to_payload()).await;
                self.track(response)
            }
            other => {
                self.pending = other;
                InteractiveResponse::error("There is no open form to answer.")
            }
        }
    }

    pub async fn choose(&mut self, option: &InteractiveOption) -> InteractiveResponse {
        self.pending = None;
        match option.to_payload() {
            Some(payload) => {
                let response = self.handler.execute_command(payload).await;
                self.track(response)
            }
            None => self.run(option.value()).await,
        }
    }

    /// Drop any open dialog.
    pub fn cancel(&mut self) -> InteractiveResponse {
        if let Some(pending) = self.pending.take() {
            debug!(?pending, "dialog cancelled");
        }
        InteractiveResponse::success(CANCELLED_MESSAGE)
    }

    async fn run(&mut self, text: &str) -> InteractiveResponse {
        let response = self.handler.execute_command(text).await;
        self.track(response)
    }

    fn track(&mut self, response: InteractiveResponse) -> InteractiveResponse {
        self.pending = match &response {
            InteractiveResponse::Form { .. } => DialogContext::from_response(&response).map(Pending::Form),
            InteractiveResponse::Ambiguous { options, .. } | InteractiveResponse::Confirm { options, .. } => {
                Some(Pending::Choice(options.clone()))
            }
            _ => None,
        };
        response
    }
}

/// Match typed text against options: 1-based index, label or value.
fn pick(options: &[InteractiveOption], normalized: &str) -> Option<InteractiveOption> {
    if let Ok(n) = normalized.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).cloned();
    }
    options
        .iter()
        .find(|o| normalize(&o.label) == normalized || normalize(o.value()) == normalized)
        .cloned()
}
