use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use super::parameter::Parameter;
use super::response::InteractiveResponse;

/// Parameter values keyed by parameter `name`.
pub type Params = serde_json::Map<String, Value>;

// ── Action results ──────────────────────────────────────────────

/// Business failure signalled by a command's own action (e.g. "must be 18 or
/// older"). Rendered as an `error` response carrying this message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What an action may hand back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    /// Nothing to say; becomes a bare `success` with an empty message.
    Empty,
    /// Plain text, wrapped as `success`.
    Message(String),
    /// A full response passed through unchanged.
    Response(InteractiveResponse),
}

impl From<()> for ActionOutput {
    fn from((): ()) -> Self {
        ActionOutput::Empty
    }
}

impl From<String> for ActionOutput {
    fn from(s: String) -> Self {
        ActionOutput::Message(s)
    }
}

impl From<&str> for ActionOutput {
    fn from(s: &str) -> Self {
        ActionOutput::Message(s.to_string())
    }
}

impl From<InteractiveResponse> for ActionOutput {
    fn from(r: InteractiveResponse) -> Self {
        ActionOutput::Response(r)
    }
}

pub type ActionResult = Result<ActionOutput, ActionError>;

/// Anything an action closure may return.
pub trait IntoActionResult {
    fn into_action_result(self) -> ActionResult;
}

impl IntoActionResult for ActionOutput {
    fn into_action_result(self) -> ActionResult {
        Ok(self)
    }
}

impl IntoActionResult for () {
    fn into_action_result(self) -> ActionResult {
        Ok(ActionOutput::Empty)
    }
}

impl IntoActionResult for String {
    fn into_action_result(self) -> ActionResult {
        Ok(ActionOutput::Message(self))
    }
}

impl IntoActionResult for &'static str {
    fn into_action_result(self) -> ActionResult {
        Ok(ActionOutput::Message(self.to_string()))
    }
}

impl IntoActionResult for InteractiveResponse {
    fn into_action_result(self) -> ActionResult {
        Ok(ActionOutput::Response(self))
    }
}

impl<T, E> IntoActionResult for Result<T, E>
where
    T: Into<ActionOutput>,
    E: Into<ActionError>,
{
    fn into_action_result(self) -> ActionResult {
        self.map(Into::into).map_err(Into::into)
    }
}

// ── CommandAction ───────────────────────────────────────────────

type ActionFn = dyn Fn(Params) -> BoxFuture<'static, ActionResult> + Send + Sync;

/// The async function a command runs once its parameters are complete.
#[derive(Clone)]
pub struct CommandAction(Arc<ActionFn>);

impl CommandAction {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoActionResult,
    {
        Self(Arc::new(move |params| {
            let fut = f(params);
            Box::pin(async move { fut.await.into_action_result() })
        }))
    }

    /// Wrap a synchronous closure.
    pub fn sync<F, R>(f: F) -> Self
    where
        F: Fn(Params) -> R + Send + Sync + 'static,
        R: IntoActionResult + Send + 'static,
    {
        Self::new(move |params| std::future::ready(f(params)))
    }

    pub fn call(&self, params: Params) -> BoxFuture<'static, ActionResult> {
        (self.0)(params)
    }
}

impl fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommandAction(..)")
    }
}

// ── Command ─────────────────────────────────────────────────────

/// A named, user-invocable action with optional typed parameters.
///
/// Commands are immutable once registered; replace one by removing and
/// re-adding it.
#[derive(Debug, Clone)]
pub struct Command {
    /// Stable identifier. Defaults to the trigger phrase.
    pub id: Option<String>,
    /// Trigger phrase, unique across a registry.
    pub command: String,
    pub description: Option<String>,
    /// Alternate deterministic triggers.
    pub keywords: Vec<String>,
    /// Requires explicit confirmation before the action runs.
    pub critical: bool,
    /// When false, parameter values extracted by the intent resolver are
    /// discarded and every required parameter is asked for explicitly.
    pub allow_ai_param_extraction: bool,
    pub parameters: Vec<Parameter>,
    pub action: CommandAction,
}

impl Command {
    pub fn new(trigger: impl Into<String>, action: CommandAction) -> Self {
        Self {
            id: None,
            command: trigger.into(),
            description: None,
            keywords: Vec::new(),
            critical: false,
            allow_ai_param_extraction: true,
            parameters: Vec::new(),
            action,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn without_ai_param_extraction(mut self) -> Self {
        self.allow_ai_param_extraction = false;
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// The stable identifier, falling back to the trigger phrase.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.command)
    }
}
