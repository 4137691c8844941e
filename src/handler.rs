//! The public entry point: registration plus `execute_command`.
//!
//! Every input resolves to exactly one [`InteractiveResponse`]. Registration
//! is the only fallible surface; matching, validation, resolver trouble and
//! action failures all come back as responses.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::confirm::{self, ConfirmationKey, Gate};
use crate::error::RegistryError;
use crate::fallback::FallbackHandler;
use crate::intent::{HttpIntentResolver, IntentResolver, DEFAULT_TIMEOUT};
use crate::matcher::{MatchOutcome, Matcher, Selection};
use crate::model::{
    ActionOutput, Command, CommandInput, InteractiveOption, InteractiveResponse, Params,
};
use crate::registry::{catalog, CommandRegistry};
use crate::slots::{self, SlotState};

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Policy knobs for a [`CommandHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerConfig {
    #[serde(default = "default_true")]
    pub enable_smart_intent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub intent_timeout_secs: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            enable_smart_intent: true,
            intent_endpoint: None,
            intent_api_key: None,
            fallback_response: None,
            intent_timeout_secs: default_timeout_secs(),
        }
    }
}

pub struct CommandHandler {
    /// Copy-on-write: each resolution works on the snapshot it started
    /// with, and registration changes show up on the next call.
    registry: RwLock<Arc<CommandRegistry>>,
    resolver: Option<Arc<dyn IntentResolver>>,
    smart_intent: bool,
    fallback: RwLock<FallbackHandler>,
    /// Signs the Yes option of confirmation prompts issued by this handler.
    confirmations: ConfirmationKey,
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new(&HandlerConfig::default())
    }
}

impl CommandHandler {
    /// An HTTP resolver is set up when the config names a non-blank endpoint.
    pub fn new(config: &HandlerConfig) -> Self {
        let resolver = config
            .intent_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|ep| !ep.is_empty())
            .map(|ep| {
                let mut http = HttpIntentResolver::new(ep)
                    .with_timeout(Duration::from_secs(config.intent_timeout_secs));
                if let Some(key) = &config.intent_api_key {
                    http = http.with_api_key(key.clone());
                }
                Arc::new(http) as Arc<dyn IntentResolver>
            });
        Self {
            registry: RwLock::new(Arc::new(CommandRegistry::new())),
            resolver,
            smart_intent: config.enable_smart_intent,
            fallback: RwLock::new(FallbackHandler::new(config.fallback_response.as_deref())),
            confirmations: ConfirmationKey::generate(),
        }
    }

    /// Replace the resolver (e.g. an in-process one instead of HTTP).
    pub fn with_resolver(mut self, resolver: Arc<dyn IntentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn smart_intent_enabled(&self) -> bool {
        self.smart_intent
    }

    pub fn add_command(&self, command: Command) -> Result<(), RegistryError> {
        let trigger = command.command.clone();
        let mut guard = self.registry.write();
        Arc::make_mut(&mut guard).add(command)?;
        info!(command = %trigger, "command added");
        Ok(())
    }

    pub fn remove_command(&self, trigger: &str) -> Result<(), RegistryError> {
        let mut guard = self.registry.write();
        let removed = Arc::make_mut(&mut guard).remove(trigger)?;
        info!(command = %removed.command, "command removed");
        Ok(())
    }

    /// Trigger phrases in registration order.
    pub fn get_commands(&self) -> Vec<String> {
        self.registry.read().triggers()
    }

    pub fn snapshot(&self) -> Arc<CommandRegistry> {
        Arc::clone(&self.registry.read())
    }

    pub fn set_fallback_message(&self, message: &str) {
        self.fallback.write().set_message(message);
    }

    pub fn fallback_message(&self) -> String {
        self.fallback.read().message().to_string()
    }

    pub async fn execute_command(&self, input: impl Into<CommandInput>) -> InteractiveResponse {
        let input = input.into();
        let registry = self.snapshot();

        let mut matcher = Matcher::new(&registry).smart_intent(self.smart_intent);
        if let Some(resolver) = self.resolver.as_deref() {
            matcher = matcher.with_resolver(resolver);
        }

        match matcher.resolve(&input).await {
            MatchOutcome::Selected(selection) => self.complete(selection).await,
            MatchOutcome::Ambiguous {
                message,
                candidates,
            } => {
                let options = candidates
                    .iter()
                    .map(|c| {
                        let mut option = InteractiveOption::command(c.command.clone(), c.id());
                        option.value = Some(c.command.clone());
                        option
                    })
                    .collect();
                InteractiveResponse::ambiguous(message, options)
            }
            MatchOutcome::Help => catalog::help_response(&registry),
            MatchOutcome::NoMatch(reason) => {
                debug!(?reason, "falling back");
                let text = match &input {
                    CommandInput::Text(text) => text.as_str(),
                    CommandInput::Payload(payload) => payload.command_id.as_str(),
                };
                self.fallback.read().handle(text)
            }
            MatchOutcome::NotFound { command_id } => {
                InteractiveResponse::error(format!("Command \"{command_id}\" not found."))
            }
        }
    }

    /// Slot filling, then the confirmation gate, then the action.
    async fn complete(&self, selection: Selection) -> InteractiveResponse {
        let Selection {
            command,
            params,
            prompt,
            confirmed,
            confirmation_token,
            ..
        } = selection;

        match slots::fill(&command, params) {
            SlotState::Collecting { missing, values } => {
                let names: Vec<&str> = missing.iter().map(|p| p.name.as_str()).collect();
                info!(command = %command.command, missing = ?names, "collecting parameters");
                slots::form_response(&command, missing, values, prompt)
            }
            SlotState::Ready { values } => match confirm::check(
                &self.confirmations,
                &command,
                &values,
                confirmed,
                confirmation_token.as_deref(),
            ) {
                Gate::Proceed => run_action(&command, values).await,
                Gate::AwaitConfirmation(response) => {
                    info!(command = %command.command, "awaiting confirmation");
                    response
                }
                Gate::Cancelled(response) => {
                    info!(command = %command.command, "cancelled");
                    response
                }
            },
        }
    }
}

async fn run_action(command: &Command, values: Params) -> InteractiveResponse {
    info!(command = %command.command, "executing command");
    let action = command.action.clone();
    // The call sits inside the async block so a panic while building the
    // future is caught too.
    let outcome = AssertUnwindSafe(async move { action.call(values).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(ActionOutput::Empty)) => InteractiveResponse::success(""),
        Ok(Ok(ActionOutput::Message(message))) => InteractiveResponse::success(message),
        Ok(Ok(ActionOutput::Response(response))) => response,
        Ok(Err(e)) => {
            info!(command = %command.command, error = %e, "action reported an error");
            InteractiveResponse::error(e.message)
        }
        Err(_) => {
            error!(command = %command.command, "action panicked");
            InteractiveResponse::error(format!(
                "Command \"{}\" failed unexpectedly.",
                command.command
            ))
        }
    }
}
