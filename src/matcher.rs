//! Input → command selection.
//!
//! Structured payloads are looked up by id alone, with no ambiguity. Free text goes
//! through the deterministic fast path (trigger phrase, then keyword) and only
//! then, if allowed, through the external intent resolver. The resolver decides
//! *which* command; whether its extracted parameters are valid is left to the
//! slot-filling stage.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::intent::{IntentMatchType, IntentRequest, IntentResolver, IntentResponse};
use crate::model::{Command, CommandInput, Params};
use crate::registry::{catalog, normalize, CommandRegistry};

pub const HELP_TRIGGER: &str = "help";
pub const AMBIGUOUS_MESSAGE: &str = "Which one did you mean?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// Trigger phrase or keyword.
    Exact,
    /// Structured `{ commandId, params }`.
    Payload,
    Resolver,
}

/// One command picked for execution, with whatever parameter values came
/// along with it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub command: Arc<Command>,
    pub params: Params,
    /// Resolver-supplied prompt for a follow-up form. Only kept when the
    /// resolver itself flagged the match as incomplete.
    pub prompt: Option<String>,
    pub confirmed: Option<bool>,
    pub confirmation_token: Option<String>,
    pub source: MatchSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    Blank,
    SmartIntentDisabled,
    NoResolver,
    ResolverNoMatch,
    ResolverFailed,
    /// The resolver named a command the registry does not have.
    UnknownCommand,
}

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Selected(Selection),
    Ambiguous {
        message: String,
        candidates: Vec<Arc<Command>>,
    },
    Help,
    NoMatch(NoMatchReason),
    NotFound {
        command_id: String,
    },
}

pub struct Matcher<'a> {
    registry: &'a CommandRegistry,
    resolver: Option<&'a dyn IntentResolver>,
    smart_intent: bool,
}

impl<'a> Matcher<'a> {
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self {
            registry,
            resolver: None,
            smart_intent: false,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn IntentResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Free text that misses the fast path only reaches the resolver when
    /// this is on.
    pub fn smart_intent(mut self, enabled: bool) -> Self {
        self.smart_intent = enabled;
        self
    }

    pub async fn resolve(&self, input: &CommandInput) -> MatchOutcome {
        match input {
            CommandInput::Payload(payload) => match self.registry.get_by_id(&payload.command_id) {
                Some(command) => MatchOutcome::Selected(Selection {
                    command,
                    params: payload.params.clone(),
                    prompt: None,
                    confirmed: payload.confirmed,
                    confirmation_token: payload.confirmation_token.clone(),
                    source: MatchSource::Payload,
                }),
                None => {
                    debug!(command_id = %payload.command_id, "payload names an unknown command");
                    MatchOutcome::NotFound {
                        command_id: payload.command_id.clone(),
                    }
                }
            },
            CommandInput::Text(text) => self.resolve_text(text).await,
        }
    }

    async fn resolve_text(&self, text: &str) -> MatchOutcome {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return MatchOutcome::NoMatch(NoMatchReason::Blank);
        }

        if let Some(command) = self.registry.find_exact(&normalized) {
            debug!(command = %command.command, "exact match");
            return MatchOutcome::Selected(Selection {
                command,
                params: Params::new(),
                prompt: None,
                confirmed: None,
                confirmation_token: None,
                source: MatchSource::Exact,
            });
        }

        if normalized == HELP_TRIGGER {
            return MatchOutcome::Help;
        }

        if !self.smart_intent {
            return MatchOutcome::NoMatch(NoMatchReason::SmartIntentDisabled);
        }
        let Some(resolver) = self.resolver else {
            return MatchOutcome::NoMatch(NoMatchReason::NoResolver);
        };
        if self.registry.is_empty() {
            return MatchOutcome::NoMatch(NoMatchReason::ResolverNoMatch);
        }

        let request = IntentRequest {
            input: text.trim().to_string(),
            commands: catalog::descriptors(self.registry),
        };
        match resolver.resolve(&request).await {
            Ok(response) => self.interpret(response),
            Err(e) => {
                warn!(input = %request.input, error = %e, "intent resolver failed");
                MatchOutcome::NoMatch(NoMatchReason::ResolverFailed)
            }
        }
    }

    fn interpret(&self, response: IntentResponse) -> MatchOutcome {
        match response.kind {
            IntentMatchType::NoMatch => MatchOutcome::NoMatch(NoMatchReason::ResolverNoMatch),
            IntentMatchType::Match => {
                let Some(name) = response.matched.as_deref() else {
                    return MatchOutcome::NoMatch(NoMatchReason::ResolverNoMatch);
                };
                let Some(command) = self.registry.lookup(name) else {
                    warn!(matched = %name, "intent resolver returned an unregistered command");
                    return MatchOutcome::NoMatch(NoMatchReason::UnknownCommand);
                };
                let params = if command.allow_ai_param_extraction {
                    response.params.unwrap_or_default()
                } else {
                    debug!(command = %command.command, "discarding resolver parameters");
                    Params::new()
                };
                debug!(command = %command.command, incomplete = response.incomplete, "resolver match");
                let prompt = if response.incomplete {
                    response.message
                } else {
                    None
                };
                MatchOutcome::Selected(Selection {
                    command,
                    params,
                    prompt,
                    confirmed: None,
                    confirmation_token: None,
                    source: MatchSource::Resolver,
                })
            }
            IntentMatchType::Ambiguous => {
                let mut candidates: Vec<Arc<Command>> = Vec::new();
                for name in &response.candidates {
                    if let Some(c) = self.registry.lookup(name) {
                        if !candidates.iter().any(|k| Arc::ptr_eq(k, &c)) {
                            candidates.push(c);
                        }
                    }
                }
                match candidates.len() {
                    0 => MatchOutcome::NoMatch(NoMatchReason::ResolverNoMatch),
                    1 => {
                        let command = candidates.remove(0);
                        // The message was a disambiguation question, not a form prompt.
                        MatchOutcome::Selected(Selection {
                            command,
                            params: Params::new(),
                            prompt: None,
                            confirmed: None,
                            confirmation_token: None,
                            source: MatchSource::Resolver,
                        })
                    }
                    _ => MatchOutcome::Ambiguous {
                        message: response
                            .message
                            .unwrap_or_else(|| AMBIGUOUS_MESSAGE.to_string()),
                        candidates,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ResolverError;
    use crate::model::{CommandAction, CommandPayload, Parameter};

    /// Returns a canned answer and counts calls.
    struct StaticResolver {
        answer: Result<IntentResponse, u16>,
        calls: AtomicUsize,
    }

    impl StaticResolver {
        fn new(answer: IntentResponse) -> Self {
            Self {
                answer: Ok(answer),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                answer: Err(status),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IntentResolver for StaticResolver {
        async fn resolve(&self, _: &IntentRequest) -> Result<IntentResponse, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map_err(ResolverError::Status)
        }
    }

    fn registry() -> CommandRegistry {
        let mut reg = CommandRegistry::new();
        reg.add(
            Command::new("book appointment", CommandAction::sync(|_| ()))
                .with_id("book_appointment")
                .keyword("schedule service")
                .parameter(Parameter::string("service").required()),
        )
        .unwrap();
        reg.add(
            Command::new("transfer money", CommandAction::sync(|_| ()))
                .with_id("transfer")
                .without_ai_param_extraction()
                .parameter(Parameter::number("amount").required()),
        )
        .unwrap();
        reg
    }

    fn selected(outcome: MatchOutcome) -> Selection {
        match outcome {
            MatchOutcome::Selected(s) => s,
            other => panic!("expected selection, got {other:?}"),
        }
    }

    fn params(json: serde_json::Value) -> Params {
        json.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn exact_match_skips_resolver() {
        let reg = registry();
        let resolver = StaticResolver::new(IntentResponse::no_match());
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);

        let s = selected(m.resolve(&"  Book Appointment ".into()).await);
        assert_eq!(s.command.id(), "book_appointment");
        assert_eq!(s.source, MatchSource::Exact);

        let s = selected(m.resolve(&"schedule service".into()).await);
        assert_eq!(s.command.id(), "book_appointment");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn payload_lookup_by_id() {
        let reg = registry();
        let m = Matcher::new(&reg);
        let input = CommandPayload::new("book_appointment").param("service", "oil change");
        let s = selected(m.resolve(&input.into()).await);
        assert_eq!(s.source, MatchSource::Payload);
        assert_eq!(s.params["service"], "oil change");

        match m.resolve(&CommandPayload::new("nope").into()).await {
            MatchOutcome::NotFound { command_id } => assert_eq!(command_id, "nope"),
            other => panic!("expected not found, got {other:?}"),
        }

        // Ids only: a trigger phrase in a payload is not a lookup key.
        match m.resolve(&CommandPayload::new("Book Appointment").into()).await {
            MatchOutcome::NotFound { command_id } => assert_eq!(command_id, "Book Appointment"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_and_help() {
        let reg = registry();
        let m = Matcher::new(&reg);
        assert!(matches!(
            m.resolve(&"   ".into()).await,
            MatchOutcome::NoMatch(NoMatchReason::Blank)
        ));
        assert!(matches!(m.resolve(&"HELP".into()).await, MatchOutcome::Help));
    }

    #[tokio::test]
    async fn smart_intent_disabled_never_calls_resolver() {
        let reg = registry();
        let resolver =
            StaticResolver::new(IntentResponse::matched("book_appointment", Params::new()));
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(false);
        assert!(matches!(
            m.resolve(&"i want my car serviced".into()).await,
            MatchOutcome::NoMatch(NoMatchReason::SmartIntentDisabled)
        ));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolver_match_keeps_params_and_prompt() {
        let reg = registry();
        let resolver = StaticResolver::new(
            IntentResponse::matched("book_appointment", params(serde_json::json!({ "service": "toyota limited" })))
                .with_message("When would you like to come in?")
                .incomplete(),
        );
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        let s = selected(m.resolve(&"get my toyota limited serviced".into()).await);
        assert_eq!(s.source, MatchSource::Resolver);
        assert_eq!(s.params["service"], "toyota limited");
        assert_eq!(s.prompt.as_deref(), Some("When would you like to come in?"));
    }

    #[tokio::test]
    async fn complete_resolver_match_drops_its_message() {
        let reg = registry();
        let resolver = StaticResolver::new(
            IntentResponse::matched("book_appointment", params(serde_json::json!({ "service": "tires" })))
                .with_message("Booking your tires now."),
        );
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        let s = selected(m.resolve(&"book tires".into()).await);
        assert_eq!(s.prompt, None);
    }

    #[tokio::test]
    async fn extraction_disabled_discards_params() {
        let reg = registry();
        let resolver = StaticResolver::new(IntentResponse::matched(
            "transfer",
            params(serde_json::json!({ "amount": 5000 })),
        ));
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        let s = selected(m.resolve(&"send 5000 to bob".into()).await);
        assert_eq!(s.command.id(), "transfer");
        assert!(s.params.is_empty());
    }

    #[tokio::test]
    async fn resolver_failures_degrade_to_no_match() {
        let reg = registry();
        let resolver = StaticResolver::failing(500);
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        assert!(matches!(
            m.resolve(&"do something".into()).await,
            MatchOutcome::NoMatch(NoMatchReason::ResolverFailed)
        ));

        let resolver = StaticResolver::new(IntentResponse::matched("ghost", Params::new()));
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        assert!(matches!(
            m.resolve(&"do something".into()).await,
            MatchOutcome::NoMatch(NoMatchReason::UnknownCommand)
        ));
    }

    #[tokio::test]
    async fn ambiguous_is_passed_through() {
        let reg = registry();
        let resolver = StaticResolver::new(IntentResponse::ambiguous(vec![
            "book_appointment".to_string(),
            "transfer".to_string(),
            "ghost".to_string(),
        ]));
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        match m.resolve(&"money for service".into()).await {
            MatchOutcome::Ambiguous { message, candidates } => {
                assert_eq!(message, AMBIGUOUS_MESSAGE);
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }

        // A single surviving candidate is just a match.
        let resolver = StaticResolver::new(IntentResponse::ambiguous(vec![
            "transfer".to_string(),
            "ghost".to_string(),
        ]));
        let m = Matcher::new(&reg).with_resolver(&resolver).smart_intent(true);
        let s = selected(m.resolve(&"money".into()).await);
        assert_eq!(s.command.id(), "transfer");
    }
}
