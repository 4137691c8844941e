//! Client side of the external "smart intent" service.
//!
//! The matcher talks to an [`IntentResolver`] port; [`HttpIntentResolver`] is
//! the production implementation that POSTs the request as JSON. Any failure
//! (transport, non-2xx status, undecodable body) is reported as a
//! [`ResolverError`], which the matcher treats exactly like "no match".

use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResolverError;
use crate::model::Params;
use crate::registry::catalog::CommandDescriptor;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// ── Wire types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentRequest {
    pub input: String,
    pub commands: Vec<CommandDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum IntentMatchType {
    Match,
    NoMatch,
    /// The resolver could not pick among `candidates`.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntentResponse {
    #[serde(rename = "type")]
    pub kind: IntentMatchType,
    /// Id (or trigger phrase) of the matched command.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(default)]
    pub incomplete: bool,
    /// Prompt for the user, used when a form is still needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl IntentResponse {
    pub fn no_match() -> Self {
        Self {
            kind: IntentMatchType::NoMatch,
            matched: None,
            params: None,
            incomplete: false,
            message: None,
            candidates: Vec::new(),
        }
    }

    pub fn matched(command: impl Into<String>, params: Params) -> Self {
        Self {
            kind: IntentMatchType::Match,
            matched: Some(command.into()),
            params: Some(params),
            ..Self::no_match()
        }
    }

    pub fn ambiguous(candidates: Vec<String>) -> Self {
        Self {
            kind: IntentMatchType::Ambiguous,
            candidates,
            ..Self::no_match()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }
}

// ── Port ─────────────────────────────────────────────────────────

/// Maps free text to one registered command. Which command wins among close
/// candidates is entirely the resolver's decision.
#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve(&self, request: &IntentRequest) -> Result<IntentResponse, ResolverError>;
}

/// Plain functions and closures are resolvers too, which keeps tests and
/// embedded rule-based resolvers free of boilerplate.
#[async_trait]
impl<F> IntentResolver for F
where
    F: Fn(&IntentRequest) -> Result<IntentResponse, ResolverError> + Send + Sync,
{
    async fn resolve(&self, request: &IntentRequest) -> Result<IntentResponse, ResolverError> {
        self(request)
    }
}

// ── HTTP implementation ─────────────────────────────────────────

pub struct HttpIntentResolver {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpIntentResolver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, request: &IntentRequest) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .json(request);
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

#[async_trait]
impl IntentResolver for HttpIntentResolver {
    async fn resolve(&self, request: &IntentRequest) -> Result<IntentResponse, ResolverError> {
        if self.endpoint.trim().is_empty() {
            return Err(ResolverError::NotConfigured);
        }

        let response = self.build_request(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

/// Decode a resolver body. Anything that is not a JSON object with a known
/// `type` is malformed.
pub fn parse_response(body: &str) -> Result<IntentResponse, ResolverError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ResolverError::Malformed(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| ResolverError::Malformed(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn request() -> IntentRequest {
        IntentRequest {
            input: "i need to upload stuffs".to_string(),
            commands: Vec::new(),
        }
    }

    #[test]
    fn test_parse_match_response() {
        let body = r#"{
            "type": "match",
            "match": "upload_file",
            "params": {},
            "incomplete": true,
            "message": "Please pick a file to upload."
        }"#;
        let r = parse_response(body).unwrap();
        assert_eq!(r.kind, IntentMatchType::Match);
        assert_eq!(r.matched.as_deref(), Some("upload_file"));
        assert!(r.incomplete);
        assert_eq!(r.message.as_deref(), Some("Please pick a file to upload."));
    }

    #[test]
    fn test_parse_no_match_and_null_params() {
        let r = parse_response(r#"{ "type": "no-match", "params": null }"#).unwrap();
        assert_eq!(r.kind, IntentMatchType::NoMatch);
        assert!(r.params.is_none());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_response("<html>"), Err(ResolverError::Malformed(_))));
        assert!(matches!(
            parse_response(r#"{ "type": "maybe" }"#),
            Err(ResolverError::Malformed(_))
        ));
        assert!(matches!(parse_response("[]"), Err(ResolverError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_closure_resolver() {
        let resolver = |req: &IntentRequest| -> Result<IntentResponse, ResolverError> {
            Ok(IntentResponse::matched(req.input.clone(), Params::new()))
        };
        let r = resolver.resolve(&request()).await.unwrap();
        assert_eq!(r.matched.as_deref(), Some("i need to upload stuffs"));
    }

    #[tokio::test]
    async fn test_http_match() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/intent"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "input": "i need to upload stuffs"
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw(
                serde_json::json!({
                    "type": "match",
                    "match": "upload_file",
                    "params": { "attachment": "csv file" },
                    "incomplete": false
                })
                .to_string(),
                "application/json",
            ))
            .mount(&server)
            .await;

        let resolver = HttpIntentResolver::new(format!("{}/intent", server.uri()));
        let r = resolver.resolve(&request()).await.unwrap();
        assert_eq!(r.kind, IntentMatchType::Match);
        assert_eq!(r.params.unwrap()["attachment"], "csv file");
    }

    #[tokio::test]
    async fn test_http_sends_bearer_key() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::header("Authorization", "Bearer secret"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw(
                r#"{ "type": "no-match" }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let resolver = HttpIntentResolver::new(server.uri()).with_api_key("secret");
        let r = resolver.resolve(&request()).await.unwrap();
        assert_eq!(r.kind, IntentMatchType::NoMatch);
    }

    #[tokio::test]
    async fn test_http_server_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = HttpIntentResolver::new(server.uri());
        let err = resolver.resolve(&request()).await.unwrap_err();
        assert!(matches!(err, ResolverError::Status(503)));
    }

    #[tokio::test]
    async fn test_http_malformed_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw("not json", "text/plain"))
            .mount(&server)
            .await;

        let resolver = HttpIntentResolver::new(server.uri());
        let err = resolver.resolve(&request()).await.unwrap_err();
        assert!(matches!(err, ResolverError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_http_unreachable() {
        // Nothing listens on port 9 (discard) on test machines.
        let resolver = HttpIntentResolver::new("http://127.0.0.1:9/intent")
            .with_timeout(Duration::from_secs(2));
        let err = resolver.resolve(&request()).await.unwrap_err();
        assert!(matches!(err, ResolverError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_not_configured() {
        let resolver = HttpIntentResolver::new("  ");
        let err = resolver.resolve(&request()).await.unwrap_err();
        assert!(matches!(err, ResolverError::NotConfigured));
    }
}
