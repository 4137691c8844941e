use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::handler::{CommandHandler, HandlerConfig};
use crate::model::{ActionError, Command, CommandAction, Parameter, Params};

pub const ENV_INTENT_ENDPOINT: &str = "FOISIT_INTENT_ENDPOINT";
pub const ENV_INTENT_API_KEY: &str = "FOISIT_INTENT_API_KEY";
pub const ENV_SMART_INTENT: &str = "FOISIT_SMART_INTENT";

/// Replies starting with this signal a business error.
const ERROR_PREFIX: &str = "error:";

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    HandlerConfig::default().intent_timeout_secs
}

// ── Command definitions ──────────────────────────────────────────

/// Declarative form of a [`Command`]: all the data, plus a `reply` template
/// standing in for the action. `{name}` placeholders are filled from the
/// completed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default = "default_true")]
    pub allow_ai_param_extraction: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl CommandDefinition {
    pub fn into_command(self) -> Command {
        let reply = self.reply;
        let action = CommandAction::sync(move |params: Params| -> Result<String, ActionError> {
            let Some(template) = &reply else {
                return Ok(String::new());
            };
            let text = render_reply(template, &params);
            match text.strip_prefix(ERROR_PREFIX) {
                Some(message) => Err(ActionError::new(message.trim())),
                None => Ok(text),
            }
        });

        let mut command = Command::new(self.command, action);
        command.id = self.id;
        command.description = self.description;
        command.keywords = self.keywords;
        command.critical = self.critical;
        command.allow_ai_param_extraction = self.allow_ai_param_extraction;
        command.parameters = self.parameters;
        command
    }
}

/// Substitute `{name}` with the parameter's value. Strings are inserted
/// bare, other JSON values in their JSON form. Unknown names stay as written.
pub fn render_reply(template: &str, params: &Params) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after)) = rest.split_once('{') {
        out.push_str(before);
        let Some((name, tail)) = after.split_once('}') else {
            out.push('{');
            out.push_str(after);
            return out;
        };
        match params.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

// ── Assistant config ────────────────────────────────────────────

/// Everything needed to stand up an assistant, as stored on disk.
///
/// The `intentApiKey` field is read but never written back; keep it in the
/// environment instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Phrase that must be heard before commands are processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<String>,
    #[serde(default = "default_true")]
    pub enable_smart_intent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub intent_api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub intent_timeout_secs: u64,
    #[serde(default)]
    pub commands: Vec<CommandDefinition>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            activation_command: None,
            intro_message: None,
            fallback_response: None,
            enable_smart_intent: true,
            intent_endpoint: None,
            intent_api_key: None,
            intent_timeout_secs: default_timeout_secs(),
            commands: Vec::new(),
        }
    }
}

impl AssistantConfig {
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            enable_smart_intent: self.enable_smart_intent,
            intent_endpoint: self.intent_endpoint.clone(),
            intent_api_key: self.intent_api_key.clone(),
            fallback_response: self.fallback_response.clone(),
            intent_timeout_secs: self.intent_timeout_secs,
        }
    }

    /// Apply `FOISIT_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENV_INTENT_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.intent_endpoint = Some(endpoint.trim().to_string());
        }
        if let Some(key) = lookup(ENV_INTENT_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.intent_api_key = Some(key.trim().to_string());
        }
        if let Some(flag) = lookup(ENV_SMART_INTENT) {
            self.enable_smart_intent = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
    }

    /// A handler with every configured command registered.
    pub fn build_handler(&self) -> Result<CommandHandler, ConfigError> {
        let handler = CommandHandler::new(&self.handler_config());
        for definition in &self.commands {
            handler.add_command(definition.clone().into_command())?;
        }
        Ok(handler)
    }

    /// A small working config, written by `foisit-cli init`.
    pub fn sample() -> Self {
        serde_json::from_value(serde_json::json!({
            "activationCommand": "hey foisit",
            "introMessage": "Hi! Say \"help\" to see what I can do.",
            "enableSmartIntent": false,
            "commands": [
                {
                    "id": "book_appointment",
                    "command": "book appointment",
                    "description": "Book a service appointment",
                    "keywords": ["schedule service"],
                    "parameters": [
                        { "name": "service", "type": "string", "required": true, "description": "the service you need" },
                        { "name": "date", "type": "date", "required": true, "description": "a date (YYYY-MM-DD)" }
                    ],
                    "reply": "Booked {service} on {date}."
                },
                {
                    "id": "set_theme",
                    "command": "set theme",
                    "parameters": [
                        { "name": "theme", "type": "select", "required": true, "options": [
                            { "label": "Light", "value": "light" },
                            { "label": "Dark", "value": "dark" }
                        ] }
                    ],
                    "reply": "Theme set to {theme}."
                },
                {
                    "id": "delete_account",
                    "command": "delete account",
                    "description": "Permanently delete your account",
                    "critical": true,
                    "reply": "Your account has been deleted."
                }
            ]
        }))
        .unwrap_or_default()
    }
}

// ── File I/O ─────────────────────────────────────────────────────

static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Write via a `.tmp` sibling, fsync, then rename over the target. Writes to
/// the same path are serialized.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let lock = Arc::clone(
        FILE_LOCKS
            .lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(()))),
    );
    let _guard = lock.lock();

    let file_name = path
        .file_name()
        .ok_or_else(|| ConfigError::Invalid(format!("not a file path: {}", path.display())))?;
    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<AssistantConfig, ConfigError> {
    let data = fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &AssistantConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    atomic_write(path, json.as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{InteractiveResponse, ParameterKind, ResponseKind};

    fn params(json: serde_json::Value) -> Params {
        json.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_reply() {
        let p = params(serde_json::json!({ "service": "oil change", "count": 2 }));
        assert_eq!(render_reply("Booked {service} x{count}.", &p), "Booked oil change x2.");
        assert_eq!(render_reply("Hi {who}", &p), "Hi {who}");
        assert_eq!(render_reply("open { brace", &p), "open { brace");
        assert_eq!(render_reply("", &p), "");
    }

    #[test]
    fn test_config_round_trip() {
        let dir = std::env::temp_dir().join("foisit_test_config_round_trip");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("assistant.json");

        let mut config = AssistantConfig::sample();
        config.intent_api_key = Some("secret".to_string());
        save_config(&path, &config).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("secret"));
        assert!(raw.contains("activationCommand"));

        let loaded = load_config(&path).expect("should load");
        assert_eq!(loaded.commands.len(), 3);
        assert_eq!(loaded.activation_command.as_deref(), Some("hey foisit"));
        assert!(loaded.intent_api_key.is_none());
        assert!(matches!(
            loaded.commands[0].parameters[1].kind,
            ParameterKind::Date(_)
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_and_bad_json() {
        let dir = std::env::temp_dir().join("foisit_test_config_errors");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        assert!(matches!(
            load_config(&dir.join("nope.json")),
            Err(ConfigError::Io(_))
        ));
        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load_config(&bad), Err(ConfigError::Json(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_defaults_when_fields_absent() {
        let config: AssistantConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enable_smart_intent);
        assert!(config.commands.is_empty());
        assert_eq!(config.intent_timeout_secs, 15);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AssistantConfig::default();
        config.apply_env_from(|key| match key {
            ENV_INTENT_ENDPOINT => Some(" http://localhost:9000/intent ".to_string()),
            ENV_SMART_INTENT => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(config.intent_endpoint.as_deref(), Some("http://localhost:9000/intent"));
        assert!(!config.enable_smart_intent);
        assert!(config.intent_api_key.is_none());
    }

    #[test]
    fn test_duplicate_definitions_fail() {
        let mut config = AssistantConfig::sample();
        let dup = config.commands[0].clone();
        config.commands.push(dup);
        assert!(matches!(config.build_handler(), Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_definitions_drive_handler() {
        let mut config = AssistantConfig::sample();
        config.commands.push(CommandDefinition {
            id: None,
            command: "check age".to_string(),
            description: None,
            keywords: Vec::new(),
            critical: false,
            allow_ai_param_extraction: true,
            parameters: vec![Parameter::number("age").required()],
            reply: Some("error: You must be 18 or older, not {age}.".to_string()),
        });
        let handler = config.build_handler().unwrap();
        assert_eq!(
            handler.get_commands(),
            vec!["book appointment", "set theme", "delete account", "check age"]
        );

        let r = handler
            .execute_command(crate::model::CommandPayload::new("book_appointment").with_params(
                params(serde_json::json!({ "service": "tires", "date": "2026-03-02" })),
            ))
            .await;
        assert_eq!(r, InteractiveResponse::success("Booked tires on 2026-03-02."));

        let r = handler.execute_command("delete account").await;
        assert_eq!(r.kind(), ResponseKind::Confirm);

        let r = handler
            .execute_command(crate::model::CommandPayload::new("check age").param("age", 16))
            .await;
        assert_eq!(r, InteractiveResponse::error("You must be 18 or older, not 16."));
    }
}
