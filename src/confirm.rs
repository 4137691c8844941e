use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::{Command, InteractiveOption, InteractiveResponse, Params};

pub const CANCELLED_MESSAGE: &str = "Cancelled.";

/// Decision for a command whose parameters are complete.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Proceed,
    AwaitConfirmation(InteractiveResponse),
    Cancelled(InteractiveResponse),
}

/// Per-handler secret that signs the values shown in a confirmation prompt.
///
/// Only the Yes option of a prompt this key produced, resubmitted with the
/// same command and values, gets past the gate.
#[derive(Clone)]
pub struct ConfirmationKey {
    secret: [u8; 32],
}

impl fmt::Debug for ConfirmationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfirmationKey(..)")
    }
}

impl Default for ConfirmationKey {
    fn default() -> Self {
        Self::generate()
    }
}

impl ConfirmationKey {
    pub fn generate() -> Self {
        use rand::Rng;

        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self { secret }
    }

    /// Hex SHA-256 over the secret, the command id and the canonical JSON of
    /// `values`.
    pub fn token(&self, command_id: &str, values: &Params) -> String {
        let mut canonical = String::new();
        write_canonical(&Value::Object(values.clone()), &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(self.secret);
        hasher.update(command_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, command_id: &str, values: &Params, token: &str) -> bool {
        self.token(command_id, values) == token
    }
}

/// JSON with object keys sorted at every level, so the token does not depend
/// on map ordering.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Only ever called once slot filling reports ready, so a critical command
/// with outstanding parameters is never confirmed early.
///
/// `confirmed: Some(true)` proceeds only with the token from this key's own
/// prompt for exactly these values; anything else asks again.
pub fn check(
    key: &ConfirmationKey,
    command: &Command,
    values: &Params,
    confirmed: Option<bool>,
    token: Option<&str>,
) -> Gate {
    if !command.critical {
        return Gate::Proceed;
    }
    match (confirmed, token) {
        (Some(false), _) => Gate::Cancelled(InteractiveResponse::success(CANCELLED_MESSAGE)),
        (Some(true), Some(token)) if key.verify(command.id(), values, token) => Gate::Proceed,
        (Some(true), _) => {
            debug!(command = %command.command, "confirmation without a matching token");
            Gate::AwaitConfirmation(confirmation(key, command, values))
        }
        (None, _) => Gate::AwaitConfirmation(confirmation(key, command, values)),
    }
}

/// The `confirm` response: a Yes/No pair, each carrying the full payload to
/// resubmit. Only Yes carries the token.
pub fn confirmation(key: &ConfirmationKey, command: &Command, values: &Params) -> InteractiveResponse {
    let choice = |label: &str, value: &str, confirmed: bool| InteractiveOption {
        label: label.to_string(),
        value: Some(value.to_string()),
        command_id: Some(command.id().to_string()),
        params: Some(values.clone()),
        confirmed: Some(confirmed),
        confirmation_token: confirmed.then(|| key.token(command.id(), values)),
    };
    InteractiveResponse::confirm(
        format!("Are you sure you want to run \"{}\"?", command.command),
        vec![choice("Yes", "yes", true), choice("No", "no", false)],
    )
}
