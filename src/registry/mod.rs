pub mod catalog;
pub mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::RegistryError;
use crate::model::Command;

/// Normalize a trigger phrase or free-text input for lookup: trim, collapse
/// inner whitespace, case-fold.
pub fn normalize(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn index_keywords(keywords: &mut HashMap<String, String>, key: &str, command: &Command) {
    for keyword in &command.keywords {
        let kw = normalize(keyword);
        if kw.is_empty() || kw == key {
            continue;
        }
        keywords.entry(kw).or_insert_with(|| key.to_string());
    }
}

/// In-memory store of registered commands.
///
/// Keyed by normalized trigger phrase in insertion order, with secondary
/// indexes by id and by keyword. Cloning is cheap enough to snapshot the
/// registry for the duration of one resolution.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: IndexMap<String, Arc<Command>>,
    /// id → trigger key
    ids: HashMap<String, String>,
    /// normalized keyword → trigger key (earliest registration still present wins)
    keywords: HashMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Fails if the trigger (after normalization) or the
    /// id is already taken, or if the command's shape is invalid.
    pub fn add(&mut self, command: Command) -> Result<(), RegistryError> {
        validation::validate_command(&command)?;

        let key = normalize(&command.command);
        if self.commands.contains_key(&key) {
            return Err(RegistryError::DuplicateCommand {
                trigger: command.command,
            });
        }
        let id = command.id().to_string();
        if let Some(owner) = self.ids.get(&id) {
            return Err(RegistryError::InvalidCommand {
                trigger: command.command.clone(),
                reason: format!("id \"{id}\" is already used by \"{owner}\""),
            });
        }

        index_keywords(&mut self.keywords, &key, &command);
        self.ids.insert(id, key.clone());
        self.commands.insert(key, Arc::new(command));
        Ok(())
    }

    /// Remove by trigger phrase. A second removal of the same trigger fails.
    pub fn remove(&mut self, trigger: &str) -> Result<Arc<Command>, RegistryError> {
        let key = normalize(trigger);
        let removed = self
            .commands
            .shift_remove(&key)
            .ok_or_else(|| RegistryError::UnknownCommand {
                trigger: trigger.to_string(),
            })?;
        self.ids.retain(|_, k| *k != key);
        // Keywords the removed command owned pass to the next command, in
        // registration order, that declares them.
        self.keywords.clear();
        for (k, command) in &self.commands {
            index_keywords(&mut self.keywords, k, command);
        }
        Ok(removed)
    }

    /// Registered trigger phrases, in insertion order, as originally written.
    pub fn triggers(&self) -> Vec<String> {
        self.commands.values().map(|c| c.command.clone()).collect()
    }

    /// Exact (normalized) trigger match, then keyword match.
    pub fn find_exact(&self, input: &str) -> Option<Arc<Command>> {
        let key = normalize(input);
        self.commands
            .get(&key)
            .or_else(|| self.keywords.get(&key).and_then(|k| self.commands.get(k)))
            .cloned()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<Command>> {
        self.ids.get(id).and_then(|k| self.commands.get(k)).cloned()
    }

    /// Id first, then trigger phrase. Used for names coming back from the
    /// intent resolver, which may use either. Structured payloads go through
    /// [`get_by_id`](Self::get_by_id).
    pub fn lookup(&self, id_or_trigger: &str) -> Option<Arc<Command>> {
        self.get_by_id(id_or_trigger)
            .or_else(|| self.commands.get(&normalize(id_or_trigger)).cloned())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
