//! Command registry and slot-filling resolution engine.
//!
//! Register [`Command`](model::Command)s on a [`CommandHandler`], then feed it
//! free text or structured payloads. Each call returns exactly one
//! [`InteractiveResponse`](model::InteractiveResponse): a result, an error, a
//! form asking for missing parameters, a confirmation for critical commands,
//! or a list of choices.

pub mod confirm;
pub mod dialog;
pub mod error;
pub mod fallback;
pub mod handler;
pub mod intent;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod registry;
pub mod settings;
pub mod slots;

pub use error::{ConfigError, RegistryError, ResolverError};
pub use handler::{CommandHandler, HandlerConfig};
pub use intent::{HttpIntentResolver, IntentResolver};
