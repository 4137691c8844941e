use serde_json::Value;
use tracing::debug;

use crate::model::{Command, InteractiveResponse, Parameter, ParameterKind, Params};
use crate::registry::validation::validate_value;

/// Where a command stands with respect to its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    /// Required parameters are still missing or invalid. `values` holds only
    /// the entries that passed validation.
    Collecting { missing: Vec<Parameter>, values: Params },
    /// Every required parameter is present and valid.
    Ready { values: Params },
}

impl SlotState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SlotState::Ready { .. })
    }
}

/// Check `params` against `command`'s declared parameters, in declared order.
///
/// Invalid optional values are dropped and absent optional parameters take
/// their `defaultValue`. Keys the command does not declare are passed through.
pub fn fill(command: &Command, mut params: Params) -> SlotState {
    let mut missing = Vec::new();

    for param in &command.parameters {
        match validate_value(param, params.get(&param.name)) {
            Ok(()) => {}
            Err(reason) if param.required => {
                debug!(command = %command.command, param = %param.name, %reason, "parameter outstanding");
                params.remove(&param.name);
                missing.push(param.clone());
            }
            Err(reason) => {
                if params.remove(&param.name).is_some() {
                    debug!(command = %command.command, param = %param.name, %reason, "dropping invalid optional value");
                }
                if let Some(default) = default_value(param) {
                    params.insert(param.name.clone(), default);
                }
            }
        }
    }

    if missing.is_empty() {
        SlotState::Ready { values: params }
    } else {
        SlotState::Collecting {
            missing,
            values: params,
        }
    }
}

/// A declared default, only if it would itself validate.
fn default_value(param: &Parameter) -> Option<Value> {
    let value = match &param.kind {
        ParameterKind::String(spec) => spec.default_value.clone().map(Value::from),
        ParameterKind::Number(spec) => spec.default_value.map(Value::from),
        ParameterKind::Date(spec) => spec.default_value.clone().map(Value::from),
        ParameterKind::Select(spec) => spec.default_value.clone().map(Value::from),
        ParameterKind::File(_) => None,
    }?;
    validate_value(param, Some(&value)).ok().map(|()| value)
}

/// Prompt for a form when no resolver message is available.
pub fn default_prompt(missing: &[Parameter]) -> String {
    let labels: Vec<&str> = missing
        .iter()
        .map(|p| p.description.as_deref().unwrap_or(&p.name))
        .collect();
    match labels.as_slice() {
        [] => "Please provide the missing details.".to_string(),
        [one] => format!("Please provide {one}."),
        many => format!("Please provide the following: {}.", many.join(", ")),
    }
}

/// The `form` continuation for a command still collecting.
pub fn form_response(
    command: &Command,
    missing: Vec<Parameter>,
    values: Params,
    prompt: Option<String>,
) -> InteractiveResponse {
    let message = prompt
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_prompt(&missing));
    InteractiveResponse::form_for(command.id(), values, message, missing)
}
