use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CommandRegistry;
use crate::intent::{IntentRequest, IntentResponse};
use crate::model::{
    Command, FileDelivery, InteractiveOption, InteractiveResponse, Parameter, ParameterKind,
};

pub const HELP_MESSAGE: &str = "Here are the available commands:";

/// The serializable face of a command: everything but the action. This is
/// what the intent resolver and UI clients get to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescriptor {
    pub id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

pub fn describe(command: &Command) -> CommandDescriptor {
    CommandDescriptor {
        id: command.id().to_string(),
        command: command.command.clone(),
        description: command.description.clone(),
        keywords: command.keywords.clone(),
        critical: command.critical,
        parameters: command.parameters.clone(),
    }
}

/// Descriptors in registration order.
pub fn descriptors(registry: &CommandRegistry) -> Vec<CommandDescriptor> {
    registry.iter().map(|c| describe(c)).collect()
}

/// The built-in "help" answer: every command as a selectable option.
pub fn help_response(registry: &CommandRegistry) -> InteractiveResponse {
    if registry.is_empty() {
        return InteractiveResponse::error("No commands are available.");
    }
    let options = registry
        .iter()
        .map(|c| {
            let mut option = InteractiveOption::command(c.command.clone(), c.id());
            option.value = Some(c.command.clone());
            option
        })
        .collect();
    InteractiveResponse::ambiguous(HELP_MESSAGE, options)
}

/// Plain-text listing for terminals.
pub fn help_text(registry: &CommandRegistry) -> String {
    if registry.is_empty() {
        return "No commands registered.".to_string();
    }
    let mut lines = vec![HELP_MESSAGE.to_string()];
    for c in registry.iter() {
        let mut line = format!("  {}", c.command);
        if let Some(desc) = &c.description {
            line.push_str(&format!(": {desc}"));
        }
        if c.critical {
            line.push_str(" (requires confirmation)");
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// JSON Schema for one command's parameter object.
pub fn param_schema(command: &Command) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in &command.parameters {
        let mut prop = serde_json::Map::new();
        match &p.kind {
            ParameterKind::String(_) => {
                prop.insert("type".into(), "string".into());
            }
            ParameterKind::Number(spec) => {
                prop.insert("type".into(), "number".into());
                if let Some(min) = spec.min {
                    prop.insert("minimum".into(), min.into());
                }
                if let Some(max) = spec.max {
                    prop.insert("maximum".into(), max.into());
                }
            }
            ParameterKind::Date(_) => {
                prop.insert("type".into(), "string".into());
                prop.insert("format".into(), "date".into());
            }
            ParameterKind::Select(spec) => {
                prop.insert("type".into(), "string".into());
                if !spec.options.is_empty() {
                    let values: Vec<Value> =
                        spec.options.iter().map(|o| o.value.clone().into()).collect();
                    prop.insert("enum".into(), Value::Array(values));
                }
            }
            ParameterKind::File(spec) => {
                let item = match spec.delivery {
                    FileDelivery::File => serde_json::json!({
                        "type": "object",
                        "properties": { "name": { "type": "string" } },
                        "required": ["name"]
                    }),
                    FileDelivery::Base64 => serde_json::json!({
                        "type": "string",
                        "pattern": "^data:"
                    }),
                };
                if spec.multiple {
                    prop.insert("type".into(), "array".into());
                    prop.insert("items".into(), item);
                } else if let Value::Object(item) = item {
                    prop.extend(item);
                }
            }
        }
        if let Some(desc) = &p.description {
            prop.insert("description".into(), desc.clone().into());
        }
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
        properties.insert(p.name.clone(), Value::Object(prop));
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Tool list for MCP / REST style consumers.
pub fn to_json_schema(registry: &CommandRegistry) -> Value {
    Value::Array(
        registry
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.id(),
                    "command": c.command,
                    "description": c.description,
                    "critical": c.critical,
                    "inputSchema": param_schema(c),
                })
            })
            .collect(),
    )
}

fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object", "properties": {} }))
}

/// Request/response schemas of the intent service contract.
pub fn contract_schema() -> Value {
    serde_json::json!({
        "request": schema_value::<IntentRequest>(),
        "response": schema_value::<IntentResponse>(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{CommandAction, SelectOption};

    fn registry() -> CommandRegistry {
        let mut reg = CommandRegistry::new();
        reg.add(
            Command::new("book appointment", CommandAction::sync(|_| ()))
                .with_id("book_appointment")
                .describe("Book a service appointment")
                .parameter(Parameter::string("service").required())
                .parameter(Parameter::date("date").required()),
        )
        .unwrap();
        reg.add(
            Command::new("set theme", CommandAction::sync(|_| ())).parameter(Parameter::select(
                "theme",
                vec![SelectOption::new("Light", "light"), SelectOption::new("Dark", "dark")],
            )),
        )
        .unwrap();
        reg
    }

    #[test]
    fn descriptors_follow_registration_order() {
        let d = descriptors(&registry());
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].id, "book_appointment");
        assert_eq!(d[1].id, "set theme");
        assert_eq!(d[0].parameters.len(), 2);
    }

    #[test]
    fn help_lists_every_command() {
        let r = help_response(&registry());
        assert_eq!(r.message(), HELP_MESSAGE);
        let options = r.options().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].command_id.as_deref(), Some("book_appointment"));
        assert_eq!(options[0].value(), "book appointment");

        assert!(help_response(&CommandRegistry::new()).is_terminal());
    }

    #[test]
    fn help_text_lines() {
        let text = help_text(&registry());
        assert!(text.contains("book appointment: Book a service appointment"));
        assert!(text.contains("  set theme"));
    }

    #[test]
    fn param_schema_shapes() {
        let reg = registry();
        let schema = to_json_schema(&reg);
        let book = &schema[0]["inputSchema"];
        assert_eq!(book["properties"]["date"]["format"], "date");
        assert_eq!(book["required"], serde_json::json!(["service", "date"]));

        let theme = &schema[1]["inputSchema"];
        assert_eq!(theme["properties"]["theme"]["enum"], serde_json::json!(["light", "dark"]));
    }

    #[test]
    fn contract_schema_has_both_sides() {
        let schema = contract_schema();
        assert!(schema["request"].is_object());
        assert!(schema["response"].is_object());
    }
}
