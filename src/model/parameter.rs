use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Select options ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Asynchronous source of select options. Owned by the UI collaborator:
/// the engine carries it on the parameter but never invokes it.
#[derive(Clone)]
pub struct OptionsSupplier(Arc<dyn Fn() -> BoxFuture<'static, Vec<SelectOption>> + Send + Sync>);

impl OptionsSupplier {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Vec<SelectOption>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub async fn fetch(&self) -> Vec<SelectOption> {
        (self.0)().await
    }
}

impl PartialEq for OptionsSupplier {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for OptionsSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OptionsSupplier(..)")
    }
}

// ── Type-specific specs ─────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StringSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NumberSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<f64>,
}

/// Bounds are ISO `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Tells the UI to populate choices at render time. Set automatically
    /// when a supplier is attached.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dynamic_options: bool,
    #[serde(skip)]
    #[schemars(skip)]
    pub get_options: Option<OptionsSupplier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl SelectSpec {
    /// True when the option set is only known to the UI.
    pub fn is_dynamic(&self) -> bool {
        self.options.is_empty() && (self.dynamic_options || self.get_options.is_some())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileDelivery {
    /// A native file handle (see [`FileHandle`]).
    #[default]
    File,
    /// A `data:` URL string.
    Base64,
}

/// Size, type and count limits are a contract for the UI collaborator; the
/// engine only checks that a value of the delivery shape is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(default)]
    pub delivery: FileDelivery,
}

/// Wire shape of a file delivered with `delivery: "file"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileHandle {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ── Parameter ───────────────────────────────────────────────────

/// Type tag plus the constraints that belong to it. Validation rules are
/// selected by the tag alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    String(StringSpec),
    Number(NumberSpec),
    Date(DateSpec),
    Select(SelectSpec),
    File(FileSpec),
}

impl ParameterKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Select(_) => "select",
            Self::File(_) => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
            kind,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::String(StringSpec::default()))
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Number(NumberSpec::default()))
    }

    pub fn number_in(name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(
            name,
            ParameterKind::Number(NumberSpec {
                min,
                max,
                ..NumberSpec::default()
            }),
        )
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Date(DateSpec::default()))
    }

    pub fn select(name: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self::new(
            name,
            ParameterKind::Select(SelectSpec {
                options,
                ..SelectSpec::default()
            }),
        )
    }

    /// A select whose choices come only from `supplier`.
    pub fn dynamic_select(name: impl Into<String>, supplier: OptionsSupplier) -> Self {
        Self::new(
            name,
            ParameterKind::Select(SelectSpec {
                dynamic_options: true,
                get_options: Some(supplier),
                ..SelectSpec::default()
            }),
        )
    }

    pub fn file(name: impl Into<String>, delivery: FileDelivery) -> Self {
        Self::new(
            name,
            ParameterKind::File(FileSpec {
                delivery,
                ..FileSpec::default()
            }),
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}
