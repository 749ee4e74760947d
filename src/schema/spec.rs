use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One selectable value of an enum field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

impl EnumOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Field kind with its own constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        placeholder: Option<String>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
        integer: bool,
        nullable: bool,
    },
    Enum {
        options: Vec<EnumOption>,
    },
    /// Subset of the dataset's current columns
    Columns {
        options: Vec<String>,
    },
    /// Old column name to new column name
    RenameMap {
        columns: Vec<String>,
    },
    Flag,
    /// Free-form structured text that must parse as JSON
    Json {
        placeholder: Option<String>,
    },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Enum { .. } => "enum",
            Self::Columns { .. } => "multiselect-columns",
            Self::RenameMap { .. } => "rename-map",
            Self::Flag => "flag",
            Self::Json { .. } => "json",
        }
    }

    /// Whether values of this kind name dataset columns
    pub fn references_columns(&self) -> bool {
        matches!(self, Self::Columns { .. } | Self::RenameMap { .. })
    }
}

/// Show a field only while another field holds a given value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub key: String,
    pub equals: Value,
}

/// Descriptor of a single parameter the user must (or may) fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub help: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub visible_when: Option<Visibility>,
}

impl ParameterSpec {
    pub fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            help: None,
            kind,
            required: false,
            default: None,
            visible_when: None,
        }
    }

    pub fn text(key: &str, label: &str) -> Self {
        Self::new(key, label, FieldKind::Text { placeholder: None })
    }

    pub fn number(key: &str, label: &str) -> Self {
        Self::new(
            key,
            label,
            FieldKind::Number {
                min: None,
                max: None,
                step: None,
                integer: false,
                nullable: false,
            },
        )
    }

    pub fn integer(key: &str, label: &str) -> Self {
        let mut spec = Self::number(key, label);
        if let FieldKind::Number { integer, .. } = &mut spec.kind {
            *integer = true;
        }
        spec
    }

    pub fn choice(key: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self::new(
            key,
            label,
            FieldKind::Enum {
                options: options
                    .iter()
                    .map(|(value, label)| EnumOption::new(value, label))
                    .collect(),
            },
        )
    }

    pub fn columns(key: &str, label: &str, columns: &[String]) -> Self {
        Self::new(
            key,
            label,
            FieldKind::Columns {
                options: columns.to_vec(),
            },
        )
    }

    pub fn rename_map(key: &str, label: &str, columns: &[String]) -> Self {
        Self::new(
            key,
            label,
            FieldKind::RenameMap {
                columns: columns.to_vec(),
            },
        )
    }

    pub fn flag(key: &str, label: &str) -> Self {
        Self::new(key, label, FieldKind::Flag)
    }

    pub fn json(key: &str, label: &str, placeholder: &str) -> Self {
        Self::new(
            key,
            label,
            FieldKind::Json {
                placeholder: Some(placeholder.to_string()),
            },
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn visible_when(mut self, key: &str, equals: Value) -> Self {
        self.visible_when = Some(Visibility {
            key: key.to_string(),
            equals,
        });
        self
    }

    pub fn bounded(mut self, lo: Option<f64>, hi: Option<f64>, by: Option<f64>) -> Self {
        if let FieldKind::Number { min, max, step, .. } = &mut self.kind {
            *min = lo;
            *max = hi;
            *step = by;
        }
        self
    }

    pub fn nullable(mut self) -> Self {
        if let FieldKind::Number { nullable, .. } = &mut self.kind {
            *nullable = true;
        }
        self
    }
}
