//! Maps `(operation, columns)` to the parameter fields the user must fill.

use crate::core::{Catalog, ModelOption, Pipeline};
use crate::error::{ForgeError, Result};
use crate::schema::spec::{EnumOption, FieldKind, ParameterSpec};
use serde_json::{Value, json};

const FILL_METHODS: &[(&str, &str)] = &[
    ("mean", "Statistical Mean"),
    ("median", "Statistical Median"),
    ("mode", "Most Frequent"),
    ("constant", "Fixed Value"),
    ("ffill", "Forward Fill"),
    ("bfill", "Backward Fill"),
];

const TARGET_TYPES: &[(&str, &str)] = &[
    ("int64", "Integer (Discrete Numbers)"),
    ("float64", "Float (Decimal Numbers)"),
    ("string", "String (Text Labels)"),
    ("datetime64[ns]", "Temporal (Date/Time)"),
    ("category", "Category"),
];

const TEXT_ACTIONS: &[(&str, &str)] = &[
    ("lower", "Force Lowercase"),
    ("upper", "Force Uppercase"),
    ("strip", "Trim Whitespace"),
    ("title", "Title Case"),
];

/// Resolve the parameter fields of `operation_id` against `columns`.
///
/// Pure: the same inputs always give the same fields. Aliases resolve to
/// their canonical operation. Training operations are model keys looked up
/// in the catalog.
pub fn resolve(
    catalog: &Catalog,
    pipeline: Pipeline,
    operation_id: &str,
    columns: &[String],
) -> Result<Vec<ParameterSpec>> {
    match pipeline {
        Pipeline::Training => catalog
            .model(operation_id)
            .map(model_fields)
            .ok_or_else(|| ForgeError::validation(format!("Unknown model: {operation_id}"))),
        _ => {
            let id = catalog
                .canonical_id(pipeline, operation_id)
                .ok_or_else(|| {
                    ForgeError::validation(format!("Unknown operation: {operation_id}"))
                })?;
            Ok(match pipeline {
                Pipeline::Cleaning => cleaning_fields(&id, columns),
                _ => feature_fields(&id, columns),
            })
        }
    }
}

fn cleaning_fields(id: &str, columns: &[String]) -> Vec<ParameterSpec> {
    match id {
        "drop_missing" => vec![
            ParameterSpec::choice(
                "axis",
                "Axis",
                &[("0", "Rows (any NaN drops row)"), ("1", "Columns (any NaN drops column)")],
            )
            .with_default(json!("0")),
            ParameterSpec::integer("threshold", "Threshold")
                .bounded(Some(0.0), None, Some(1.0))
                .nullable()
                .with_help("Keep rows/columns with at least this many non-NaN values"),
            ParameterSpec::columns("subset", "Filter by Columns", columns),
        ],
        "fill_missing" => vec![
            ParameterSpec::choice("method", "Strategy", FILL_METHODS)
                .required()
                .with_default(json!("mean")),
            ParameterSpec::text("value", "Constant Value")
                .required()
                .visible_when("method", json!("constant")),
            ParameterSpec::columns("subset", "Columns to Impute", columns),
        ],
        "drop_duplicates" => vec![
            ParameterSpec::columns("subset", "Identity Columns", columns)
                .with_help("Leave empty to compare complete rows"),
            ParameterSpec::choice("keep", "Keep", &[("first", "First"), ("last", "Last")])
                .with_default(json!("first")),
        ],
        "drop_columns" => vec![ParameterSpec::columns("columns", "Columns to Drop", columns).required()],
        "rename_columns" => {
            vec![ParameterSpec::rename_map("mapping", "Column Mapper", columns).required()]
        }
        "convert_type" => vec![
            ParameterSpec::columns("columns", "Target Columns", columns).required(),
            ParameterSpec::choice("type", "Target Format", TARGET_TYPES).required(),
        ],
        "remove_outliers_zscore" => vec![
            ParameterSpec::number("threshold", "Sensitivity (Threshold)")
                .bounded(Some(0.0), None, Some(0.1))
                .with_default(json!(3.0)),
            ParameterSpec::columns("columns", "Feature Subset", columns),
        ],
        "remove_outliers_iqr" => vec![ParameterSpec::columns("columns", "Feature Subset", columns)],
        "text_clean" => vec![
            ParameterSpec::choice("action", "Sanitization Strategy", TEXT_ACTIONS)
                .required()
                .with_default(json!("lower")),
            ParameterSpec::columns("columns", "Target Columns", columns).required(),
        ],
        "find_replace" => vec![
            ParameterSpec::columns("columns", "Target Columns", columns).required(),
            ParameterSpec::text("find", "Find").required(),
            ParameterSpec::text("replace", "Replace With"),
            ParameterSpec::flag("regex", "Regular Expression").with_default(json!(false)),
        ],
        "winsorize" => vec![
            ParameterSpec::columns("columns", "Target Columns", columns).required(),
            ParameterSpec::json("limits", "Limits (lower, upper)", "[0.05, 0.05]")
                .with_default(json!([0.05, 0.05])),
        ],
        "manual_update" => vec![
            ParameterSpec::json("updates", "Cell Updates", "[{\"index\": 0, \"column\": \"a\", \"value\": 1}]")
                .required(),
        ],
        _ => Vec::new(),
    }
}

fn feature_fields(id: &str, columns: &[String]) -> Vec<ParameterSpec> {
    let mut fields = vec![ParameterSpec::columns("columns", "Target Features", columns).required()];
    match id {
        "pca" => fields.push(
            ParameterSpec::integer("n_components", "Components")
                .bounded(Some(1.0), None, Some(1.0))
                .required()
                .with_default(json!(2)),
        ),
        "binarizer" => fields.push(
            ParameterSpec::number("threshold", "Threshold").with_default(json!(0.0)),
        ),
        _ => {}
    }
    fields
}

/// Fields of a served model, built from its `param_meta`.
pub fn model_fields(model: &ModelOption) -> Vec<ParameterSpec> {
    model
        .param_meta
        .iter()
        .map(|(key, meta)| {
            let label = meta
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or(key.as_str());
            let default = model.default_params.get(key).cloned();
            let kind = match meta.get("type").and_then(Value::as_str) {
                Some("number") => FieldKind::Number {
                    min: meta.get("min").and_then(Value::as_f64),
                    max: meta.get("max").and_then(Value::as_f64),
                    step: meta.get("step").and_then(Value::as_f64),
                    integer: default
                        .as_ref()
                        .map(|v| v.is_i64() || v.is_u64())
                        .unwrap_or(false),
                    nullable: meta.get("nullable").and_then(Value::as_bool).unwrap_or(false),
                },
                Some("select") => FieldKind::Enum {
                    options: meta
                        .get("options")
                        .and_then(Value::as_array)
                        .map(|opts| {
                            opts.iter()
                                .filter_map(Value::as_str)
                                .map(|o| EnumOption::new(o, o))
                                .collect()
                        })
                        .unwrap_or_default(),
                },
                Some("boolean") => FieldKind::Flag,
                _ => FieldKind::Text { placeholder: None },
            };
            ParameterSpec {
                key: key.clone(),
                label: label.to_string(),
                help: meta.get("help").and_then(Value::as_str).map(str::to_string),
                kind,
                required: false,
                default,
                visible_when: None,
            }
        })
        .collect()
}
