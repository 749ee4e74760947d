//! Operation Catalog: static cleaning and feature-engineering operations plus
//! the served model registry.

use crate::core::models::ModelOption;
use crate::core::types::{Pipeline, TaskType};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Human-facing description of one operation or model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub id: String,
    pub label: String,
    pub category: String,
    pub description: String,
    pub pipeline: Pipeline,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl OperationDescriptor {
    fn new(
        pipeline: Pipeline,
        id: &str,
        label: &str,
        category: &str,
        description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            pipeline,
            aliases: Vec::new(),
        }
    }

    fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn matches(&self, id: &str) -> bool {
        self.id == id || self.aliases.iter().any(|a| a == id)
    }
}

lazy_static! {
    static ref CLEANING_OPERATIONS: Vec<OperationDescriptor> = {
        use Pipeline::Cleaning as C;
        vec![
            OperationDescriptor::new(C, "drop_missing", "Drop Missing Rows", "Missing Data",
                "Removes rows or columns with missing values. The threshold is the minimum number of non-empty cells required to keep a row.")
                .alias("drop_missing_rows"),
            OperationDescriptor::new(C, "fill_missing", "Fill Missing Values", "Missing Data",
                "Replaces missing values with the mean, median, mode, a neighbour or a fixed value."),
            OperationDescriptor::new(C, "drop_duplicates", "Drop Duplicates", "Columns",
                "Deletes identical rows, optionally comparing only a subset of columns."),
            OperationDescriptor::new(C, "drop_columns", "Drop Columns", "Columns",
                "Removes the selected columns."),
            OperationDescriptor::new(C, "rename_columns", "Rename Columns", "Columns",
                "Maps existing column names to new labels."),
            OperationDescriptor::new(C, "convert_type", "Convert Data Type", "Type Conversion",
                "Changes the storage type of the selected columns."),
            OperationDescriptor::new(C, "remove_outliers_zscore", "Remove Outliers (Z-Score)", "Outliers",
                "Drops rows whose values lie more than the threshold standard deviations from the mean."),
            OperationDescriptor::new(C, "remove_outliers_iqr", "Remove Outliers (IQR)", "Outliers",
                "Drops rows outside 1.5 inter-quartile ranges of the 25th/75th percentiles."),
            OperationDescriptor::new(C, "text_clean", "Text Cleaning", "Text",
                "Normalises casing or whitespace of text columns."),
            OperationDescriptor::new(C, "find_replace", "Find and Replace", "Cell Editing",
                "Replaces matching cell values, optionally by regular expression."),
            OperationDescriptor::new(C, "winsorize", "Winsorize", "Outliers",
                "Caps the lowest and highest fractions of numeric columns."),
            OperationDescriptor::new(C, "manual_update", "Manual Cell Updates", "Cell Editing",
                "Writes staged cell edits into a new dataset version."),
        ]
    };

    static ref FEATURE_OPERATIONS: Vec<OperationDescriptor> = {
        use Pipeline::Features as F;
        vec![
            OperationDescriptor::new(F, "standard_scaler", "Standard Scaler (Z-Score)", "Scaling",
                "Centres columns on zero with unit variance."),
            OperationDescriptor::new(F, "minmax_scaler", "MinMax Scaler (0-1 Range)", "Scaling",
                "Rescales columns into the 0-1 range."),
            OperationDescriptor::new(F, "robust_scaler", "Robust Scaler", "Scaling",
                "Scales with median and IQR, resistant to outliers."),
            OperationDescriptor::new(F, "maxabs_scaler", "MaxAbs Scaler", "Scaling",
                "Divides by the maximum absolute value."),
            OperationDescriptor::new(F, "log_transform", "Log Transform", "Transformation",
                "Applies log(1 + x) to reduce right skew."),
            OperationDescriptor::new(F, "sqrt_transform", "Square Root Transform", "Transformation",
                "Applies a square root to non-negative values."),
            OperationDescriptor::new(F, "yeo_johnson", "Yeo-Johnson Power Transform", "Transformation",
                "Makes data more Gaussian-like, supports negative values."),
            OperationDescriptor::new(F, "box_cox", "Box-Cox Power Transform", "Transformation",
                "Makes strictly positive data more Gaussian-like."),
            OperationDescriptor::new(F, "quantile_normal", "Quantile Transform (Normal)", "Transformation",
                "Maps values onto a normal distribution."),
            OperationDescriptor::new(F, "quantile_uniform", "Quantile Transform (Uniform)", "Transformation",
                "Maps values onto a uniform distribution."),
            OperationDescriptor::new(F, "l2_normalization", "L2 Normalization", "Transformation",
                "Scales each row to unit norm."),
            OperationDescriptor::new(F, "label_encoding", "Label Encoding", "Encoding",
                "Replaces categories with integer codes."),
            OperationDescriptor::new(F, "one_hot_encoding", "One-Hot Encoding", "Encoding",
                "Expands categories into indicator columns."),
            OperationDescriptor::new(F, "frequency_encoding", "Frequency Encoding", "Encoding",
                "Replaces categories with their relative frequency."),
            OperationDescriptor::new(F, "hash_encoding", "Hash Encoding", "Encoding",
                "Buckets categories by hash."),
            OperationDescriptor::new(F, "polynomial_features", "Polynomial Features", "Generation",
                "Replaces the selection with its degree-2 polynomial expansion."),
            OperationDescriptor::new(F, "interaction_only", "Interaction Features", "Generation",
                "Adds pairwise products of the selected columns."),
            OperationDescriptor::new(F, "kbins_uniform", "Binning (Uniform)", "Discretization",
                "Discretises into five equal-width bins."),
            OperationDescriptor::new(F, "kbins_quantile", "Binning (Quantile)", "Discretization",
                "Discretises into five equal-frequency bins."),
            OperationDescriptor::new(F, "kbins_kmeans", "Binning (K-Means)", "Discretization",
                "Discretises into five k-means clusters."),
            OperationDescriptor::new(F, "binarizer", "Binarizer", "Discretization",
                "Maps values above the threshold to 1, others to 0."),
            OperationDescriptor::new(F, "sigmoid_transform", "Sigmoid Transform", "Misc",
                "Squashes values through 1 / (1 + e^-x)."),
            OperationDescriptor::new(F, "percentile_rank", "Percentile Rank", "Misc",
                "Replaces values with their percentile rank."),
            OperationDescriptor::new(F, "date_extraction", "Date Part Extraction", "Misc",
                "Adds year, month, day and weekday columns."),
            OperationDescriptor::new(F, "pca", "PCA (Dimension Reduction)", "Dimensionality Reduction",
                "Projects the selection onto its principal components."),
        ]
    };
}

/// Registry of everything a user can pick on any screen.
///
/// Cleaning and feature operations are fixed; models are served by the
/// backend and installed with [`Catalog::set_models`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    models: Vec<ModelOption>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(models: Vec<ModelOption>) -> Self {
        Self { models }
    }

    pub fn set_models(&mut self, models: Vec<ModelOption>) {
        self.models = models;
    }

    pub fn models(&self) -> &[ModelOption] {
        &self.models
    }

    pub fn model(&self, key: &str) -> Option<&ModelOption> {
        self.models.iter().find(|m| m.key == key)
    }

    /// Models for one task type, in registry order
    pub fn models_for(&self, task: TaskType) -> impl Iterator<Item = &ModelOption> {
        self.models.iter().filter(move |m| m.task_type == task)
    }

    /// Static operations of a data pipeline; empty for training
    pub fn static_operations(pipeline: Pipeline) -> &'static [OperationDescriptor] {
        match pipeline {
            Pipeline::Cleaning => CLEANING_OPERATIONS.as_slice(),
            Pipeline::Features => FEATURE_OPERATIONS.as_slice(),
            Pipeline::Training => &[],
        }
    }

    /// Every descriptor of a pipeline. Training descriptors come from models.
    pub fn operations(&self, pipeline: Pipeline) -> Vec<OperationDescriptor> {
        match pipeline {
            Pipeline::Training => self.models.iter().map(model_descriptor).collect(),
            _ => Self::static_operations(pipeline).to_vec(),
        }
    }

    pub fn lookup(&self, pipeline: Pipeline, id: &str) -> Option<OperationDescriptor> {
        match pipeline {
            Pipeline::Training => self.model(id).map(model_descriptor),
            _ => Self::static_operations(pipeline)
                .iter()
                .find(|op| op.matches(id))
                .cloned(),
        }
    }

    /// Canonical id for an id or alias
    pub fn canonical_id(&self, pipeline: Pipeline, id: &str) -> Option<String> {
        self.lookup(pipeline, id).map(|op| op.id)
    }
}

fn model_descriptor(model: &ModelOption) -> OperationDescriptor {
    OperationDescriptor {
        id: model.key.clone(),
        label: model.name.clone(),
        category: model.task_type.to_string(),
        description: model.description.clone(),
        pipeline: Pipeline::Training,
        aliases: Vec::new(),
    }
}
