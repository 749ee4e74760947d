//! Records exchanged with the processing backend.

use crate::core::types::{DatasetId, JobStatus, Relevance, RunId, TaskType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A dataset version as listed by `GET /datasets/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub filename: String,
    pub source_type: String,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub column_count: u32,
    #[serde(default)]
    pub size_bytes: u64,
    pub created_at: NaiveDateTime,
}

/// Response of `GET /datasets/{id}/preview`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    pub total_rows: u64,
}

/// Body of `POST /cleaning/apply` and `POST /features/apply`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub dataset_id: DatasetId,
    pub operation: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResponse {
    #[serde(default)]
    pub message: String,
    pub new_dataset_id: DatasetId,
}

/// Response of `GET /{pipeline}/recommend/{id}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationRecommendations {
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Body of `POST /analysis/features`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAnalysisRequest {
    pub dataset_id: DatasetId,
    pub target_column: String,
}

/// Per-column relevance against the chosen target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRelevance {
    pub feature: String,
    #[serde(default)]
    pub score: f64,
    pub relevance: Relevance,
    #[serde(default)]
    pub reason: String,
}

/// Body of `POST /models/recommend`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecommendRequest {
    pub dataset_id: DatasetId,
    pub target_column: String,
    pub task_type: Option<TaskType>,
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

/// A ranked suggestion for an operation or model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Operation or model key
    pub key: String,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub reason: String,
}

impl Recommendation {
    /// Wrap an unranked operation suggestion
    pub fn from_operation(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            match_score: None,
            reason: "Suggested from the dataset profile".to_string(),
        }
    }
}

/// A trainable model as served by `GET /models/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOption {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub default_params: Map<String, Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub formula: String,
    /// Field metadata keyed by parameter name, in display order
    #[serde(default)]
    pub param_meta: Map<String, Value>,
}

/// Body of `POST /training/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub dataset_id: DatasetId,
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub model_key: String,
    pub parameters: Map<String, Value>,
}

/// A tracked training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: RunId,
    /// Model key the run was started with; doubles as its display label
    #[serde(rename = "model_name")]
    pub label: String,
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default)]
    pub feature_columns: Option<Vec<String>>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub metrics: Option<Map<String, Value>>,
    #[serde(default)]
    pub detailed_report: Option<Map<String, Value>>,
    #[serde(default)]
    pub logs: Vec<String>,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Response of `POST /deployment/{run_id}/predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Value>,
    pub run_id: RunId,
}

/// Server-side audit record from `GET /activities/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerActivity {
    pub id: i64,
    pub operation: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata_json: Option<Map<String, Value>>,
    pub created_at: NaiveDateTime,
}
