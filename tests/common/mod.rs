#![allow(dead_code)]

use chrono::Utc;
use dsforge::core::{
    ApplyRequest, ApplyResponse, Dataset, DatasetId, FeatureAnalysisRequest, FeatureRelevance,
    JobRun, JobStatus, ModelOption, ModelRecommendRequest, Pipeline, PredictResponse, Preview,
    Recommendation, Relevance, RunId, ServerActivity, TaskType, TrainingRequest,
};
use dsforge::{Backend, ForgeError, Result};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Progress added to a running job on every poll
pub const PROGRESS_STEP: u8 = 40;

pub const SAMPLE_CSV: &str = "a,b,y\n1,,0\n2,3,1\n,5,0\n";

struct StoredDataset {
    meta: Dataset,
    rows: Vec<Map<String, Value>>,
}

#[derive(Default)]
struct FakeState {
    datasets: BTreeMap<i64, StoredDataset>,
    next_dataset_id: i64,
    runs: BTreeMap<i64, JobRun>,
    next_run_id: i64,
    models: Vec<ModelOption>,
    recommend_delays: HashMap<String, Duration>,
    failing_polls: usize,
    poll_requests: Vec<Vec<RunId>>,
    preview_calls: usize,
    analyze_calls: usize,
    apply_calls: usize,
    deleted_datasets: Vec<DatasetId>,
    deleted_runs: Vec<RunId>,
    purges: usize,
}

/// In-memory backend: datasets parsed from CSV, runs that advance on every
/// poll, and knobs for slow or failing calls.
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

pub fn model(key: &str, task: TaskType) -> ModelOption {
    let mut defaults = Map::new();
    defaults.insert("max_depth".into(), json!(5));
    let mut meta = Map::new();
    meta.insert(
        "max_depth".into(),
        json!({"type": "number", "label": "Max depth", "min": 1, "max": 50}),
    );
    ModelOption {
        key: key.into(),
        name: key.replace('_', " "),
        task_type: task,
        default_params: defaults,
        description: String::new(),
        formula: String::new(),
        param_meta: meta,
    }
}

fn parse_cell(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    match raw.parse::<i64>() {
        Ok(n) => json!(n),
        Err(_) => raw.parse::<f64>().map(|f| json!(f)).unwrap_or_else(|_| json!(raw)),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        let state = FakeState {
            next_dataset_id: 1,
            next_run_id: 1,
            models: vec![
                model("rf_classifier", TaskType::Classification),
                model("logistic_regression", TaskType::Classification),
                model("rf_regressor", TaskType::Regression),
                model("kmeans", TaskType::Clustering),
            ],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn models(&self) -> Vec<ModelOption> {
        self.state().models.clone()
    }

    /// Store a dataset directly, bypassing upload
    pub fn seed_csv(&self, filename: &str, csv: &str) -> DatasetId {
        let mut state = self.state();
        let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<String> = lines
            .next()
            .unwrap_or_default()
            .split(',')
            .map(|h| h.trim().to_string())
            .collect();
        let rows: Vec<Map<String, Value>> = lines
            .map(|line| {
                header
                    .iter()
                    .cloned()
                    .zip(line.split(',').map(parse_cell))
                    .collect()
            })
            .collect();
        Self::insert(&mut state, filename, header, rows)
    }

    fn insert(
        state: &mut FakeState,
        filename: &str,
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
    ) -> DatasetId {
        let id = state.next_dataset_id;
        state.next_dataset_id += 1;
        let meta = Dataset {
            id: DatasetId(id),
            filename: filename.to_string(),
            source_type: "upload".to_string(),
            row_count: rows.len() as u64,
            column_count: columns.len() as u32,
            size_bytes: 0,
            created_at: Utc::now().naive_utc(),
        };
        state.datasets.insert(id, StoredDataset { meta, rows });
        DatasetId(id)
    }

    /// Remove a dataset behind the client's back
    pub fn delete_dataset_now(&self, id: DatasetId) {
        self.state().datasets.remove(&id.0);
    }

    pub fn rows(&self, id: DatasetId) -> Vec<Map<String, Value>> {
        self.state()
            .datasets
            .get(&id.0)
            .map(|d| d.rows.clone())
            .unwrap_or_default()
    }

    /// Delay model recommendations for one target column
    pub fn delay_recommendations(&self, target: &str, delay: Duration) {
        self.state().recommend_delays.insert(target.to_string(), delay);
    }

    /// Make the next `count` batched run fetches fail
    pub fn fail_next_polls(&self, count: usize) {
        self.state().failing_polls = count;
    }

    /// Insert a run with the given status, as if started earlier
    pub fn seed_run(&self, label: &str, status: JobStatus) -> JobRun {
        let mut state = self.state();
        let id = state.next_run_id;
        state.next_run_id += 1;
        let run = new_run(id, label, status);
        state.runs.insert(id, run.clone());
        run
    }

    /// Id lists of every batched run fetch, in order
    pub fn poll_requests(&self) -> Vec<Vec<RunId>> {
        self.state().poll_requests.clone()
    }

    pub fn preview_calls(&self) -> usize {
        self.state().preview_calls
    }

    pub fn analyze_calls(&self) -> usize {
        self.state().analyze_calls
    }

    pub fn apply_calls(&self) -> usize {
        self.state().apply_calls
    }

    pub fn deleted_datasets(&self) -> Vec<DatasetId> {
        self.state().deleted_datasets.clone()
    }

    pub fn deleted_runs(&self) -> Vec<RunId> {
        self.state().deleted_runs.clone()
    }

    pub fn purges(&self) -> usize {
        self.state().purges
    }
}

fn new_run(id: i64, label: &str, status: JobStatus) -> JobRun {
    JobRun {
        id: RunId(id),
        label: label.to_string(),
        target_column: None,
        feature_columns: None,
        status,
        progress: if status == JobStatus::Completed { 100 } else { 0 },
        stage: None,
        metrics: None,
        detailed_report: None,
        logs: Vec::new(),
        created_at: Utc::now().naive_utc(),
        error_message: None,
    }
}

fn advance(run: &mut JobRun) {
    if run.status.is_terminal() {
        return;
    }
    run.progress = run.progress.saturating_add(PROGRESS_STEP).min(100);
    if run.progress == 100 {
        run.status = JobStatus::Completed;
        run.stage = Some("done".into());
        let mut metrics = Map::new();
        metrics.insert("accuracy".into(), json!(0.93));
        run.metrics = Some(metrics);
    } else {
        run.status = JobStatus::Running;
        run.stage = Some("fitting".into());
    }
}

fn not_found(what: &str) -> ForgeError {
    ForgeError::Backend {
        status: 404,
        message: Some(format!("{what} not found")),
    }
}

impl Backend for FakeBackend {
    async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        Ok(self.state().datasets.values().map(|d| d.meta.clone()).collect())
    }

    async fn preview(&self, id: DatasetId, limit: u32) -> Result<Preview> {
        let mut state = self.state();
        state.preview_calls += 1;
        let stored = state.datasets.get(&id.0).ok_or_else(|| not_found("Dataset"))?;
        let columns = stored
            .rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Preview {
            columns,
            data: stored.rows.iter().take(limit as usize).cloned().collect(),
            total_rows: stored.rows.len() as u64,
        })
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<Dataset> {
        let csv = String::from_utf8(bytes).map_err(|e| ForgeError::Backend {
            status: 400,
            message: Some(e.to_string()),
        })?;
        let id = self.seed_csv(filename, &csv);
        Ok(self.state().datasets[&id.0].meta.clone())
    }

    async fn delete_dataset(&self, id: DatasetId) -> Result<()> {
        let mut state = self.state();
        state.datasets.remove(&id.0).ok_or_else(|| not_found("Dataset"))?;
        state.deleted_datasets.push(id);
        Ok(())
    }

    async fn apply(&self, _pipeline: Pipeline, request: &ApplyRequest) -> Result<ApplyResponse> {
        let mut state = self.state();
        state.apply_calls += 1;
        let source = state
            .datasets
            .get(&request.dataset_id.0)
            .ok_or_else(|| not_found("Dataset"))?;
        let filename = source.meta.filename.clone();
        let mut rows = source.rows.clone();
        match request.operation.as_str() {
            "drop_missing" | "drop_missing_rows" => {
                rows.retain(|row| row.values().all(|v| !v.is_null()));
            }
            "manual_update" => {
                let updates = request
                    .params
                    .get("updates")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for update in updates {
                    let index = update["index"].as_u64().unwrap_or(0) as usize;
                    let column = update["column"].as_str().unwrap_or_default().to_string();
                    if let Some(row) = rows.get_mut(index) {
                        row.insert(column, update["value"].clone());
                    }
                }
            }
            "unknown_op" => {
                return Err(ForgeError::Backend {
                    status: 400,
                    message: Some("Unknown operation: unknown_op".into()),
                });
            }
            _ => {}
        }
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        let new_id = Self::insert(&mut state, &format!("{}_{}", request.operation, filename), columns, rows);
        Ok(ApplyResponse {
            message: "ok".into(),
            new_dataset_id: new_id,
        })
    }

    async fn operation_recommendations(&self, pipeline: Pipeline, _id: DatasetId) -> Result<Vec<String>> {
        Ok(match pipeline {
            Pipeline::Cleaning => vec!["drop_missing".into(), "drop_duplicates".into()],
            _ => vec!["standard_scaler".into()],
        })
    }

    async fn analyze_features(&self, request: &FeatureAnalysisRequest) -> Result<Vec<FeatureRelevance>> {
        let mut state = self.state();
        state.analyze_calls += 1;
        let stored = state
            .datasets
            .get(&request.dataset_id.0)
            .ok_or_else(|| not_found("Dataset"))?;
        let columns: Vec<String> = stored
            .rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Ok(columns
            .into_iter()
            .filter(|c| *c != request.target_column)
            .enumerate()
            .map(|(i, feature)| FeatureRelevance {
                feature,
                score: if i == 0 { 0.8 } else { 0.1 },
                relevance: if i == 0 { Relevance::High } else { Relevance::Low },
                reason: format!("against {}", request.target_column),
            })
            .collect())
    }

    async fn recommend_models(&self, request: &ModelRecommendRequest) -> Result<Vec<Recommendation>> {
        let (delay, models) = {
            let state = self.state();
            (
                state.recommend_delays.get(&request.target_column).copied(),
                state.models.clone(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let task = request.task_type.unwrap_or(TaskType::Classification);
        Ok(models
            .into_iter()
            .filter(|m| m.task_type == task)
            .enumerate()
            .map(|(i, m)| Recommendation {
                key: m.key,
                match_score: Some(0.9 - i as f64 * 0.1),
                reason: format!("fits {}", request.target_column),
            })
            .collect())
    }

    async fn list_models(&self) -> Result<Vec<ModelOption>> {
        Ok(self.models())
    }

    async fn start_training(&self, request: &TrainingRequest) -> Result<JobRun> {
        let mut state = self.state();
        if !state.datasets.contains_key(&request.dataset_id.0) {
            return Err(not_found("Dataset"));
        }
        let id = state.next_run_id;
        state.next_run_id += 1;
        let mut run = new_run(id, &request.model_key, JobStatus::Pending);
        run.target_column = Some(request.target_column.clone());
        run.feature_columns = Some(request.feature_columns.clone());
        state.runs.insert(id, run.clone());
        Ok(run)
    }

    async fn fetch_runs(&self, ids: &[RunId]) -> Result<Vec<JobRun>> {
        let mut state = self.state();
        if ids.is_empty() {
            return Ok(state.runs.values().rev().cloned().collect());
        }
        state.poll_requests.push(ids.to_vec());
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(ForgeError::TransientNetwork("connection reset".into()));
        }
        let mut out = Vec::new();
        for id in ids {
            if let Some(run) = state.runs.get_mut(&id.0) {
                advance(run);
                out.push(run.clone());
            }
        }
        Ok(out)
    }

    async fn delete_run(&self, id: RunId) -> Result<()> {
        let mut state = self.state();
        state.runs.remove(&id.0).ok_or_else(|| not_found("Run"))?;
        state.deleted_runs.push(id);
        Ok(())
    }

    async fn download_run(&self, id: RunId) -> Result<Vec<u8>> {
        match self.state().runs.get(&id.0) {
            Some(run) if run.status == JobStatus::Completed => Ok(b"model-bytes".to_vec()),
            Some(_) => Err(ForgeError::Backend {
                status: 400,
                message: Some("Model not ready".into()),
            }),
            None => Err(not_found("Run")),
        }
    }

    async fn predict(&self, id: RunId, records: &[Map<String, Value>]) -> Result<PredictResponse> {
        if !self.state().runs.contains_key(&id.0) {
            return Err(not_found("Run"));
        }
        Ok(PredictResponse {
            predictions: records.iter().map(|_| json!(1)).collect(),
            run_id: id,
        })
    }

    async fn list_activities(&self) -> Result<Vec<ServerActivity>> {
        Ok(Vec::new())
    }

    async fn purge(&self) -> Result<()> {
        let mut state = self.state();
        state.datasets.clear();
        state.runs.clear();
        state.purges += 1;
        Ok(())
    }
}
