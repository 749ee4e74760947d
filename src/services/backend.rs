use crate::core::{
    ApplyRequest, ApplyResponse, Dataset, DatasetId, FeatureAnalysisRequest, FeatureRelevance,
    JobRun, ModelOption, ModelRecommendRequest, OperationRecommendations, Pipeline,
    PredictResponse, Preview, Recommendation, RunId, ServerActivity, TrainingRequest,
};
use crate::error::{ForgeError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;

/// The processing backend as seen by the orchestration core.
///
/// Every call is independent; there is no session. Implementations must be
/// shareable across spawned tasks.
pub trait Backend: Send + Sync + 'static {
    fn list_datasets(&self) -> impl Future<Output = Result<Vec<Dataset>>> + Send;

    fn preview(&self, id: DatasetId, limit: u32) -> impl Future<Output = Result<Preview>> + Send;

    fn upload(&self, filename: &str, bytes: Vec<u8>) -> impl Future<Output = Result<Dataset>> + Send;

    fn delete_dataset(&self, id: DatasetId) -> impl Future<Output = Result<()>> + Send;

    /// Apply a cleaning or feature operation, producing a new dataset version
    fn apply(
        &self,
        pipeline: Pipeline,
        request: &ApplyRequest,
    ) -> impl Future<Output = Result<ApplyResponse>> + Send;

    fn operation_recommendations(
        &self,
        pipeline: Pipeline,
        id: DatasetId,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn analyze_features(
        &self,
        request: &FeatureAnalysisRequest,
    ) -> impl Future<Output = Result<Vec<FeatureRelevance>>> + Send;

    fn recommend_models(
        &self,
        request: &ModelRecommendRequest,
    ) -> impl Future<Output = Result<Vec<Recommendation>>> + Send;

    fn list_models(&self) -> impl Future<Output = Result<Vec<ModelOption>>> + Send;

    fn start_training(&self, request: &TrainingRequest) -> impl Future<Output = Result<JobRun>> + Send;

    /// Snapshots of the given runs, or of every run when `ids` is empty
    fn fetch_runs(&self, ids: &[RunId]) -> impl Future<Output = Result<Vec<JobRun>>> + Send;

    fn delete_run(&self, id: RunId) -> impl Future<Output = Result<()>> + Send;

    fn download_run(&self, id: RunId) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn predict(
        &self,
        id: RunId,
        records: &[Map<String, Value>],
    ) -> impl Future<Output = Result<PredictResponse>> + Send;

    fn list_activities(&self) -> impl Future<Output = Result<Vec<ServerActivity>>> + Send;

    /// Wipe every dataset, run and activity on the server
    fn purge(&self) -> impl Future<Output = Result<()>> + Send;
}

/// [`Backend`] over HTTP with `reqwest`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!("Request failed before a response: {}", e);
            ForgeError::from(e)
        })?;
        check_status(response).await
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turn a non-2xx response into `Backend`, keeping the server's `detail`
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = detail_message(&body);
    tracing::warn!("{} returned {}: {:?}", url, status, message);
    Err(ForgeError::Backend {
        status: status.as_u16(),
        message,
    })
}

/// Extract `detail` from an error body: strings verbatim, anything else as JSON
pub fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Backend for HttpBackend {
    async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        self.json(self.client.get(self.url("datasets/"))).await
    }

    async fn preview(&self, id: DatasetId, limit: u32) -> Result<Preview> {
        let request = self
            .client
            .get(self.url(&format!("datasets/{id}/preview")))
            .query(&[("limit", limit)]);
        self.json(request).await
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<Dataset> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("file", part);
        tracing::info!("Uploading {}", filename);
        self.json(self.client.post(self.url("datasets/upload")).multipart(form))
            .await
    }

    async fn delete_dataset(&self, id: DatasetId) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("datasets/{id}"))))
            .await
            .map(|_| ())
    }

    async fn apply(&self, pipeline: Pipeline, request: &ApplyRequest) -> Result<ApplyResponse> {
        let url = self.url(&format!("{}/apply", pipeline.route()));
        tracing::info!(
            "Applying {} to dataset {} via {}",
            request.operation,
            request.dataset_id,
            url
        );
        self.json(self.client.post(url).json(request)).await
    }

    async fn operation_recommendations(&self, pipeline: Pipeline, id: DatasetId) -> Result<Vec<String>> {
        let url = self.url(&format!("{}/recommend/{id}", pipeline.route()));
        let recs: OperationRecommendations = self.json(self.client.get(url)).await?;
        Ok(recs.recommendations)
    }

    async fn analyze_features(&self, request: &FeatureAnalysisRequest) -> Result<Vec<FeatureRelevance>> {
        self.json(self.client.post(self.url("analysis/features")).json(request))
            .await
    }

    async fn recommend_models(&self, request: &ModelRecommendRequest) -> Result<Vec<Recommendation>> {
        self.json(self.client.post(self.url("models/recommend")).json(request))
            .await
    }

    async fn list_models(&self) -> Result<Vec<ModelOption>> {
        self.json(self.client.get(self.url("models/"))).await
    }

    async fn start_training(&self, request: &TrainingRequest) -> Result<JobRun> {
        tracing::info!(
            "Starting {} on dataset {} (target {})",
            request.model_key,
            request.dataset_id,
            request.target_column
        );
        self.json(self.client.post(self.url("training/start")).json(request))
            .await
    }

    async fn fetch_runs(&self, ids: &[RunId]) -> Result<Vec<JobRun>> {
        let mut request = self.client.get(self.url("training/runs"));
        if !ids.is_empty() {
            let joined = ids.iter().map(RunId::to_string).collect::<Vec<_>>().join(",");
            request = request.query(&[("ids", joined)]);
        }
        let runs: Vec<JobRun> = self.json(request).await?;
        if ids.is_empty() {
            return Ok(runs);
        }
        Ok(runs.into_iter().filter(|r| ids.contains(&r.id)).collect())
    }

    async fn delete_run(&self, id: RunId) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("training/runs/{id}"))))
            .await
            .map(|_| ())
    }

    async fn download_run(&self, id: RunId) -> Result<Vec<u8>> {
        let response = self
            .send(self.client.get(self.url(&format!("training/runs/{id}/download"))))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn predict(&self, id: RunId, records: &[Map<String, Value>]) -> Result<PredictResponse> {
        self.json(
            self.client
                .post(self.url(&format!("deployment/{id}/predict")))
                .json(records),
        )
        .await
    }

    async fn list_activities(&self) -> Result<Vec<ServerActivity>> {
        self.json(self.client.get(self.url("activities/"))).await
    }

    async fn purge(&self) -> Result<()> {
        tracing::warn!("Purging the backend registry");
        self.send(self.client.delete(self.url("system/purge")))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn run_json(id: i64, status: &str, progress: u8) -> Value {
        json!({
            "id": id,
            "model_name": "rf_classifier",
            "status": status,
            "progress": progress,
            "logs": [],
            "created_at": "2025-03-01T10:15:00"
        })
    }

    #[test]
    fn test_detail_message_extraction() {
        assert_eq!(
            detail_message(r#"{"detail": "Dataset not found"}"#).as_deref(),
            Some("Dataset not found")
        );
        assert_eq!(
            detail_message(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#).as_deref(),
            Some(r#"[{"loc":["body"],"msg":"field required"}]"#)
        );
        assert_eq!(detail_message("Internal Server Error"), None);
        assert_eq!(detail_message(r#"{"error": "x"}"#), None);
    }

    #[tokio::test]
    async fn test_apply_posts_body_and_reads_new_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cleaning/apply"))
            .and(body_json(json!({"dataset_id": 4, "operation": "drop_missing", "params": {"axis": "0"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Operation drop_missing applied successfully",
                "new_dataset_id": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri()).unwrap();
        let mut params = Map::new();
        params.insert("axis".into(), json!("0"));
        let response = backend
            .apply(
                Pipeline::Cleaning,
                &ApplyRequest {
                    dataset_id: DatasetId(4),
                    operation: "drop_missing".into(),
                    params,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.new_dataset_id, DatasetId(5));
    }

    #[tokio::test]
    async fn test_non_success_carries_server_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/features/apply"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "Column 'zip' is not numeric"})),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(format!("{}/", server.uri())).unwrap();
        let err = backend
            .apply(
                Pipeline::Features,
                &ApplyRequest {
                    dataset_id: DatasetId(1),
                    operation: "standard_scaler".into(),
                    params: Map::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ForgeError::Backend {
                status: 400,
                message: Some("Column 'zip' is not numeric".into())
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_runs_batches_ids_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/training/runs"))
            .and(query_param("ids", "1,3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                run_json(3, "running", 50),
                run_json(2, "completed", 100),
                run_json(1, "pending", 0)
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri()).unwrap();
        let runs = backend.fetch_runs(&[RunId(1), RunId(3)]).await.unwrap();
        let ids: Vec<RunId> = runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RunId(3), RunId(1)]);
        assert_eq!(runs[0].status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(format!("http://{addr}")).unwrap();
        let err = backend.list_datasets().await.unwrap_err();
        assert!(err.is_transient(), "unexpected error {err:?}");
    }

    #[tokio::test]
    async fn test_operation_recommendations_unwraps_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/features/recommend/8"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"recommendations": ["standard_scaler", "pca"]})),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri()).unwrap();
        let recs = backend
            .operation_recommendations(Pipeline::Features, DatasetId(8))
            .await
            .unwrap();
        assert_eq!(recs, vec!["standard_scaler".to_string(), "pca".to_string()]);
    }
}
