use crate::core::{ApplyRequest, DatasetId, Pipeline, RunId, Severity, TrainingRequest};
use crate::error::{ForgeError, Result};
use crate::schema::values;
use crate::services::backend::Backend;
use crate::state::{ActivityStore, CellUpdate, JobStore, NotificationCenter, SelectionState};
use serde_json::Value;
use std::sync::Arc;

/// Identifier produced by a successful submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRef {
    /// New dataset version written by a cleaning or feature operation
    DatasetVersion(DatasetId),
    /// Queued training run, now tracked by the poller
    TrainingRun(RunId),
}

/// A fully validated request, detached from the selection it came from
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Apply {
        pipeline: Pipeline,
        request: ApplyRequest,
    },
    Train(TrainingRequest),
}

impl Submission {
    /// Package the selection into a request.
    ///
    /// Fails with `Validation` when dataset, operation or (for training)
    /// target and features are missing, and with `MalformedInput` when a
    /// parameter value breaks its field's constraints.
    pub fn prepare(state: &SelectionState) -> Result<Self> {
        let missing = state.missing_fields();
        if !missing.is_empty() {
            return Err(ForgeError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        values::validate(state.parameter_specs(), state.parameter_values())?;

        let (Some(dataset_id), Some(operation)) = (state.dataset_id(), state.operation()) else {
            return Err(ForgeError::validation("Missing dataset or operation"));
        };
        let params = values::submission_params(state.parameter_specs(), state.parameter_values());

        match state.pipeline() {
            Pipeline::Training => Ok(Self::Train(TrainingRequest {
                dataset_id,
                target_column: state.target().unwrap_or_default().to_string(),
                feature_columns: state.features().to_vec(),
                model_key: operation.to_string(),
                parameters: params,
            })),
            pipeline => Ok(Self::Apply {
                pipeline,
                request: ApplyRequest {
                    dataset_id,
                    operation: operation.to_string(),
                    params,
                },
            }),
        }
    }

    /// Drain the staged cell edits into a `manual_update` request.
    ///
    /// The drained edits are returned alongside so they can be restaged if
    /// the request fails.
    pub fn commit_staged(state: &mut SelectionState) -> Result<(Self, Vec<CellUpdate>)> {
        let dataset_id = state
            .dataset_id()
            .ok_or_else(|| ForgeError::validation("Select a dataset first"))?;
        if state.staging().is_empty() {
            return Err(ForgeError::validation("No staged edits to save"));
        }
        let params = state.staging().to_params();
        let updates = state.staging_mut().commit();
        let submission = Self::Apply {
            pipeline: Pipeline::Cleaning,
            request: ApplyRequest {
                dataset_id,
                operation: "manual_update".to_string(),
                params,
            },
        };
        Ok((submission, updates))
    }

    pub fn pipeline(&self) -> Pipeline {
        match self {
            Self::Apply { pipeline, .. } => *pipeline,
            Self::Train(_) => Pipeline::Training,
        }
    }

    /// Operation or model key being submitted
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Apply { request, .. } => &request.operation,
            Self::Train(request) => &request.model_key,
        }
    }

    pub fn dataset_id(&self) -> DatasetId {
        match self {
            Self::Apply { request, .. } => request.dataset_id,
            Self::Train(request) => request.dataset_id,
        }
    }

    /// Parameters as sent on the wire
    pub fn params(&self) -> Value {
        match self {
            Self::Apply { request, .. } => Value::Object(request.params.clone()),
            Self::Train(request) => Value::Object(request.parameters.clone()),
        }
    }
}

/// JobSubmitter posts prepared requests and reports the outcome.
///
/// This service is responsible for:
/// - Sending apply and training requests to the backend
/// - Recording an activity entry and a success toast on success
/// - Tracking new training runs so the poller picks them up
/// - Showing the server's message in an error toast on failure
pub struct JobSubmitter<B> {
    backend: Arc<B>,
    jobs: JobStore,
    notifications: NotificationCenter,
    activity: ActivityStore,
}

impl<B> Clone for JobSubmitter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            jobs: self.jobs.clone(),
            notifications: self.notifications.clone(),
            activity: self.activity.clone(),
        }
    }
}

impl<B: Backend> JobSubmitter<B> {
    pub fn new(
        backend: Arc<B>,
        jobs: JobStore,
        notifications: NotificationCenter,
        activity: ActivityStore,
    ) -> Self {
        Self {
            backend,
            jobs,
            notifications,
            activity,
        }
    }

    pub async fn submit(&self, submission: Submission) -> Result<JobRef> {
        let operation = submission.operation_id().to_string();
        let outcome = match &submission {
            Submission::Apply { pipeline, request } => self
                .backend
                .apply(*pipeline, request)
                .await
                .map(|resp| JobRef::DatasetVersion(resp.new_dataset_id)),
            Submission::Train(request) => self.backend.start_training(request).await.map(|run| {
                let id = run.id;
                self.jobs.track(run);
                JobRef::TrainingRun(id)
            }),
        };

        match &outcome {
            Ok(job) => {
                self.activity.record(operation.clone());
                let message = match job {
                    JobRef::DatasetVersion(id) => format!("Applied {operation}, new dataset version #{id}"),
                    JobRef::TrainingRun(id) => format!("Training run #{id} queued ({operation})"),
                };
                tracing::info!("{}", message);
                self.notifications.add_toast(message, Severity::Success);
            }
            Err(err) => {
                tracing::error!("Submitting {} failed: {}", operation, err);
                self.notifications
                    .add_toast(err.user_message("Operation failed"), Severity::Error);
            }
        }
        outcome
    }
}
