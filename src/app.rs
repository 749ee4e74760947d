use crate::action::Action;
use crate::config::Config;
use crate::core::{Dataset, JobRun, Pipeline, PredictResponse, RunId, ServerActivity, Severity};
use crate::error::{ForgeError, Result};
use crate::services::{Backend, JobPoller, JobRef, JobSubmitter, RecommendationClient, Submission};
use crate::state::{AppContext, ApplyOutcome, Confirmation, Effect};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

fn send(tx: &UnboundedSender<Action>, action: Action) {
    if let Err(err) = tx.send(action) {
        tracing::debug!("View gone, dropping {}", err.0);
    }
}

/// Orchestrator of one screen.
///
/// Owns the stores of an [`AppContext`], turns user [`Action`]s into setter
/// calls and background requests, and applies the responses that come back
/// on its action channel. Nothing is mutated from a background task
/// directly except the job list, which the poller owns.
pub struct App<B> {
    backend: Arc<B>,
    ctx: AppContext,
    recommendations: RecommendationClient<B>,
    submitter: JobSubmitter<B>,
    poller: JobPoller<B>,
    preview_limit: u32,
    poll_interval: Duration,
    datasets: Vec<Dataset>,
    activities: Vec<ServerActivity>,
    action_tx: UnboundedSender<Action>,
    action_rx: UnboundedReceiver<Action>,
    mounted: bool,
}

impl<B: Backend> App<B> {
    pub fn new(backend: Arc<B>, config: &Config, pipeline: Pipeline) -> Self {
        let ctx = AppContext::new(pipeline, config.notifications.toast_duration());
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            recommendations: RecommendationClient::new(backend.clone(), config.llm.clone()),
            submitter: JobSubmitter::new(
                backend.clone(),
                ctx.jobs.clone(),
                ctx.notifications.clone(),
                ctx.activity.clone(),
            ),
            poller: JobPoller::new(
                backend.clone(),
                ctx.jobs.clone(),
                ctx.notifications.clone(),
                ctx.activity.clone(),
            ),
            backend,
            ctx,
            preview_limit: config.api.preview_limit,
            poll_interval: config.polling.interval(),
            datasets: Vec::new(),
            activities: Vec::new(),
            action_tx,
            action_rx,
            mounted: false,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn action_sender(&self) -> UnboundedSender<Action> {
        self.action_tx.clone()
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn activities(&self) -> &[ServerActivity] {
        &self.activities
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Job list published after every poll tick
    pub fn job_updates(&self) -> watch::Receiver<Vec<JobRun>> {
        self.poller.subscribe()
    }

    /// Load the registries and start polling
    pub fn mount(&mut self) {
        tracing::info!("Mounting {} view", self.ctx.selection.read(|s| s.pipeline()));
        self.mounted = true;
        self.spawn_load_datasets();
        self.spawn_load_runs();
        let backend = self.backend.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            send(&tx, Action::ModelsLoaded(backend.list_models().await));
        });
        self.poller.start(self.poll_interval);
    }

    /// Stop every timer owned by this view
    pub fn teardown(&mut self) {
        if self.mounted {
            tracing::info!("Tearing down view");
        }
        self.mounted = false;
        self.poller.stop();
    }

    /// Wait for the next action and handle it. `None` once the channel closed.
    pub async fn process_next(&mut self) -> Option<Result<()>> {
        let action = self.action_rx.recv().await?;
        Some(self.handle_action(action))
    }

    /// Handle every action already queued, without waiting
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(action) = self.action_rx.try_recv() {
            if let Err(err) = self.handle_action(action) {
                tracing::warn!("Action failed: {}", err);
            }
            handled += 1;
        }
        handled
    }

    pub fn handle_action(&mut self, action: Action) -> Result<()> {
        tracing::trace!("Handling {}", action);
        let selection = self.ctx.selection.clone();
        match action {
            Action::SelectDataset(id) => {
                let effects = selection.update(|s| s.set_dataset(id));
                if !effects.is_empty() && self.mounted {
                    self.poller.start(self.poll_interval);
                }
                self.run_effects(effects);
            }
            Action::SelectTarget(column) => {
                let effects = selection.update(|s| s.set_target(&column))?;
                self.run_effects(effects);
            }
            Action::ClearTarget => selection.update(|s| s.clear_target()),
            Action::ToggleFeature(column) => selection.update(|s| s.toggle_feature(&column))?,
            Action::SelectRelevantFeatures => selection.update(|s| s.select_relevant_features()),
            Action::SelectOperation(id) => selection.update(|s| s.set_operation(&id))?,
            Action::ClearOperation => selection.update(|s| s.unset_operation()),
            Action::SetParameter { key, value } => {
                selection.update(|s| s.set_parameter(&key, value))?
            }
            Action::SetParameterText { key, raw } => {
                selection.update(|s| s.set_parameter_text(&key, &raw))?
            }
            Action::SetTaskType(task) => {
                let effects = selection.update(|s| s.set_task_type(task));
                self.run_effects(effects);
            }

            Action::StageCell { row, column, value } => {
                selection.update(|s| s.stage_cell(row, &column, value))?
            }
            Action::UnstageCell { row, column } => {
                selection.update(|s| s.unstage_cell(row, &column));
            }
            Action::DiscardStaged => selection.update(|s| s.discard_staged()),
            Action::SaveStaged => {
                let (submission, updates) = selection.update(Submission::commit_staged)?;
                let dataset_id = submission.dataset_id();
                let submitter = self.submitter.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    let result = submitter.submit(submission).await;
                    send(&tx, Action::StagedSaved { dataset_id, updates, result });
                });
            }

            Action::Submit => {
                let submission = selection.read(Submission::prepare)?;
                tracing::info!(
                    "Submitting {} on dataset {}",
                    submission.operation_id(),
                    submission.dataset_id()
                );
                let submitter = self.submitter.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    send(&tx, Action::Submitted(submitter.submit(submission).await));
                });
            }

            Action::RefreshDatasets => self.spawn_load_datasets(),
            Action::RefreshRuns => self.spawn_load_runs(),
            Action::RefreshActivities => {
                let backend = self.backend.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    send(&tx, Action::ActivitiesLoaded(backend.list_activities().await));
                });
            }
            Action::UploadDataset { filename, bytes } => {
                let backend = self.backend.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    send(&tx, Action::DatasetUploaded(backend.upload(&filename, bytes).await));
                });
            }
            Action::DeleteDataset(id) => {
                let tx = self.action_tx.clone();
                self.ctx.notifications.show_confirm(
                    Confirmation::new(
                        "Delete dataset",
                        format!("Dataset #{id} and its file will be removed. This cannot be undone."),
                    )
                    .on_confirm(move || send(&tx, Action::DeleteDatasetConfirmed(id))),
                );
            }
            Action::DeleteDatasetConfirmed(id) => {
                let backend = self.backend.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    let result = backend.delete_dataset(id).await;
                    send(&tx, Action::DatasetDeleted { id, result });
                });
            }
            Action::DeleteRun(id) => {
                let tx = self.action_tx.clone();
                self.ctx.notifications.show_confirm(
                    Confirmation::new(
                        "Delete training run",
                        format!("Run #{id} and its model artifact will be removed."),
                    )
                    .on_confirm(move || send(&tx, Action::DeleteRunConfirmed(id))),
                );
            }
            Action::DeleteRunConfirmed(id) => {
                let backend = self.backend.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    let result = backend.delete_run(id).await;
                    send(&tx, Action::RunDeleted { id, result });
                });
            }
            Action::PurgeSystem => {
                let tx = self.action_tx.clone();
                self.ctx.notifications.show_confirm(
                    Confirmation::new(
                        "Purge registry",
                        "Every dataset, training run and activity will be deleted.",
                    )
                    .on_confirm(move || send(&tx, Action::PurgeConfirmed)),
                );
            }
            Action::PurgeConfirmed => {
                let backend = self.backend.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    send(&tx, Action::Purged(backend.purge().await));
                });
            }

            Action::Confirm => {
                self.ctx.notifications.confirm();
            }
            Action::Cancel => {
                self.ctx.notifications.cancel();
            }
            Action::DismissToast(id) => {
                self.ctx.notifications.remove_toast(id);
            }
            Action::Teardown => self.teardown(),

            Action::PreviewLoaded { ticket, result } => {
                if let ApplyOutcome::Failed(err) = selection.update(|s| s.apply_preview(&ticket, result)) {
                    self.toast_error(&err, "Could not load dataset columns");
                }
            }
            Action::RecommendationsLoaded { ticket, result } => {
                if let ApplyOutcome::Failed(err) =
                    selection.update(|s| s.apply_recommendations(&ticket, result))
                {
                    self.ctx.notifications.add_toast(
                        err.user_message("Recommendations are unavailable right now"),
                        Severity::Warning,
                    );
                }
            }
            Action::RelevanceLoaded { ticket, result } => {
                if let ApplyOutcome::Failed(err) = selection.update(|s| s.apply_relevance(&ticket, result)) {
                    self.ctx.notifications.add_toast(
                        err.user_message("Feature analysis is unavailable right now"),
                        Severity::Warning,
                    );
                }
            }
            Action::DatasetsLoaded(result) => match result {
                Ok(datasets) => {
                    tracing::debug!("{} datasets listed", datasets.len());
                    self.datasets = datasets;
                }
                Err(err) => self.toast_error(&err, "Could not load datasets"),
            },
            Action::ModelsLoaded(result) => match result {
                Ok(models) => selection.update(|s| s.set_models(models)),
                Err(err) => self.toast_error(&err, "Could not load the model catalog"),
            },
            Action::RunsLoaded(result) => match result {
                Ok(runs) => self.ctx.jobs.load(runs),
                Err(err) => self.toast_error(&err, "Could not load training runs"),
            },
            Action::ActivitiesLoaded(result) => match result {
                Ok(activities) => self.activities = activities,
                Err(err) => self.toast_error(&err, "Could not load activities"),
            },
            Action::Submitted(result) => {
                if let Ok(JobRef::DatasetVersion(_)) = result {
                    self.spawn_load_datasets();
                }
            }
            Action::StagedSaved { dataset_id, updates, result } => match result {
                Ok(_) => self.spawn_load_datasets(),
                Err(_) => selection.update(|s| {
                    if s.dataset_id() == Some(dataset_id) {
                        for update in updates {
                            s.staging_mut().stage(update.index, update.column, update.value);
                        }
                    }
                }),
            },
            Action::DatasetUploaded(result) => match result {
                Ok(dataset) => {
                    self.ctx.notifications.add_toast(
                        format!("Uploaded {} ({} rows)", dataset.filename, dataset.row_count),
                        Severity::Success,
                    );
                    self.ctx.activity.record("upload");
                    self.spawn_load_datasets();
                }
                Err(err) => self.toast_error(&err, "Upload failed"),
            },
            Action::DatasetDeleted { id, result } => match result {
                Ok(()) => {
                    self.datasets.retain(|d| d.id != id);
                    self.ctx.notifications.add_toast(format!("Dataset #{id} deleted"), Severity::Success);
                    self.spawn_load_datasets();
                }
                Err(err) => self.toast_error(&err, "Could not delete dataset"),
            },
            Action::RunDeleted { id, result } => match result {
                Ok(()) => {
                    self.ctx.jobs.remove(id);
                    self.ctx.notifications.add_toast(format!("Run #{id} deleted"), Severity::Success);
                }
                Err(err) => self.toast_error(&err, "Could not delete run"),
            },
            Action::Purged(result) => match result {
                Ok(()) => {
                    self.datasets.clear();
                    self.activities.clear();
                    self.ctx.jobs.clear();
                    self.ctx.notifications.add_toast("Registry purged", Severity::Success);
                    self.spawn_load_datasets();
                }
                Err(err) => self.toast_error(&err, "Purge failed"),
            },
        }
        Ok(())
    }

    /// Fetch a trained model artifact
    pub async fn download_run(&self, id: RunId) -> Result<Vec<u8>> {
        self.backend.download_run(id).await.inspect_err(|err| {
            self.toast_error(err, "Download failed");
        })
    }

    /// Score records with a completed run
    pub async fn predict(&self, id: RunId, records: &[Map<String, Value>]) -> Result<PredictResponse> {
        if records.is_empty() {
            return Err(ForgeError::validation("Nothing to predict"));
        }
        self.backend.predict(id, records).await.inspect_err(|err| {
            self.toast_error(err, "Prediction failed");
        })
    }

    fn toast_error(&self, err: &ForgeError, fallback: &str) {
        tracing::warn!("{}: {}", fallback, err);
        self.ctx
            .notifications
            .add_toast(err.user_message(fallback), Severity::Error);
    }

    fn spawn_load_datasets(&self) {
        let backend = self.backend.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            send(&tx, Action::DatasetsLoaded(backend.list_datasets().await));
        });
    }

    fn spawn_load_runs(&self) {
        let backend = self.backend.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            send(&tx, Action::RunsLoaded(backend.fetch_runs(&[]).await));
        });
    }

    fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            let tx = self.action_tx.clone();
            match effect {
                Effect::FetchPreview(ticket) => {
                    let backend = self.backend.clone();
                    let limit = self.preview_limit;
                    tokio::spawn(async move {
                        let result = backend.preview(ticket.dataset_id, limit).await;
                        send(&tx, Action::PreviewLoaded { ticket, result });
                    });
                }
                Effect::FetchRecommendations(ticket) => {
                    let client = self.recommendations.clone();
                    tokio::spawn(async move {
                        let result = client.fetch(&ticket).await;
                        send(&tx, Action::RecommendationsLoaded { ticket, result });
                    });
                }
                Effect::FetchRelevance(ticket) => {
                    let client = self.recommendations.clone();
                    tokio::spawn(async move {
                        let result = client.analyze(&ticket).await;
                        send(&tx, Action::RelevanceLoaded { ticket, result });
                    });
                }
            }
        }
    }
}
