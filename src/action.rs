use crate::core::{
    Dataset, DatasetId, FeatureRelevance, JobRun, ModelOption, Preview, Recommendation, RunId,
    ServerActivity, TaskType,
};
use crate::error::Result;
use crate::services::JobRef;
use crate::state::{CellUpdate, Ticket};
use serde_json::Value;
use strum::Display;
use uuid::Uuid;

/// Messages handled by [`crate::app::App`]: user intents plus the responses
/// of the requests they trigger.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Action {
    // Selection
    SelectDataset(DatasetId),
    SelectTarget(String),
    ClearTarget,
    ToggleFeature(String),
    SelectRelevantFeatures,
    SelectOperation(String),
    ClearOperation,
    SetParameter { key: String, value: Value },
    /// Raw text typed into a parameter field
    SetParameterText { key: String, raw: String },
    SetTaskType(TaskType),

    // Manual cell edits
    StageCell { row: u64, column: String, value: Value },
    UnstageCell { row: u64, column: String },
    DiscardStaged,
    SaveStaged,

    Submit,

    // Registry management
    RefreshDatasets,
    RefreshRuns,
    RefreshActivities,
    UploadDataset { filename: String, bytes: Vec<u8> },
    /// Asks for confirmation first
    DeleteDataset(DatasetId),
    DeleteDatasetConfirmed(DatasetId),
    /// Asks for confirmation first
    DeleteRun(RunId),
    DeleteRunConfirmed(RunId),
    /// Asks for confirmation first
    PurgeSystem,
    PurgeConfirmed,

    // Notifications
    Confirm,
    Cancel,
    DismissToast(Uuid),

    /// The owning view is going away
    Teardown,

    // Responses
    PreviewLoaded { ticket: Ticket, result: Result<Preview> },
    RecommendationsLoaded { ticket: Ticket, result: Result<Vec<Recommendation>> },
    RelevanceLoaded { ticket: Ticket, result: Result<Vec<FeatureRelevance>> },
    DatasetsLoaded(Result<Vec<Dataset>>),
    ModelsLoaded(Result<Vec<ModelOption>>),
    RunsLoaded(Result<Vec<JobRun>>),
    ActivitiesLoaded(Result<Vec<ServerActivity>>),
    Submitted(Result<JobRef>),
    StagedSaved {
        dataset_id: DatasetId,
        updates: Vec<CellUpdate>,
        result: Result<JobRef>,
    },
    DatasetUploaded(Result<Dataset>),
    DatasetDeleted { id: DatasetId, result: Result<()> },
    RunDeleted { id: RunId, result: Result<()> },
    Purged(Result<()>),
}
