use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Backend identifier for a dataset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub i64);

impl DatasetId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| format!("Invalid dataset id '{}': {}", s, e))
    }
}

/// Backend identifier for a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| format!("Invalid run id '{}': {}", s, e))
    }
}

/// The screen a selection belongs to. Picks the operation catalog and the
/// endpoints used for recommendations and submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Pipeline {
    Cleaning,
    Features,
    Training,
}

impl Pipeline {
    /// Path prefix of the backend router serving this pipeline
    pub fn route(&self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Features => "features",
            Self::Training => "training",
        }
    }

    /// Operation name used in activity records
    pub fn activity_name(&self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Features => "feature_eng",
            Self::Training => "training",
        }
    }
}

/// Learning task a model targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskType {
    Classification,
    Regression,
    Clustering,
}

/// How the current task type came to be set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskTypeSource {
    #[default]
    Unset,
    /// Derived from the top recommendation of an auto-detect request
    Inferred,
    /// Chosen by the user
    Explicit,
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    #[default]
    Info,
    Warning,
}

/// Column relevance verdict from the analysis endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Relevance {
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

impl Relevance {
    pub fn is_useful(&self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }
}

/// Lifecycle of a tracked backend job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Status only moves forward; terminal states are final.
    pub fn can_become(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}
