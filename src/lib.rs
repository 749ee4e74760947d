#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_match)]
#![allow(clippy::collapsible_else_if)]

pub mod action;
pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod schema;
pub mod services;
pub mod state;

// Re-export commonly used types
pub use action::Action;
pub use app::App;
pub use config::Config;
pub use core::{Catalog, DatasetId, JobRun, JobStatus, Pipeline, RunId, TaskType};
pub use error::{ForgeError, Result};
pub use services::{Backend, HttpBackend, JobPoller, JobSubmitter, RecommendationClient};
pub use state::{AppContext, NotificationCenter, SelectionState};
