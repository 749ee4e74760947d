pub mod backend;
pub mod poller;
pub mod recommendation;
pub mod submitter;

pub use backend::{Backend, HttpBackend};
pub use poller::JobPoller;
pub use recommendation::RecommendationClient;
pub use submitter::{JobRef, JobSubmitter, Submission};
