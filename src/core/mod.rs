pub mod catalog;
pub mod models;
pub mod types;

pub use catalog::{Catalog, OperationDescriptor};
pub use models::*;
pub use types::*;
