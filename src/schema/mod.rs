//! Parameter Schema Resolver

pub mod resolver;
pub mod spec;
pub mod values;

pub use resolver::{model_fields, resolve};
pub use spec::{EnumOption, FieldKind, ParameterSpec, Visibility};
pub use values::ParameterValues;
