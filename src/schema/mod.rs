//! Schema validation and file templates

pub mod registry;
pub mod template;
pub mod validator;

pub use registry::SchemaRegistry;
pub use template::{TemplateContext, TemplateError, TemplateGenerator};
pub use validator::{SchemaError, Validator};
