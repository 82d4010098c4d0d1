//! Core module - calibration arithmetic, configuration and storage

pub mod autofill;
pub mod config;
pub mod correction;
pub mod format;
pub mod identity;
pub mod project;
pub mod readings;
pub mod stats;
pub mod store;

pub use autofill::{Autofill, AutofillConfig, Notice};
pub use config::Config;
pub use identity::{DraftId, IdParseError};
pub use project::{Project, ProjectError};
pub use stats::PointStatistics;
pub use store::{DraftStore, StoreError};
