//! Certificate rendering
//!
//! [`render`] composes a draft into blocks ([`document`]) and typesets them
//! on A4 pages ([`pdf`], with the custom pieces in [`elements`]). Point
//! grouping and table geometry live in [`layout`].

pub mod assets;
pub mod document;
pub mod elements;
pub mod layout;
pub mod pdf;

pub use assets::{AssetError, AssetKind, Assets, Image};
pub use document::{compose, Block, Document};
pub use pdf::{render, RenderedCertificate};

use thiserror::Error;

use crate::schema::template::TemplateError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the certificate has no calibration points")]
    NoCalibrationPoints,

    #[error("the repipetter has no syringes")]
    NoSyringes,

    #[error("layout error: {0}")]
    Layout(#[from] genpdfi::error::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("invalid file name pattern: {0}")]
    Template(#[from] TemplateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
