//! Calcert: gravimetric calibration certificates
//!
//! Certificate drafts for micropipettes, multichannel pipettes and repipetters
//! live as plain YAML files. Mass readings are converted to volumes with the
//! temperature correction factor, summarised per calibration point and
//! rendered as a PDF certificate.

pub mod cli;
pub mod core;
pub mod entities;
pub mod render;
pub mod schema;
pub mod yaml;
