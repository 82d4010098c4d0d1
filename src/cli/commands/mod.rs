//! CLI command implementations

pub mod channel;
pub mod completions;
pub mod compute;
pub mod config;
pub mod draft;
pub mod factor;
pub mod init;
pub mod parse;
pub mod point;
pub mod render;
pub mod syringe;
pub mod validate;
