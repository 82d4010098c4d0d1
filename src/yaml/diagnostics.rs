//! YAML error diagnostics with source spans

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum YamlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A syntax or shape error located in the source file
#[derive(Debug, Error, Diagnostic)]
#[error("invalid YAML in {filename}: {message}")]
#[diagnostic(
    code(calcert::yaml::syntax),
    help("check indentation and the field names of the draft schema")
)]
pub struct YamlSyntaxError {
    pub filename: String,
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,

    /// 1-based line of the error, when known
    pub line: Option<usize>,
}

impl YamlSyntaxError {
    pub fn from_serde_error(error: &serde_yml::Error, content: &str, filename: &str) -> Self {
        let span = error.location().map(|loc| {
            let offset = loc.index().min(content.len());
            SourceSpan::from((offset, 1usize.min(content.len() - offset)))
        });
        Self {
            filename: filename.to_string(),
            message: error.to_string(),
            src: NamedSource::new(filename, content.to_string()),
            span,
            line: error.location().map(|loc| loc.line()),
        }
    }
}
