//! Draft validation: JSON schema plus consistency checks

use miette::Diagnostic;
use std::collections::HashSet;
use thiserror::Error;

use crate::entities::draft::{CertificateDraft, Equipment, Instrument};
use crate::schema::registry::{SchemaRegistry, DRAFT_SCHEMA};
use crate::yaml::diagnostics::YamlSyntaxError;

/// One schema violation
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// JSON pointer of the offending value ("/equipment/points/0/id")
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("schema '{0}' is not embedded in this build")]
    Missing(String),

    #[error("schema '{name}' is invalid: {message}")]
    InvalidSchema { name: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlSyntaxError),

    #[error("{filename} does not match the draft schema ({} violation(s))", .violations.len())]
    #[diagnostic(
        code(calcert::schema::violation),
        help("compare the file with a draft created by 'calcert draft new'")
    )]
    Violations {
        filename: String,
        violations: Vec<Violation>,
    },
}

impl SchemaError {
    pub fn violation_count(&self) -> usize {
        match self {
            SchemaError::Violations { violations, .. } => violations.len(),
            _ => 1,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            SchemaError::Violations { violations, .. } => violations,
            _ => &[],
        }
    }
}

/// Validates draft files against the embedded schema
pub struct Validator {
    draft: jsonschema::Validator,
}

impl Validator {
    pub fn new(registry: &SchemaRegistry) -> Result<Self, SchemaError> {
        let source = registry
            .get(DRAFT_SCHEMA)
            .ok_or_else(|| SchemaError::Missing(DRAFT_SCHEMA.to_string()))?;
        let invalid = |message: String| SchemaError::InvalidSchema {
            name: DRAFT_SCHEMA.to_string(),
            message,
        };
        let schema: serde_json::Value =
            serde_json::from_str(source).map_err(|e| invalid(e.to_string()))?;
        let draft = jsonschema::validator_for(&schema).map_err(|e| invalid(e.to_string()))?;
        Ok(Self { draft })
    }

    /// Validate the YAML text of a draft file
    pub fn validate(&self, content: &str, filename: &str) -> Result<(), SchemaError> {
        let instance: serde_json::Value = serde_yml::from_str(content)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, content, filename))?;

        let violations: Vec<Violation> = self
            .draft
            .iter_errors(&instance)
            .map(|error| {
                let path = error.instance_path.to_string();
                Violation {
                    path: if path.is_empty() { "/".to_string() } else { path },
                    message: error.to_string(),
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violations {
                filename: filename.to_string(),
                violations,
            })
        }
    }
}

/// Consistency warnings the schema cannot express
pub fn check_draft(draft: &CertificateDraft) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for point in draft.equipment.points() {
        if !seen.insert(point.id) {
            warnings.push(format!("point id {} is used more than once", point.id));
        }
    }

    match &draft.equipment {
        Equipment::Micropipette {
            instrument:
                Instrument::Multichannel {
                    points_per_channel,
                    points,
                    ..
                },
            ..
        } => {
            for channel in draft.equipment.channels() {
                let count = points.iter().filter(|p| p.channel == Some(channel)).count();
                if count != *points_per_channel as usize {
                    warnings.push(format!(
                        "channel {} has {} point(s), expected {}",
                        channel, count, points_per_channel
                    ));
                }
            }
            if points.iter().any(|p| p.channel.is_none()) {
                warnings.push("multichannel point without a channel number".to_string());
            }
        }
        Equipment::Repipetter { syringes } => {
            if syringes.is_empty() {
                warnings.push("repipetter has no syringes".to_string());
            }
            for syringe in syringes {
                if syringe.nominal_volume.is_none() {
                    warnings.push(format!("syringe {} has no nominal volume", syringe.id));
                }
            }
        }
        _ => {}
    }

    for point in draft.equipment.points() {
        if point.nominal_volume.is_none() && point.valid_count() > 0 {
            warnings.push(format!("point {} has readings but no nominal volume", point.id));
        }
    }

    warnings
}
