//! Template generation for draft files and output file names

use chrono::{DateTime, Utc};
use rust_embed::Embed;
use tera::Tera;
use thiserror::Error;

use crate::core::identity::DraftId;
use crate::entities::draft::CertificateDraft;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const DRAFT_TEMPLATE: &str = "draft.yaml.tera";

/// Context for the draft file header
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub id: DraftId,
    pub author: String,
    pub created: DateTime<Utc>,
}

impl TemplateContext {
    pub fn new(id: DraftId, author: String) -> Self {
        Self {
            id,
            author,
            created: Utc::now(),
        }
    }

    pub fn for_draft(draft: &CertificateDraft) -> Self {
        Self {
            id: draft.id,
            author: draft.author.clone(),
            created: draft.created,
        }
    }
}

/// Template generator using Tera
pub struct TemplateGenerator {
    tera: Tera,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    RenderError(String),
}

impl TemplateGenerator {
    /// Create a new template generator with embedded templates
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                if let Ok(template_str) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(filename, template_str)
                        .map_err(|e| TemplateError::RenderError(e.to_string()))?;
                }
            }
        }

        Ok(Self { tera })
    }

    /// Wrap a serialized draft in its commented file header
    pub fn generate_draft(&self, ctx: &TemplateContext, body: &str) -> Result<String, TemplateError> {
        let mut context = tera::Context::new();
        context.insert("id", &ctx.id.to_string());
        context.insert("author", &ctx.author);
        context.insert("created", &ctx.created.to_rfc3339());
        context.insert("created_date", &ctx.created.format("%Y-%m-%d").to_string());
        context.insert("body", body.trim_end());

        if self.tera.get_template_names().any(|n| n == DRAFT_TEMPLATE) {
            let mut rendered = self
                .tera
                .render(DRAFT_TEMPLATE, &context)
                .map_err(|e| TemplateError::RenderError(e.to_string()))?;
            if !rendered.ends_with('\n') {
                rendered.push('\n');
            }
            Ok(rendered)
        } else {
            Ok(format!(
                "# Calibration certificate draft {}\n\n{}\n",
                ctx.id,
                body.trim_end()
            ))
        }
    }

    /// Render the configured output file name for a draft
    ///
    /// Available variables: `serial`, `model`, `manufacturer`, `number`,
    /// `client`, `date` (YYYY-MM-DD) and `id`. Path separators in the result
    /// are replaced so the name stays inside the output directory.
    pub fn file_name(pattern: &str, draft: &CertificateDraft) -> Result<String, TemplateError> {
        let mut context = tera::Context::new();
        context.insert("serial", &draft.serial_number);
        context.insert("model", &draft.model);
        context.insert("manufacturer", &draft.manufacturer);
        context.insert("number", &draft.certificate_number);
        context.insert("client", &draft.client.name);
        context.insert("date", &draft.calibration_date.format("%Y-%m-%d").to_string());
        context.insert("id", &draft.id.to_string());

        let rendered = Tera::one_off(pattern, &context, false)
            .map_err(|e| TemplateError::RenderError(e.to_string()))?;
        let name: String = rendered
            .trim()
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
            .collect();
        if name.is_empty() {
            return Err(TemplateError::RenderError(format!(
                "file name pattern '{}' produced an empty name",
                pattern
            )));
        }
        Ok(name)
    }
}
