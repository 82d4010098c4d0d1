//! Draft files on disk
//!
//! Every draft lives in `drafts/CAL-<ULID>.calcert.yaml`. Drafts are referred
//! to on the command line by full id, by a unique id prefix (with or without
//! `CAL-`), by `@N` (the N-th draft of `draft list`) or by file path.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::identity::DraftId;
use crate::core::project::Project;
use crate::entities::draft::CertificateDraft;
use crate::schema::template::{TemplateContext, TemplateGenerator};
use crate::yaml::{parse_yaml_file, YamlError};

/// Suffix of draft files
pub const DRAFT_SUFFIX: &str = ".calcert.yaml";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no draft matches '{0}'")]
    NotFound(String),

    #[error("'{reference}' matches several drafts: {}", .matches.join(", "))]
    Ambiguous {
        reference: String,
        matches: Vec<String>,
    },

    #[error("failed to read draft {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: YamlError,
    },

    #[error("failed to serialize draft: {0}")]
    Serialize(String),

    #[error("{0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A draft together with the file it was read from
#[derive(Debug, Clone)]
pub struct StoredDraft {
    pub path: PathBuf,
    pub draft: CertificateDraft,
}

/// Draft directory of a project
#[derive(Debug, Clone)]
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    pub fn open(project: &Project) -> Self {
        Self {
            dir: project.drafts_dir(),
        }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &DraftId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    /// Draft files, oldest first
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().ends_with(DRAFT_SUFFIX))
            .map(|e| e.into_path())
            .collect();
        // ULIDs sort by creation time
        files.sort();
        files
    }

    /// Every readable draft, oldest first; unreadable files are skipped
    pub fn list(&self) -> Vec<StoredDraft> {
        self.files()
            .into_iter()
            .filter_map(|path| match load(&path) {
                Ok(draft) => Some(StoredDraft { path, draft }),
                Err(e) => {
                    tracing::warn!("skipping {}", e);
                    None
                }
            })
            .collect()
    }

    /// Find the file a reference points to
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, StoreError> {
        let reference = reference.trim();

        if let Some(index) = reference.strip_prefix('@') {
            let n: usize = index
                .parse()
                .map_err(|_| StoreError::NotFound(reference.to_string()))?;
            return n
                .checked_sub(1)
                .and_then(|i| self.files().into_iter().nth(i))
                .ok_or_else(|| StoreError::NotFound(reference.to_string()));
        }

        let as_path = Path::new(reference);
        if reference.ends_with(DRAFT_SUFFIX) && as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let wanted = reference.to_uppercase();
        let wanted = if wanted.starts_with("CAL-") {
            wanted
        } else {
            format!("CAL-{}", wanted)
        };

        let matches: Vec<PathBuf> = self
            .files()
            .into_iter()
            .filter(|path| stem(path).is_some_and(|s| s.starts_with(&wanted)))
            .collect();

        // An exact id wins over longer ids sharing the prefix
        if let Some(exact) = matches.iter().find(|p| stem(p).as_deref() == Some(wanted.as_str())) {
            return Ok(exact.clone());
        }

        match matches.len() {
            0 => Err(StoreError::NotFound(reference.to_string())),
            1 => Ok(matches.into_iter().next().unwrap_or_default()),
            _ => Err(StoreError::Ambiguous {
                reference: reference.to_string(),
                matches: matches.iter().filter_map(|p| stem(p)).collect(),
            }),
        }
    }

    /// Resolve and load a draft
    pub fn get(&self, reference: &str) -> Result<StoredDraft, StoreError> {
        let path = self.resolve(reference)?;
        let draft = load(&path)?;
        Ok(StoredDraft { path, draft })
    }

    /// Write a draft to its canonical file, replacing any previous content
    pub fn save(&self, draft: &CertificateDraft) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&draft.id);
        write(&path, draft)?;
        Ok(path)
    }

    pub fn delete(&self, path: &Path) -> Result<(), StoreError> {
        fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "deleted draft");
        Ok(())
    }
}

/// Read a draft file and restore its derived fields
pub fn load(path: &Path) -> Result<CertificateDraft, StoreError> {
    let mut draft: CertificateDraft =
        parse_yaml_file(path).map_err(|source| StoreError::Load {
            path: path.to_path_buf(),
            source,
        })?;
    draft.normalize();
    tracing::debug!(id = %draft.id, path = %path.display(), "loaded draft");
    Ok(draft)
}

/// Serialize a draft with its commented header
pub fn to_yaml(draft: &CertificateDraft) -> Result<String, StoreError> {
    let body = serde_yml::to_string(draft).map_err(|e| StoreError::Serialize(e.to_string()))?;
    let generator = TemplateGenerator::new().map_err(|e| StoreError::Template(e.to_string()))?;
    generator
        .generate_draft(&TemplateContext::for_draft(draft), &body)
        .map_err(|e| StoreError::Template(e.to_string()))
}

/// Write a draft to an explicit path
pub fn write(path: &Path, draft: &CertificateDraft) -> Result<(), StoreError> {
    let content = to_yaml(draft)?;
    fs::write(path, content)?;
    tracing::debug!(id = %draft.id, path = %path.display(), "saved draft");
    Ok(())
}

fn stem(path: &Path) -> Option<String> {
    path.file_name()?
        .to_str()?
        .strip_suffix(DRAFT_SUFFIX)
        .map(str::to_string)
}
