//! Project discovery and layout
//!
//! A project is any directory holding a `.calcert/` folder:
//!
//! ```text
//! .calcert/config.yaml   project configuration layer
//! drafts/                certificate drafts (CAL-<ULID>.calcert.yaml)
//! certificates/          rendered PDFs
//! assets/                letterhead, signature and footer images
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker directory of a project
pub const PROJECT_DIR: &str = ".calcert";

pub const DRAFTS_DIR: &str = "drafts";
pub const CERTIFICATES_DIR: &str = "certificates";
pub const ASSETS_DIR: &str = "assets";

const CONFIG_TEMPLATE: &str = "\
# Calcert project configuration
# Only the keys set here override the global configuration.

# author: Your Name

# laboratory:
#   name: Laboratório de Calibração
#   short_name: LABORATÓRIO DE CALIBRAÇÃO
#   tax_id: \"CNPJ: 00.000.000/0000-00\"
#   contact: \"Tel: (00) 0000-0000 | e-mail: lab@example.com\"
#   signatory_name: Responsável Técnico
#   signatory_role: Diretor Responsável

# standards_used: |
#   Termohigrômetro Digital ...
#   Balança Analítica ...

# autofill:
#   enabled: true
#   seed: 42

# output:
#   file_name: \"serie. {{ serial }}.pdf\"
";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a calcert project (or any parent): {0}\nRun 'calcert init' to create one")]
    NotFound(PathBuf),

    #[error("project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A discovered or freshly initialized project
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Find the project containing the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Walk up from `start` looking for a `.calcert/` directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        start
            .ancestors()
            .find(|dir| dir.join(PROJECT_DIR).is_dir())
            .map(|root| Self {
                root: root.to_path_buf(),
            })
            .ok_or_else(|| ProjectError::NotFound(start.to_path_buf()))
    }

    /// Create the project layout under `root`
    pub fn init(root: &Path) -> Result<Self, ProjectError> {
        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root.to_path_buf()));
        }
        Self::init_force(root)
    }

    /// Create any missing part of the layout, keeping existing files
    pub fn init_force(root: &Path) -> Result<Self, ProjectError> {
        let project = Self {
            root: root.to_path_buf(),
        };
        fs::create_dir_all(root.join(PROJECT_DIR))?;
        fs::create_dir_all(project.drafts_dir())?;
        fs::create_dir_all(project.certificates_dir())?;
        fs::create_dir_all(project.assets_dir())?;

        let config = project.config_path();
        if !config.exists() {
            fs::write(&config, CONFIG_TEMPLATE)?;
        }
        tracing::info!(root = %root.display(), "initialized project");
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(PROJECT_DIR).join("config.yaml")
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.root.join(DRAFTS_DIR)
    }

    pub fn certificates_dir(&self) -> PathBuf {
        self.root.join(CERTIFICATES_DIR)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        assert!(project.config_path().is_file());
        assert!(project.drafts_dir().is_dir());
        assert!(project.certificates_dir().is_dir());
        assert!(project.assets_dir().is_dir());
    }

    #[test]
    fn test_init_twice_fails() {
        let tmp = TempDir::new().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(matches!(
            Project::init(tmp.path()),
            Err(ProjectError::AlreadyExists(_))
        ));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("drafts/a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = Project::discover_from(&nested).unwrap();
        assert_eq!(found.root(), tmp.path());
    }

    #[test]
    fn test_discover_outside_project() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Project::discover_from(tmp.path()),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_config_template_loads_as_defaults() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let config =
            crate::core::config::Config::load_layers(None, Some(&project.config_path()));
        assert_eq!(
            config.laboratory,
            crate::core::config::Laboratory::default()
        );
    }
}
