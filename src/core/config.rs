//! Layered configuration
//!
//! Values are merged in this order, later layers winning:
//!
//! 1. built-in defaults
//! 2. global file `<config_dir>/calcert/config.yaml`
//! 3. project file `.calcert/config.yaml`
//! 4. environment (`CALCERT_AUTHOR`, `CALCERT_SEED`)
//!
//! Files only need the keys they override; nested sections merge key by key.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_yml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::autofill::AutofillConfig;
use crate::core::project::Project;

/// Overrides the global configuration directory
pub const CONFIG_DIR_ENV: &str = "CALCERT_CONFIG_DIR";

/// Default text of the "Padrões Utilizados" section
pub const DEFAULT_STANDARDS: &str = "Termohigrômetro Digital HT600 Instrutherm, Certificado RBC Nº CAL – A 15694/25 , (Validade 08/2026).\n\
Balança Analítica Metter Toledo SAG250, Certificado RBC Nº CAL – A 15695/25, (Validade 08/2026).";

/// Default output file name pattern (Tera syntax)
pub const DEFAULT_FILE_NAME: &str = "serie. {{ serial }}.pdf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("'{0}' is not a configuration section")]
    NotASection(String),
}

/// Laboratory identity printed on every certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Laboratory {
    /// Full legal name, header fallback when there is no letterhead image
    pub name: String,

    /// Name used in the certificate title
    pub short_name: String,

    /// Tax registration line ("CNPJ: ...")
    pub tax_id: String,

    /// Phone / e-mail line
    pub contact: String,

    pub signatory_name: String,
    pub signatory_role: String,
}

impl Default for Laboratory {
    fn default() -> Self {
        Self {
            name: "Laboratório de Calibração".to_string(),
            short_name: "LABORATÓRIO DE CALIBRAÇÃO".to_string(),
            tax_id: String::new(),
            contact: String::new(),
            signatory_name: "Responsável Técnico".to_string(),
            signatory_role: "Diretor Responsável".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directories searched for letterhead, signature and footer images.
    /// Relative entries are resolved against the project root.
    pub search_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where `render` writes certificates; the project's `certificates/` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Tera pattern for the file name. Variables: serial, number, id, model,
    /// manufacturer, client
    pub file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,

    /// Program used by `render --preview`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,

    pub laboratory: Laboratory,

    /// Free text embedded verbatim under "Padrões Utilizados"
    pub standards_used: String,

    pub assets: AssetsConfig,
    pub autofill: AutofillConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            author: None,
            editor: None,
            viewer: None,
            laboratory: Laboratory::default(),
            standards_used: DEFAULT_STANDARDS.to_string(),
            assets: AssetsConfig::default(),
            autofill: AutofillConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load the effective configuration for the current directory
    ///
    /// Broken files are reported with a warning and skipped.
    pub fn load() -> Self {
        let project_file = Project::discover().ok().map(|p| p.config_path());
        Self::load_layers(global_path().as_deref(), project_file.as_deref())
    }

    /// Load defaults plus the given files, then apply the environment
    pub fn load_layers(global: Option<&Path>, project: Option<&Path>) -> Self {
        let mut merged = match serde_yml::to_value(Config::default()) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("failed to serialize default configuration: {}", e);
                return Config::default();
            }
        };

        for path in [global, project].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            match read_layer(path) {
                Ok(layer) => {
                    tracing::debug!(path = %path.display(), "loaded config layer");
                    merge_values(&mut merged, layer);
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let mut config: Config = match serde_yml::from_value(merged) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("configuration ignored: {}", e);
                Config::default()
            }
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(author) = std::env::var("CALCERT_AUTHOR") {
            if !author.trim().is_empty() {
                self.author = Some(author);
            }
        }
        if let Ok(seed) = std::env::var("CALCERT_SEED") {
            match seed.trim().parse::<u64>() {
                Ok(seed) => self.autofill.seed = Some(seed),
                Err(_) => tracing::warn!("CALCERT_SEED is not an unsigned integer: {}", seed),
            }
        }
    }

    /// Author recorded in new drafts
    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Editor used by `draft edit`
    pub fn editor(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .unwrap_or_else(|| {
                if cfg!(windows) {
                    "notepad".to_string()
                } else {
                    "vi".to_string()
                }
            })
    }

    /// PDF viewer used by `render --preview`
    pub fn viewer(&self) -> String {
        self.viewer.clone().unwrap_or_else(|| {
            if cfg!(target_os = "macos") {
                "open".to_string()
            } else if cfg!(windows) {
                "explorer".to_string()
            } else {
                "xdg-open".to_string()
            }
        })
    }
}

/// Location of the global configuration file
pub fn global_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir).join("config.yaml"));
    }
    ProjectDirs::from("", "", "calcert").map(|dirs| dirs.config_dir().join("config.yaml"))
}

fn read_layer(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let blank = content.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    });
    if blank {
        return Ok(Value::Null);
    }
    serde_yml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep-merge `overlay` into `base`; mappings merge, everything else replaces
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Set a dotted key (`laboratory.name`) in a YAML file, creating it if needed
pub fn set_value(path: &Path, key: &str, value: Value) -> Result<(), ConfigError> {
    let mut root = if path.exists() {
        read_layer(path)?
    } else {
        Value::Null
    };
    if !matches!(root, Value::Mapping(_)) {
        root = Value::Mapping(Default::default());
    }

    let parts: Vec<&str> = key.split('.').collect();
    let mut node = &mut root;
    for (i, part) in parts.iter().enumerate() {
        let Value::Mapping(map) = node else {
            return Err(ConfigError::NotASection(parts[..i].join(".")));
        };
        let k = Value::String(part.to_string());
        if i == parts.len() - 1 {
            map.insert(k, value);
            break;
        }
        if !map.contains_key(&k) {
            map.insert(k.clone(), Value::Mapping(Default::default()));
        }
        node = match map.get_mut(&k) {
            Some(next) => next,
            None => return Err(ConfigError::NotASection(part.to_string())),
        };
    }

    let content = serde_yml::to_string(&root).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output.file_name, DEFAULT_FILE_NAME);
        assert!(config.standards_used.contains("HT600"));
        assert!(config.standards_used.contains("SAG250"));
        assert_eq!(config.autofill.completion_trigger, 5);
    }

    #[test]
    fn test_layers_merge_per_key() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.yaml");
        let project = tmp.path().join("project.yaml");
        fs::write(
            &global,
            "author: Ana\nlaboratory:\n  name: Lab Global\n  short_name: GLOBAL\n",
        )
        .unwrap();
        fs::write(&project, "laboratory:\n  short_name: LOCAL\nautofill:\n  seed: 9\n").unwrap();

        let config = Config::load_layers(Some(&global), Some(&project));
        assert_eq!(config.laboratory.name, "Lab Global");
        assert_eq!(config.laboratory.short_name, "LOCAL");
        assert_eq!(config.autofill.seed, Some(9));
        assert_eq!(config.autofill.max_attempts, 50);
        assert_eq!(config.output.file_name, DEFAULT_FILE_NAME);
    }

    #[test]
    fn test_broken_layer_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project.yaml");
        fs::write(&project, "laboratory: [unclosed").unwrap();
        let config = Config::load_layers(None, Some(&project));
        assert_eq!(config.laboratory, Laboratory::default());
    }

    #[test]
    fn test_empty_layer_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project.yaml");
        fs::write(&project, "").unwrap();
        let config = Config::load_layers(None, Some(&project));
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_set_value_creates_nested_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sub/config.yaml");
        set_value(&path, "laboratory.name", Value::String("Lab X".into())).unwrap();
        set_value(&path, "standards_used", Value::String("Balança".into())).unwrap();

        let config = Config::load_layers(None, Some(&path));
        assert_eq!(config.laboratory.name, "Lab X");
        assert_eq!(config.standards_used, "Balança");
    }

    #[test]
    fn test_set_value_rejects_scalar_parent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "author: Ana\n").unwrap();
        let result = set_value(&path, "author.name", Value::String("x".into()));
        assert!(matches!(result, Err(ConfigError::NotASection(_))));
    }
}
