//! Project conventions: where generated code lives and what the shared
//! names are called.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CodemodError, IoOp, Result};

/// Environment variable naming a config file to use when `--config` is not given.
pub const CONFIG_ENV: &str = "CRUDMOD_CONFIG";

/// Dotted package paths and shared names of the generated project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespaces {
    /// Package holding one `<module>/routes.py` per resource.
    pub routes: String,
    /// Package holding one repository module per resource.
    pub repositories: String,
    /// Package holding one model module per resource.
    pub models: String,
    /// FastAPI application object that routers are included into.
    pub app_name: String,
    /// Export list of the models package.
    pub manifest_name: String,
    /// Name that always heads the export list.
    pub sentinel: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            routes: "src.api".to_string(),
            repositories: "src.db.repositories".to_string(),
            models: "src.db.models".to_string(),
            app_name: "app".to_string(),
            manifest_name: "__all__".to_string(),
            sentinel: "Base".to_string(),
        }
    }
}

impl Namespaces {
    /// Load a config file. `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON with a YAML fallback.
    pub fn load(path: &Path) -> Result<Self> {
        let namespaces: Namespaces = load_structured(path)?;
        namespaces.validate().map_err(|err| CodemodError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(namespaces)
    }

    /// `explicit`, else the file named by `CRUDMOD_CONFIG`, else the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => {
                tracing::debug!(path = ?path, "loading namespaces from {}", CONFIG_ENV);
                Self::load(Path::new(&path))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_dotted("routes namespace", &self.routes)?;
        validate_dotted("repositories namespace", &self.repositories)?;
        validate_dotted("models namespace", &self.models)?;
        validate_identifier("app name", &self.app_name)?;
        validate_identifier("manifest name", &self.manifest_name)?;
        validate_identifier("sentinel", &self.sentinel)?;
        Ok(())
    }
}

/// Conventional file locations inside a generated project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub src_dir: PathBuf,
    /// Overrides `<src>/api/app.py`.
    pub app_file: Option<PathBuf>,
}

impl ProjectLayout {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
            app_file: None,
        }
    }

    pub fn with_app_file(mut self, app_file: Option<PathBuf>) -> Self {
        self.app_file = app_file;
        self
    }

    pub fn app_file(&self) -> PathBuf {
        self.app_file
            .clone()
            .unwrap_or_else(|| self.src_dir.join("api").join("app.py"))
    }

    pub fn dependencies_file(&self) -> PathBuf {
        self.src_dir.join("api").join("repositories").join("dependencies.py")
    }

    pub fn models_init(&self) -> PathBuf {
        self.src_dir.join("db").join("models").join("__init__.py")
    }
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::new("src")
    }
}

/// Read a JSON or YAML document, choosing by extension.
pub(crate) fn load_structured<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| CodemodError::Io {
        path: path.to_path_buf(),
        op: IoOp::Read,
        source,
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if is_yaml {
        serde_yaml::from_str(&content).map_err(|err| err.to_string())
    } else {
        serde_json::from_str(&content)
            .or_else(|_| serde_yaml::from_str(&content))
            .map_err(|err| format!("not valid JSON or YAML: {}", err))
    };
    parsed.map_err(|message| CodemodError::Config {
        path: path.to_path_buf(),
        message,
    })
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield",
];

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !KEYWORDS.contains(&value)
}

pub fn validate_identifier(role: &'static str, value: &str) -> Result<()> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(CodemodError::InvalidIdentifier {
            role,
            value: value.to_string(),
        })
    }
}

/// `a.b.c`, every segment an identifier.
pub fn validate_dotted(role: &'static str, value: &str) -> Result<()> {
    if value.split('.').all(is_identifier) {
        Ok(())
    } else {
        Err(CodemodError::InvalidIdentifier {
            role,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("widget"));
        assert!(is_identifier("_private2"));
        assert!(is_identifier("größe"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("order-item"));
        assert!(!is_identifier("class"));

        assert!(validate_dotted("path", "src.db.models").is_ok());
        assert!(validate_dotted("path", "src..models").is_err());
        assert!(validate_dotted("path", ".models").is_err());
    }

    #[test]
    fn test_partial_yaml_config_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "routes: app.routers\napp_name: api").unwrap();

        let namespaces = Namespaces::load(file.path()).unwrap();
        assert_eq!(namespaces.routes, "app.routers");
        assert_eq!(namespaces.app_name, "api");
        assert_eq!(namespaces.models, "src.db.models");
        assert_eq!(namespaces.sentinel, "Base");
    }

    #[test]
    fn test_json_config_without_extension() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"models": "app.models"}}"#).unwrap();

        let namespaces = Namespaces::load(file.path()).unwrap();
        assert_eq!(namespaces.models, "app.models");
    }

    #[test]
    fn test_invalid_namespace_is_a_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"models": "app models"}}"#).unwrap();

        let err = Namespaces::load(file.path()).unwrap_err();
        assert!(matches!(err, CodemodError::Config { .. }));
        assert!(err.to_string().contains("app models"));
    }

    #[test]
    fn test_project_layout_paths() {
        let layout = ProjectLayout::new("backend/src");
        assert_eq!(layout.app_file(), PathBuf::from("backend/src/api/app.py"));
        assert_eq!(
            layout.dependencies_file(),
            PathBuf::from("backend/src/api/repositories/dependencies.py")
        );
        assert_eq!(layout.models_init(), PathBuf::from("backend/src/db/models/__init__.py"));

        let layout = layout.with_app_file(Some(PathBuf::from("main.py")));
        assert_eq!(layout.app_file(), PathBuf::from("main.py"));
    }
}
