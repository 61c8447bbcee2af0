use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{validate_identifier, Namespaces};
use crate::error::{CodemodError, Result};

/// Include a resource router into the FastAPI application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSpec {
    pub module_name: String,
    pub app_name: String,
    pub import_path: String,
    pub import_name: String,
    pub alias: String,
}

impl RouterSpec {
    pub fn new(module_name: &str, namespaces: &Namespaces) -> Result<Self> {
        validate_identifier("module name", module_name)?;
        Ok(Self {
            module_name: module_name.to_string(),
            app_name: namespaces.app_name.clone(),
            import_path: format!("{}.{}.routes", namespaces.routes, module_name),
            import_name: "router".to_string(),
            alias: format!("{}_router", module_name),
        })
    }

    pub fn with_app_name(mut self, app_name: &str) -> Result<Self> {
        validate_identifier("app name", app_name)?;
        self.app_name = app_name.to_string();
        Ok(self)
    }

    /// `app.include_router`
    pub fn callee(&self) -> String {
        format!("{}.include_router", self.app_name)
    }
}

/// Provide a `get_<module>_repository` FastAPI dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub module_name: String,
    pub model_name: String,
    pub import_path: String,
    pub import_name: String,
    pub function_name: String,
}

impl DependencySpec {
    pub fn new(module_name: &str, model_name: &str, namespaces: &Namespaces) -> Result<Self> {
        validate_identifier("module name", module_name)?;
        validate_identifier("model name", model_name)?;
        Ok(Self {
            module_name: module_name.to_string(),
            model_name: model_name.to_string(),
            import_path: format!("{}.{}", namespaces.repositories, module_name),
            import_name: format!("{}Repository", model_name),
            function_name: format!("get_{}_repository", module_name),
        })
    }
}

/// Re-export a model from the models package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSpec {
    pub module_name: String,
    pub model_name: String,
    pub import_path: String,
    pub manifest_name: String,
    pub sentinel: String,
}

impl ExportSpec {
    pub fn new(module_name: &str, model_name: &str, namespaces: &Namespaces) -> Result<Self> {
        validate_identifier("module name", module_name)?;
        validate_identifier("model name", model_name)?;
        Ok(Self {
            module_name: module_name.to_string(),
            model_name: model_name.to_string(),
            import_path: format!("{}.{}", namespaces.models, module_name),
            manifest_name: namespaces.manifest_name.clone(),
            sentinel: namespaces.sentinel.clone(),
        })
    }
}

/// A fully resolved edit for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Codemod {
    RegisterRouter(RouterSpec),
    ProvideRepository(DependencySpec),
    ExportModel(ExportSpec),
}

impl Codemod {
    pub fn name(&self) -> &'static str {
        match self {
            Codemod::RegisterRouter(_) => "register-router",
            Codemod::ProvideRepository(_) => "add-dependency",
            Codemod::ExportModel(_) => "export-model",
        }
    }
}

impl fmt::Display for Codemod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codemod::RegisterRouter(spec) => write!(f, "register router for '{}'", spec.module_name),
            Codemod::ProvideRepository(spec) => {
                write!(f, "provide {} for '{}'", spec.function_name, spec.module_name)
            }
            Codemod::ExportModel(spec) => write!(f, "export {} from {}", spec.model_name, spec.import_path),
        }
    }
}

/// One entry of a batch file, as a user writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    RegisterRouter {
        file: PathBuf,
        module: String,
        #[serde(default)]
        app_name: Option<String>,
    },
    AddDependency {
        file: PathBuf,
        module: String,
        model: String,
    },
    ExportModel {
        file: PathBuf,
        module: String,
        model: String,
    },
}

impl Operation {
    pub fn file(&self) -> &Path {
        match self {
            Operation::RegisterRouter { file, .. }
            | Operation::AddDependency { file, .. }
            | Operation::ExportModel { file, .. } => file.as_path(),
        }
    }

    /// Derive the full codemod; names are validated here, before any file
    /// is read.
    pub fn resolve(&self, namespaces: &Namespaces) -> Result<Codemod> {
        match self {
            Operation::RegisterRouter { module, app_name, .. } => {
                let spec = RouterSpec::new(module, namespaces)?;
                let spec = match app_name {
                    Some(app_name) => spec.with_app_name(app_name)?,
                    None => spec,
                };
                Ok(Codemod::RegisterRouter(spec))
            }
            Operation::AddDependency { module, model, .. } => {
                Ok(Codemod::ProvideRepository(DependencySpec::new(module, model, namespaces)?))
            }
            Operation::ExportModel { module, model, .. } => {
                Ok(Codemod::ExportModel(ExportSpec::new(module, model, namespaces)?))
            }
        }
    }
}

/// A list of operations, files relative to `base_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSpec {
    #[serde(default)]
    pub base_path: PathBuf,
    #[serde(default)]
    pub namespaces: Option<Namespaces>,
    pub operations: Vec<Operation>,
}

impl BatchSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let batch: BatchSpec = crate::config::load_structured(path)?;
        if let Some(namespaces) = &batch.namespaces {
            namespaces.validate().map_err(|err| CodemodError::Config {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_spec_names() {
        let spec = RouterSpec::new("widget", &Namespaces::default()).unwrap();
        assert_eq!(spec.import_path, "src.api.widget.routes");
        assert_eq!(spec.import_name, "router");
        assert_eq!(spec.alias, "widget_router");
        assert_eq!(spec.callee(), "app.include_router");

        let spec = spec.with_app_name("api").unwrap();
        assert_eq!(spec.callee(), "api.include_router");
    }

    #[test]
    fn test_dependency_and_export_spec_names() {
        let namespaces = Namespaces::default();

        let spec = DependencySpec::new("order_item", "OrderItem", &namespaces).unwrap();
        assert_eq!(spec.import_path, "src.db.repositories.order_item");
        assert_eq!(spec.import_name, "OrderItemRepository");
        assert_eq!(spec.function_name, "get_order_item_repository");

        let spec = ExportSpec::new("invoice", "Invoice", &namespaces).unwrap();
        assert_eq!(spec.import_path, "src.db.models.invoice");
        assert_eq!(spec.manifest_name, "__all__");
        assert_eq!(spec.sentinel, "Base");
    }

    #[test]
    fn test_rejects_non_identifiers() {
        let err = RouterSpec::new("order-item", &Namespaces::default()).unwrap_err();
        assert!(matches!(err, CodemodError::InvalidIdentifier { role: "module name", .. }));

        let err = ExportSpec::new("invoice", "Invoice Line", &Namespaces::default()).unwrap_err();
        assert!(matches!(err, CodemodError::InvalidIdentifier { role: "model name", .. }));
    }

    #[test]
    fn test_batch_operations_deserialize_from_yaml() {
        let yaml = r#"
base_path: backend
operations:
  - type: RegisterRouter
    file: src/api/app.py
    module: widget
  - type: ExportModel
    file: src/db/models/__init__.py
    module: widget
    model: Widget
"#;
        let batch: BatchSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(batch.base_path, PathBuf::from("backend"));
        assert!(batch.namespaces.is_none());
        assert_eq!(batch.operations.len(), 2);
        assert_eq!(batch.operations[1].file(), Path::new("src/db/models/__init__.py"));

        let codemod = batch.operations[0].resolve(&Namespaces::default()).unwrap();
        assert_eq!(codemod.name(), "register-router");
    }
}
