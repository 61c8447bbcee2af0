//! Read, edit, compare, write back.

use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Namespaces, ProjectLayout};
use crate::editor::{Change, Diagnostic, PythonEditor};
use crate::error::{CodemodError, IoOp, Result};
use crate::operations::{BatchSpec, Codemod, DependencySpec, ExportSpec, RouterSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Apply,
    /// Compute the outcome without touching the file.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Unchanged,
    Modified,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Whether the new content was written to disk.
    pub written: bool,
    pub codemods: Vec<&'static str>,
    pub changes: Vec<Change>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    pub original: String,
    #[serde(skip)]
    pub updated: String,
}

impl FileOutcome {
    pub fn is_modified(&self) -> bool {
        self.status == FileStatus::Modified
    }
}

/// Per-file results in processing order. One file failing never hides the
/// outcome of another.
pub type FileResults = Vec<(PathBuf, Result<FileOutcome>)>;

pub fn apply_to_file(path: &Path, codemod: &Codemod, mode: WriteMode) -> Result<FileOutcome> {
    apply_all_to_file(path, std::slice::from_ref(codemod), mode)
}

/// Apply `codemods` in order to one file. Everything is computed in memory
/// first; the file is written at most once, and only if its text changed.
pub fn apply_all_to_file(path: &Path, codemods: &[Codemod], mode: WriteMode) -> Result<FileOutcome> {
    let original = fs::read_to_string(path).map_err(|source| CodemodError::Io {
        path: path.to_path_buf(),
        op: IoOp::Read,
        source,
    })?;

    let mut editor = PythonEditor::new(&original).map_err(|source| CodemodError::Syntax {
        path: path.to_path_buf(),
        source,
    })?;

    let mut changes = Vec::new();
    let mut diagnostics = Vec::new();
    for codemod in codemods {
        debug!(path = %path.display(), codemod = %codemod, "applying");
        let result = editor.apply(codemod)?;
        changes.extend(result.changes);
        diagnostics.extend(result.diagnostics);
    }

    let updated = editor.to_string();
    let status = if updated == original {
        FileStatus::Unchanged
    } else {
        FileStatus::Modified
    };

    let written = status == FileStatus::Modified && mode == WriteMode::Apply;
    if written {
        write_atomic(path, &updated).map_err(|source| CodemodError::Io {
            path: path.to_path_buf(),
            op: IoOp::Write,
            source,
        })?;
        info!(path = %path.display(), changes = changes.len(), "file updated");
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        status,
        written,
        codemods: codemods.iter().map(Codemod::name).collect(),
        changes,
        diagnostics,
        original,
        updated,
    })
}

/// Parse only; used by `check`.
pub fn check_file(path: &Path) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|source| CodemodError::Io {
        path: path.to_path_buf(),
        op: IoOp::Read,
        source,
    })?;
    PythonEditor::new(&content).map_err(|source| CodemodError::Syntax {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write through a temporary file in the same directory and rename it over
/// the target, keeping the target's permissions.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{}.crudmod.tmp", file_name));

    let result = write_and_rename(path, &temp_path, content);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(path: &Path, temp_path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp_path, metadata.permissions())?;
    }
    fs::rename(temp_path, path)
}

#[derive(Debug, Clone)]
pub struct RegisterOptions {
    /// Overrides the configured application object name.
    pub app_name: Option<String>,
    /// Include the router into the app and provide the repository
    /// dependency. The model export runs either way.
    pub register: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            app_name: None,
            register: true,
        }
    }
}

/// Wire a newly generated resource into an existing project: include its
/// router into the app, provide its repository dependency and export its
/// model. The dependency and models files are only edited when they exist;
/// without `register` only the model is exported.
///
/// Names are validated before any file is read.
pub fn register_resource(
    layout: &ProjectLayout,
    module: &str,
    model: &str,
    namespaces: &Namespaces,
    options: &RegisterOptions,
    mode: WriteMode,
) -> Result<FileResults> {
    let mut plan: Vec<(PathBuf, Codemod)> = Vec::new();

    if options.register {
        let spec = RouterSpec::new(module, namespaces)?;
        let spec = match &options.app_name {
            Some(app_name) => spec.with_app_name(app_name)?,
            None => spec,
        };
        plan.push((layout.app_file(), Codemod::RegisterRouter(spec)));

        let dependencies = layout.dependencies_file();
        let spec = DependencySpec::new(module, model, namespaces)?;
        if dependencies.exists() {
            plan.push((dependencies, Codemod::ProvideRepository(spec)));
        } else {
            info!(path = %dependencies.display(), "no dependencies module, skipping repository provider");
        }
    }

    let models_init = layout.models_init();
    let spec = ExportSpec::new(module, model, namespaces)?;
    if models_init.exists() {
        plan.push((models_init, Codemod::ExportModel(spec)));
    } else {
        info!(path = %models_init.display(), "no models package init, skipping export");
    }

    Ok(plan
        .into_iter()
        .map(|(path, codemod)| {
            let outcome = apply_to_file(&path, &codemod, mode);
            (path, outcome)
        })
        .collect())
}

/// Run a batch file. Operations on the same file are applied together, in
/// the order they are listed, and the file is written once.
pub fn run_batch(batch: &BatchSpec, namespaces: &Namespaces, mode: WriteMode) -> FileResults {
    let namespaces = batch.namespaces.as_ref().unwrap_or(namespaces);

    let mut files: Vec<(PathBuf, Result<Vec<Codemod>>)> = Vec::new();
    for operation in &batch.operations {
        let path = batch.base_path.join(operation.file());
        let index = match files.iter().position(|(existing, _)| *existing == path) {
            Some(index) => index,
            None => {
                files.push((path, Ok(Vec::new())));
                files.len() - 1
            }
        };
        let slot = &mut files[index].1;
        if slot.is_ok() {
            match operation.resolve(namespaces) {
                Ok(codemod) => {
                    if let Ok(codemods) = slot {
                        codemods.push(codemod);
                    }
                }
                Err(err) => *slot = Err(err),
            }
        }
    }

    files
        .into_iter()
        .map(|(path, codemods)| {
            let outcome = codemods.and_then(|codemods| apply_all_to_file(&path, &codemods, mode));
            (path, outcome)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Operation;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn router_codemod(module: &str) -> Codemod {
        Codemod::RegisterRouter(RouterSpec::new(module, &Namespaces::default()).unwrap())
    }

    fn write(dir: &TempDir, relative: &str, content: &str) -> PathBuf {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_apply_writes_and_second_run_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.py", "app = FastAPI()\n");

        let outcome = apply_to_file(&path, &router_codemod("widget"), WriteMode::Apply).unwrap();
        assert!(outcome.is_modified());
        assert!(outcome.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), outcome.updated);

        let again = apply_to_file(&path, &router_codemod("widget"), WriteMode::Apply).unwrap();
        assert_eq!(again.status, FileStatus::Unchanged);
        assert!(!again.written);
        assert!(again.changes.is_empty());
    }

    #[test]
    fn test_dry_run_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.py", "app = FastAPI()\n");

        let outcome = apply_to_file(&path, &router_codemod("widget"), WriteMode::DryRun).unwrap();
        assert!(outcome.is_modified());
        assert!(!outcome.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "app = FastAPI()\n");
    }

    #[test]
    fn test_syntax_error_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let broken = "def broken(:\n    pass\n";
        let path = write(&dir, "app.py", broken);

        let err = apply_to_file(&path, &router_codemod("widget"), WriteMode::Apply).unwrap_err();
        assert!(matches!(err, CodemodError::Syntax { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);
        assert!(check_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = apply_to_file(&dir.path().join("nope.py"), &router_codemod("widget"), WriteMode::Apply)
            .unwrap_err();
        assert!(matches!(err, CodemodError::Io { op: IoOp::Read, .. }));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.py", "x = 1\n");
        write_atomic(&path, "x = 2\n").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("app.py")]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = 2\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.py", "x = 1\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&path, "x = 2\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_register_resource_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        let app = write(&dir, "src/api/app.py", "from fastapi import FastAPI\n\napp = FastAPI()\n");
        let models = write(&dir, "src/db/models/__init__.py", "from src.db.base import Base\n");

        let layout = ProjectLayout::new(dir.path().join("src"));
        let results = register_resource(
            &layout,
            "widget",
            "Widget",
            &Namespaces::default(),
            &RegisterOptions::default(),
            WriteMode::Apply,
        )
        .unwrap();

        let paths: Vec<&PathBuf> = results.iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec![&app, &models]);
        assert!(results.iter().all(|(_, outcome)| outcome.as_ref().unwrap().is_modified()));
        assert!(fs::read_to_string(&models).unwrap().contains("    \"Widget\",\n"));
    }

    #[test]
    fn test_register_resource_validates_before_reading() {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path().join("src"));
        let err = register_resource(
            &layout,
            "widget",
            "not a model",
            &Namespaces::default(),
            &RegisterOptions::default(),
            WriteMode::Apply,
        )
        .unwrap_err();
        assert!(matches!(err, CodemodError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_batch_groups_by_file_and_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let app = write(&dir, "app.py", "app = FastAPI()\n");
        write(&dir, "broken.py", "if :\n");

        let batch = BatchSpec {
            base_path: dir.path().to_path_buf(),
            namespaces: None,
            operations: vec![
                Operation::RegisterRouter {
                    file: "broken.py".into(),
                    module: "widget".into(),
                    app_name: None,
                },
                Operation::RegisterRouter {
                    file: "app.py".into(),
                    module: "widget".into(),
                    app_name: None,
                },
                Operation::RegisterRouter {
                    file: "app.py".into(),
                    module: "order".into(),
                    app_name: None,
                },
            ],
        };

        let results = run_batch(&batch, &Namespaces::default(), WriteMode::Apply);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].1, Err(CodemodError::Syntax { .. })));

        let outcome = results[1].1.as_ref().unwrap();
        assert_eq!(outcome.codemods, vec!["register-router", "register-router"]);
        assert_eq!(outcome.changes.len(), 4);
        let written = fs::read_to_string(&app).unwrap();
        assert!(written.ends_with("app.include_router(widget_router)\napp.include_router(order_router)\n"));
    }
}
