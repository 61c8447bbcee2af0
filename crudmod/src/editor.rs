//! Idempotent structural edits.
//!
//! Each mutator detects first and inserts only what is missing, so running
//! it on its own output changes nothing. Every mutator is a function of the
//! tree and its spec; the tree it returns is a new value.

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::anchors;
use crate::error::{CodemodError, Result, SyntaxError};
use crate::operations::{Codemod, DependencySpec, ExportSpec, RouterSpec};
use crate::parser::parse_module;
use crate::syntax::*;
use crate::visitor::{find_assignments, find_call_with_argument, find_function, find_import, find_imports};

/// One node-level edit a mutator made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "snake_case")]
pub enum Change {
    AddedImport(String),
    AddedCall(String),
    AddedFunction(String),
    InsertedManifest(String),
    RewroteManifest(String),
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::AddedImport(source) => write!(f, "added import `{}`", source),
            Change::AddedCall(source) => write!(f, "added call `{}`", source),
            Change::AddedFunction(name) => write!(f, "added function `{}`", name),
            Change::InsertedManifest(name) => write!(f, "inserted `{}`", name),
            Change::RewroteManifest(name) => write!(f, "rewrote `{}`", name),
        }
    }
}

/// Something the user should look at; the edit still went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// More than one top-level assignment to the manifest; only the first
    /// was rewritten.
    AmbiguousManifest { name: String, count: usize },
    /// The manifest is not a standalone list of plain strings and was left
    /// as written.
    UnsupportedManifest { name: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::AmbiguousManifest { name, count } => write!(
                f,
                "{} is assigned {} times at module level; only the first assignment was updated",
                name, count
            ),
            Diagnostic::UnsupportedManifest { name } => write!(
                f,
                "{} is not a plain list of string literals; left unchanged",
                name
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transformed {
    pub module: Module,
    pub changes: Vec<Change>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Transformed {
    fn new(module: Module) -> Self {
        Self {
            module,
            changes: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Result of applying one codemod through a [`PythonEditor`].
#[derive(Debug, Clone, Default)]
pub struct ModificationResult {
    pub changes: Vec<Change>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModificationResult {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A parsed Python file that codemods are applied to in turn.
pub struct PythonEditor {
    module: Module,
}

impl PythonEditor {
    pub fn new(content: &str) -> std::result::Result<Self, SyntaxError> {
        Ok(Self {
            module: parse_module(content)?,
        })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Run `codemod`. On error the editor keeps its previous tree.
    pub fn apply(&mut self, codemod: &Codemod) -> Result<ModificationResult> {
        let transformed = transform(self.module.clone(), codemod)?;
        self.module = transformed.module;
        Ok(ModificationResult {
            changes: transformed.changes,
            diagnostics: transformed.diagnostics,
        })
    }

    pub fn to_string(&self) -> String {
        self.module.code()
    }
}

pub fn transform(module: Module, codemod: &Codemod) -> Result<Transformed> {
    match codemod {
        Codemod::RegisterRouter(spec) => register_router(module, spec),
        Codemod::ProvideRepository(spec) => provide_repository(module, spec),
        Codemod::ExportModel(spec) => export_model(module, spec),
    }
}

fn snippet(module: &Module, text: &str) -> Result<StatementLine> {
    module
        .parse_snippet(text)
        .map_err(|source| CodemodError::Template { source })
}

/// Insert an import right after the last top-level import.
fn insert_import(module: &mut Module, text: &str) -> Result<Change> {
    let statement = snippet(module, text)?;
    let index = anchors::after_last_import(module);
    let change = Change::AddedImport(statement.source.clone());
    anchors::insert_statement(module, index, statement);
    Ok(change)
}

/// Make sure the resource router is imported and included into the app.
///
/// An import of the router under any alias counts. The router counts as
/// registered when the app includes it under the expected alias or under
/// any name an existing import binds, so an aliased import is never
/// duplicated and a registered router is never included twice.
pub fn register_router(module: Module, spec: &RouterSpec) -> Result<Transformed> {
    let mut out = Transformed::new(module);
    let callee = spec.callee();

    let (binding, registered) = {
        let imports: Vec<_> = find_imports(&out.module, &spec.import_path, &spec.import_name).collect();
        let binding = imports
            .iter()
            .find(|import| import.alias_matches(&spec.alias))
            .or(imports.first())
            .map(|import| import.binding().to_string());
        let registered = find_call_with_argument(&out.module, &callee, &spec.alias).is_some()
            || imports
                .iter()
                .any(|import| find_call_with_argument(&out.module, &callee, import.binding()).is_some());
        (binding, registered)
    };

    let binding = match binding {
        Some(binding) => {
            debug!(import = %spec.import_path, %binding, "router import present");
            binding
        }
        None => {
            let text = format!(
                "from {} import {} as {}  # noqa: E402\n",
                spec.import_path, spec.import_name, spec.alias
            );
            out.changes.push(insert_import(&mut out.module, &text)?);
            spec.alias.clone()
        }
    };

    if registered {
        debug!(%callee, %binding, "router already registered");
    } else {
        let statement = snippet(&out.module, &format!("{}({})\n", callee, binding))?;
        out.changes.push(Change::AddedCall(statement.source.clone()));
        out.module.body.push(Node::Statement(statement));
    }

    Ok(out)
}

/// Make sure the repository is imported and a `get_<module>_repository`
/// dependency exists.
///
/// The function goes at the end of the body with at least two blank lines
/// above it; trailing comment and blank lines of the file stay below it.
pub fn provide_repository(module: Module, spec: &DependencySpec) -> Result<Transformed> {
    let mut out = Transformed::new(module);

    if find_import(&out.module, &spec.import_path, &spec.import_name).is_some() {
        debug!(import = %spec.import_path, "repository import present");
    } else {
        let text = format!("from {} import {}\n", spec.import_path, spec.import_name);
        out.changes.push(insert_import(&mut out.module, &text)?);
    }

    if find_function(&out.module, &spec.function_name).is_some() {
        debug!(function = %spec.function_name, "dependency provider present");
    } else {
        let text = format!(
            "def {function}(\n    storage: AbstractSQLAlchemyStorage = Depends(get_storage),\n) -> {repository}:\n    return {repository}(storage)\n",
            function = spec.function_name,
            repository = spec.import_name,
        );
        let statement = snippet(&out.module, &text)?;
        anchors::append_padded(&mut out.module, statement, 2);
        out.changes.push(Change::AddedFunction(spec.function_name.clone()));
    }

    Ok(out)
}

/// Make sure the model is imported and listed in the export manifest, and
/// rewrite the manifest in its canonical one-name-per-line form.
pub fn export_model(module: Module, spec: &ExportSpec) -> Result<Transformed> {
    let mut out = Transformed::new(module);

    if find_import(&out.module, &spec.import_path, &spec.model_name).is_some() {
        debug!(import = %spec.import_path, "model import present");
    } else {
        let text = format!("from {} import {}\n", spec.import_path, spec.model_name);
        out.changes.push(insert_import(&mut out.module, &text)?);
    }

    let (first, count) = {
        let manifests = find_assignments(&out.module, &spec.manifest_name);
        let first = manifests.first().map(|found| {
            (
                found.index,
                found.string_elements().map(<[String]>::to_vec),
                found.assign.annotation.clone(),
            )
        });
        (first, manifests.len())
    };

    if count > 1 {
        let diagnostic = Diagnostic::AmbiguousManifest {
            name: spec.manifest_name.clone(),
            count,
        };
        warn!("{}", diagnostic);
        out.diagnostics.push(diagnostic);
    }

    match first {
        None => {
            let elements = canonical_elements(&[], &spec.sentinel, &spec.model_name);
            let text = render_manifest(&spec.manifest_name, None, &elements);
            let index = anchors::after_last_import(&out.module);
            let leading = (0..anchors::separating_blank_lines(index))
                .map(|_| EmptyLine::blank(out.module.newline))
                .collect();
            let statement = snippet(&out.module, &text)?.with_leading_lines(leading);
            anchors::insert_statement(&mut out.module, index, statement);
            out.changes.push(Change::InsertedManifest(spec.manifest_name.clone()));
        }
        Some((_, None, _)) => {
            let diagnostic = Diagnostic::UnsupportedManifest {
                name: spec.manifest_name.clone(),
            };
            warn!("{}", diagnostic);
            out.diagnostics.push(diagnostic);
        }
        Some((index, Some(existing), annotation)) => {
            let elements = canonical_elements(&existing, &spec.sentinel, &spec.model_name);
            let text = render_manifest(&spec.manifest_name, annotation.as_deref(), &elements);
            let statement = snippet(&out.module, &text)?;
            if let Some(Node::Statement(current)) = out.module.body.get_mut(index) {
                let replacement = StatementLine {
                    leading_lines: anchors::normalize_leading_blank_lines(
                        &current.leading_lines,
                        anchors::separating_blank_lines(index),
                        out.module.newline,
                    ),
                    ending: current.ending,
                    ..statement
                };
                if *current == replacement {
                    debug!(manifest = %spec.manifest_name, "manifest already canonical");
                } else {
                    *current = replacement;
                    out.changes.push(Change::RewroteManifest(spec.manifest_name.clone()));
                }
            }
        }
    }

    Ok(out)
}

/// Existing order, first occurrence wins; sentinel first and model last
/// when they are missing.
fn canonical_elements(existing: &[String], sentinel: &str, model: &str) -> Vec<String> {
    let mut elements: Vec<String> = Vec::with_capacity(existing.len() + 2);
    for element in existing {
        if !elements.contains(element) {
            elements.push(element.clone());
        }
    }
    if !elements.iter().any(|element| element == sentinel) {
        elements.insert(0, sentinel.to_string());
    }
    if !elements.iter().any(|element| element == model) {
        elements.push(model.to_string());
    }
    elements
}

fn render_manifest(name: &str, annotation: Option<&str>, elements: &[String]) -> String {
    let mut text = match annotation {
        Some(annotation) => format!("{}: {} = [\n", name, annotation),
        None => format!("{} = [\n", name),
    };
    for element in elements {
        text.push_str("    ");
        text.push_str(&quote(element));
        text.push_str(",\n");
    }
    text.push_str("]\n");
    text
}

/// Double quotes unless the value itself holds a double quote.
fn quote(value: &str) -> String {
    if value.contains('"') && !value.contains('\'') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}
