//! Read-only pattern detectors.
//!
//! Every detector is a find-first query over the tree; none of them keeps
//! state between calls or mutates anything.

use crate::syntax::*;

/// Depth-first, source-order walk over every statement of a module,
/// including statements nested in functions, classes and compound blocks.
pub struct Statements<'a> {
    stack: Vec<&'a Statement>,
}

impl<'a> Iterator for Statements<'a> {
    type Item = &'a Statement;

    fn next(&mut self) -> Option<Self::Item> {
        let statement = self.stack.pop()?;
        self.stack.extend(statement.children().iter().rev());
        Some(statement)
    }
}

pub fn walk(module: &Module) -> Statements<'_> {
    let mut stack: Vec<&Statement> = module.statements().map(|line| &line.statement).collect();
    stack.reverse();
    Statements { stack }
}

fn small_statements(module: &Module) -> impl Iterator<Item = &SmallStatement> {
    walk(module).flat_map(Statement::small_statements)
}

/// One `name [as alias]` entry of a matching `from ... import`.
#[derive(Debug, Clone, Copy)]
pub struct ImportMatch<'a> {
    pub import: &'a ImportFrom,
    pub alias: &'a ImportAlias,
}

impl<'a> ImportMatch<'a> {
    /// Name the import makes available in the module namespace.
    pub fn binding(&self) -> &'a str {
        self.alias.bound_name()
    }

    /// True when the alias is absent or equal to `expected`.
    pub fn alias_matches(&self, expected: &str) -> bool {
        match &self.alias.alias {
            None => true,
            Some(alias) => alias == expected,
        }
    }
}

/// Every `from <module_path> import <name>` anywhere in the tree, whatever
/// the alias.
pub fn find_imports<'a>(
    module: &'a Module,
    module_path: &'a str,
    name: &'a str,
) -> impl Iterator<Item = ImportMatch<'a>> + 'a {
    small_statements(module)
        .filter_map(move |small| match small {
            SmallStatement::ImportFrom(import) if import.module == module_path => Some(import),
            _ => None,
        })
        .flat_map(move |import| {
            import
                .names
                .iter()
                .filter(move |alias| alias.name == name)
                .map(move |alias| ImportMatch { import, alias })
        })
}

pub fn find_import<'a>(module: &'a Module, module_path: &'a str, name: &'a str) -> Option<ImportMatch<'a>> {
    find_imports(module, module_path, name).next()
}

/// First free-standing `callee(arg, ...)` call whose first argument is the
/// positional name `arg`.
pub fn find_call_with_argument<'a>(module: &'a Module, callee: &str, arg: &str) -> Option<&'a Call> {
    small_statements(module).find_map(|small| match small {
        SmallStatement::Expr(Expression::Call(call))
            if call.callee.as_deref() == Some(callee)
                && call
                    .args
                    .first()
                    .is_some_and(|first| first.is_positional() && first.name.as_deref() == Some(arg)) =>
        {
            Some(call)
        }
        _ => None,
    })
}

/// First function definition called `name`, methods and nested functions
/// included. Bodies are never looked at.
pub fn find_function<'a>(module: &'a Module, name: &str) -> Option<&'a FunctionDef> {
    walk(module).find_map(|statement| match statement {
        Statement::FunctionDef(function) if function.name == name => Some(function),
        _ => None,
    })
}

/// A top-level assignment to a given name.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentMatch<'a> {
    /// Position in `Module::body`.
    pub index: usize,
    pub assign: &'a Assign,
    /// False when the assignment shares its line with other statements
    /// (`__all__ = []; x = 1`) and cannot be replaced as a whole node.
    pub standalone: bool,
}

impl<'a> AssignmentMatch<'a> {
    pub fn string_elements(&self) -> Option<&'a [String]> {
        match &self.assign.value {
            AssignedValue::StringList(elements) if self.standalone => Some(elements),
            _ => None,
        }
    }
}

/// Top-level assignments to `name`, in source order.
pub fn find_assignments<'a>(module: &'a Module, name: &str) -> Vec<AssignmentMatch<'a>> {
    let mut matches = Vec::new();
    for (index, node) in module.body.iter().enumerate() {
        let Some(Statement::Simple(smalls)) = node.as_statement().map(|line| &line.statement) else {
            continue;
        };
        for small in smalls {
            if let SmallStatement::Assign(assign) = small {
                if assign.target.as_deref() == Some(name) {
                    matches.push(AssignmentMatch {
                        index,
                        assign,
                        standalone: smalls.len() == 1,
                    });
                }
            }
        }
    }
    matches
}
