//! Python source → [`Module`].
//!
//! tree-sitter decides what is valid Python and where statements start and
//! end; the trivia and the exact text are cut out of the source by line, so
//! nothing tree-sitter treats as an extra (comments, blank lines, line
//! continuations) can get lost.

use tree_sitter::{Node as TsNode, Parser, Tree};

use crate::error::SyntaxError;
use crate::syntax::*;

/// Parse a whole module. Any ERROR or MISSING node is a hard failure.
pub fn parse_module(source: &str) -> Result<Module, SyntaxError> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(describe_error(root, source));
    }
    validate(root, source)?;

    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let groups = group_top_level(root);
    Ok(assemble(source, &lines, &groups))
}

/// Parse a snippet that must hold exactly one statement, with the same
/// grammar and printer as [`parse_module`].
pub fn parse_statement(snippet: &str) -> Result<StatementLine, SyntaxError> {
    let module = parse_module(snippet)?;
    let trivia = module.header.len() + module.footer.len();
    let mut statements: Vec<StatementLine> = module
        .body
        .into_iter()
        .filter_map(|node| match node {
            Node::Statement(line) => Some(line),
            Node::EmptyLine(_) => None,
        })
        .collect();

    if statements.len() != 1 || trivia != 0 {
        return Err(SyntaxError::new(
            1,
            1,
            format!(
                "expected exactly one statement without surrounding trivia, found {} statement(s)",
                statements.len()
            ),
        ));
    }
    Ok(statements.remove(0))
}

impl Module {
    /// Parse a generated snippet using this module's newline convention.
    pub fn parse_snippet(&self, snippet: &str) -> Result<StatementLine, SyntaxError> {
        match self.newline {
            LineEnding::CrLf => parse_statement(&snippet.replace('\n', "\r\n")),
            _ => parse_statement(snippet),
        }
    }
}

fn parse_tree(source: &str) -> Result<Tree, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| SyntaxError::new(1, 1, format!("failed to load the Python grammar: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| SyntaxError::new(1, 1, "parser returned no tree"))
}

fn describe_error(root: TsNode, source: &str) -> SyntaxError {
    let Some(node) = first_error(root) else {
        return SyntaxError::new(1, 1, "invalid syntax");
    };
    let pos = node.start_position();
    let message = if node.is_missing() {
        format!("missing {}", node.kind())
    } else {
        let text = text(node, source);
        let snippet: String = text.lines().next().unwrap_or("").chars().take(40).collect();
        if snippet.trim().is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near `{}`", snippet.trim())
        }
    };
    SyntaxError::new(pos.row + 1, pos.column + 1, message)
}

fn first_error<'t>(node: TsNode<'t>) -> Option<TsNode<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<TsNode> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Reject what the grammar accepts but Python 3 does not: Python 2
/// statements, backticks, and indentation its scanner tolerates.
fn validate(root: TsNode, source: &str) -> Result<(), SyntaxError> {
    for child in named_children(root) {
        if indentation(child, source).is_some_and(|indent| !indent.is_empty()) {
            return Err(error_at(child, source, "unexpected indent"));
        }
    }

    let mut literals: Vec<std::ops::Range<usize>> = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "print_statement" => {
                return Err(error_at(node, source, "missing parentheses in call to 'print'"));
            }
            "exec_statement" => {
                return Err(error_at(node, source, "missing parentheses in call to 'exec'"));
            }
            "chevron" => return Err(error_at(node, source, "'>>' redirection is Python 2 syntax")),
            "binary_operator" if is_print_redirect(node, source) => {
                return Err(error_at(node, source, "'>>' redirection is Python 2 syntax"));
            }
            "string" | "comment" => {
                literals.push(node.byte_range());
                continue;
            }
            "block" => check_block_indentation(node, source)?,
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<TsNode> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    let backtick = source
        .match_indices('`')
        .map(|(offset, _)| offset)
        .find(|offset| !literals.iter().any(|range| range.contains(offset)));
    match backtick {
        Some(offset) => {
            let (line, column) = position(source, offset);
            Err(SyntaxError::new(line, column, "backticks are Python 2 syntax"))
        }
        None => Ok(()),
    }
}

/// `print >>stream, ...` read as a shift expression.
fn is_print_redirect(node: TsNode, source: &str) -> bool {
    let left = node.child_by_field_name("left");
    let operator = node.child_by_field_name("operator");
    matches!(
        (left, operator),
        (Some(left), Some(operator)) if text(left, source) == "print" && operator.kind() == ">>"
    )
}

/// Every statement of a block that starts its own line must be indented
/// the same way.
fn check_block_indentation(block: TsNode, source: &str) -> Result<(), SyntaxError> {
    let mut expected: Option<&str> = None;
    for child in named_children(block) {
        if child.kind() == "line_continuation" {
            continue;
        }
        let Some(indent) = indentation(child, source) else {
            continue;
        };
        match expected {
            None => expected = Some(indent),
            Some(first) if first == indent => {}
            Some(first) if indent.len() < first.len() => {
                return Err(error_at(
                    child,
                    source,
                    "unindent does not match any outer indentation level",
                ));
            }
            Some(_) => return Err(error_at(child, source, "unexpected indent")),
        }
    }
    Ok(())
}

/// Whitespace before `node` on its line, or `None` when something else
/// precedes it there.
fn indentation<'s>(node: TsNode, source: &'s str) -> Option<&'s str> {
    let start = node.start_byte();
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..start];
    prefix
        .chars()
        .all(|c| matches!(c, ' ' | '\t' | '\x0c'))
        .then_some(prefix)
}

fn error_at(node: TsNode, source: &str, message: &str) -> SyntaxError {
    let (line, column) = position(source, node.start_byte());
    SyntaxError::new(line, column, message)
}

/// 1-based line and byte column of a byte offset.
fn position(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (before.matches('\n').count() + 1, offset - line_start + 1)
}

/// Top-level statements that share a physical line (`a = 1; b = 2`).
struct Group<'t> {
    first_row: usize,
    last_row: usize,
    nodes: Vec<TsNode<'t>>,
}

fn group_top_level<'t>(root: TsNode<'t>) -> Vec<Group<'t>> {
    let mut groups: Vec<Group> = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        let first_row = child.start_position().row;
        let last_row = last_row(child);
        match groups.last_mut() {
            Some(group) if first_row <= group.last_row => {
                group.last_row = group.last_row.max(last_row);
                group.nodes.push(child);
            }
            _ => groups.push(Group {
                first_row,
                last_row,
                nodes: vec![child],
            }),
        }
    }
    groups
}

fn last_row(node: TsNode) -> usize {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    }
}

fn assemble(source: &str, lines: &[&str], groups: &[Group]) -> Module {
    let newline = detect_newline(source);
    let mut module = Module {
        header: Vec::new(),
        body: Vec::new(),
        footer: Vec::new(),
        newline,
    };

    let mut row = 0;
    for (index, group) in groups.iter().enumerate() {
        let first = group.first_row.min(lines.len());
        let last = group.last_row.min(lines.len().saturating_sub(1)).max(first);

        let mut leading: Vec<EmptyLine> = lines[row..first]
            .iter()
            .map(|line| EmptyLine::from_line(line))
            .collect();
        if index == 0 {
            // Comments separated from the first statement by a blank line
            // belong to the module, not to the statement.
            if let Some(split) = leading.iter().rposition(EmptyLine::is_blank) {
                let rest = leading.split_off(split + 1);
                module.header = leading;
                leading = rest;
            }
        }

        let joined: String = lines[first..=last].concat();
        let (body, ending) = LineEnding::split(&joined);
        module.body.push(Node::Statement(StatementLine {
            leading_lines: leading,
            source: body.to_string(),
            ending,
            statement: lower_group(&group.nodes, source),
        }));
        row = last + 1;
    }

    let rest: Vec<EmptyLine> = lines[row.min(lines.len())..]
        .iter()
        .map(|line| EmptyLine::from_line(line))
        .collect();
    if groups.is_empty() {
        module.header = rest;
    } else {
        module.footer = rest;
    }
    module
}

fn detect_newline(source: &str) -> LineEnding {
    match source.find('\n') {
        Some(i) if source[..i].ends_with('\r') => LineEnding::CrLf,
        _ => LineEnding::Lf,
    }
}

fn text<'s>(node: TsNode, source: &'s str) -> &'s str {
    &source[node.start_byte()..node.end_byte()]
}

fn named_children<'t>(node: TsNode<'t>) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

fn field_children<'t>(node: TsNode<'t>, field: &str) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    let children = node.children_by_field_name(field, &mut cursor).collect();
    children
}

fn lower_group(nodes: &[TsNode], source: &str) -> Statement {
    match nodes {
        [single] => lower_statement(*single, source),
        _ => Statement::Simple(nodes.iter().map(|n| lower_small(*n, source)).collect()),
    }
}

fn lower_block(block: TsNode, source: &str) -> Vec<Statement> {
    named_children(block)
        .into_iter()
        .map(|child| lower_statement(child, source))
        .collect()
}

fn lower_statement(node: TsNode, source: &str) -> Statement {
    match node.kind() {
        "function_definition" => Statement::FunctionDef(lower_function(node, Vec::new(), source)),
        "class_definition" => Statement::ClassDef(lower_class(node, Vec::new(), source)),
        "decorated_definition" => {
            let decorators: Vec<String> = named_children(node)
                .into_iter()
                .filter(|child| child.kind() == "decorator")
                .map(|child| text(child, source).trim_end().to_string())
                .collect();
            match node.child_by_field_name("definition") {
                Some(def) if def.kind() == "function_definition" => {
                    Statement::FunctionDef(lower_function(def, decorators, source))
                }
                Some(def) if def.kind() == "class_definition" => {
                    Statement::ClassDef(lower_class(def, decorators, source))
                }
                _ => Statement::Simple(vec![SmallStatement::Other(node.kind().to_string())]),
            }
        }
        "if_statement" | "for_statement" | "while_statement" | "try_statement"
        | "with_statement" | "match_statement" => {
            let mut blocks = Vec::new();
            collect_blocks(node, &mut blocks);
            Statement::Compound(Compound {
                keyword: node.kind().trim_end_matches("_statement").to_string(),
                body: blocks
                    .into_iter()
                    .flat_map(|block| lower_block(block, source))
                    .collect(),
            })
        }
        _ => Statement::Simple(vec![lower_small(node, source)]),
    }
}

/// Blocks of a compound statement, clauses (`elif`, `except`, `case`, ...)
/// included, without descending into the blocks themselves.
fn collect_blocks<'t>(node: TsNode<'t>, out: &mut Vec<TsNode<'t>>) {
    for child in named_children(node) {
        if child.kind() == "block" {
            out.push(child);
        } else {
            collect_blocks(child, out);
        }
    }
}

fn lower_function(node: TsNode, decorators: Vec<String>, source: &str) -> FunctionDef {
    let mut cursor = node.walk();
    let is_async = node
        .children(&mut cursor)
        .next()
        .is_some_and(|first| first.kind() == "async");
    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| {
            named_children(params)
                .into_iter()
                .map(|p| text(p, source).to_string())
                .collect()
        })
        .unwrap_or_default();

    FunctionDef {
        name: field_text(node, "name", source),
        is_async,
        decorators,
        parameters,
        returns: node
            .child_by_field_name("return_type")
            .map(|r| text(r, source).to_string()),
        body: node
            .child_by_field_name("body")
            .map(|b| lower_block(b, source))
            .unwrap_or_default(),
    }
}

fn lower_class(node: TsNode, decorators: Vec<String>, source: &str) -> ClassDef {
    let bases = node
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .map(|b| text(b, source).to_string())
                .collect()
        })
        .unwrap_or_default();

    ClassDef {
        name: field_text(node, "name", source),
        decorators,
        bases,
        body: node
            .child_by_field_name("body")
            .map(|b| lower_block(b, source))
            .unwrap_or_default(),
    }
}

fn field_text(node: TsNode, field: &str, source: &str) -> String {
    node.child_by_field_name(field)
        .map(|n| text(n, source).to_string())
        .unwrap_or_default()
}

fn lower_small(node: TsNode, source: &str) -> SmallStatement {
    match node.kind() {
        "import_statement" => SmallStatement::Import(Import {
            names: lower_aliases(node, source),
        }),
        "future_import_statement" => SmallStatement::ImportFrom(ImportFrom {
            module: "__future__".to_string(),
            names: lower_aliases(node, source),
            wildcard: false,
        }),
        "import_from_statement" => {
            let wildcard = named_children(node)
                .iter()
                .any(|child| child.kind() == "wildcard_import");
            SmallStatement::ImportFrom(ImportFrom {
                module: node
                    .child_by_field_name("module_name")
                    .map(|m| dotted(m, source))
                    .unwrap_or_default(),
                names: lower_aliases(node, source),
                wildcard,
            })
        }
        "expression_statement" => match named_children(node).as_slice() {
            [inner] if inner.kind() == "assignment" => SmallStatement::Assign(lower_assign(*inner, source)),
            [inner] if inner.kind() == "call" => SmallStatement::Expr(Expression::Call(lower_call(*inner, source))),
            [inner] if matches!(inner.kind(), "string" | "concatenated_string") => {
                SmallStatement::Expr(Expression::String)
            }
            _ => SmallStatement::Expr(Expression::Other),
        },
        kind => SmallStatement::Other(kind.to_string()),
    }
}

fn lower_aliases(node: TsNode, source: &str) -> Vec<ImportAlias> {
    field_children(node, "name")
        .into_iter()
        .map(|name| match name.kind() {
            "aliased_import" => ImportAlias {
                name: name
                    .child_by_field_name("name")
                    .map(|n| dotted(n, source))
                    .unwrap_or_default(),
                alias: name
                    .child_by_field_name("alias")
                    .map(|a| text(a, source).to_string()),
            },
            _ => ImportAlias {
                name: dotted(name, source),
                alias: None,
            },
        })
        .collect()
}

/// Dotted name with any whitespace around the dots removed.
fn dotted(node: TsNode, source: &str) -> String {
    match node.kind() {
        "dotted_name" => named_children(node)
            .into_iter()
            .map(|part| text(part, source))
            .collect::<Vec<_>>()
            .join("."),
        _ => text(node, source).split_whitespace().collect(),
    }
}

/// `a.b.c` for identifier/attribute chains, `None` for anything else.
fn full_name(node: TsNode, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(node, source).to_string()),
        "attribute" => {
            let object = full_name(node.child_by_field_name("object")?, source)?;
            let attribute = node.child_by_field_name("attribute")?;
            Some(format!("{}.{}", object, text(attribute, source)))
        }
        _ => None,
    }
}

fn lower_call(node: TsNode, source: &str) -> Call {
    let callee = node
        .child_by_field_name("function")
        .and_then(|f| full_name(f, source));

    let args = match node.child_by_field_name("arguments") {
        Some(list) if list.kind() == "argument_list" => named_children(list)
            .into_iter()
            .map(|arg| lower_argument(arg, source))
            .collect(),
        Some(other) => vec![Argument {
            keyword: None,
            name: None,
            source: text(other, source).to_string(),
        }],
        None => Vec::new(),
    };

    Call { callee, args }
}

fn lower_argument(arg: TsNode, source: &str) -> Argument {
    let source_text = text(arg, source).to_string();
    match arg.kind() {
        "keyword_argument" => Argument {
            keyword: arg
                .child_by_field_name("name")
                .map(|n| text(n, source).to_string()),
            name: arg
                .child_by_field_name("value")
                .filter(|v| v.kind() == "identifier")
                .map(|v| text(v, source).to_string()),
            source: source_text,
        },
        "identifier" => Argument {
            keyword: None,
            name: Some(source_text.clone()),
            source: source_text,
        },
        _ => Argument {
            keyword: None,
            name: None,
            source: source_text,
        },
    }
}

fn lower_assign(node: TsNode, source: &str) -> Assign {
    let target = node
        .child_by_field_name("left")
        .filter(|left| left.kind() == "identifier")
        .map(|left| text(left, source).to_string());
    let annotation = node
        .child_by_field_name("type")
        .map(|t| text(t, source).to_string());
    let value = match node.child_by_field_name("right") {
        None => AssignedValue::Missing,
        Some(right) if right.kind() == "list" => string_list(right, source)
            .map(AssignedValue::StringList)
            .unwrap_or(AssignedValue::Other),
        Some(_) => AssignedValue::Other,
    };
    Assign {
        target,
        annotation,
        value,
    }
}

fn string_list(list: TsNode, source: &str) -> Option<Vec<String>> {
    named_children(list)
        .into_iter()
        .map(|element| plain_string(element, source))
        .collect()
}

/// Value of a non-f, non-bytes string literal, escapes left as written.
fn plain_string(node: TsNode, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut value = String::new();
    for part in named_children(node) {
        match part.kind() {
            "string_start" => {
                let prefix = text(part, source).trim_end_matches(['\'', '"']);
                if prefix.chars().any(|c| matches!(c, 'f' | 'F' | 'b' | 'B' | 't' | 'T')) {
                    return None;
                }
            }
            "string_content" => value.push_str(text(part, source)),
            "string_end" => {}
            _ => return None,
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(source: &str) {
        let module = parse_module(source).unwrap();
        assert_eq!(module.code(), source);
    }

    #[test]
    fn test_round_trip_preserves_every_byte() {
        round_trip("");
        round_trip("\n\n");
        round_trip("# only a comment\n");
        round_trip("x = 1");
        round_trip("import os\nimport sys\n\n\nx = 1  # trailing\n\n\n");
        round_trip("from a import (\n    b,\n    c,  # why\n)\n");
        round_trip("a = 1; b = 2\nc = 3\n");
        round_trip("\"\"\"Docstring.\n\nMore.\n\"\"\"\n\nimport os\n");
        round_trip("@decorator\ndef f(\n    x,\n):\n    return x\n\n# tail\n");
        round_trip("class A:\n    def m(self):\n        pass\n    # dangling\n\n\ny = 2\n");
        round_trip("if x:\n\tpass\nelse:\n\tpass\n");
        round_trip("value = 1 + \\\n    2\n");
        round_trip("import os\r\n\r\nx = 1\r\n");
    }

    #[test]
    fn test_trivia_attribution() {
        let module = parse_module("# license\n\n# about x\nx = 1\n\ny = 2\n# end\n").unwrap();
        assert_eq!(module.header.len(), 2);
        assert_eq!(module.footer, vec![EmptyLine::from_line("# end\n")]);

        let statements: Vec<_> = module.statements().collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].leading_lines, vec![EmptyLine::from_line("# about x\n")]);
        assert_eq!(statements[0].source, "x = 1");
        assert_eq!(statements[1].leading_lines, vec![EmptyLine::blank(LineEnding::Lf)]);
    }

    #[test]
    fn test_module_without_statements_keeps_lines_in_header() {
        let module = parse_module("\n# nothing here\n").unwrap();
        assert!(module.body.is_empty());
        assert_eq!(module.header.len(), 2);
        assert!(module.footer.is_empty());
    }

    #[test]
    fn test_semicolon_statements_share_a_line() {
        let module = parse_module("import a; import b\n").unwrap();
        let line = module.statements().next().unwrap();
        match &line.statement {
            Statement::Simple(smalls) => assert_eq!(smalls.len(), 2),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_lowers_import_from_with_alias() {
        let module = parse_module("from src.api . widget.routes import router as widget_router\n").unwrap();
        let line = module.statements().next().unwrap();
        let Statement::Simple(smalls) = &line.statement else {
            panic!("expected simple statement");
        };
        assert_eq!(
            smalls[0],
            SmallStatement::ImportFrom(ImportFrom {
                module: "src.api.widget.routes".to_string(),
                names: vec![ImportAlias {
                    name: "router".to_string(),
                    alias: Some("widget_router".to_string()),
                }],
                wildcard: false,
            })
        );
    }

    #[test]
    fn test_lowers_relative_and_future_imports() {
        let module = parse_module("from __future__ import annotations\nfrom .models import User\n").unwrap();
        let modules: Vec<String> = module
            .statements()
            .filter_map(|line| match &line.statement {
                Statement::Simple(smalls) => match &smalls[0] {
                    SmallStatement::ImportFrom(import) => Some(import.module.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(modules, vec!["__future__", ".models"]);
    }

    #[test]
    fn test_lowers_call_arguments() {
        let module = parse_module("app.include_router(widget_router, prefix=\"/w\")\n").unwrap();
        let line = module.statements().next().unwrap();
        let Statement::Simple(smalls) = &line.statement else {
            panic!("expected simple statement");
        };
        let SmallStatement::Expr(Expression::Call(call)) = &smalls[0] else {
            panic!("expected call");
        };
        assert_eq!(call.callee.as_deref(), Some("app.include_router"));
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0].name.as_deref(), Some("widget_router"));
        assert!(call.args[0].is_positional());
        assert_eq!(call.args[1].keyword.as_deref(), Some("prefix"));
    }

    #[test]
    fn test_lowers_string_list_assignment() {
        let module = parse_module("__all__ = [\"Base\", 'Order',  # keep\n]\nother = [1]\n").unwrap();
        let values: Vec<AssignedValue> = module
            .statements()
            .filter_map(|line| match &line.statement {
                Statement::Simple(smalls) => match &smalls[0] {
                    SmallStatement::Assign(assign) => Some(assign.value.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(
            values,
            vec![
                AssignedValue::StringList(vec!["Base".to_string(), "Order".to_string()]),
                AssignedValue::Other,
            ]
        );
    }

    #[test]
    fn test_f_strings_are_not_plain_strings() {
        let module = parse_module("__all__ = [f\"{x}\"]\n").unwrap();
        let line = module.statements().next().unwrap();
        let Statement::Simple(smalls) = &line.statement else {
            panic!("expected simple statement");
        };
        let SmallStatement::Assign(assign) = &smalls[0] else {
            panic!("expected assignment");
        };
        assert_eq!(assign.value, AssignedValue::Other);
    }

    #[test]
    fn test_nested_definitions_are_lowered() {
        let source = "if TYPE_CHECKING:\n    from a import b\nclass Repo:\n    async def get_user_repository(self):\n        pass\n";
        let module = parse_module(source).unwrap();
        let statements: Vec<_> = module.statements().collect();
        assert!(matches!(&statements[0].statement, Statement::Compound(c) if c.keyword == "if" && c.body[0].is_import()));
        let Statement::ClassDef(class) = &statements[1].statement else {
            panic!("expected class");
        };
        let Statement::FunctionDef(method) = &class.body[0] else {
            panic!("expected method");
        };
        assert_eq!(method.name, "get_user_repository");
        assert!(method.is_async);
        assert_eq!(method.parameters, vec!["self"]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let err = parse_module("def broken(:\n    pass\n").unwrap_err();
        assert!(err.line >= 1 && err.column >= 1);

        assert!(parse_module("x = = 1\n").is_err());
        assert!(parse_module("from import x\n").is_err());

        for source in [
            "print \"hello\"\n",
            "exec \"x = 1\"\n",
            "print >>sys.stderr, 'x'\n",
            "x = `y`\n",
            "  x = 1\n",
            "if x:\n    y = 1\n  z = 2\n",
            "def f():\n    a = 1\n        b = 2\n",
        ] {
            assert!(parse_module(source).is_err(), "accepted {:?}", source);
        }

        let err = parse_module("x = 1\nprint \"hello\"\n").unwrap_err();
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_accepts_backticks_in_strings_and_comments() {
        round_trip("doc = \"use `crudmod`\"  # run `it`\nx = 1; y = 2\n");
        round_trip("if x: y = 1\nelse:\n\tz = 2\n");
        round_trip("print(\"hello\")\n");
    }

    #[test]
    fn test_parse_statement_requires_exactly_one() {
        assert!(parse_statement("x = 1\n").is_ok());
        assert!(parse_statement("x = 1\ny = 2\n").is_err());
        assert!(parse_statement("").is_err());
    }

    #[test]
    fn test_parse_snippet_follows_module_newline() {
        let module = parse_module("import os\r\n").unwrap();
        let stmt = module.parse_snippet("def f():\n    pass\n").unwrap();
        assert_eq!(stmt.source, "def f():\r\n    pass");
        assert_eq!(stmt.ending, LineEnding::CrLf);
    }
}
