//! Where new statements go, and how the blank lines around them look.

use crate::syntax::*;

/// Body index right after the last top-level import statement. Without any
/// top-level import this is the start of the body, or right below the module
/// docstring if there is one.
///
/// Anchoring on the *last* import keeps an import block contiguous even when
/// every import in it was added by earlier runs.
pub fn after_last_import(module: &Module) -> usize {
    if let Some(index) = module
        .body
        .iter()
        .rposition(|node| node.as_statement().is_some_and(|line| line.statement.is_import()))
    {
        return index + 1;
    }
    match module.body.first().and_then(Node::as_statement) {
        Some(first) if first.statement.is_docstring() => 1,
        _ => 0,
    }
}

/// Insert `statement` at body `index`. At the very top it takes over the
/// comment block of the statement it displaces, so a shebang or an encoding
/// line stays on the first lines of the file.
pub fn insert_statement(module: &mut Module, index: usize, mut statement: StatementLine) {
    if index == 0 {
        if let Some(Node::Statement(displaced)) = module.body.first_mut() {
            let mut leading = std::mem::take(&mut displaced.leading_lines);
            leading.append(&mut statement.leading_lines);
            statement.leading_lines = leading;
        }
    }
    module.body.insert(index, Node::Statement(statement));
}

/// Number of blank-line units queued at the tail of the body.
pub fn trailing_blank_lines(module: &Module) -> usize {
    module
        .body
        .iter()
        .rev()
        .take_while(|node| matches!(node, Node::EmptyLine(line) if line.is_blank()))
        .count()
}

/// Append `statement` at the end of the body so that at least `blank_lines`
/// blank lines separate it from the preceding content. Existing surplus is
/// left alone. An empty body gets no padding.
pub fn append_padded(module: &mut Module, statement: StatementLine, blank_lines: usize) {
    if module.body.iter().any(|node| node.as_statement().is_some()) {
        let needed = blank_lines.saturating_sub(trailing_blank_lines(module));
        for _ in 0..needed {
            module.body.push(Node::EmptyLine(EmptyLine::blank(module.newline)));
        }
    }
    module.body.push(Node::Statement(statement));
}

/// Exactly `blank_lines` blank lines above the node. A comment block among
/// the leading lines is kept and moved down onto the node; blank lines inside
/// the block stay as written.
pub fn normalize_leading_blank_lines(
    leading: &[EmptyLine],
    blank_lines: usize,
    newline: LineEnding,
) -> Vec<EmptyLine> {
    let mut normalized: Vec<EmptyLine> = (0..blank_lines).map(|_| EmptyLine::blank(newline)).collect();
    let first_comment = leading.iter().position(|line| !line.is_blank());
    let last_comment = leading.iter().rposition(|line| !line.is_blank());
    if let (Some(first), Some(last)) = (first_comment, last_comment) {
        normalized.extend_from_slice(&leading[first..=last]);
    }
    normalized
}

/// Blank lines wanted above a body node that must be set apart from what
/// precedes it. The first body node is already separated from the header by
/// the header's own trailing blank line.
pub fn separating_blank_lines(index: usize) -> usize {
    if index == 0 {
        0
    } else {
        1
    }
}
