//! Lossless concrete syntax tree for Python modules.
//!
//! The tree keeps the exact source text of every top-level logical line and
//! every trivia line around it, so printing an unmodified [`Module`] gives
//! back the input byte for byte. A structured [`Statement`] view sits next to
//! the text; the detectors in `visitor` only ever look at that view, and the
//! mutators in `editor` only ever replace or insert whole nodes.

use std::fmt;

/// Line terminator of a physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a file that does not end in a newline.
    None,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::None => "",
        }
    }

    /// Split a physical line (as produced by `split_inclusive('\n')`) into
    /// its content and terminator.
    pub(crate) fn split(line: &str) -> (&str, LineEnding) {
        if let Some(rest) = line.strip_suffix("\r\n") {
            (rest, LineEnding::CrLf)
        } else if let Some(rest) = line.strip_suffix('\n') {
            (rest, LineEnding::Lf)
        } else {
            (line, LineEnding::None)
        }
    }
}

/// A blank or comment-only line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyLine {
    /// Everything before the terminator, indentation and comment included.
    pub content: String,
    pub ending: LineEnding,
}

impl EmptyLine {
    pub fn blank(ending: LineEnding) -> Self {
        Self {
            content: String::new(),
            ending,
        }
    }

    pub(crate) fn from_line(line: &str) -> Self {
        let (content, ending) = LineEnding::split(line);
        Self {
            content: content.to_string(),
            ending,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn comment(&self) -> Option<&str> {
        let trimmed = self.content.trim_start();
        trimmed.starts_with('#').then_some(trimmed)
    }
}

/// `name` or `name as alias` inside an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAlias {
    /// Dotted name as written, without inner whitespace.
    pub name: String,
    pub alias: Option<String>,
}

impl ImportAlias {
    /// The local name this alias binds in a `from ... import` statement.
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub names: Vec<ImportAlias>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFrom {
    /// Dotted module path; relative imports keep their leading dots.
    pub module: String,
    pub names: Vec<ImportAlias>,
    pub wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub keyword: Option<String>,
    /// Set when the argument value is a bare identifier.
    pub name: Option<String>,
    pub source: String,
}

impl Argument {
    pub fn is_positional(&self) -> bool {
        self.keyword.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// `receiver.method` style callee; `None` when the callee is not a plain
    /// name or attribute chain (`factory()()`, `items[0]()`, ...).
    pub callee: Option<String>,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Call(Call),
    /// A bare string literal; in first position this is the module docstring.
    String,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignedValue {
    /// `[ "a", 'b', ... ]` with nothing but plain string literals.
    StringList(Vec<String>),
    /// Annotation without a value (`x: int`).
    Missing,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    /// `None` for targets that are not a single plain name.
    pub target: Option<String>,
    pub annotation: Option<String>,
    pub value: AssignedValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmallStatement {
    Import(Import),
    ImportFrom(ImportFrom),
    Expr(Expression),
    Assign(Assign),
    /// Any other simple statement, tagged with its grammar kind.
    Other(String),
}

impl SmallStatement {
    pub fn is_import(&self) -> bool {
        matches!(self, SmallStatement::Import(_) | SmallStatement::ImportFrom(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub is_async: bool,
    pub decorators: Vec<String>,
    pub parameters: Vec<String>,
    pub returns: Option<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub decorators: Vec<String>,
    pub bases: Vec<String>,
    pub body: Vec<Statement>,
}

/// `if`, `for`, `while`, `try`, `with` and `match` blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub keyword: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// One physical statement line; several entries when joined with `;`.
    Simple(Vec<SmallStatement>),
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Compound(Compound),
}

impl Statement {
    pub fn is_import(&self) -> bool {
        match self {
            Statement::Simple(smalls) => smalls.iter().any(SmallStatement::is_import),
            _ => false,
        }
    }

    pub fn small_statements(&self) -> &[SmallStatement] {
        match self {
            Statement::Simple(smalls) => smalls,
            _ => &[],
        }
    }

    pub fn is_docstring(&self) -> bool {
        matches!(self.small_statements(), [SmallStatement::Expr(Expression::String)])
    }

    /// Statements nested directly inside this one.
    pub fn children(&self) -> &[Statement] {
        match self {
            Statement::Simple(_) => &[],
            Statement::FunctionDef(f) => &f.body,
            Statement::ClassDef(c) => &c.body,
            Statement::Compound(c) => &c.body,
        }
    }
}

/// A top-level logical line together with the trivia above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementLine {
    pub leading_lines: Vec<EmptyLine>,
    /// Exact source from the first character of the first line through the
    /// end of the last line, without the final terminator.
    pub source: String,
    pub ending: LineEnding,
    pub statement: Statement,
}

impl StatementLine {
    pub fn with_leading_lines(mut self, leading_lines: Vec<EmptyLine>) -> Self {
        self.leading_lines = leading_lines;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Statement(StatementLine),
    /// Spacing unit inserted by a mutator. The parser attaches blank lines
    /// to the statement that follows them instead.
    EmptyLine(EmptyLine),
}

impl Node {
    pub fn as_statement(&self) -> Option<&StatementLine> {
        match self {
            Node::Statement(line) => Some(line),
            Node::EmptyLine(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub header: Vec<EmptyLine>,
    pub body: Vec<Node>,
    pub footer: Vec<EmptyLine>,
    /// Terminator used for lines the tool synthesizes.
    pub newline: LineEnding,
}

impl Module {
    pub fn empty() -> Self {
        Self {
            header: Vec::new(),
            body: Vec::new(),
            footer: Vec::new(),
            newline: LineEnding::Lf,
        }
    }

    /// Top-level statement lines in source order.
    pub fn statements(&self) -> impl Iterator<Item = &StatementLine> {
        self.body.iter().filter_map(Node::as_statement)
    }

    /// Re-serialize the tree.
    pub fn code(&self) -> String {
        let mut printer = Printer::new(self.newline);
        for line in &self.header {
            printer.line(&line.content, line.ending);
        }
        for node in &self.body {
            match node {
                Node::EmptyLine(line) => printer.line(&line.content, line.ending),
                Node::Statement(stmt) => {
                    for line in &stmt.leading_lines {
                        printer.line(&line.content, line.ending);
                    }
                    printer.line(&stmt.source, stmt.ending);
                }
            }
        }
        for line in &self.footer {
            printer.line(&line.content, line.ending);
        }
        printer.finish()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Concatenates lines, supplying the module newline for an unterminated
/// line that is no longer last (a statement appended after a file that did
/// not end in a newline).
struct Printer {
    out: String,
    newline: LineEnding,
    unterminated: bool,
}

impl Printer {
    fn new(newline: LineEnding) -> Self {
        Self {
            out: String::new(),
            newline,
            unterminated: false,
        }
    }

    fn line(&mut self, content: &str, ending: LineEnding) {
        if self.unterminated {
            self.out.push_str(self.newline.as_str());
        }
        self.out.push_str(content);
        self.out.push_str(ending.as_str());
        self.unterminated = ending == LineEnding::None;
    }

    fn finish(self) -> String {
        self.out
    }
}
