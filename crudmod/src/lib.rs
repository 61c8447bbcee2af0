//! Idempotent, formatting-preserving edits that wire generated CRUD
//! resources into the Python sources of a FastAPI project.

pub mod anchors;
pub mod config;
pub mod diff;
pub mod driver;
pub mod editor;
pub mod error;
pub mod operations;
pub mod parser;
pub mod syntax;
pub mod visitor;


pub use config::{Namespaces, ProjectLayout};
pub use diff::{generate_unified_diff, DiffStats};
pub use driver::{
    apply_all_to_file, apply_to_file, check_file, register_resource, run_batch, FileOutcome, FileResults,
    FileStatus, RegisterOptions, WriteMode,
};
pub use editor::{Change, Diagnostic, PythonEditor};
pub use error::{CodemodError, IoOp, Result, SyntaxError};
pub use operations::*;
pub use parser::{parse_module, parse_statement};
pub use syntax::Module;
