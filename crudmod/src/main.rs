use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crudmod::diff::outcome_diff;
use crudmod::{
    apply_to_file, check_file, register_resource, run_batch, BatchSpec, Codemod, DependencySpec, DiffStats,
    ExportSpec, FileResults, FileStatus, Namespaces, ProjectLayout, RegisterOptions, RouterSpec, WriteMode,
};

#[derive(Parser)]
#[command(name = "crudmod")]
#[command(about = "Wire generated CRUD resources into a FastAPI project without disturbing hand-written code")]
#[command(long_about = "Idempotent, formatting-preserving edits for the Python files of a FastAPI project.

Every command checks whether what it would add is already there, and only adds what is
missing. Comments, blank lines and formatting of everything else stay byte-identical,
and running a command twice changes nothing the second time.

Nothing is written unless --apply is given.")]
#[command(after_help = "Examples:
  crudmod register --module invoice --model Invoice --apply
  crudmod register-router --file src/api/app.py --module invoice --format diff
  crudmod batch --spec wiring.yaml --apply")]
#[command(version)]
struct Cli {
    /// Write changes to disk (default is a dry run)
    #[arg(long, global = true)]
    apply: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Default, global = true)]
    format: OutputFormat,

    /// Show summary statistics after diff output
    #[arg(long, global = true)]
    summary: bool,

    /// Namespace configuration (JSON or YAML); falls back to $CRUDMOD_CONFIG
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Default,
    Diff,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a resource router and include it into the app
    #[command(after_help = "EXAMPLES:
    crudmod register-router --file src/api/app.py --module invoice

    Adds, only if missing:
        from src.api.invoice.routes import router as invoice_router  # noqa: E402
        app.include_router(invoice_router)

    An existing import of the router under another alias is reused as is.")]
    RegisterRouter {
        #[arg(short, long)]
        file: PathBuf,

        /// Resource module name (e.g. invoice)
        #[arg(short, long)]
        module: String,

        /// Application object the router is included into
        #[arg(long)]
        app_name: Option<String>,
    },

    /// Provide a get_<module>_repository dependency
    #[command(after_help = "EXAMPLES:
    crudmod add-dependency --file src/api/repositories/dependencies.py --module invoice --model Invoice")]
    AddDependency {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        module: String,

        /// Model class name (e.g. Invoice)
        #[arg(long)]
        model: String,
    },

    /// Import a model and list it in the package's __all__
    #[command(after_help = "EXAMPLES:
    crudmod export-model --file src/db/models/__init__.py --module invoice --model Invoice

    __all__ is rewritten one name per line, with Base first.")]
    ExportModel {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        module: String,

        #[arg(long)]
        model: String,
    },

    /// Run all three edits on the conventional project layout
    #[command(after_help = "FILES:
    <src>/api/app.py                          router registration (unless --no-register)
    <src>/api/repositories/dependencies.py   repository dependency, if the file exists (unless --no-register)
    <src>/db/models/__init__.py               model export, if the file exists")]
    Register {
        #[arg(short, long)]
        module: String,

        #[arg(long)]
        model: String,

        #[arg(long, default_value = "src")]
        src_dir: PathBuf,

        /// Application module, if not <src>/api/app.py
        #[arg(long)]
        app_file: Option<PathBuf>,

        #[arg(long)]
        app_name: Option<String>,

        /// Skip router registration and the repository dependency
        #[arg(long)]
        no_register: bool,
    },

    /// Run the operations listed in a JSON or YAML file
    #[command(after_help = "SPEC FORMAT (YAML):
    base_path: backend
    operations:
      - type: RegisterRouter
        file: src/api/app.py
        module: invoice
      - type: AddDependency
        file: src/api/repositories/dependencies.py
        module: invoice
        model: Invoice
      - type: ExportModel
        file: src/db/models/__init__.py
        module: invoice
        model: Invoice")]
    Batch {
        #[arg(short, long)]
        spec: PathBuf,
    },

    /// Only parse a file and report syntax errors
    Check {
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mode = if cli.apply { WriteMode::Apply } else { WriteMode::DryRun };
    let namespaces = Namespaces::resolve(cli.config.as_deref()).context("Failed to load namespace configuration")?;

    let results: FileResults = match &cli.command {
        Commands::RegisterRouter { file, module, app_name } => {
            let spec = RouterSpec::new(module, &namespaces)?;
            let spec = match app_name {
                Some(app_name) => spec.with_app_name(app_name)?,
                None => spec,
            };
            single(file, &Codemod::RegisterRouter(spec), mode)
        }

        Commands::AddDependency { file, module, model } => {
            let spec = DependencySpec::new(module, model, &namespaces)?;
            single(file, &Codemod::ProvideRepository(spec), mode)
        }

        Commands::ExportModel { file, module, model } => {
            let spec = ExportSpec::new(module, model, &namespaces)?;
            single(file, &Codemod::ExportModel(spec), mode)
        }

        Commands::Register { module, model, src_dir, app_file, app_name, no_register } => {
            let layout = ProjectLayout::new(src_dir).with_app_file(app_file.clone());
            let options = RegisterOptions {
                app_name: app_name.clone(),
                register: !no_register,
            };
            register_resource(&layout, module, model, &namespaces, &options, mode)?
        }

        Commands::Batch { spec } => {
            let batch = BatchSpec::load(spec).context("Failed to load batch spec")?;
            run_batch(&batch, &namespaces, mode)
        }

        Commands::Check { file } => {
            check_file(file)?;
            println!("✓ {} parses", file.display());
            return Ok(());
        }
    };

    report(&results, &cli)
}

fn single(file: &Path, codemod: &Codemod, mode: WriteMode) -> FileResults {
    vec![(file.to_path_buf(), apply_to_file(file, codemod, mode))]
}

/// One JSON object per file; failures become `{"status": "error"}` entries.
fn json_entries(results: &FileResults) -> serde_json::Result<Vec<serde_json::Value>> {
    results
        .iter()
        .map(|(path, outcome)| match outcome {
            Ok(outcome) => serde_json::to_value(outcome),
            Err(err) => Ok(serde_json::json!({
                "path": path,
                "status": "error",
                "error": err.to_string(),
            })),
        })
        .collect()
}

fn report(results: &FileResults, cli: &Cli) -> Result<()> {
    let failed = results.iter().filter(|(_, outcome)| outcome.is_err()).count();

    match cli.format {
        OutputFormat::Json => {
            let entries = json_entries(results).context("Failed to serialize results")?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }

        OutputFormat::Diff => {
            let mut total = DiffStats::default();
            for (path, outcome) in results {
                match outcome {
                    Ok(outcome) => {
                        let (diff, stats) = outcome_diff(outcome);
                        if stats.files_changed > 0 {
                            print!("{}", diff);
                        }
                        total.add(&stats);
                        for diagnostic in &outcome.diagnostics {
                            eprintln!("⚠️  {}: {}", path.display(), diagnostic);
                        }
                    }
                    Err(err) => eprintln!("✗ {}", err),
                }
            }
            if cli.summary {
                println!("\n{}", total);
            }
        }

        OutputFormat::Default => {
            let mut modified = 0;
            for (path, outcome) in results {
                match outcome {
                    Ok(outcome) => {
                        match (outcome.status, outcome.written) {
                            (FileStatus::Unchanged, _) => println!("= Unchanged: {}", path.display()),
                            (FileStatus::Modified, true) => println!("✓ Modified: {}", path.display()),
                            (FileStatus::Modified, false) => println!("Would modify: {}", path.display()),
                        }
                        if outcome.is_modified() {
                            modified += 1;
                        }
                        for change in &outcome.changes {
                            println!("    + {}", change);
                        }
                        for diagnostic in &outcome.diagnostics {
                            println!("    ⚠️  {}", diagnostic);
                        }
                    }
                    Err(err) => eprintln!("✗ {}", err),
                }
            }
            if !cli.apply {
                println!("\n🔍 Dry run complete. Use --apply to write changes, or --format diff to see a patch.");
                println!("Summary: {} file(s) would be modified", modified);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", failed, results.len());
    }
    Ok(())
}
