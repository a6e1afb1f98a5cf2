//! OpenAPI IR CLI
//!
//! Command-line interface for compiling, pruning, and checking OpenAPI documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use oas_ir::{
    check, compile_all, compile_batch, load_document_auto, load_options, prune, CompileOptions,
    FileStatus, PruneOptions, PruneStrategy, Severity,
};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "oas-ir")]
#[command(about = "Compile OpenAPI schemas into a canonical type model")]
#[command(version)]
struct Cli {
    /// Log pipeline decisions to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one or more documents and print their type definitions as JSON
    Compile {
        /// Document sources: file paths or URLs (http:// or https://)
        #[arg(required = true)]
        sources: Vec<String>,

        /// Options file (JSON or YAML); flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Keep operations with this tag (repeatable)
        #[arg(long = "include-tag", value_name = "TAG")]
        include_tags: Vec<String>,

        /// Drop operations with this tag (repeatable)
        #[arg(long = "exclude-tag", value_name = "TAG")]
        exclude_tags: Vec<String>,

        /// Keep only this path (repeatable)
        #[arg(long = "include-path", value_name = "PATH")]
        include_paths: Vec<String>,

        /// Drop this path (repeatable)
        #[arg(long = "exclude-path", value_name = "PATH")]
        exclude_paths: Vec<String>,

        /// Keep the operation with this operationId (repeatable)
        #[arg(long = "include-operation-id", value_name = "ID")]
        include_operation_ids: Vec<String>,

        /// Drop the operation with this operationId (repeatable)
        #[arg(long = "exclude-operation-id", value_name = "ID")]
        exclude_operation_ids: Vec<String>,

        /// Suffix tried when a hoisted type name is taken (repeatable, in order)
        #[arg(long = "name-suffix", value_name = "SUFFIX")]
        name_suffixes: Vec<String>,

        /// Compile every component, reachable or not
        #[arg(long)]
        no_prune: bool,

        /// Report every failing schema instead of stopping at the first
        #[arg(long)]
        keep_going: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Remove components no operation can reach and print the document
    Prune {
        /// Document source: file path or URL (http:// or https://)
        source: String,

        /// Pruning strategy: fixed-point (default) or reachability
        #[arg(long, default_value = "fixed-point")]
        strategy: String,

        /// Give up after this many fixed-point passes
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check documents for schemas that do not compile
    Check {
        /// File or directory to check
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

struct CompileArgs {
    sources: Vec<String>,
    config: Option<PathBuf>,
    include_tags: Vec<String>,
    exclude_tags: Vec<String>,
    include_paths: Vec<String>,
    exclude_paths: Vec<String>,
    include_operation_ids: Vec<String>,
    exclude_operation_ids: Vec<String>,
    name_suffixes: Vec<String>,
    no_prune: bool,
    keep_going: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            sources,
            config,
            include_tags,
            exclude_tags,
            include_paths,
            exclude_paths,
            include_operation_ids,
            exclude_operation_ids,
            name_suffixes,
            no_prune,
            keep_going,
            output,
            pretty,
        } => run_compile(CompileArgs {
            sources,
            config,
            include_tags,
            exclude_tags,
            include_paths,
            exclude_paths,
            include_operation_ids,
            exclude_operation_ids,
            name_suffixes,
            no_prune,
            keep_going,
            output,
            pretty,
        }),

        Commands::Prune {
            source,
            strategy,
            max_iterations,
            output,
            pretty,
        } => run_prune(&source, &strategy, max_iterations, output, pretty),

        Commands::Check {
            path,
            format,
            quiet,
        } => run_check(&path, &format, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn compile_options(args: &CompileArgs) -> Result<CompileOptions, u8> {
    let mut options = match &args.config {
        Some(path) => load_options(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => CompileOptions::new(),
    };

    let filter = &mut options.filter;
    filter.include.tags.extend(args.include_tags.iter().cloned());
    filter.exclude.tags.extend(args.exclude_tags.iter().cloned());
    filter.include.paths.extend(args.include_paths.iter().cloned());
    filter.exclude.paths.extend(args.exclude_paths.iter().cloned());
    filter
        .include
        .operation_ids
        .extend(args.include_operation_ids.iter().cloned());
    filter
        .exclude
        .operation_ids
        .extend(args.exclude_operation_ids.iter().cloned());

    if !args.name_suffixes.is_empty() {
        options.name_suffixes = args.name_suffixes.clone();
    }
    if args.no_prune {
        options.prune = false;
    }
    Ok(options)
}

fn load_all(sources: &[String]) -> Result<Vec<Value>, u8> {
    sources
        .iter()
        .map(|source| {
            load_document_auto(source).map_err(|e| {
                eprintln!("Error loading {}: {}", source, e);
                e.exit_code() as u8
            })
        })
        .collect()
}

fn run_compile(args: CompileArgs) -> Result<(), u8> {
    let options = compile_options(&args)?;
    let documents = load_all(&args.sources)?;

    let mut outputs = Vec::with_capacity(documents.len());
    let mut failed = false;

    if args.keep_going {
        let reports: Vec<_> = documents
            .par_iter()
            .map(|document| compile_all(document, &options))
            .collect();
        for (source, report) in args.sources.iter().zip(reports) {
            let report = report.map_err(|e| {
                eprintln!("Error in {}: {}", source, e);
                e.exit_code() as u8
            })?;
            for error in &report.errors {
                eprintln!("Error in {}: {}", source, error);
            }
            failed |= !report.is_ok();
            let errors: Vec<Value> = report
                .errors
                .iter()
                .map(|e| json!({ "code": e.code(), "path": e.path(), "message": e.to_string() }))
                .collect();
            outputs.push(json!({
                "types": report.compilation.types,
                "prune": report.compilation.prune,
                "errors": errors,
            }));
        }
    } else {
        for (source, result) in args.sources.iter().zip(compile_batch(&documents, &options)) {
            let compilation = result.map_err(|e| {
                eprintln!("Error in {}: {}", source, e);
                e.exit_code() as u8
            })?;
            outputs.push(serde_json::to_value(&compilation).map_err(|e| {
                eprintln!("Error serializing output: {}", e);
                2u8
            })?);
        }
    }

    if outputs.len() == 1 {
        write_json(&outputs[0], args.output.as_deref(), args.pretty)?;
    } else {
        write_json(&outputs, args.output.as_deref(), args.pretty)?;
    }

    if failed {
        Err(1)
    } else {
        Ok(())
    }
}

fn run_prune(
    source: &str,
    strategy: &str,
    max_iterations: Option<usize>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let Some(strategy) = PruneStrategy::parse(strategy) else {
        eprintln!(
            "Error: unknown strategy '{}' (expected fixed-point or reachability)",
            strategy
        );
        return Err(2);
    };
    let mut options = PruneOptions::new().strategy(strategy);
    if let Some(max) = max_iterations {
        options = options.max_iterations(max);
    }

    let mut document = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let report = prune(&mut document, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    for reference in &report.removed {
        tracing::info!(reference = %reference, "removed");
    }

    write_json(&document, output.as_deref(), pretty)
}

fn write_json<T: Serialize + ?Sized>(
    value: &T,
    output: Option<&Path>,
    pretty: bool,
) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(path: &Path, format: &str, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    // Every component is checked, referenced or not.
    let result = check(path, &CompileOptions::new().prune(false));

    if format == "json" {
        write_json(&result, None, true)?;
    } else {
        if !quiet {
            println!("Checking {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status == FileStatus::Error {
                println!(
                    "  {} {} ({} types)",
                    status_icon,
                    file_result.file.display(),
                    file_result.types
                );
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err(1)
    }
}
