//! Document checking: compile every OpenAPI file under a path and report
//! what failed.
//!
//! Each file is compiled in collecting mode, so one broken schema produces
//! one diagnostic and the rest of the document is still checked.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::compile::compile_all;
use crate::loader::load_document;
use crate::types::CompileOptions;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from checking.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// Site the issue was found at (e.g., "Order/items")
    pub path: String,
    pub message: String,
}

/// Result of checking a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    /// Definitions produced by the sites that compiled.
    pub types: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a checked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of checking a directory or a single file.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl CheckResult {
    /// Returns true if no file reported an error.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Check a file or directory.
///
/// Directories are searched recursively for `.json`, `.yaml` and `.yml`
/// files. Files are checked in parallel; results are sorted by path.
pub fn check(path: &Path, options: &CompileOptions) -> CheckResult {
    let files = collect_document_files(path);
    let base = if path.is_file() {
        path.parent().unwrap_or(Path::new(""))
    } else {
        path
    };

    let results: Vec<FileResult> = files
        .par_iter()
        .map(|file| check_file(file, base, options))
        .collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);
    let failed = results
        .iter()
        .filter(|r| r.status == FileStatus::Error)
        .count();

    CheckResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Check a single document file.
pub fn check_file(file: &Path, base_path: &Path, options: &CompileOptions) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let diagnostic = |severity, code: &str, path: &str, message: String| Diagnostic {
        severity,
        code: code.to_string(),
        file: display.clone(),
        path: path.to_string(),
        message,
    };

    let document = match load_document(file) {
        Ok(document) => document,
        Err(e) => {
            return FileResult {
                file: display.clone(),
                status: FileStatus::Error,
                types: 0,
                diagnostics: vec![diagnostic(Severity::Error, "L001", "/", e.to_string())],
            };
        }
    };

    let mut diagnostics = Vec::new();
    if document.get("openapi").is_none() {
        diagnostics.push(diagnostic(
            Severity::Warning,
            "W001",
            "/",
            "document missing openapi version field".to_string(),
        ));
    }

    let types = match compile_all(&document, options) {
        Ok(report) => {
            for error in &report.errors {
                diagnostics.push(diagnostic(
                    Severity::Error,
                    error.code(),
                    error.path().unwrap_or("/"),
                    error.to_string(),
                ));
            }
            report.compilation.types.len()
        }
        Err(error) => {
            diagnostics.push(diagnostic(
                Severity::Error,
                error.code(),
                error.path().unwrap_or("/"),
                error.to_string(),
            ));
            0
        }
    };

    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.is_empty() {
        FileStatus::Ok
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: display,
        status,
        types,
        diagnostics,
    }
}

fn is_document_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

fn collect_document_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_document_file(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_document_file(&path) {
            files.push(path);
        }
    }
}
