//! macro-doc-check - verify that template macro docs, headers and bodies agree.
//!
//! For every `{{% macro %}}` the checker cross-references three views of the
//! parameter list:
//!
//! - **documented**: `:param`/`:type` fields in the `{{# ... #}}` block above it
//! - **defined**: the names and defaults in the macro header
//! - **used**: references inside `{{% ... %}}` and `{{{ ... }}}` in the body
//!
//! `macro-doc-check shared/macros/*.jinja --level 2`

mod checker;
mod diagnostic;
mod guard;
mod ledger;
mod types;

use anyhow::{bail, Context, Result};
use checker::{CheckOptions, FileReport};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "macro-doc-check",
    about = "Check that template macro documentation matches macro definitions and bodies",
    after_help = "Fatal diagnostics are printed as ERROR(<file>:<line>:<state>) \
                  and fail the run.\n\
                  Style warnings use WARNING(<file>:<line>:<state>) \
                  and do not affect the exit status."
)]
struct Cli {
    /// Template files, directories or glob patterns
    #[arg(required = true)]
    files: Vec<String>,

    /// Trace every line with its parser state and dump parameters at each endmacro
    #[arg(long)]
    log: bool,

    /// Strictness: 2 reports boolean tests of non-bool parameters,
    /// 3 makes undocumented parameters fatal
    #[arg(long, default_value_t = 1)]
    level: u8,

    /// Stop at the first file with a fatal diagnostic
    #[arg(long)]
    fail_fast: bool,

    /// Print type guard statements for every documented parameter
    #[arg(long)]
    emit_guards: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log);

    let opts = CheckOptions {
        level: cli.level,
        emit_guards: cli.emit_guards,
    };

    let files = expand_inputs(&cli.files)?;
    let mut failed = false;

    for path in &files {
        let report = check_file(path, &opts)?;
        print_report(&report);

        if report.is_fatal() {
            failed = true;
            if cli.fail_fast {
                break;
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn init_logging(trace: bool) {
    let level = if trace {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    if let Err(e) = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Never) {
        eprintln!("failed to initialize logging: {}", e);
    }
}

fn check_file(path: &Path, opts: &CheckOptions) -> Result<FileReport> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let report = checker::check_source(&path.to_string_lossy(), &source, opts);
    info!("{}: {} macro(s) checked", report.file, report.macros);
    Ok(report)
}

fn print_report(report: &FileReport) {
    for diag in &report.diagnostics {
        eprintln!("{}", diag);
    }
    for block in &report.guards {
        println!("{{{{# {}({}) #}}}}", block.macro_name, block.param);
        print!("{}", guard::render_block(&block.statements));
    }
}

/// File extensions picked up when a directory is given.
const TEMPLATE_EXTENSIONS: &[&str] = &["jinja", "j2"];

/// Expand paths, directories and glob patterns in the order given.
/// Directory and glob matches are sorted; duplicates are dropped.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            push_unique(&mut files, path.to_path_buf());
            continue;
        }

        // Directory: non-recursive scan for template files
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            let mut found: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && has_template_extension(p))
                .collect();
            found.sort();
            if found.is_empty() {
                warn!("no template files in {}", path.display());
            }
            for p in found {
                push_unique(&mut files, p);
            }
            continue;
        }

        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            bail!("no files matched: {}", pattern);
        }
        matches.sort();
        for p in matches {
            push_unique(&mut files, p);
        }
    }

    Ok(files)
}

fn push_unique(files: &mut Vec<PathBuf>, path: PathBuf) {
    if !files.contains(&path) {
        files.push(path);
    }
}

fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn template_extensions() {
        assert!(has_template_extension(Path::new("shared/macros/10-oval.jinja")));
        assert!(has_template_extension(Path::new("x.j2")));
        assert!(!has_template_extension(Path::new("rule.yml")));
        assert!(!has_template_extension(Path::new("Makefile")));
    }

    #[test]
    fn directory_scan_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.jinja", "a.j2", "notes.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let files = expand_inputs(&[dir.path().to_string_lossy().to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.j2", "b.jinja"]);
    }

    #[test]
    fn explicit_order_kept_and_deduplicated() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jinja");
        let b = dir.path().join("b.jinja");
        File::create(&a).unwrap();
        File::create(&b).unwrap();
        let args = [
            b.to_string_lossy().to_string(),
            a.to_string_lossy().to_string(),
            b.to_string_lossy().to_string(),
        ];
        let files = expand_inputs(&args).unwrap();
        assert_eq!(files, vec![b, a]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.jinja");
        let err = expand_inputs(&[missing.to_string_lossy().to_string()]).unwrap_err();
        assert!(err.to_string().contains("no files matched"));
    }
}
