#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Expandium CLI
//!
//! A command-line interface for the expandium macro expansion library.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use expandium::{
    Compiler, Diagnostic, IncludeKind, Preprocessed, PreprocessorConfig, Severity, SourceResolver,
    Target,
};
use std::path::{Path, PathBuf};

/// Exit codes for different error conditions
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const PREPROCESS_ERROR: i32 = 3;
    pub const ARGUMENT_ERROR: i32 = 4;
}

/// Command-line interface for the expandium preprocessor
#[derive(Parser)]
#[command(
    name = "expandium",
    version,
    author,
    about = "Expand C macros and resolve conditional compilation",
    long_about = "expandium runs the macro expansion and conditional compilation stage of a C preprocessor: it executes #define, #undef, #if and friends, expands macros and removes inactive regions.",
    after_help = "EXAMPLES:
  # Preprocess a single file
  $ expandium input.c -o output.i

  # Preprocess for Windows with MSVC
  $ expandium input.c --target windows --compiler msvc

  # Define and undefine macros, search include directories
  $ expandium input.c -D DEBUG -D LEVEL=2 -U __GNUC__ -I include

  # Read from stdin and write to stdout
  $ cat input.c | expandium - | gcc -x c -

  # Show warnings and debug logging
  $ expandium input.c -W -v"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input file to preprocess (use '-' for stdin)
    #[arg(help = "Input C/C++ file to preprocess (use '-' for stdin)")]
    input: PathBuf,

    /// Output file (use '-' for stdout, default: stdout)
    #[arg(
        short = 'o',
        long,
        help = "Output file (use '-' for stdout, default: stdout)"
    )]
    output: Option<PathBuf>,

    /// Target operating system
    #[arg(
        short = 't',
        long,
        value_enum,
        default_value = "linux",
        help = "Target operating system"
    )]
    target: TargetValue,

    /// Compiler dialect
    #[arg(
        short = 'c',
        long,
        value_enum,
        default_value = "gcc",
        help = "Compiler dialect for predefined macros"
    )]
    compiler: CompilerValue,

    /// Add include directory
    #[arg(
        short = 'I',
        long = "include",
        value_name = "DIR",
        help = "Add directory to include search path"
    )]
    include_dirs: Vec<PathBuf>,

    /// Define a macro
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VALUE]",
        help = "Define NAME as VALUE (default 1) before processing"
    )]
    defines: Vec<String>,

    /// Undefine a macro
    #[arg(
        short = 'U',
        long = "undefine",
        value_name = "NAME",
        help = "Remove NAME after predefined macros and -D are applied"
    )]
    undefines: Vec<String>,

    /// Maximum nesting depth of #include
    #[arg(
        long,
        default_value = "200",
        help = "Maximum nesting depth of #include"
    )]
    include_depth: usize,

    /// Output in JSON format
    #[arg(long, help = "Output preprocessing result in JSON format")]
    #[cfg(feature = "json")]
    json: bool,

    /// Output in plain text format (no formatting)
    #[arg(long, help = "Output in plain text format for scripts")]
    plain: bool,

    /// Enable verbose output
    #[arg(
        short = 'v',
        long,
        help = "Enable verbose output with debug logging"
    )]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short = 'q', long, help = "Suppress non-error output (quiet mode)")]
    quiet: bool,

    /// Show preprocessing warnings
    #[arg(short = 'W', long, help = "Show preprocessing warnings")]
    warnings: bool,

    /// Show what would happen without preprocessing
    #[arg(
        short = 'n',
        long,
        help = "Show what would happen without actually preprocessing"
    )]
    dry_run: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    no_color: bool,

    /// Force colored output
    #[arg(long, help = "Force colored output even when not a terminal")]
    force_color: bool,
}

/// Target operating system values for CLI
#[derive(Clone, Debug, ValueEnum)]
enum TargetValue {
    Linux,
    Windows,
    #[clap(name = "mac-os")]
    MacOS,
}

impl From<TargetValue> for Target {
    fn from(value: TargetValue) -> Self {
        match value {
            TargetValue::Linux => Target::Linux,
            TargetValue::Windows => Target::Windows,
            TargetValue::MacOS => Target::MacOS,
        }
    }
}

/// Compiler dialect values for CLI
#[derive(Clone, Debug, ValueEnum)]
#[allow(clippy::upper_case_acronyms)]
enum CompilerValue {
    #[clap(name = "gcc")]
    GCC,
    Clang,
    #[clap(name = "msvc")]
    MSVC,
}

impl From<CompilerValue> for Compiler {
    fn from(value: CompilerValue) -> Self {
        match value {
            CompilerValue::GCC => Compiler::GCC,
            CompilerValue::Clang => Compiler::Clang,
            CompilerValue::MSVC => Compiler::MSVC,
        }
    }
}

/// Invalid combination of command line arguments
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ArgumentError(String);

/// Preprocessing raised error diagnostics; they have already been printed
#[derive(Debug, thiserror::Error)]
#[error("{first}{}", more(.errors))]
struct PreprocessFailed {
    errors: usize,
    first: String,
}

fn more(errors: &usize) -> String {
    match *errors {
        0 | 1 => String::new(),
        n => format!(" (and {} more)", n - 1),
    }
}

/// Main application entry point
fn main() {
    std::process::exit(match run() {
        Ok(false) => exit_code::SUCCESS,
        Ok(true) => exit_code::GENERAL_ERROR,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

/// Determine the appropriate exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else if error.downcast_ref::<PreprocessFailed>().is_some() {
        exit_code::PREPROCESS_ERROR
    } else if error.downcast_ref::<ArgumentError>().is_some() {
        exit_code::ARGUMENT_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

/// Run the main application logic
///
/// Returns whether warnings were shown.
fn run() -> Result<bool> {
    let cli = Cli::parse();

    init_logging(&cli);
    colored::control::set_override(use_color(
        cli.no_color || cli.plain,
        cli.force_color,
        atty::is(atty::Stream::Stderr),
    ));

    validate_args(&cli)?;

    if cli.dry_run {
        show_dry_run_info(&cli);
        return Ok(false);
    }

    let input_content = read_input(&cli.input)?;
    let config = create_config(&cli);

    let start_time = std::time::Instant::now();
    let result = expandium::preprocess_named(&input_content, &format_input(&cli.input), &config);
    let processing_time = start_time.elapsed();
    log::info!("preprocessed {} in {processing_time:?}", format_input(&cli.input));

    let warnings_shown = report_diagnostics(&cli, &result.diagnostics);

    #[cfg(feature = "json")]
    if cli.json {
        write_json_output(&cli, &result, processing_time)?;
        return finish(result, warnings_shown);
    }

    if !result.has_errors() {
        write_output(&cli, &result.output)?;
    }

    if cli.verbose {
        show_verbose_info(&cli, processing_time);
    }

    if cli.verbose && !cli.quiet && !result.has_errors() {
        let input_display = format_input(&cli.input);
        let output_display = cli
            .output
            .as_deref()
            .map_or("stdout".to_string(), format_output);
        eprintln!("{} Preprocessed {input_display} -> {output_display}", "✓".green());
    }

    finish(result, warnings_shown)
}

/// Turn collected error diagnostics into the command's failure
fn finish(result: Preprocessed, warnings_shown: bool) -> Result<bool> {
    if !result.has_errors() {
        return Ok(warnings_shown);
    }
    let mut errors = result.diagnostics.iter().filter(|d| d.is_error());
    let first = errors.next().map(ToString::to_string).unwrap_or_default();
    Err(PreprocessFailed {
        errors: 1 + errors.count(),
        first,
    })
    .context("Failed to preprocess input")
}

/// Install the logger; `RUST_LOG` overrides the level chosen by flags
fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Decide whether diagnostics are colored
fn use_color(disabled: bool, forced: bool, is_terminal: bool) -> bool {
    if forced {
        true
    } else if disabled {
        false
    } else {
        is_terminal
    }
}

/// Validate command-line arguments
fn validate_args(cli: &Cli) -> Result<()> {
    // Check that input and output are not the same file
    if let Some(output) = &cli.output
        && !is_std_stream(output)
        && std::fs::canonicalize(output).ok() == std::fs::canonicalize(&cli.input).ok()
    {
        return Err(ArgumentError(format!(
            "Input and output files cannot be the same: {}",
            output.display()
        ))
        .into());
    }

    if let Some(bad) = cli
        .defines
        .iter()
        .map(|d| d.split_once('=').map_or(d.as_str(), |(name, _)| name))
        .chain(cli.undefines.iter().map(String::as_str))
        .find(|name| !expandium::is_valid_macro_name(name))
    {
        return Err(ArgumentError(format!("Invalid macro name: {bad:?}")).into());
    }

    if cli.include_depth == 0 {
        return Err(ArgumentError("Include depth must be greater than 0".to_string()).into());
    }

    Ok(())
}

/// Show dry run information
fn show_dry_run_info(cli: &Cli) {
    let input_display = format_input(&cli.input);
    let output_display = cli
        .output
        .as_deref()
        .map_or("stdout".to_string(), format_output);

    eprintln!("Dry run: would preprocess {input_display} -> {output_display}");
    eprintln!("Target: {}", format_target(&cli.target));
    eprintln!("Compiler: {}", format_compiler(&cli.compiler));
    eprintln!("Include depth: {}", cli.include_depth);

    if !cli.include_dirs.is_empty() {
        eprintln!("Include directories:");
        for dir in &cli.include_dirs {
            eprintln!("  {}", dir.display());
        }
    }
    for define in &cli.defines {
        eprintln!("Define: {define}");
    }
    for undefine in &cli.undefines {
        eprintln!("Undefine: {undefine}");
    }

    #[cfg(feature = "json")]
    if cli.json {
        eprintln!("Output format: JSON");
    } else if cli.plain {
        eprintln!("Output format: Plain text");
    }
}

/// Create preprocessor configuration from CLI arguments
fn create_config(cli: &Cli) -> PreprocessorConfig {
    let target: Target = cli.target.clone().into();
    let compiler: Compiler = cli.compiler.clone().into();

    let mut config = match target {
        Target::Linux => PreprocessorConfig::for_linux().with_compiler(compiler),
        Target::Windows => PreprocessorConfig::for_windows().with_compiler(compiler),
        Target::MacOS => PreprocessorConfig::for_macos().with_compiler(compiler),
    };

    for define in &cli.defines {
        config = config.with_define_arg(define);
    }
    for undefine in &cli.undefines {
        config = config.with_undefine(undefine.as_str());
    }

    let search = IncludeSearch::new(&cli.input, cli.include_dirs.clone());
    config = config.with_include_depth_limit(cli.include_depth);
    config.with_include_resolver(SourceResolver::new(move |name: &str, kind| {
        let path = search.find(name, kind)?;
        log::debug!("resolved {name} to {}", path.display());
        std::fs::read_to_string(&path)
            .inspect_err(|e| log::warn!("cannot read {}: {e}", path.display()))
            .ok()
    }))
}

/// Filesystem lookup for `#include`
///
/// Quoted includes look next to the input file first, then in the `-I`
/// directories; angle-bracket includes only use the `-I` directories.
struct IncludeSearch {
    local_dir: Option<PathBuf>,
    include_dirs: Vec<PathBuf>,
}

impl IncludeSearch {
    fn new(input: &Path, include_dirs: Vec<PathBuf>) -> Self {
        let local_dir = if is_std_stream(input) {
            std::env::current_dir().ok()
        } else {
            Some(
                input
                    .parent()
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            )
        };
        Self {
            local_dir,
            include_dirs,
        }
    }

    fn find(&self, name: &str, kind: IncludeKind) -> Option<PathBuf> {
        let local = match kind {
            IncludeKind::Local => self.local_dir.as_ref(),
            IncludeKind::System => None,
        };
        local
            .into_iter()
            .chain(&self.include_dirs)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

/// Print diagnostics to stderr; returns whether any warning was shown
fn report_diagnostics(cli: &Cli, diagnostics: &[Diagnostic]) -> bool {
    let mut warnings_shown = false;
    for diagnostic in diagnostics {
        let show = match diagnostic.severity() {
            Severity::Error => true,
            Severity::Warning => cli.warnings && !cli.quiet,
        };
        if show {
            warnings_shown |= !diagnostic.is_error();
            eprintln!("{}", format_diagnostic(diagnostic));
        }
    }
    warnings_shown
}

/// Render one diagnostic as `file:line:col: severity: message`
fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    let severity = diagnostic.severity().to_string();
    let severity = match diagnostic.severity() {
        Severity::Error => severity.red().bold(),
        Severity::Warning => severity.yellow().bold(),
    };
    format!(
        "{}: {severity}: {}",
        diagnostic.location.to_string().bold(),
        diagnostic.message
    )
}

/// Read input from file or stdin
fn read_input(input_path: &Path) -> Result<String> {
    if is_std_stream(input_path) {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))
    }
}

/// Write output to file or stdout
fn write_output(cli: &Cli, content: &str) -> Result<()> {
    match &cli.output {
        Some(output_path) if !is_std_stream(output_path) => {
            std::fs::write(output_path, content).with_context(|| {
                format!("Failed to write to output file: {}", output_path.display())
            })?;
        }
        _ => print!("{content}"),
    }
    Ok(())
}

/// One diagnostic in the JSON report
#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct JsonDiagnostic {
    severity: String,
    kind: String,
    file: String,
    line: usize,
    column: usize,
    message: String,
}

#[cfg(feature = "json")]
impl From<&Diagnostic> for JsonDiagnostic {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            severity: diagnostic.severity().to_string(),
            kind: format!("{:?}", diagnostic.kind),
            file: diagnostic.location.file.to_string(),
            line: diagnostic.location.start_line,
            column: diagnostic.location.start_column,
            message: diagnostic.message.clone(),
        }
    }
}

/// The JSON report written by `--json`
#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct JsonReport {
    success: bool,
    output: Option<String>,
    input_file: String,
    output_file: Option<String>,
    target: String,
    compiler: String,
    include_dirs: Vec<String>,
    diagnostics: Vec<JsonDiagnostic>,
    processing_time_ms: u64,
}

#[cfg(feature = "json")]
fn json_report(cli: &Cli, result: &Preprocessed, processing_time: std::time::Duration) -> JsonReport {
    JsonReport {
        success: !result.has_errors(),
        output: (!result.has_errors()).then(|| result.output.clone()),
        input_file: format_input(&cli.input),
        output_file: cli.output.as_deref().map(format_output),
        target: format_target(&cli.target),
        compiler: format_compiler(&cli.compiler),
        include_dirs: cli
            .include_dirs
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        diagnostics: result.diagnostics.iter().map(JsonDiagnostic::from).collect(),
        processing_time_ms: u64::try_from(processing_time.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Write JSON output
#[cfg(feature = "json")]
fn write_json_output(
    cli: &Cli,
    result: &Preprocessed,
    processing_time: std::time::Duration,
) -> Result<()> {
    let report = serde_json::to_string_pretty(&json_report(cli, result, processing_time))
        .context("Failed to serialize JSON report")?;
    match &cli.output {
        Some(output_path) if !is_std_stream(output_path) => std::fs::write(output_path, report)
            .with_context(|| format!("Failed to write to output file: {}", output_path.display())),
        _ => {
            println!("{report}");
            Ok(())
        }
    }
}

/// Show verbose information
fn show_verbose_info(cli: &Cli, processing_time: std::time::Duration) {
    if cli.quiet {
        return;
    }

    eprintln!("Target: {}", format_target(&cli.target));
    eprintln!("Compiler: {}", format_compiler(&cli.compiler));
    eprintln!("Include depth: {}", cli.include_depth);
    eprintln!("Processing time: {processing_time:?}");

    if !cli.include_dirs.is_empty() {
        eprintln!("Include directories ({}):", cli.include_dirs.len());
        for dir in &cli.include_dirs {
            eprintln!("  {}", dir.display());
        }
    }
}

fn is_std_stream(path: &Path) -> bool {
    path == Path::new("-")
}

/// Format input path for display
fn format_input(path: &Path) -> String {
    if is_std_stream(path) {
        expandium::STDIN_NAME.to_string()
    } else {
        path.display().to_string()
    }
}

/// Format output path for display
fn format_output(path: &Path) -> String {
    if is_std_stream(path) {
        "stdout".to_string()
    } else {
        path.display().to_string()
    }
}

/// Format target for display
fn format_target(target: &TargetValue) -> String {
    match target {
        TargetValue::Linux => "Linux".to_string(),
        TargetValue::Windows => "Windows".to_string(),
        TargetValue::MacOS => "macOS".to_string(),
    }
}

/// Format compiler for display
fn format_compiler(compiler: &CompilerValue) -> String {
    match compiler {
        CompilerValue::GCC => "GCC".to_string(),
        CompilerValue::Clang => "Clang".to_string(),
        CompilerValue::MSVC => "MSVC".to_string(),
    }
}
