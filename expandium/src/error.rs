use crate::diagnostics::Diagnostic;

/// Errors returned by the convenience entry points
///
/// The token-level API never fails; it reports through a
/// [`DiagnosticSink`](crate::DiagnosticSink) instead.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// I/O error (e.g., file reading/writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Error diagnostics raised while preprocessing
    #[error("{}", summarize(.0))]
    Diagnostics(Vec<Diagnostic>),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "preprocessing failed".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}
