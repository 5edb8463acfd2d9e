//! Warning and error reporting.
//!
//! The preprocessor never stops on a problem. Each condition is reported
//! through a named hook on [`DiagnosticSink`]; the default hooks format a
//! [`Diagnostic`] and hand it to [`DiagnosticSink::report`], which does
//! nothing unless overridden. Embedders can override either level.

use std::fmt;

use crate::macro_def::Macro;
use crate::token::{Location, Token, tokens_to_string};

/// How serious a diagnostic is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Processing continues with a sensible fallback
    Warning,
    /// The construct was dropped or replaced by a neutral value
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Every condition the preprocessor reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Directive is missing a required argument
    IncompleteDirective,
    /// `#define`/`#undef`/`#ifdef` name is not an identifier
    InvalidMacroName,
    /// Macro redefined with a different replacement
    MacroRedefinition,
    /// Parameter name repeated in a macro definition
    MacroParameterRedefinition,
    /// Identifier in `#if` that is not a macro
    UndefinedIdentifier,
    /// `#elif`/`#else`/`#endif` without a matching `#if`, or after `#else`
    MismatchedDirective,
    /// Extra tokens after a directive's argument
    ExtraToken,
    /// Directive name that is not recognized
    UnknownDirective,
    /// `#if` still open at the end of input
    UnterminatedConditional,
    /// `#warning`
    UserWarning,
    /// Parameter list of a function-like macro is cut short
    IncompleteMacroDefinition,
    /// Malformed parameter list
    InvalidMacroDefinition,
    /// Argument list of a macro call is cut short
    InvalidMacroCall,
    /// Too few arguments in a macro call
    MissingMacroArgument,
    /// Too many arguments in a macro call
    ExtraMacroArgument,
    /// `##` did not form a valid token
    InvalidPaste,
    /// Malformed constant expression
    InvalidExpression,
    /// `defined` without an identifier
    InvalidDefinedOperand,
    /// Floating literal in a constant expression
    FloatingPointInExpression,
    /// String or character literal in a constant expression
    StringInExpression,
    /// Assignment operator in a constant expression
    AssignmentInExpression,
    /// Division or remainder by zero in a constant expression
    DivisionByZero,
    /// `#include` argument is neither `"file"` nor `<file>`
    InvalidInclude,
    /// No include resolver could supply the file
    IncludeNotFound,
    /// `#include` nested deeper than the configured limit
    IncludeDepthExceeded,
    /// `#error`
    UserError,
}

impl DiagnosticKind {
    /// Severity this kind is reported with
    #[must_use]
    pub const fn severity(self) -> Severity {
        use DiagnosticKind::*;
        match self {
            IncompleteDirective | InvalidMacroName | MacroRedefinition
            | MacroParameterRedefinition | UndefinedIdentifier | MismatchedDirective
            | ExtraToken | UnknownDirective | UnterminatedConditional | UserWarning => {
                Severity::Warning
            }
            IncompleteMacroDefinition | InvalidMacroDefinition | InvalidMacroCall
            | MissingMacroArgument | ExtraMacroArgument | InvalidPaste | InvalidExpression
            | InvalidDefinedOperand | FloatingPointInExpression | StringInExpression
            | AssignmentInExpression | DivisionByZero | InvalidInclude | IncludeNotFound
            | IncludeDepthExceeded | UserError => Severity::Error,
        }
    }
}

/// A formatted warning or error
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {}: {message}", .kind.severity())]
pub struct Diagnostic {
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Where it went wrong
    pub location: Location,
    /// Human readable description
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic located at `token`
    pub fn new(kind: DiagnosticKind, token: &Token, message: impl Into<String>) -> Self {
        Self {
            kind,
            location: token.location().clone(),
            message: message.into(),
        }
    }

    /// Severity of the diagnostic
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Check if this is an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

fn signature(mac: &Macro) -> String {
    if mac.is_function_like() {
        format!("{}({})", mac.name(), mac.params().join(", "))
    } else {
        mac.name().to_string()
    }
}

/// Receiver for every warning and error the preprocessor raises
///
/// All hooks have default implementations that build a [`Diagnostic`] and
/// pass it to [`DiagnosticSink::report`].
#[allow(unused_variables)]
pub trait DiagnosticSink {
    /// Receive a formatted diagnostic; ignored by default
    fn report(&mut self, diagnostic: Diagnostic) {}

    /// A directive lacks its argument
    fn incomplete_directive(&mut self, directive: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::IncompleteDirective,
            directive,
            format!("#{} directive is missing its argument", directive.text()),
        ));
    }

    /// `name` cannot be used as a macro name
    fn invalid_macro_name(&mut self, directive: &Token, name: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidMacroName,
            name,
            format!("`{name}` is not a valid macro name in #{directive}"),
        ));
    }

    /// `new` replaces a different definition `old`
    fn macro_redefinition(&mut self, directive: &Token, old: &Macro, new: &Macro) {
        self.report(Diagnostic::new(
            DiagnosticKind::MacroRedefinition,
            directive,
            format!(
                "`{}` redefined: `{}` was `{}`, now `{}`",
                new.name(),
                signature(old),
                tokens_to_string(old.body()),
                tokens_to_string(new.body())
            ),
        ));
    }

    /// Parameter `parameter` appears twice in the definition of `name`
    fn macro_parameter_redefinition(&mut self, directive: &Token, name: &Token, parameter: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::MacroParameterRedefinition,
            parameter,
            format!("duplicate parameter `{parameter}` in definition of `{name}`"),
        ));
    }

    /// Identifier in a constant expression is not a macro
    fn undefined_identifier(&mut self, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::UndefinedIdentifier,
            token,
            format!("`{token}` is not defined, evaluating as false"),
        ));
    }

    /// Conditional directive without a matching open `#if`, or after `#else`
    fn mismatched_directive(&mut self, directive: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::MismatchedDirective,
            directive,
            format!("#{directive} without a matching #if"),
        ));
    }

    /// `extra` follows the argument of a directive
    fn extra_token(&mut self, directive: &Token, extra: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::ExtraToken,
            extra,
            format!("extra token `{extra}` after #{directive}"),
        ));
    }

    /// Directive name is not recognized
    fn unknown_directive(&mut self, directive: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::UnknownDirective,
            directive,
            format!("unknown directive #{directive}"),
        ));
    }

    /// Conditional opened by `directive` is still open at end of input
    fn unterminated_conditional(&mut self, directive: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::UnterminatedConditional,
            directive,
            format!("#{directive} is never closed by #endif"),
        ));
    }

    /// `#warning` with its message
    fn user_warning(&mut self, directive: &Token, message: &str) {
        self.report(Diagnostic::new(
            DiagnosticKind::UserWarning,
            directive,
            format!("#warning {message}"),
        ));
    }

    /// Parameter list of `name` ends before `)`
    fn incomplete_macro_definition(&mut self, directive: &Token, name: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::IncompleteMacroDefinition,
            name,
            format!("parameter list of `{name}` is not closed"),
        ));
    }

    /// `offending` is not allowed in the parameter list of `name`
    fn invalid_macro_definition(&mut self, directive: &Token, name: &Token, offending: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidMacroDefinition,
            offending,
            format!("unexpected `{offending}` in parameter list of `{name}`"),
        ));
    }

    /// Input ended inside the argument list of a call to `mac`
    fn invalid_macro_call(&mut self, mac: &Macro, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidMacroCall,
            token,
            format!("unterminated argument list invoking `{}`", mac.name()),
        ));
    }

    /// The call to `mac` supplies only `index` arguments
    fn missing_macro_argument(&mut self, mac: &Macro, token: &Token, index: usize) {
        let parameter = mac.params().get(index).map_or("?", String::as_str);
        self.report(Diagnostic::new(
            DiagnosticKind::MissingMacroArgument,
            token,
            format!(
                "`{}` requires {} arguments, but only {index} given (missing `{parameter}`)",
                signature(mac),
                mac.params().len()
            ),
        ));
    }

    /// The call to `mac` supplies more arguments than it declares
    fn extra_macro_argument(&mut self, mac: &Macro, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::ExtraMacroArgument,
            token,
            format!(
                "`{}` passed more than {} arguments",
                signature(mac),
                mac.params().len()
            ),
        ));
    }

    /// Pasting inside `mac` produced the invalid token `token`
    fn invalid_paste(&mut self, mac: &Macro, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidPaste,
            token,
            format!(
                "pasting in `{}` does not give a valid token: `{token}`",
                mac.name()
            ),
        ));
    }

    /// Constant expression is malformed near `token`
    fn invalid_expression(&mut self, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidExpression,
            token,
            format!("invalid constant expression near `{token}`"),
        ));
    }

    /// `defined` is not followed by an identifier
    fn invalid_defined_operand(&mut self, defined: &Token, operand: Option<&Token>) {
        let message = match operand {
            Some(operand) => format!("`defined` requires an identifier, found `{operand}`"),
            None => "`defined` requires an identifier".to_string(),
        };
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidDefinedOperand,
            defined,
            message,
        ));
    }

    /// Floating literal in a constant expression
    fn floating_point_in_expression(&mut self, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::FloatingPointInExpression,
            token,
            format!("floating constant `{token}` in preprocessor expression"),
        ));
    }

    /// String or character literal in a constant expression
    fn string_in_expression(&mut self, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::StringInExpression,
            token,
            format!("literal `{token}` in preprocessor expression"),
        ));
    }

    /// Assignment operator in a constant expression
    fn assignment_in_expression(&mut self, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::AssignmentInExpression,
            token,
            format!("assignment `{token}` in preprocessor expression"),
        ));
    }

    /// Division or remainder by zero
    fn division_by_zero(&mut self, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::DivisionByZero,
            token,
            format!("division by zero in `{token}`"),
        ));
    }

    /// `#include` argument is malformed
    fn invalid_include(&mut self, directive: &Token, token: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::InvalidInclude,
            token,
            format!("#include expects \"FILENAME\" or <FILENAME>, found `{token}`"),
        ));
    }

    /// No include resolver supplied `file`
    fn include_not_found(&mut self, directive: &Token, file: &Token) {
        self.report(Diagnostic::new(
            DiagnosticKind::IncludeNotFound,
            file,
            format!("include file not found: {file}"),
        ));
    }

    /// `#include` of `file` would open more than `limit` nested files
    fn include_depth_exceeded(&mut self, directive: &Token, file: &Token, limit: usize) {
        self.report(Diagnostic::new(
            DiagnosticKind::IncludeDepthExceeded,
            file,
            format!("#include nested more than {limit} levels deep: {file}"),
        ));
    }

    /// `#error` with its message
    fn user_error(&mut self, directive: &Token, message: &str) {
        self.report(Diagnostic::new(
            DiagnosticKind::UserError,
            directive,
            format!("#error {message}"),
        ));
    }
}

/// Discards every diagnostic
impl DiagnosticSink for () {}

/// Keeps every diagnostic in order of occurrence
#[derive(Clone, Debug, Default)]
pub struct Collector {
    diagnostics: Vec<Diagnostic>,
}

impl Collector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics collected so far
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take the collected diagnostics
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Collected errors
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Collected warnings
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Kinds of the collected diagnostics, in order
    #[must_use]
    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.diagnostics.iter().map(|d| d.kind).collect()
    }

    /// Check if any error was collected
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

impl DiagnosticSink for Collector {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::debug!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }
}

/// Forwards diagnostics to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Location;

    fn token(text: &str) -> Token {
        Token::new(Location::point("d.c", 4, 2), text)
    }

    #[test]
    fn severities() {
        assert_eq!(DiagnosticKind::UserWarning.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::UserError.severity(), Severity::Error);
        assert_eq!(DiagnosticKind::UndefinedIdentifier.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::DivisionByZero.severity(), Severity::Error);
    }

    #[test]
    fn collector_keeps_order_and_splits_by_severity() {
        let mut sink = Collector::new();
        sink.undefined_identifier(&token("FOO"));
        sink.user_error(&token("error"), "stop");
        assert_eq!(
            sink.kinds(),
            vec![DiagnosticKind::UndefinedIdentifier, DiagnosticKind::UserError]
        );
        assert_eq!(sink.errors().count(), 1);
        assert_eq!(sink.warnings().count(), 1);
        assert!(sink.has_errors());
    }

    #[test]
    fn display_includes_location_and_severity() {
        let diagnostic = Diagnostic::new(DiagnosticKind::UserError, &token("error"), "#error boom");
        assert_eq!(diagnostic.to_string(), "d.c:4:2: error: #error boom");
    }

    #[test]
    fn overriding_a_hook_bypasses_report() {
        #[derive(Default)]
        struct OnlyUndefined(Vec<String>);
        impl DiagnosticSink for OnlyUndefined {
            fn undefined_identifier(&mut self, token: &Token) {
                self.0.push(token.text().to_string());
            }
        }

        let mut sink = OnlyUndefined::default();
        sink.undefined_identifier(&token("X"));
        sink.invalid_expression(&token(")"));
        assert_eq!(sink.0, vec!["X"]);
    }
}
