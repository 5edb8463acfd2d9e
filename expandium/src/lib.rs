#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # C Macro Expansion Library
//!
//! This library implements the macro expansion and conditional compilation
//! stage of a C preprocessor. It consumes a token stream and produces the
//! preprocessed token stream: directives are executed, macros are expanded
//! and inactive conditional regions are removed.
//!
//! ## Features
//!
//! - Object-like, function-like and variadic macros with `#` and `##`
//! - Hideset-based recursion prevention
//! - Conditional compilation (`#if`, `#ifdef`, `#ifndef`, `#elif`, `#else`, `#endif`)
//! - Arbitrary precision `#if` arithmetic with `defined`
//! - Include processing with custom resolvers
//! - Target-specific macro definitions (Linux, Windows, macOS)
//! - Compiler-specific macro definitions (GCC, Clang, MSVC)
//! - Diagnostics through a pluggable [`DiagnosticSink`]
//!
//! ## Example
//!
//! ```rust
//! use expandium::{preprocess_c_code, PreprocessorConfig};
//!
//! let code = r#"
//! #define PI 3.14
//! #ifdef __linux__
//! const char* platform = "Linux";
//! #endif
//! float x = PI;
//! "#;
//!
//! let config = PreprocessorConfig::for_linux();
//! let result = preprocess_c_code(code, &config).unwrap();
//! assert!(result.contains("\"Linux\""));
//! assert!(result.contains("float x = 3.14;"));
//! ```

mod conditional;
mod config;
mod context;
mod diagnostics;
mod error;
mod expander;
mod expression;
mod lexer;
mod literal;
mod macro_def;
mod preprocessor;
mod token;
mod token_queue;

pub use conditional::{IfElseStack, Level};
pub use config::{
    Compiler, DEFAULT_INCLUDE_DEPTH_LIMIT, IncludeKind, IncludeResolver, PreprocessorConfig,
    SourceResolver, Target,
};
pub use context::PreprocessorContext;
pub use diagnostics::{Collector, Diagnostic, DiagnosticKind, DiagnosticSink, LogSink, Severity};
pub use error::PreprocessError;
pub use expander::{Expander, Expansion};
pub use expression::{BinaryOp, CompareOp, Expr, ExprError, ExpressionEvaluator, UnaryOp, Value};
pub use lexer::{Lexer, tokenize};
pub use literal::{Base, FloatWidth, IntegerWidth, Literal};
pub use macro_def::{DefineOutcome, Macro, MacroKind, MacroTable, VA_ARGS};
pub use preprocessor::Preprocessor;
pub use token::{
    DefaultTokenFactory, HideSet, Location, Token, TokenFactory, is_valid_macro_name,
    tokens_to_string,
};
pub use token_queue::TokenQueue;

use std::path::Path;

/// File name used for input given as a string
pub const STDIN_NAME: &str = "<stdin>";

/// Concatenate token texts into source text
pub fn render(tokens: &[Token]) -> String {
    tokens_to_string(tokens)
}

/// Output of a preprocessing run together with everything it reported
#[derive(Clone, Debug)]
pub struct Preprocessed {
    /// Preprocessed source text
    pub output: String,
    /// Warnings and errors in the order they were raised
    pub diagnostics: Vec<Diagnostic>,
}

impl Preprocessed {
    /// Whether any error was reported
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Preprocess `input`, collecting diagnostics instead of failing
pub fn preprocess(input: &str, config: &PreprocessorConfig) -> Preprocessed {
    preprocess_named(input, STDIN_NAME, config)
}

/// Like [`preprocess`], with locations reported against `file`
pub fn preprocess_named(input: &str, file: &str, config: &PreprocessorConfig) -> Preprocessed {
    let mut preprocessor = Preprocessor::with_config(tokenize(input, file), config, Collector::new());
    let tokens: Vec<Token> = preprocessor.by_ref().collect();
    Preprocessed {
        output: render(&tokens),
        diagnostics: preprocessor.into_sink().into_diagnostics(),
    }
}

/// Preprocess C code with the given configuration.
/// This automatically defines target and compiler-specific macros.
///
/// # Errors
/// Returns `PreprocessError::Diagnostics` holding every error diagnostic if
/// any was raised. Warnings alone do not fail.
pub fn preprocess_c_code<S: AsRef<str>>(
    input: S,
    config: &PreprocessorConfig,
) -> Result<String, PreprocessError> {
    into_result(preprocess(input.as_ref(), config))
}

fn into_result(result: Preprocessed) -> Result<String, PreprocessError> {
    if !result.has_errors() {
        return Ok(result.output);
    }
    let errors = result
        .diagnostics
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    Err(PreprocessError::Diagnostics(errors))
}

/// Preprocess a C file and write the result to another file
///
/// # Errors
/// Returns `PreprocessError` if the input file cannot be read,
/// the output file cannot be written, or if preprocessing fails.
pub fn preprocess_c_file<P: AsRef<Path>>(
    input_path: P,
    output_path: P,
    config: &PreprocessorConfig,
) -> Result<(), PreprocessError> {
    let output = preprocess_c_file_to_string(input_path, config)?;
    std::fs::write(output_path, output)?;
    Ok(())
}

/// Preprocess a C file and return the result as a string
///
/// # Errors
/// Returns `PreprocessError` if the file cannot be read or if preprocessing fails.
pub fn preprocess_c_file_to_string<P: AsRef<Path>>(
    input_path: P,
    config: &PreprocessorConfig,
) -> Result<String, PreprocessError> {
    let input_path = input_path.as_ref();
    let input = std::fs::read_to_string(input_path)?;
    let file = input_path.to_string_lossy();
    into_result(preprocess_named(&input, &file, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(src: &str) -> Result<String, PreprocessError> {
        preprocess_c_code(src, &PreprocessorConfig::default())
    }

    #[test]
    fn simple_object_macro() {
        let src = r#"
#define PI 3.14
float x = PI;
"#;
        let out = process(src).unwrap();
        assert!(out.contains("float x = 3.14;"));
    }

    #[test]
    fn function_like_macro() {
        let src = r#"
#define ADD(a, b) ((a)+(b))
int z = ADD(1, 2);
"#;
        let out = process(src).unwrap();
        assert!(out.contains("((1)+(2))"));
    }

    #[test]
    fn include_example() {
        let src = r#"
#include "inc.h"
int x = FOO;
"#;
        let config = PreprocessorConfig::default().with_include_resolver(SourceResolver::new(
            |path: &str, _| (path == "inc.h").then(|| "#define FOO 42\n".to_string()),
        ));
        let out = preprocess_c_code(src, &config).unwrap();
        assert!(out.contains("int x = 42;"));
    }

    #[test]
    fn conditional_compilation_ifdef() {
        let src = r#"
#define DEBUG 1
#ifdef DEBUG
int x = 1;
#else
int x = 0;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 1;"));
        assert!(!out.contains("int x = 0;"));
    }

    #[test]
    fn expression_arithmetic() {
        let src = r#"
#if 1 + 2 * 3 == 7 && 7 / 2 == 3 && -7 % 3 == -1 && (1 << 40) > 0
int x = 1;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn expression_logical() {
        let src = r#"
#if (1 && 0) || (0 && 1) || (1 && 1)
int x = 1;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn expression_comparison() {
        let src = r#"
#if 5 > 3 && 10 >= 10 && 2 < 4 && 5 <= 5 && 3 != 4 && 5 == 5
int x = 1;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn expression_unary() {
        let src = r#"
#if !0 && !!1 && -(-5) == 5 && ~0 == -1
int x = 1;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn expression_precedence() {
        let src = r#"
#if 2 + 3 * 4 == 14 && (2 + 3) * 4 == 20 && (1 ? 2 : 3) == 2
int x = 1;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 1;"));
    }

    #[test]
    fn predefined_macros_drive_conditionals() {
        let src = r#"
#if defined(_WIN32) && _MSC_VER >= 1900
int windows;
#elif defined __linux__ && __GNUC__ >= 4
int linux;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int linux;"));
        let out = preprocess_c_code(src, &PreprocessorConfig::for_windows()).unwrap();
        assert!(out.contains("int windows;"));
    }

    #[test]
    fn comment_stripping() {
        let src = r#"
// This is a comment
int x = 1; /* inline comment */
#define MACRO // comment after define
int y = MACRO;
"#;
        let out = process(src).unwrap();
        assert!(!out.contains("comment"));
        assert!(out.contains("int y = ;"));
    }

    #[test]
    fn conditional_compilation_elif() {
        let src = r#"
#define LEVEL 2
#if LEVEL == 1
int x = 1;
#elif LEVEL == 2
int x = 2;
#else
int x = 3;
#endif
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = 2;"));
        assert!(!out.contains("int x = 3;"));
    }

    #[test]
    fn error_directive() {
        let src = r#"
#if 0
#else
#error This should error
#endif
"#;
        let Err(PreprocessError::Diagnostics(errors)) = process(src) else {
            panic!("expected an error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::UserError);
        assert_eq!(errors[0].location.start_line, 4);
    }

    #[test]
    fn warnings_do_not_fail() {
        let result = preprocess("#warning soon\n#define A 1\n#define A 2\nA\n", &PreprocessorConfig::default());
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics.len(), 2);
        assert_eq!(result.output, "2\n");
        assert_eq!(&*result.diagnostics[0].location.file, STDIN_NAME);
    }

    #[test]
    fn undef_directive() {
        let src = r#"
#define FOO 1
#undef FOO
int x = FOO;
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = FOO;"));
    }

    #[test]
    fn variadic_macro() {
        let src = r#"
#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)
LOG("hello %s\n", "world");
"#;
        let out = process(src).unwrap();
        assert!(out.contains("printf(\"hello %s\\n\", \"world\")"));
    }

    #[test]
    fn nested_macros() {
        let src = r#"
#define ADD(a, b) ((a)+(b))
#define MUL(a, b) ((a)*(b))
int x = ADD(ADD(1, 2), MUL(3, 4));
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x = ((((1)+(2)))+(((3)*(4))));"));
    }

    #[test]
    fn macro_with_stringification() {
        let src = r#"
#define STR(x) #x
const char* s = STR(hello);
"#;
        let out = process(src).unwrap();
        assert!(out.contains("\"hello\""));
    }

    #[test]
    fn token_pasting_basic() {
        let src = r#"
#define PASTE(a,b) a##b
int x1 = PASTE(x, 1);
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x1 = x1;"));
    }

    #[test]
    fn token_pasting_operators() {
        let src = r#"
#define MAKE_ASSIGN(op) op ## =
int x MAKE_ASSIGN(+) 5;
"#;
        let out = process(src).unwrap();
        assert!(out.contains("int x += 5;"));
    }

    #[test]
    fn token_pasting_multiple() {
        let src = r#"
#define PASTE3(a,b,c) a##b##c
int var PASTE3(_,x,_) = 42;
"#;
        let out = process(src).unwrap();
        assert!(out.contains("_x_"));
    }

    #[test]
    fn file_round_trip() {
        let dir = std::env::temp_dir().join(format!("expandium-lib-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.c");
        let output = dir.join("out.c");
        std::fs::write(&input, "#define N 3\nint a[N];\n").unwrap();

        preprocess_c_file(&input, &output, &PreprocessorConfig::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "int a[3];\n");

        std::fs::write(&input, "#error broken\n").unwrap();
        let Err(PreprocessError::Diagnostics(errors)) =
            preprocess_c_file_to_string(&input, &PreprocessorConfig::default())
        else {
            panic!("expected an error");
        };
        assert!(errors[0].location.file.ends_with("in.c"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = preprocess_c_file_to_string("/nonexistent/expandium.c", &PreprocessorConfig::default());
        assert!(matches!(result, Err(PreprocessError::Io(_))));
    }
}
