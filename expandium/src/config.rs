use std::rc::Rc;

use crate::lexer::tokenize;
use crate::token::Token;

/// Kind of include directive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeKind {
    /// Local include with quotes: #include "file.h"
    Local,
    /// System include with angles: #include <file.h>
    System,
}

/// Supplies the tokens of files named by `#include`
pub trait IncludeResolver {
    /// Tokens of `file`, or `None` if it cannot be found
    ///
    /// `directive` is the `include` token and `file` holds the bare file name.
    fn resolve(&self, directive: &Token, file: &Token, kind: IncludeKind) -> Option<Vec<Token>>;
}

impl<F> IncludeResolver for F
where
    F: Fn(&Token, &Token, IncludeKind) -> Option<Vec<Token>>,
{
    fn resolve(&self, directive: &Token, file: &Token, kind: IncludeKind) -> Option<Vec<Token>> {
        self(directive, file, kind)
    }
}

/// Include resolver built from a function returning source text
///
/// The text is tokenized with the bundled lexer and always ends with a
/// newline, so the including file continues on a fresh line.
pub struct SourceResolver<F> {
    load: F,
}

impl<F> SourceResolver<F>
where
    F: Fn(&str, IncludeKind) -> Option<String>,
{
    /// Wrap a loader taking the file name and include kind
    pub fn new(load: F) -> Self {
        Self { load }
    }
}

impl<F> IncludeResolver for SourceResolver<F>
where
    F: Fn(&str, IncludeKind) -> Option<String>,
{
    fn resolve(&self, _directive: &Token, file: &Token, kind: IncludeKind) -> Option<Vec<Token>> {
        let mut source = (self.load)(file.text(), kind)?;
        if !source.is_empty() && !source.ends_with('\n') {
            source.push('\n');
        }
        Some(tokenize(&source, file.text()))
    }
}

/// Nesting depth of `#include` allowed by default
pub const DEFAULT_INCLUDE_DEPTH_LIMIT: usize = 200;

/// Target operating system for preprocessing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Linux operating system
    Linux,
    /// Windows operating system
    Windows,
    /// macOS operating system
    MacOS,
}

/// Compiler dialect for preprocessing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compiler {
    /// GNU Compiler Collection
    GCC,
    /// LLVM Clang compiler
    Clang,
    /// Microsoft Visual C++ compiler
    MSVC,
}

/// Configuration for the C preprocessor
pub struct PreprocessorConfig {
    /// Target operating system
    pub target: Target,
    /// Compiler dialect
    pub compiler: Compiler,
    /// Macros defined before processing starts, as name and replacement text
    pub defines: Vec<(String, String)>,
    /// Macros removed after the predefined ones and `defines` are in place
    pub undefines: Vec<String>,
    /// Include file resolver
    pub include_resolver: Option<Rc<dyn IncludeResolver>>,
    /// How many included files may be open at once
    pub include_depth_limit: usize,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self::for_linux()
    }
}

impl PreprocessorConfig {
    /// Create configuration for Linux + GCC
    #[must_use]
    pub const fn for_linux() -> Self {
        Self::new(Target::Linux, Compiler::GCC)
    }

    /// Create configuration for Windows + MSVC
    #[must_use]
    pub const fn for_windows() -> Self {
        Self::new(Target::Windows, Compiler::MSVC)
    }

    /// Create configuration for macOS + Clang
    #[must_use]
    pub const fn for_macos() -> Self {
        Self::new(Target::MacOS, Compiler::Clang)
    }

    const fn new(target: Target, compiler: Compiler) -> Self {
        Self {
            target,
            compiler,
            defines: Vec::new(),
            undefines: Vec::new(),
            include_resolver: None,
            include_depth_limit: DEFAULT_INCLUDE_DEPTH_LIMIT,
        }
    }

    /// Override the compiler for this configuration
    #[must_use]
    pub const fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Define `name` as `value` before processing
    #[must_use]
    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    /// Parse a command line style definition: `NAME` (defined as `1`) or `NAME=VALUE`
    #[must_use]
    pub fn with_define_arg(self, definition: &str) -> Self {
        match definition.split_once('=') {
            Some((name, value)) => self.with_define(name, value),
            None => self.with_define(definition, "1"),
        }
    }

    /// Remove `name` before processing
    #[must_use]
    pub fn with_undefine(mut self, name: impl Into<String>) -> Self {
        self.undefines.push(name.into());
        self
    }

    /// Use `resolver` for `#include`
    #[must_use]
    pub fn with_include_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.include_resolver = Some(Rc::new(resolver));
        self
    }

    /// Limit how deeply `#include` may nest
    #[must_use]
    pub const fn with_include_depth_limit(mut self, limit: usize) -> Self {
        self.include_depth_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Location;

    fn tok(text: &str) -> Token {
        Token::new(Location::point("c.c", 1, 1), text)
    }

    #[test]
    fn presets() {
        let config = PreprocessorConfig::for_windows();
        assert_eq!(config.target, Target::Windows);
        assert_eq!(config.compiler, Compiler::MSVC);
        let config = PreprocessorConfig::for_macos().with_compiler(Compiler::GCC);
        assert_eq!(config.compiler, Compiler::GCC);
        assert_eq!(PreprocessorConfig::default().target, Target::Linux);
        assert_eq!(
            PreprocessorConfig::default().include_depth_limit,
            DEFAULT_INCLUDE_DEPTH_LIMIT
        );
        assert_eq!(
            PreprocessorConfig::for_linux().with_include_depth_limit(3).include_depth_limit,
            3
        );
    }

    #[test]
    fn define_arguments() {
        let config = PreprocessorConfig::default()
            .with_define_arg("DEBUG")
            .with_define_arg("LEVEL=3")
            .with_define_arg("EMPTY=")
            .with_undefine("NDEBUG");
        assert_eq!(
            config.defines,
            vec![
                ("DEBUG".to_string(), "1".to_string()),
                ("LEVEL".to_string(), "3".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
        assert_eq!(config.undefines, vec!["NDEBUG".to_string()]);
    }

    #[test]
    fn source_resolver_tokenizes_and_terminates_lines() {
        let resolver = SourceResolver::new(|name: &str, kind| {
            (name == "a.h" && kind == IncludeKind::Local).then(|| "int a;".to_string())
        });
        let tokens = resolver
            .resolve(&tok("include"), &tok("a.h"), IncludeKind::Local)
            .unwrap();
        let texts: Vec<&str> = tokens.iter().map(Token::text).collect();
        assert_eq!(texts, vec!["int", " ", "a", ";", "\n"]);
        assert_eq!(&*tokens[0].location().file, "a.h");
        assert!(resolver
            .resolve(&tok("include"), &tok("a.h"), IncludeKind::System)
            .is_none());
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |_: &Token, file: &Token, _: IncludeKind| Some(vec![file.clone()]);
        let tokens = resolver.resolve(&tok("include"), &tok("x.h"), IncludeKind::System);
        assert_eq!(tokens.unwrap()[0].text(), "x.h");
    }
}
