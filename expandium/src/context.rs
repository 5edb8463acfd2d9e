use std::collections::HashSet;
use std::rc::Rc;

use crate::conditional::IfElseStack;
use crate::config::{
    Compiler, DEFAULT_INCLUDE_DEPTH_LIMIT, IncludeResolver, PreprocessorConfig, Target,
};
use crate::lexer::tokenize;
use crate::macro_def::{DefineOutcome, Macro, MacroTable};

/// File name given to tokens of predefined and command line macros
const BUILTIN_FILE: &str = "<built-in>";

/// Context containing all state for preprocessor operations
///
/// One context belongs to one preprocessing session; nothing is shared
/// between sessions.
pub struct PreprocessorContext {
    /// Defined macros
    pub macros: MacroTable,
    /// Open conditional groups
    pub conditionals: IfElseStack,
    /// Include resolver, if any
    pub include_resolver: Option<Rc<dyn IncludeResolver>>,
    /// How many included files may be open at once
    pub include_depth_limit: usize,
    /// Files that asked with `#pragma once` not to be included again
    pub included_once: HashSet<String>,
}

impl Default for PreprocessorContext {
    fn default() -> Self {
        Self {
            macros: MacroTable::default(),
            conditionals: IfElseStack::default(),
            include_resolver: None,
            include_depth_limit: DEFAULT_INCLUDE_DEPTH_LIMIT,
            included_once: HashSet::new(),
        }
    }
}

impl PreprocessorContext {
    /// Create an empty context: no macros, no open groups, no include resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply configuration to the context
    ///
    /// Target and compiler macros are defined first, then the configured
    /// definitions, then the configured undefinitions.
    pub fn apply_config(&mut self, config: &PreprocessorConfig) {
        self.include_resolver.clone_from(&config.include_resolver);
        self.include_depth_limit = config.include_depth_limit;

        self.define_target_macros(config.target);
        self.define_compiler_macros(config.compiler);
        self.define_sizeof_macros();

        for (name, value) in &config.defines {
            self.define(name, value);
        }
        for name in &config.undefines {
            self.undef(name);
        }
    }

    fn define_target_macros(&mut self, target: Target) {
        match target {
            Target::Linux => {
                self.define("__linux__", "1");
                self.define("__unix__", "1");
                self.define("__LP64__", "1");
            }
            Target::Windows => {
                self.define("_WIN32", "1");
                self.define("WIN32", "1");
                self.define("_WINDOWS", "1");
            }
            Target::MacOS => {
                self.define("__APPLE__", "1");
                self.define("__MACH__", "1");
                self.define("TARGET_OS_MAC", "1");
                self.define("__LP64__", "1");
            }
        }
    }

    fn define_compiler_macros(&mut self, compiler: Compiler) {
        match compiler {
            Compiler::GCC => {
                // GCC 11.2.0
                self.define("__GNUC__", "11");
                self.define("__GNUC_MINOR__", "2");
                self.define("__GNUC_PATCHLEVEL__", "0");
            }
            Compiler::Clang => {
                // Clang 14.0.0
                self.define("__clang__", "1");
                self.define("__clang_major__", "14");
                self.define("__clang_minor__", "0");
                self.define("__clang_patchlevel__", "0");
            }
            Compiler::MSVC => {
                // Visual Studio 2019
                self.define("_MSC_VER", "1920");
                self.define("_MSC_FULL_VER", "192027508");
            }
        }
    }

    fn define_sizeof_macros(&mut self) {
        self.define("__SIZEOF_INT__", "4");
        self.define("__SIZEOF_LONG_LONG__", "8");
        self.define("__SIZEOF_POINTER__", "8");
    }

    /// Define an object-like macro whose replacement is the tokenized `body`
    pub fn define(&mut self, name: &str, body: &str) -> DefineOutcome {
        log::debug!("predefining `{name}` as `{body}`");
        self.macros
            .define(Rc::new(Macro::object(name, tokenize(body, BUILTIN_FILE))))
    }

    /// Remove a macro definition
    pub fn undef(&mut self, name: &str) -> bool {
        log::debug!("removing predefined `{name}`");
        self.macros.undef(name).is_some()
    }

    /// Check if a macro is defined
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.is_defined(name)
    }

    /// Mark `file` so later `#include`s of it are skipped
    pub fn mark_once(&mut self, file: &str) {
        self.included_once.insert(file.to_string());
    }

    /// Check if `file` was marked with `#pragma once`
    #[must_use]
    pub fn is_once(&self, file: &str) -> bool {
        self.included_once.contains(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokens_to_string;

    fn body(context: &PreprocessorContext, name: &str) -> Option<String> {
        context
            .macros
            .resolve(name)
            .map(|m| tokens_to_string(m.body()))
    }

    #[test]
    fn new_context_is_empty() {
        let context = PreprocessorContext::new();
        assert!(context.macros.is_empty());
        assert!(context.conditionals.is_empty());
        assert!(context.include_resolver.is_none());
        assert!(context.included_once.is_empty());
        assert_eq!(context.include_depth_limit, DEFAULT_INCLUDE_DEPTH_LIMIT);
    }

    #[test]
    fn once_marks() {
        let mut context = PreprocessorContext::new();
        context.mark_once("a.h");
        assert!(context.is_once("a.h"));
        assert!(!context.is_once("b.h"));
    }

    #[test]
    fn config_sets_the_include_depth_limit() {
        let mut context = PreprocessorContext::new();
        context.apply_config(&PreprocessorConfig::default().with_include_depth_limit(7));
        assert_eq!(context.include_depth_limit, 7);
    }

    #[test]
    fn target_and_compiler_macros() {
        let mut context = PreprocessorContext::new();
        context.apply_config(&PreprocessorConfig::for_windows());
        assert_eq!(body(&context, "_MSC_VER").as_deref(), Some("1920"));
        assert!(context.is_defined("_WIN32"));
        assert!(!context.is_defined("__linux__"));

        let mut context = PreprocessorContext::new();
        context.apply_config(&PreprocessorConfig::for_macos());
        assert!(context.is_defined("__APPLE__"));
        assert!(context.is_defined("__clang__"));
    }

    #[test]
    fn user_defines_then_undefines() {
        let config = PreprocessorConfig::for_linux()
            .with_define("VERSION", "2 + 1")
            .with_define_arg("FEATURE")
            .with_undefine("__GNUC__")
            .with_undefine("FEATURE");
        let mut context = PreprocessorContext::new();
        context.apply_config(&config);
        assert_eq!(body(&context, "VERSION").as_deref(), Some("2 + 1"));
        assert!(!context.is_defined("__GNUC__"));
        assert!(!context.is_defined("FEATURE"));
        assert!(context.is_defined("__linux__"));
    }
}
