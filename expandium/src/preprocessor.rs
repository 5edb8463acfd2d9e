use std::rc::Rc;

use crate::config::{IncludeKind, IncludeResolver, PreprocessorConfig};
use crate::context::PreprocessorContext;
use crate::diagnostics::DiagnosticSink;
use crate::expander::{Expander, Expansion};
use crate::expression::ExpressionEvaluator;
use crate::macro_def::{DefineOutcome, Macro, VA_ARGS};
use crate::token::{DefaultTokenFactory, Token, TokenFactory, tokens_to_string};
use crate::token_queue::TokenQueue;

/// Pull-based C preprocessor over a token stream
///
/// Tokens are produced one at a time by [`Preprocessor::next_token`] (or by
/// iterating). Directives are consumed, macros are expanded and tokens in
/// inactive conditional regions are dropped. Newlines and blanks are kept so
/// the output has the same line structure as the input.
///
/// # Examples
///
/// ```
/// use expandium::{Preprocessor, tokenize, render};
///
/// let source = "#define SQUARE(x) ((x) * (x))\nSQUARE(3)\n";
/// let output: Vec<_> = Preprocessor::new(tokenize(source, "demo.c")).collect();
/// assert_eq!(render(&output), "((3) * (3))\n");
/// ```
pub struct Preprocessor<'a, D: DiagnosticSink = ()> {
    queue: TokenQueue<'a>,
    context: PreprocessorContext,
    factory: Box<dyn TokenFactory>,
    sink: D,
    at_line_start: bool,
    finished: bool,
}

impl<'a> Preprocessor<'a, ()> {
    /// Create a preprocessor that discards diagnostics
    pub fn new<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        Self::with_sink(tokens, ())
    }
}

impl<'a, D: DiagnosticSink> Preprocessor<'a, D> {
    /// Create a preprocessor reporting to `sink`
    pub fn with_sink<I>(tokens: I, sink: D) -> Self
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        Self {
            queue: TokenQueue::new(tokens),
            context: PreprocessorContext::new(),
            factory: Box::new(DefaultTokenFactory),
            sink,
            at_line_start: true,
            finished: false,
        }
    }

    /// Create a preprocessor with predefined macros and include resolver from `config`
    pub fn with_config<I>(tokens: I, config: &PreprocessorConfig, sink: D) -> Self
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        let mut preprocessor = Self::with_sink(tokens, sink);
        preprocessor.context.apply_config(config);
        preprocessor
    }

    /// Use `factory` for every token created during expansion
    #[must_use]
    pub fn with_token_factory(mut self, factory: impl TokenFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Use `resolver` for `#include`
    #[must_use]
    pub fn with_include_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.context.include_resolver = Some(Rc::new(resolver));
        self
    }

    /// Session state: macro table and open conditionals
    #[must_use]
    pub fn context(&self) -> &PreprocessorContext {
        &self.context
    }

    /// Mutable session state, e.g. to define macros before processing
    pub fn context_mut(&mut self) -> &mut PreprocessorContext {
        &mut self.context
    }

    /// The diagnostic sink
    #[must_use]
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Take back the diagnostic sink
    #[must_use]
    pub fn into_sink(self) -> D {
        self.sink
    }

    /// Produce the next output token
    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            let Some(token) = self.queue.read_next_token() else {
                self.finish();
                return None;
            };

            if token.is_newline() {
                self.at_line_start = true;
                return Some(token);
            }
            if token.is_blank() || token.is_continuation() {
                return Some(token);
            }
            if token.is_comment() {
                continue;
            }
            if token.is("#") && self.at_line_start {
                self.read_directive();
                continue;
            }

            self.at_line_start = false;
            if !self.context.conditionals.current_state() {
                continue;
            }

            if token.is_identifier()
                && !token.hideset().contains(token.text())
                && let Some(mac) = self.context.macros.resolve(token.text())
            {
                let mut expander =
                    Expander::new(&self.context.macros, self.factory.as_ref(), &mut self.sink);
                match expander.expand(&mac, token, &mut self.queue) {
                    Expansion::Expanded | Expansion::Failed => continue,
                    Expansion::NotInvoked(token) => return Some(token),
                }
            }
            return Some(token);
        }
    }

    /// Report conditionals left open at end of input
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        for level in self.context.conditionals.drain() {
            self.sink.unterminated_conditional(&level.enter_token);
        }
    }

    /// Read the rest of a directive line after its `#` and process it
    fn read_directive(&mut self) {
        let Some(directive) = self.queue.skip(Token::is_whitespace) else {
            return;
        };
        if directive.is_newline() {
            // Null directive
            return;
        }

        let mut arguments = Vec::new();
        while let Some(token) = self.queue.read_next_token() {
            if token.is_newline() {
                break;
            }
            if token.is_continuation() {
                continue;
            }
            if token.is_comment() {
                arguments.push(self.factory.create_token(token.location(), " "));
                continue;
            }
            arguments.push(token);
        }
        self.at_line_start = true;
        self.process_directive(directive, arguments);
    }

    fn process_directive(&mut self, directive: Token, arguments: Vec<Token>) {
        let name = directive.text().to_ascii_lowercase();
        log::trace!("#{name} at {}", directive.location());

        match name.as_str() {
            "if" => return self.process_if(directive, arguments, false),
            "elif" => return self.process_if(directive, arguments, true),
            "ifdef" => return self.process_ifdef(directive, arguments, true),
            "ifndef" => return self.process_ifdef(directive, arguments, false),
            "else" => return self.process_else(directive, arguments),
            "endif" => return self.process_endif(directive, arguments),
            _ => {}
        }
        if !self.context.conditionals.current_state() {
            return;
        }

        match name.as_str() {
            "define" => self.process_define(directive, arguments),
            "undef" => self.process_undef(directive, arguments),
            "include" => self.process_include(directive, arguments),
            "error" => {
                let message = message_text(&arguments);
                self.sink.user_error(&directive, &message);
            }
            "warning" => {
                let message = message_text(&arguments);
                self.sink.user_warning(&directive, &message);
            }
            "pragma" => self.process_pragma(directive, arguments),
            "line" => log::debug!("ignoring #line at {}", directive.location()),
            _ => self.sink.unknown_directive(&directive),
        }
    }

    fn process_if(&mut self, directive: Token, arguments: Vec<Token>, else_if: bool) {
        let conditionals = &mut self.context.conditionals;
        if else_if && conditionals.top().is_none_or(|level| level.else_token.is_some()) {
            self.sink.mismatched_directive(&directive);
            return;
        }

        if conditionals.disabled() {
            if else_if {
                conditionals.enter_disabled_else_if(directive);
            } else {
                conditionals.enter_disabled_if(directive);
            }
            return;
        }
        if !else_if && !conditionals.current_state() {
            conditionals.enter_disabled_if(directive);
            return;
        }
        if else_if && conditionals.valid_state_seen() {
            conditionals.enter_else_if(directive, false);
            return;
        }

        let state = ExpressionEvaluator::new(&self.context.macros, self.factory.as_ref(), &mut self.sink)
            .evaluate_condition(&directive, arguments);
        if else_if {
            self.context.conditionals.enter_else_if(directive, state);
        } else {
            self.context.conditionals.enter_if(directive, state);
        }
    }

    fn process_ifdef(&mut self, directive: Token, arguments: Vec<Token>, want_defined: bool) {
        if !self.context.conditionals.current_state() {
            self.context.conditionals.enter_disabled_if(directive);
            return;
        }

        let mut words = arguments.iter().filter(|t| !t.is_blank());
        let Some(name) = words.next() else {
            self.sink.incomplete_directive(&directive);
            self.context.conditionals.enter_if(directive, false);
            return;
        };
        if !name.is_identifier() {
            self.sink.invalid_macro_name(&directive, name);
        }
        if let Some(extra) = words.next() {
            self.sink.extra_token(&directive, extra);
        }
        let state = self.context.macros.is_defined(name.text()) == want_defined;
        self.context.conditionals.enter_if(directive, state);
    }

    fn process_else(&mut self, directive: Token, arguments: Vec<Token>) {
        let conditionals = &mut self.context.conditionals;
        if conditionals.top().is_none_or(|level| level.else_token.is_some()) {
            self.sink.mismatched_directive(&directive);
            return;
        }
        if let Some(extra) = arguments.iter().find(|t| !t.is_blank()) {
            self.sink.extra_token(&directive, extra);
        }
        if conditionals.disabled() {
            conditionals.enter_disabled_else(directive);
        } else {
            conditionals.enter_else(directive);
        }
    }

    fn process_endif(&mut self, directive: Token, arguments: Vec<Token>) {
        if self.context.conditionals.exit_if().is_none() {
            self.sink.mismatched_directive(&directive);
            return;
        }
        if let Some(extra) = arguments.iter().find(|t| !t.is_blank()) {
            self.sink.extra_token(&directive, extra);
        }
    }

    fn process_define(&mut self, directive: Token, arguments: Vec<Token>) {
        let mut tokens = arguments.into_iter().peekable();
        while tokens.next_if(Token::is_blank).is_some() {}

        let Some(name) = tokens.next() else {
            self.sink.incomplete_directive(&directive);
            return;
        };
        if !name.is_identifier() || name.is("defined") {
            self.sink.invalid_macro_name(&directive, &name);
            return;
        }

        let mac = if tokens.next_if(|t| t.is("(")).is_some() {
            let Some((params, variadic)) = self.parse_parameters(&directive, &name, &mut tokens)
            else {
                return;
            };
            Macro::function(name.text(), params, variadic, tokens.collect())
        } else {
            Macro::object(name.text(), tokens.collect())
        };

        let mac = Rc::new(mac);
        match self.context.macros.define(Rc::clone(&mac)) {
            DefineOutcome::Inserted => log::debug!("defined `{}` at {}", mac.name(), name.location()),
            DefineOutcome::Unchanged => {}
            DefineOutcome::Redefined(old) => self.sink.macro_redefinition(&directive, &old, &mac),
        }
    }

    /// Parse a parameter list after its `(`, consuming the closing `)`
    fn parse_parameters(
        &mut self,
        directive: &Token,
        name: &Token,
        tokens: &mut impl Iterator<Item = Token>,
    ) -> Option<(Vec<String>, bool)> {
        let mut significant = tokens.filter(|t| !t.is_blank());
        let mut params: Vec<String> = Vec::new();

        let Some(mut param) = significant.next() else {
            self.sink.incomplete_macro_definition(directive, name);
            return None;
        };
        if param.is(")") {
            return Some((params, false));
        }

        loop {
            if param.is("...") {
                params.push(VA_ARGS.to_string());
                return match significant.next() {
                    Some(close) if close.is(")") => Some((params, true)),
                    Some(other) => {
                        self.sink.invalid_macro_definition(directive, name, &other);
                        None
                    }
                    None => {
                        self.sink.incomplete_macro_definition(directive, name);
                        None
                    }
                };
            }
            if !param.is_identifier() || param.is(VA_ARGS) {
                self.sink.invalid_macro_definition(directive, name, &param);
                return None;
            }
            if params.iter().any(|p| param.is(p)) {
                self.sink.macro_parameter_redefinition(directive, name, &param);
                return None;
            }
            params.push(param.text().to_string());

            match significant.next() {
                Some(close) if close.is(")") => return Some((params, false)),
                Some(comma) if comma.is(",") => {}
                Some(other) => {
                    self.sink.invalid_macro_definition(directive, name, &other);
                    return None;
                }
                None => {
                    self.sink.incomplete_macro_definition(directive, name);
                    return None;
                }
            }
            param = match significant.next() {
                Some(next) => next,
                None => {
                    self.sink.incomplete_macro_definition(directive, name);
                    return None;
                }
            };
        }
    }

    fn process_undef(&mut self, directive: Token, arguments: Vec<Token>) {
        let mut words = arguments.iter().filter(|t| !t.is_blank());
        let Some(name) = words.next() else {
            self.sink.incomplete_directive(&directive);
            return;
        };
        if !name.is_identifier() {
            self.sink.invalid_macro_name(&directive, name);
            return;
        }
        if let Some(extra) = words.next() {
            self.sink.extra_token(&directive, extra);
        }
        if self.context.macros.undef(name.text()).is_some() {
            log::debug!("undefined `{name}` at {}", name.location());
        }
    }

    fn process_include(&mut self, directive: Token, arguments: Vec<Token>) {
        let Some(start) = arguments.iter().position(|t| !t.is_blank()) else {
            self.sink.incomplete_directive(&directive);
            return;
        };
        let first = &arguments[start];
        let text = first.text();

        let (file_name, kind, end) = if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            (text[1..text.len() - 1].to_string(), IncludeKind::Local, start)
        } else if text.len() >= 2 && text.starts_with('<') && text.ends_with('>') {
            (text[1..text.len() - 1].to_string(), IncludeKind::System, start)
        } else if first.is("<") {
            match arguments[start..].iter().position(|t| t.is(">")) {
                Some(offset) => {
                    let close = start + offset;
                    let name = tokens_to_string(&arguments[start + 1..close]);
                    (name.trim().to_string(), IncludeKind::System, close)
                }
                None => {
                    self.sink.invalid_include(&directive, first);
                    return;
                }
            }
        } else {
            self.sink.invalid_include(&directive, first);
            return;
        };

        if let Some(extra) = arguments[end + 1..].iter().find(|t| !t.is_blank()) {
            self.sink.extra_token(&directive, extra);
        }

        let file = self.factory.create_token(first.location(), &file_name);
        if self.context.is_once(&file_name) {
            log::debug!("skipping {file_name}: already included with #pragma once");
            return;
        }
        let limit = self.context.include_depth_limit;
        if self.queue.include_depth() >= limit {
            self.sink.include_depth_exceeded(&directive, &file, limit);
            return;
        }
        let included = self
            .context
            .include_resolver
            .as_ref()
            .and_then(|resolver| resolver.resolve(&directive, &file, kind));
        match included {
            Some(tokens) => {
                if tokens.first().is_some_and(|t| self.context.is_once(&t.location().file)) {
                    log::debug!("skipping {file_name}: already included with #pragma once");
                    return;
                }
                log::debug!("including {file_name} ({} tokens)", tokens.len());
                self.queue.front_load_include(tokens);
            }
            None => self.sink.include_not_found(&directive, &file),
        }
    }

    /// `#pragma once` marks the file it appears in; other pragmas are ignored
    fn process_pragma(&mut self, directive: Token, arguments: Vec<Token>) {
        let mut words = arguments.iter().filter(|t| !t.is_blank());
        if words.next().is_some_and(|t| t.is("once")) && words.next().is_none() {
            let file = &directive.location().file;
            log::debug!("{file} asked to be included once");
            self.context.mark_once(file);
        } else {
            log::debug!("ignoring #pragma at {}", directive.location());
        }
    }
}

impl<D: DiagnosticSink> Iterator for Preprocessor<'_, D> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Text of a `#error`/`#warning` message, trimmed
fn message_text(arguments: &[Token]) -> String {
    tokens_to_string(arguments).trim().to_string()
}
