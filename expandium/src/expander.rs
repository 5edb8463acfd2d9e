//! Macro invocation: argument collection, substitution, stringizing and pasting.
//!
//! Used both by the main token loop and by `#if` evaluation, so that macros
//! behave the same in both places.

use crate::diagnostics::DiagnosticSink;
use crate::macro_def::{Macro, MacroTable};
use crate::token::{HideSet, Location, Token, TokenFactory};
use crate::token_queue::TokenQueue;

/// What happened to a macro name handed to [`Expander::expand`]
#[derive(Debug)]
pub enum Expansion {
    /// The replacement was pushed in front of the queue
    Expanded,
    /// A function-like name without `(`; the name is handed back unchanged
    NotInvoked(Token),
    /// The invocation was malformed and has been reported
    Failed,
}

/// Creates the tokens of one expansion, all located at the invocation
struct Stamp<'f> {
    factory: &'f dyn TokenFactory,
    location: Location,
    hideset: HideSet,
}

impl Stamp<'_> {
    /// Copy of a replacement-list token, hidden from the macro being expanded
    fn body(&self, token: &Token) -> Token {
        self.synthesize(token.text())
    }

    /// Copy of an argument token, hidden from the macro being expanded as
    /// well as from everything the argument was already hidden from
    fn argument(&self, token: &Token) -> Token {
        self.factory
            .create_token(&self.location, token.text())
            .with_hideset(token.hideset().union(&self.hideset))
    }

    /// New token produced by `#` or `##`
    fn synthesize(&self, text: &str) -> Token {
        self.factory
            .create_token(&self.location, text)
            .with_hideset(self.hideset.clone())
    }
}

/// Expands macro invocations read from a [`TokenQueue`]
pub struct Expander<'s> {
    macros: &'s MacroTable,
    factory: &'s dyn TokenFactory,
    sink: &'s mut dyn DiagnosticSink,
}

impl<'s> Expander<'s> {
    /// Create an expander over the given definitions
    pub fn new(
        macros: &'s MacroTable,
        factory: &'s dyn TokenFactory,
        sink: &'s mut dyn DiagnosticSink,
    ) -> Self {
        Self {
            macros,
            factory,
            sink,
        }
    }

    /// Expand `mac`, invoked through `name`
    ///
    /// For a function-like macro the argument list is read from `queue`. On
    /// success the replacement is front-loaded into `queue` so it is rescanned.
    pub fn expand(&mut self, mac: &Macro, name: Token, queue: &mut TokenQueue<'_>) -> Expansion {
        let replacement = if mac.is_function_like() {
            let mut skipped = Vec::new();
            match queue.skip_collecting(|t| t.is_whitespace() || t.is_newline(), &mut skipped) {
                Some(open) if open.is("(") => {}
                Some(other) => {
                    queue.front_load_token(other);
                    queue.front_load_tokens(skipped);
                    return Expansion::NotInvoked(name);
                }
                None => {
                    queue.front_load_tokens(skipped);
                    return Expansion::NotInvoked(name);
                }
            }
            let Some(args) = self.collect_arguments(mac, &name, queue) else {
                return Expansion::Failed;
            };
            self.substitute(mac, &name, &args)
        } else {
            self.substitute(mac, &name, &[])
        };

        log::trace!(
            "expanded `{}` at {} into {} tokens",
            mac.name(),
            name.location(),
            replacement.len()
        );
        queue.front_load_tokens(replacement);
        Expansion::Expanded
    }

    /// Read comma-separated arguments up to the `)` matching the already consumed `(`
    ///
    /// Arguments are trimmed and inner whitespace is collapsed to one blank.
    fn collect_arguments(
        &mut self,
        mac: &Macro,
        name: &Token,
        queue: &mut TokenQueue<'_>,
    ) -> Option<Vec<Vec<Token>>> {
        let expected = mac.params().len();
        let split_limit = if mac.is_variadic() {
            expected - 1
        } else {
            usize::MAX
        };

        let mut args: Vec<Vec<Token>> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut space: Option<Token> = None;
        let mut first_extra: Option<Token> = None;
        let mut depth = 0usize;
        let mut last = name.clone();

        loop {
            let Some(token) = queue.read_next_token() else {
                self.sink.invalid_macro_call(mac, &last);
                return None;
            };
            if token.is_continuation() {
                continue;
            }
            if token.is_whitespace() || token.is_newline() {
                space = Some(self.factory.create_token(token.location(), " "));
                continue;
            }
            match token.text() {
                "(" => depth += 1,
                ")" if depth == 0 => {
                    args.push(current);
                    break;
                }
                ")" => depth -= 1,
                "," if depth == 0 && args.len() < split_limit => {
                    args.push(std::mem::take(&mut current));
                    if args.len() == expected && first_extra.is_none() {
                        first_extra = Some(token.clone());
                    }
                    space = None;
                    last = token;
                    continue;
                }
                _ => {}
            }
            if let Some(space) = space.take()
                && !current.is_empty()
            {
                current.push(space);
            }
            last = token.clone();
            current.push(token);
        }

        // `F()` passes no arguments rather than one empty one
        if expected == 0 && args.len() == 1 && args[0].is_empty() {
            args.clear();
        }
        if mac.is_variadic() && args.len() + 1 == expected {
            args.push(Vec::new());
        }

        if args.len() < expected {
            self.sink.missing_macro_argument(mac, &last, args.len());
            return None;
        }
        if args.len() > expected {
            let at = first_extra
                .or_else(|| args.get(expected).and_then(|a| a.first().cloned()))
                .unwrap_or(last);
            self.sink.extra_macro_argument(mac, &at);
            return None;
        }
        Some(args)
    }

    /// Build the replacement list of `mac` for the given arguments
    fn substitute(&mut self, mac: &Macro, name: &Token, args: &[Vec<Token>]) -> Vec<Token> {
        let stamp = Stamp {
            factory: self.factory,
            location: name.location().clone(),
            hideset: name.hideset().with(mac.name()),
        };
        let body = mac.body();
        let mut out = Vec::with_capacity(body.len());
        let mut n = 0;

        while n < body.len() {
            if body[n].is_blank() {
                out.push(stamp.body(&body[n]));
                n += 1;
                continue;
            }

            let (mut current, end) = match self.stringize_at(mac, body, n, args, &stamp) {
                Some(stringized) => stringized,
                None => {
                    let pasting = next_significant(body, n + 1).is_some_and(|p| body[p].is("##"));
                    let tokens = match mac.param_index(body[n].text()) {
                        Some(index) if pasting => {
                            args[index].iter().map(|t| stamp.argument(t)).collect()
                        }
                        Some(index) => self.expand_argument(&args[index], &stamp),
                        None => vec![stamp.body(&body[n])],
                    };
                    (tokens, n)
                }
            };
            n = end + 1;

            while let Some(op) = next_significant(body, n).filter(|&p| body[p].is("##")) {
                let Some(right_start) = next_significant(body, op + 1) else {
                    // Trailing `##` pastes with nothing
                    n = body.len();
                    break;
                };
                let (right, right_end) = match self.stringize_at(mac, body, right_start, args, &stamp) {
                    Some(stringized) => stringized,
                    None => {
                        let tokens = match mac.param_index(body[right_start].text()) {
                            Some(index) => args[index].iter().map(|t| stamp.argument(t)).collect(),
                            None => vec![stamp.body(&body[right_start])],
                        };
                        (tokens, right_start)
                    }
                };
                self.paste(mac, &mut current, right, &stamp);
                n = right_end + 1;
            }

            out.extend(current);
        }
        out
    }

    /// Stringize `# param` starting at `n`, if that is what is there
    fn stringize_at(
        &self,
        mac: &Macro,
        body: &[Token],
        n: usize,
        args: &[Vec<Token>],
        stamp: &Stamp<'_>,
    ) -> Option<(Vec<Token>, usize)> {
        if !mac.is_function_like() || !body[n].is("#") {
            return None;
        }
        let operand = next_significant(body, n + 1)?;
        let text = match mac.param_index(body[operand].text()) {
            Some(index) => stringize(&args[index]),
            None => quote(body[operand].text()),
        };
        Some((vec![stamp.synthesize(&text)], operand))
    }

    /// Fully macro-expand an argument on its own before it is substituted
    ///
    /// A function-like name whose `(` is not inside the argument stays as is.
    fn expand_argument(&mut self, arg: &[Token], stamp: &Stamp<'_>) -> Vec<Token> {
        let mut queue = TokenQueue::new(arg.to_vec());
        let mut out = Vec::with_capacity(arg.len());
        while let Some(token) = queue.read_next_token() {
            if token.is_identifier()
                && !token.hideset().contains(token.text())
                && let Some(inner) = self.macros.resolve(token.text())
            {
                match self.expand(&inner, token, &mut queue) {
                    Expansion::Expanded | Expansion::Failed => continue,
                    Expansion::NotInvoked(token) => out.push(stamp.argument(&token)),
                }
                continue;
            }
            out.push(stamp.argument(&token));
        }
        out
    }

    /// Paste the last token of `current` with the first token of `right`
    fn paste(&mut self, mac: &Macro, current: &mut Vec<Token>, right: Vec<Token>, stamp: &Stamp<'_>) {
        let mut right = right.into_iter();
        let Some(left) = current.pop() else {
            current.extend(right);
            return;
        };
        let Some(first) = right.next() else {
            current.push(left);
            return;
        };

        let pasted = stamp.synthesize(&format!("{}{}", left.text(), first.text()));
        if is_valid_paste(pasted.text()) {
            current.push(pasted);
        } else {
            self.sink.invalid_paste(mac, &pasted);
            current.push(left);
            current.push(first);
        }
        current.extend(right);
    }
}

fn next_significant(body: &[Token], from: usize) -> Option<usize> {
    (from..body.len()).find(|&i| !body[i].is_blank())
}

fn escape(text: &str, out: &mut String) {
    for c in text.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Spell an argument as a string literal
pub(crate) fn stringize(arg: &[Token]) -> String {
    let mut out = String::from("\"");
    let mut pending_space = false;
    for token in arg {
        if token.is_whitespace() || token.is_newline() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        escape(token.text(), &mut out);
    }
    out.push('"');
    out
}

fn quote(text: &str) -> String {
    let mut out = String::from("\"");
    escape(text, &mut out);
    out.push('"');
    out
}

/// Check whether `##` may produce `text`
pub(crate) fn is_valid_paste(text: &str) -> bool {
    let mut chars = text.chars();
    let (Some(first), Some(_)) = (chars.next(), chars.next()) else {
        return true;
    };
    if first == '"' || first == '\'' {
        return is_closed_literal(text, first);
    }
    for c in text.chars() {
        match c {
            '(' | ')' | '{' | '}' | '[' | ']' | ',' | ':' | ';' | '?' => return false,
            '*' => return text == "*=",
            '/' => return text == "/=",
            '%' => return text == "%=",
            '+' => return text == "++" || text == "+=",
            '-' => return text == "--" || text == "-=" || text == "->",
            '<' => return text == "<<" || text == "<=" || text == "<<=",
            '>' => return text == ">>" || text == ">=" || text == ">>=",
            '#' => return text == "##",
            c if c.is_whitespace() => return false,
            _ => {}
        }
    }
    true
}

/// A quoted literal whose only unescaped quote is the closing one
fn is_closed_literal(text: &str, quote: char) -> bool {
    let mut escaped = false;
    let mut chars = text.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return i + c.len_utf8() == text.len();
        }
    }
    false
}
