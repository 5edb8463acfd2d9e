//! Tokenizer producing the token stream the preprocessor consumes.
//!
//! The lexer keeps every character of the input: blank runs, newlines,
//! backslash-newline continuations and comments all come out as their own
//! tokens, so concatenating the token texts gives back the source (with
//! `\r\n` normalized to `\n`).

use std::rc::Rc;

use crate::token::{Location, Token, is_blank_char, is_identifier_continue, is_identifier_start};

/// Multi-character punctuators, longest first
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=",
    "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##",
];

const STRING_PREFIXES: &[&str] = &["u8", "L", "u", "U"];

/// Streaming tokenizer over a source text
pub struct Lexer {
    file: Rc<str>,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a lexer for `source`, attributing tokens to `file`
    #[must_use]
    pub fn new(source: &str, file: &str) -> Self {
        Self {
            file: Rc::from(file),
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn take_while(&mut self, text: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
    }

    fn at_line_end(&self) -> bool {
        self.starts_with("\n") || self.starts_with("\r\n")
    }

    fn lex_line_comment(&mut self, text: &mut String) {
        while !self.at_line_end() {
            match self.bump() {
                Some(c) => text.push(c),
                None => break,
            }
        }
    }

    fn lex_block_comment(&mut self, text: &mut String) {
        text.push_str("/*");
        self.bump_n(2);
        loop {
            if self.starts_with("*/") {
                text.push_str("*/");
                self.bump_n(2);
                break;
            }
            match self.bump() {
                Some(c) => text.push(c),
                // Unterminated comment runs to the end of input
                None => break,
            }
        }
    }

    fn lex_quoted(&mut self, text: &mut String, quote: char) {
        text.push(quote);
        self.bump();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
            if c == '\\' {
                if let Some(escaped) = self.peek()
                    && escaped != '\n'
                {
                    text.push(escaped);
                    self.bump();
                }
            } else if c == quote {
                break;
            }
        }
    }

    fn lex_number(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            if matches!(c, 'e' | 'E' | 'p' | 'P') && matches!(self.peek_at(1), Some('+' | '-')) {
                text.push(c);
                self.bump();
                if let Some(sign) = self.bump() {
                    text.push(sign);
                }
            } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_punctuator(&mut self, text: &mut String, first: char) {
        match PUNCTUATORS.iter().find(|p| self.starts_with(p)) {
            Some(p) => {
                text.push_str(p);
                self.bump_n(p.len());
            }
            None => {
                text.push(first);
                self.bump();
            }
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let c = self.peek()?;
        let (start_line, start_column) = (self.line, self.column);
        let mut text = String::new();

        match c {
            '\n' => {
                self.bump();
                text.push('\n');
            }
            '\r' if self.peek_at(1) == Some('\n') => {
                self.bump_n(2);
                text.push('\n');
            }
            '\\' if self.peek_at(1) == Some('\n') => {
                self.bump_n(2);
                text.push_str("\\\n");
            }
            '\\' if self.starts_with("\\\r\n") => {
                self.bump_n(3);
                text.push_str("\\\n");
            }
            c if is_blank_char(c) => {
                while let Some(b) = self.peek() {
                    if !is_blank_char(b) || self.starts_with("\r\n") {
                        break;
                    }
                    text.push(b);
                    self.bump();
                }
            }
            '/' if self.peek_at(1) == Some('/') => self.lex_line_comment(&mut text),
            '/' if self.peek_at(1) == Some('*') => self.lex_block_comment(&mut text),
            '"' | '\'' => self.lex_quoted(&mut text, c),
            c if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {
                self.lex_number(&mut text);
            }
            c if is_identifier_start(c) => {
                self.take_while(&mut text, is_identifier_continue);
                if STRING_PREFIXES.contains(&text.as_str())
                    && let Some(quote @ ('"' | '\'')) = self.peek()
                {
                    self.lex_quoted(&mut text, quote);
                }
            }
            c => self.lex_punctuator(&mut text, c),
        }

        let location = Location {
            file: Rc::clone(&self.file),
            start_line,
            start_column,
            end_line: self.line,
            end_column: self.column,
        };
        Some(Token::new(location, text))
    }
}

/// Tokenize a complete source text
#[must_use]
pub fn tokenize(source: &str, file: &str) -> Vec<Token> {
    Lexer::new(source, file).collect()
}
