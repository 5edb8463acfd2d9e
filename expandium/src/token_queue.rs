use std::collections::VecDeque;

use crate::token::Token;

/// Entry of the front-loaded buffer
enum Pending {
    Token(Token),
    /// Last token of an included file was read
    EndOfInclude,
}

/// Token source that allows pushing tokens back in front of the stream
///
/// Macro expansion results and included files are front-loaded here so they
/// are read before anything that follows the construct that produced them.
pub struct TokenQueue<'a> {
    pending: VecDeque<Pending>,
    upstream: Box<dyn Iterator<Item = Token> + 'a>,
    include_depth: usize,
}

impl<'a> TokenQueue<'a> {
    /// Create a queue reading from `upstream`
    pub fn new<I>(upstream: I) -> Self
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        Self {
            pending: VecDeque::new(),
            upstream: Box::new(upstream.into_iter()),
            include_depth: 0,
        }
    }

    /// Next token, taking front-loaded tokens first
    pub fn read_next_token(&mut self) -> Option<Token> {
        while let Some(entry) = self.pending.pop_front() {
            match entry {
                Pending::Token(token) => return Some(token),
                Pending::EndOfInclude => self.include_depth -= 1,
            }
        }
        self.upstream.next()
    }

    /// Number of included files whose tokens are still being read
    ///
    /// A file counts until a read goes past its last token, so an `#include`
    /// on the last line of a file nests inside it.
    #[must_use]
    pub fn include_depth(&self) -> usize {
        self.include_depth
    }

    /// Push one token so it is read next
    pub fn front_load_token(&mut self, token: Token) {
        self.pending.push_front(Pending::Token(token));
    }

    /// Push a sequence so it is read next, in its original order
    pub fn front_load_tokens<I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: DoubleEndedIterator,
    {
        for token in tokens.into_iter().rev() {
            self.pending.push_front(Pending::Token(token));
        }
    }

    /// Push the tokens of an included file so they are read next
    pub fn front_load_include(&mut self, tokens: Vec<Token>) {
        self.pending.push_front(Pending::EndOfInclude);
        self.front_load_tokens(tokens);
        self.include_depth += 1;
    }

    /// Read until a token not matching `ignorable`, discarding the rest
    pub fn skip(&mut self, ignorable: impl Fn(&Token) -> bool) -> Option<Token> {
        while let Some(token) = self.read_next_token() {
            if !ignorable(&token) {
                return Some(token);
            }
        }
        None
    }

    /// Like [`TokenQueue::skip`], but keeps the skipped tokens in `skipped`
    pub fn skip_collecting(
        &mut self,
        ignorable: impl Fn(&Token) -> bool,
        skipped: &mut Vec<Token>,
    ) -> Option<Token> {
        while let Some(token) = self.read_next_token() {
            if !ignorable(&token) {
                return Some(token);
            }
            skipped.push(token);
        }
        None
    }
}
