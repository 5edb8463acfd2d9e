use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Check if a character can start an identifier (letter or underscore)
pub const fn is_identifier_start(c: char) -> bool {
    (c >= 'a' && c <= 'z') || (c >= 'A' && c <= 'Z') || c == '_'
}

/// Check if a character can continue an identifier (letter, digit, or underscore)
pub const fn is_identifier_continue(c: char) -> bool {
    (c >= 'a' && c <= 'z') || (c >= 'A' && c <= 'Z') || (c >= '0' && c <= '9') || c == '_'
}

/// Check if a character is horizontal whitespace as produced in blank tokens
pub const fn is_blank_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0b' | '\x0c' | '\r')
}

/// Check if `name` can be used as a macro name
pub fn is_valid_macro_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_continue),
        _ => false,
    }
}

/// Source range covered by a token
///
/// Lines and columns are 1-based; the end position is exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    /// File the token was read from
    pub file: Rc<str>,
    /// Line of the first character
    pub start_line: usize,
    /// Column of the first character
    pub start_column: usize,
    /// Line just after the last character
    pub end_line: usize,
    /// Column just after the last character
    pub end_column: usize,
}

impl Location {
    /// Create a location covering a single point
    #[must_use]
    pub fn point(file: &str, line: usize, column: usize) -> Self {
        Self {
            file: Rc::from(file),
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.start_line, self.start_column)
    }
}

/// Names of the macros whose expansion produced a token
///
/// A token is never expanded again by a macro listed in its own hideset,
/// which is what makes self-referential macros terminate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HideSet(Option<Rc<BTreeSet<Rc<str>>>>);

impl HideSet {
    /// Check whether `name` is hidden
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.as_ref().is_some_and(|names| names.contains(name))
    }

    /// Return a hideset extended with `name`
    #[must_use]
    pub fn with(&self, name: &str) -> Self {
        if self.contains(name) {
            return self.clone();
        }
        let mut names = self.0.as_deref().cloned().unwrap_or_default();
        names.insert(Rc::from(name));
        Self(Some(Rc::new(names)))
    }

    /// Return the names hidden in either set
    #[must_use]
    pub fn union(&self, other: &HideSet) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut names = self.0.as_deref().cloned().unwrap_or_default();
        names.extend(other.0.iter().flat_map(|set| set.iter().cloned()));
        Self(Some(Rc::new(names)))
    }

    /// Check if no macro name is hidden
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.as_ref().is_none_or(|names| names.is_empty())
    }

    /// Iterate over the hidden names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().flat_map(|names| names.iter().map(AsRef::as_ref))
    }
}

/// A preprocessing token: its text and where it came from
#[derive(Clone, Debug)]
pub struct Token {
    text: Rc<str>,
    location: Location,
    hideset: HideSet,
}

impl Token {
    /// Create a token with an empty hideset
    pub fn new(location: Location, text: impl Into<Rc<str>>) -> Self {
        Self {
            text: text.into(),
            location,
            hideset: HideSet::default(),
        }
    }

    /// Replace the hideset of this token
    #[must_use]
    pub fn with_hideset(mut self, hideset: HideSet) -> Self {
        self.hideset = hideset;
        self
    }

    /// The text of the token
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Where the token was read or produced
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Macros that must not expand this token again
    #[must_use]
    pub fn hideset(&self) -> &HideSet {
        &self.hideset
    }

    /// Check if the token text is exactly `text`
    #[must_use]
    pub fn is(&self, text: &str) -> bool {
        &*self.text == text
    }

    /// A run of horizontal whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(is_blank_char)
    }

    /// An end of line
    #[must_use]
    pub fn is_newline(&self) -> bool {
        self.is("\n")
    }

    /// A backslash-newline line continuation
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.is("\\\n")
    }

    /// A block or line comment
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.text.starts_with("/*") || self.text.starts_with("//")
    }

    /// Whitespace that does not end a line: blanks, continuations and comments
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        self.is_blank() || self.is_continuation() || self.is_comment()
    }

    /// A token that could name a macro
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        is_valid_macro_name(&self.text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds every token the preprocessor derives from others
///
/// Expansion clones, stringized arguments and pasted tokens are all created
/// through this hook so that embedders can track or intern them.
pub trait TokenFactory {
    /// Create a token with the given location and text
    fn create_token(&self, location: &Location, text: &str) -> Token;
}

/// Token factory that allocates plain [`Token`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTokenFactory;

impl TokenFactory for DefaultTokenFactory {
    fn create_token(&self, location: &Location, text: &str) -> Token {
        Token::new(location.clone(), text)
    }
}

/// Convert tokens back to a string
pub fn tokens_to_string<'t, I>(tokens: I) -> String
where
    I: IntoIterator<Item = &'t Token>,
{
    let mut out = String::new();
    for token in tokens {
        out.push_str(token.text());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str) -> Token {
        Token::new(Location::point("t.c", 1, 1), text)
    }

    #[test]
    fn macro_names() {
        assert!(is_valid_macro_name("FOO"));
        assert!(is_valid_macro_name("_bar9"));
        assert!(!is_valid_macro_name("9lives"));
        assert!(!is_valid_macro_name(""));
        assert!(!is_valid_macro_name("a.b"));
        assert!(!is_valid_macro_name("+"));
    }

    #[test]
    fn token_classes() {
        assert!(token("  \t").is_blank());
        assert!(!token("").is_blank());
        assert!(token("\n").is_newline());
        assert!(token("\\\n").is_continuation());
        assert!(token("/* x */").is_comment());
        assert!(token("// x").is_whitespace());
        assert!(!token("\n").is_whitespace());
        assert!(token("ident").is_identifier());
    }

    #[test]
    fn hideset_grows_without_mutating_the_original() {
        let empty = HideSet::default();
        let one = empty.with("A");
        let two = one.with("B");
        assert!(empty.is_empty());
        assert!(one.contains("A") && !one.contains("B"));
        assert_eq!(two.iter().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(two.with("A"), two);
    }

    #[test]
    fn hideset_union() {
        let ab = HideSet::default().with("A").with("B");
        let bc = HideSet::default().with("B").with("C");
        assert_eq!(ab.union(&bc).iter().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(ab.union(&HideSet::default()), ab);
        assert_eq!(HideSet::default().union(&bc), bc);
    }

    #[test]
    fn default_factory_keeps_location() {
        let loc = Location::point("x.c", 3, 7);
        let t = DefaultTokenFactory.create_token(&loc, "abc");
        assert_eq!(t.location(), &loc);
        assert_eq!(t.text(), "abc");
        assert!(t.hideset().is_empty());
    }

    #[test]
    fn rendering() {
        let tokens = [token("a"), token(" "), token("+"), token("b")];
        assert_eq!(tokens_to_string(&tokens), "a +b");
    }
}
