use std::collections::HashMap;
use std::rc::Rc;

use crate::token::Token;

/// Name bound to the variadic part of a macro's arguments
pub const VA_ARGS: &str = "__VA_ARGS__";

/// Shape of a macro
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroKind {
    /// Replaced by its body wherever its name appears
    Object,
    /// Replaced only when followed by a parenthesized argument list
    Function {
        /// Parameter names in declaration order; `__VA_ARGS__` is last when variadic
        params: Vec<String>,
        /// Declared with a trailing `...`
        variadic: bool,
    },
}

/// A preprocessor macro definition
#[derive(Clone, Debug)]
pub struct Macro {
    name: String,
    kind: MacroKind,
    body: Vec<Token>,
}

impl Macro {
    /// Create an object-like macro
    pub fn object(name: impl Into<String>, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            kind: MacroKind::Object,
            body: normalize_body(body),
        }
    }

    /// Create a function-like macro
    ///
    /// For a variadic macro `params` must already end with `__VA_ARGS__`.
    pub fn function(
        name: impl Into<String>,
        params: Vec<String>,
        variadic: bool,
        body: Vec<Token>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MacroKind::Function { params, variadic },
            body: normalize_body(body),
        }
    }

    /// Name the macro is defined under
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object-like or function-like
    #[must_use]
    pub fn kind(&self) -> &MacroKind {
        &self.kind
    }

    /// Replacement tokens, with whitespace collapsed to single blanks
    #[must_use]
    pub fn body(&self) -> &[Token] {
        &self.body
    }

    /// Check if this macro takes arguments
    #[must_use]
    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, MacroKind::Function { .. })
    }

    /// Check if this macro accepts a variable number of arguments
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, MacroKind::Function { variadic: true, .. })
    }

    /// Parameter names; empty for object-like macros
    #[must_use]
    pub fn params(&self) -> &[String] {
        match &self.kind {
            MacroKind::Object => &[],
            MacroKind::Function { params, .. } => params,
        }
    }

    /// Position of the parameter called `name`
    #[must_use]
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params().iter().position(|p| p == name)
    }

    /// Check whether `other` defines exactly the same replacement
    ///
    /// Any two blanks compare equal; everything else compares by text.
    #[must_use]
    pub fn is_equivalent(&self, other: &Macro) -> bool {
        self.kind == other.kind
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .all(|(a, b)| (a.is_blank() && b.is_blank()) || a.text() == b.text())
    }
}

/// Drop leading and trailing whitespace and collapse inner runs to one blank
fn normalize_body(body: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(body.len());
    let mut space: Option<Token> = None;
    for token in body {
        if token.is_blank() {
            space = Some(token);
        } else if token.is_whitespace() || token.is_newline() {
            // Comments and continuations separate tokens without a blank of their own
            space = space.or(Some(token));
        } else {
            if let Some(space) = space.take()
                && !out.is_empty()
            {
                out.push(space);
            }
            out.push(token);
        }
    }
    out.into_iter()
        .map(|t| {
            if t.is_comment() || t.is_continuation() || t.is_newline() {
                Token::new(t.location().clone(), " ")
            } else {
                t
            }
        })
        .collect()
}

/// Result of installing a definition in a [`MacroTable`]
#[derive(Debug)]
pub enum DefineOutcome {
    /// The name was not defined before
    Inserted,
    /// An equivalent definition already existed
    Unchanged,
    /// A different definition was replaced
    Redefined(Rc<Macro>),
}

/// The set of currently defined macros
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Rc<Macro>>,
}

impl MacroTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a definition
    ///
    /// An equivalent existing definition is kept as is; a different one is
    /// replaced.
    pub fn define(&mut self, mac: Rc<Macro>) -> DefineOutcome {
        if let Some(old) = self.macros.get(mac.name())
            && old.is_equivalent(&mac)
        {
            return DefineOutcome::Unchanged;
        }
        match self.macros.insert(mac.name().to_string(), mac) {
            None => DefineOutcome::Inserted,
            Some(old) => DefineOutcome::Redefined(old),
        }
    }

    /// Remove a definition, returning it if it existed
    pub fn undef(&mut self, name: &str) -> Option<Rc<Macro>> {
        self.macros.remove(name)
    }

    /// Look up a macro by name
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Rc<Macro>> {
        self.macros.get(name).cloned()
    }

    /// Check if a macro is defined
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Number of defined macros
    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Check if no macro is defined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Iterate over all definitions in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values().map(AsRef::as_ref)
    }
}
