use crate::token::Token;

/// One open `#if` group
#[derive(Clone, Debug)]
pub struct Level {
    /// Whole group sits inside an inactive region
    pub disabled: bool,
    /// The current branch is active
    pub current_state: bool,
    /// Some branch of this group has been active
    pub valid_state_seen: bool,
    /// Directive that opened the group
    pub enter_token: Token,
    /// Most recent `#elif`
    pub elif_token: Option<Token>,
    /// The `#else`, once seen
    pub else_token: Option<Token>,
}

impl Level {
    fn new(enter_token: Token, state: bool, disabled: bool) -> Self {
        Self {
            disabled,
            current_state: state,
            valid_state_seen: state,
            enter_token,
            elif_token: None,
            else_token: None,
        }
    }
}

/// Nesting of `#if`/`#elif`/`#else`/`#endif` groups
///
/// A branch is active only when every enclosing branch is active. Groups
/// opened inside an inactive branch are marked disabled and never become
/// active.
#[derive(Clone, Debug, Default)]
pub struct IfElseStack {
    levels: Vec<Level>,
}

impl IfElseStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a group whose first branch is `state`
    pub fn enter_if(&mut self, token: Token, state: bool) {
        self.levels.push(Level::new(token, state, false));
    }

    /// Open a group inside an inactive region
    pub fn enter_disabled_if(&mut self, token: Token) {
        self.levels.push(Level::new(token, false, true));
    }

    /// Move to an `#elif` branch whose condition is `state`
    ///
    /// The branch is active only if no earlier branch was.
    pub fn enter_else_if(&mut self, token: Token, state: bool) {
        if let Some(level) = self.levels.last_mut() {
            level.current_state = !level.valid_state_seen && state;
            level.valid_state_seen |= level.current_state;
            level.elif_token = Some(token);
        }
    }

    /// Record an `#elif` of a disabled group
    pub fn enter_disabled_else_if(&mut self, token: Token) {
        if let Some(level) = self.levels.last_mut() {
            level.elif_token = Some(token);
        }
    }

    /// Move to the `#else` branch
    pub fn enter_else(&mut self, token: Token) {
        if let Some(level) = self.levels.last_mut() {
            level.current_state = !level.valid_state_seen;
            level.valid_state_seen = true;
            level.else_token = Some(token);
        }
    }

    /// Record the `#else` of a disabled group
    pub fn enter_disabled_else(&mut self, token: Token) {
        if let Some(level) = self.levels.last_mut() {
            level.else_token = Some(token);
        }
    }

    /// Close the innermost group
    pub fn exit_if(&mut self) -> Option<Level> {
        self.levels.pop()
    }

    /// Check whether tokens at this point are active
    #[must_use]
    pub fn current_state(&self) -> bool {
        self.levels.last().is_none_or(|level| level.current_state)
    }

    /// Check whether the innermost group lies in an inactive region
    #[must_use]
    pub fn disabled(&self) -> bool {
        self.levels.last().is_some_and(|level| level.disabled)
    }

    /// Check whether some branch of the innermost group has been active
    #[must_use]
    pub fn valid_state_seen(&self) -> bool {
        self.levels.last().is_some_and(|level| level.valid_state_seen)
    }

    /// The innermost open group
    #[must_use]
    pub fn top(&self) -> Option<&Level> {
        self.levels.last()
    }

    /// Number of open groups
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Check if no group is open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Close every group, innermost first
    pub fn drain(&mut self) -> impl Iterator<Item = Level> + '_ {
        self.levels.drain(..).rev()
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
    fn first_true_branch_wins() {
        let mut stack = IfElseStack::new();
        stack.enter_if(tok("if"), false);
        assert!(!stack.current_state());
        stack.enter_else_if(tok("elif"), true);
        assert!(stack.current_state());
        stack.enter_else_if(tok("elif"), true);
        assert!(!stack.current_state());
        stack.enter_else(tok("else"));
        assert!(!stack.current_state());
        assert!(stack.exit_if().is_some());
        assert!(stack.current_state());
        assert!(stack.is_empty());
    }

    #[test]
    fn else_after_false_branches() {
        let mut stack = IfElseStack::new();
        stack.enter_if(tok("if"), false);
        stack.enter_else_if(tok("elif"), false);
        stack.enter_else(tok("else"));
        assert!(stack.current_state());
        assert!(stack.top().unwrap().else_token.is_some());
    }

    #[test]
    fn disabled_groups_stay_inactive() {
        let mut stack = IfElseStack::new();
        stack.enter_if(tok("if"), false);
        stack.enter_disabled_if(tok("ifdef"));
        assert!(stack.disabled());
        stack.enter_disabled_else_if(tok("elif"));
        stack.enter_disabled_else(tok("else"));
        assert!(!stack.current_state());
        stack.exit_if();
        assert!(!stack.disabled());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn drain_reports_innermost_first() {
        let mut stack = IfElseStack::new();
        stack.enter_if(tok("outer"), true);
        stack.enter_if(tok("inner"), true);
        let names: Vec<String> = stack.drain().map(|l| l.enter_token.text().to_string()).collect();
        assert_eq!(names, vec!["inner", "outer"]);
        assert!(stack.is_empty());
    }
}
