//! Constant expressions of `#if` and `#elif`.
//!
//! Parsing is operator precedence over explicit operand and operator stacks.
//! Macros are expanded lazily while scanning: an expansion is pushed back
//! into the expression's own token queue and read like any other input.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::diagnostics::DiagnosticSink;
use crate::expander::{Expander, Expansion};
use crate::literal::Literal;
use crate::macro_def::MacroTable;
use crate::token::{Token, TokenFactory};
use crate::token_queue::TokenQueue;

/// Largest shift count accepted by `<<` and `>>`
const MAX_SHIFT: usize = 1 << 16;

const ASSIGNMENTS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "^=", "|=",
];

/// Result of evaluating a constant expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Result of `defined`, `!`, comparisons and logical operators
    Boolean(bool),
    /// Arbitrary precision integer
    Integer(BigInt),
}

impl Value {
    /// Truth value: non-zero integers are true
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(i) => !i.is_zero(),
        }
    }

    /// Integer value, with booleans as 0 or 1
    #[must_use]
    pub fn to_integer(&self) -> BigInt {
        match self {
            Value::Boolean(b) => BigInt::from(u8::from(*b)),
            Value::Integer(i) => i.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// Why a constant expression could not be evaluated
#[derive(Clone, Debug, thiserror::Error)]
pub enum ExprError {
    /// Malformed expression
    #[error("invalid constant expression near `{0}`")]
    Invalid(Token),
    /// `defined` without an identifier
    #[error("`defined` requires an identifier")]
    DefinedOperand {
        /// The `defined` keyword
        defined: Token,
        /// What followed it, if anything
        operand: Option<Token>,
    },
    /// Floating literal operand
    #[error("floating constant `{0}` in preprocessor expression")]
    FloatingPoint(Token),
    /// String or character literal operand
    #[error("literal `{0}` in preprocessor expression")]
    StringLiteral(Token),
    /// Assignment operator
    #[error("assignment `{0}` in preprocessor expression")]
    Assignment(Token),
    /// Division or remainder by zero
    #[error("division by zero in `{0}`")]
    DivisionByZero(Token),
    /// Macro call whose arguments were already reported as malformed
    #[error("malformed invocation of `{0}`")]
    MacroCall(Token),
}

impl ExprError {
    /// Pass the error to the matching sink hook
    pub fn report(&self, sink: &mut dyn DiagnosticSink) {
        match self {
            ExprError::Invalid(token) => sink.invalid_expression(token),
            ExprError::DefinedOperand { defined, operand } => {
                sink.invalid_defined_operand(defined, operand.as_ref());
            }
            ExprError::FloatingPoint(token) => sink.floating_point_in_expression(token),
            ExprError::StringLiteral(token) => sink.string_in_expression(token),
            ExprError::Assignment(token) => sink.assignment_in_expression(token),
            ExprError::DivisionByZero(token) => sink.division_by_zero(token),
            ExprError::MacroCall(_) => {}
        }
    }
}

/// Unary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `+`
    Plus,
    /// `~`
    BitNot,
}

impl UnaryOp {
    fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "!" => UnaryOp::Not,
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Plus,
            "~" => UnaryOp::BitNot,
            _ => return None,
        })
    }
}

/// Arithmetic and bitwise binary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    BitAnd,
    /// `^`
    BitXor,
    /// `|`
    BitOr,
}

/// Relational and equality operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InfixOp {
    Binary(BinaryOp),
    Compare(CompareOp),
    And,
    Or,
}

impl InfixOp {
    fn from_text(text: &str) -> Option<Self> {
        use BinaryOp::*;
        use CompareOp::*;
        Some(match text {
            "*" => InfixOp::Binary(Mul),
            "/" => InfixOp::Binary(Div),
            "%" => InfixOp::Binary(Mod),
            "+" => InfixOp::Binary(Add),
            "-" => InfixOp::Binary(Sub),
            "<<" => InfixOp::Binary(Shl),
            ">>" => InfixOp::Binary(Shr),
            "<" => InfixOp::Compare(Lt),
            ">" => InfixOp::Compare(Gt),
            "<=" => InfixOp::Compare(Le),
            ">=" => InfixOp::Compare(Ge),
            "==" => InfixOp::Compare(Eq),
            "!=" => InfixOp::Compare(Ne),
            "&" => InfixOp::Binary(BitAnd),
            "^" => InfixOp::Binary(BitXor),
            "|" => InfixOp::Binary(BitOr),
            "&&" => InfixOp::And,
            "||" => InfixOp::Or,
            _ => return None,
        })
    }

    /// Lower binds tighter
    fn precedence(self) -> u8 {
        use BinaryOp::*;
        use CompareOp::*;
        match self {
            InfixOp::Binary(Mul | Div | Mod) => 3,
            InfixOp::Binary(Add | Sub) => 4,
            InfixOp::Binary(Shl | Shr) => 5,
            InfixOp::Compare(Lt | Gt | Le | Ge) => 6,
            InfixOp::Compare(Eq | Ne) => 7,
            InfixOp::Binary(BitAnd) => 8,
            InfixOp::Binary(BitXor) => 9,
            InfixOp::Binary(BitOr) => 10,
            InfixOp::And => 11,
            InfixOp::Or => 12,
        }
    }
}

const UNARY_PRECEDENCE: u8 = 2;
const CONDITIONAL_PRECEDENCE: u8 = 13;

/// Parsed constant expression
#[derive(Clone, Debug)]
pub enum Expr {
    /// Integer literal
    Integer(Token, BigInt),
    /// `true`, `false`, or an identifier that is not a macro
    Boolean(Token, bool),
    /// `defined NAME`, resolved while parsing
    Defined {
        /// The macro name asked about
        name: Token,
        /// Whether it was defined
        value: bool,
    },
    /// Prefix operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operator token
        token: Token,
        /// Operand
        operand: Box<Expr>,
    },
    /// Arithmetic or bitwise operator
    Binary {
        /// Operator
        op: BinaryOp,
        /// Operator token
        token: Token,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Relational or equality operator
    Compare {
        /// Operator
        op: CompareOp,
        /// Operator token
        token: Token,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `&&`
    And(Token, Box<Expr>, Box<Expr>),
    /// `||`
    Or(Token, Box<Expr>, Box<Expr>),
    /// `condition ? on_true : on_false`
    Ternary {
        /// The `?` token
        token: Token,
        /// Selector
        condition: Box<Expr>,
        /// Value when the selector is true
        on_true: Box<Expr>,
        /// Value when the selector is false
        on_false: Box<Expr>,
    },
}

impl Expr {
    /// Token the node was built from
    #[must_use]
    pub fn token(&self) -> &Token {
        match self {
            Expr::Integer(token, _) | Expr::Boolean(token, _) => token,
            Expr::Defined { name, .. } => name,
            Expr::Unary { token, .. }
            | Expr::Binary { token, .. }
            | Expr::Compare { token, .. }
            | Expr::Ternary { token, .. } => token,
            Expr::And(token, ..) | Expr::Or(token, ..) => token,
        }
    }

    /// Compute the value of the expression
    ///
    /// Both sides of `&&` and `||` are evaluated; only the selected branch of
    /// `?:` is.
    pub fn evaluate(&self) -> Result<Value, ExprError> {
        Ok(match self {
            Expr::Integer(_, value) => Value::Integer(value.clone()),
            Expr::Boolean(_, value) => Value::Boolean(*value),
            Expr::Defined { value, .. } => Value::Boolean(*value),
            Expr::Unary { op, operand, .. } => {
                let value = operand.evaluate()?;
                match op {
                    UnaryOp::Not => Value::Boolean(!value.truthy()),
                    UnaryOp::Neg => Value::Integer(-value.to_integer()),
                    UnaryOp::Plus => Value::Integer(value.to_integer()),
                    UnaryOp::BitNot => Value::Integer(!value.to_integer()),
                }
            }
            Expr::Binary {
                op,
                token,
                left,
                right,
            } => {
                let left = left.evaluate()?.to_integer();
                let right = right.evaluate()?.to_integer();
                Value::Integer(arithmetic(*op, token, left, right)?)
            }
            Expr::Compare { op, left, right, .. } => {
                Value::Boolean(compare(*op, &left.evaluate()?, &right.evaluate()?))
            }
            Expr::And(_, left, right) => {
                let left = left.evaluate()?;
                let right = right.evaluate()?;
                Value::Boolean(left.truthy() && right.truthy())
            }
            Expr::Or(_, left, right) => {
                let left = left.evaluate()?;
                let right = right.evaluate()?;
                Value::Boolean(left.truthy() || right.truthy())
            }
            Expr::Ternary {
                condition,
                on_true,
                on_false,
                ..
            } => {
                if condition.evaluate()?.truthy() {
                    on_true.evaluate()?
                } else {
                    on_false.evaluate()?
                }
            }
        })
    }
}

fn arithmetic(op: BinaryOp, token: &Token, left: BigInt, right: BigInt) -> Result<BigInt, ExprError> {
    Ok(match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div | BinaryOp::Mod if right.is_zero() => {
            return Err(ExprError::DivisionByZero(token.clone()));
        }
        BinaryOp::Div => left / right,
        BinaryOp::Mod => left % right,
        BinaryOp::Shl => shift(left, right, true, token)?,
        BinaryOp::Shr => shift(left, right, false, token)?,
        BinaryOp::BitAnd => left & right,
        BinaryOp::BitXor => left ^ right,
        BinaryOp::BitOr => left | right,
    })
}

fn shift(value: BigInt, amount: BigInt, left: bool, token: &Token) -> Result<BigInt, ExprError> {
    // A negative count shifts the other way
    let (left, amount) = if amount.is_negative() {
        (!left, -amount)
    } else {
        (left, amount)
    };
    let bits = amount
        .to_usize()
        .filter(|bits| *bits <= MAX_SHIFT)
        .ok_or_else(|| ExprError::Invalid(token.clone()))?;
    Ok(if left { value << bits } else { value >> bits })
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    if let (Value::Boolean(l), Value::Boolean(r)) = (left, right) {
        let (l, r) = (*l, *r);
        return match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            CompareOp::Ge => l,
            CompareOp::Le => r,
            CompareOp::Gt => l && !r,
            CompareOp::Lt => !l && r,
        };
    }
    let (l, r) = (left.to_integer(), right.to_integer());
    match op {
        CompareOp::Eq => l == r,
        CompareOp::Ne => l != r,
        CompareOp::Ge => l >= r,
        CompareOp::Le => l <= r,
        CompareOp::Gt => l > r,
        CompareOp::Lt => l < r,
    }
}

/// Entry on the operator stack
enum Pending {
    Open(Token),
    Unary(UnaryOp, Token),
    Infix(InfixOp, Token),
    Question(Token),
    Colon(Token),
}

impl Pending {
    fn precedence(&self) -> Option<u8> {
        match self {
            Pending::Open(_) => None,
            Pending::Unary(..) => Some(UNARY_PRECEDENCE),
            Pending::Infix(op, _) => Some(op.precedence()),
            Pending::Question(_) | Pending::Colon(_) => Some(CONDITIONAL_PRECEDENCE),
        }
    }
}

fn pop_operand(operands: &mut Vec<Expr>, at: &Token) -> Result<Box<Expr>, ExprError> {
    operands
        .pop()
        .map(Box::new)
        .ok_or_else(|| ExprError::Invalid(at.clone()))
}

fn reduce(pending: Pending, operands: &mut Vec<Expr>) -> Result<(), ExprError> {
    let node = match pending {
        Pending::Open(token) | Pending::Question(token) => return Err(ExprError::Invalid(token)),
        Pending::Unary(op, token) => {
            let operand = pop_operand(operands, &token)?;
            Expr::Unary { op, token, operand }
        }
        Pending::Infix(op, token) => {
            let right = pop_operand(operands, &token)?;
            let left = pop_operand(operands, &token)?;
            match op {
                InfixOp::Binary(op) => Expr::Binary {
                    op,
                    token,
                    left,
                    right,
                },
                InfixOp::Compare(op) => Expr::Compare {
                    op,
                    token,
                    left,
                    right,
                },
                InfixOp::And => Expr::And(token, left, right),
                InfixOp::Or => Expr::Or(token, left, right),
            }
        }
        Pending::Colon(token) => {
            let on_false = pop_operand(operands, &token)?;
            let on_true = pop_operand(operands, &token)?;
            let condition = pop_operand(operands, &token)?;
            Expr::Ternary {
                token,
                condition,
                on_true,
                on_false,
            }
        }
    };
    operands.push(node);
    Ok(())
}

/// Reduce operators on top of the stack while `pred` holds for their precedence
fn reduce_while(
    operators: &mut Vec<Pending>,
    operands: &mut Vec<Expr>,
    pred: impl Fn(u8) -> bool,
) -> Result<(), ExprError> {
    while let Some(precedence) = operators.last().and_then(Pending::precedence) {
        if !pred(precedence) {
            break;
        }
        if let Some(top) = operators.pop() {
            reduce(top, operands)?;
        }
    }
    Ok(())
}

/// Parses and evaluates constant expressions against a macro table
pub struct ExpressionEvaluator<'s> {
    macros: &'s MacroTable,
    factory: &'s dyn TokenFactory,
    sink: &'s mut dyn DiagnosticSink,
}

impl<'s> ExpressionEvaluator<'s> {
    /// Create an evaluator
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

    /// Evaluate the condition of `directive`, reporting any problem
    ///
    /// Anything that prevents evaluation makes the condition false.
    pub fn evaluate_condition(&mut self, directive: &Token, tokens: Vec<Token>) -> bool {
        match self.evaluate(tokens) {
            Ok(Some(value)) => {
                log::debug!("#{directive} at {} is {value}", directive.location());
                value.truthy()
            }
            Ok(None) => {
                self.sink.incomplete_directive(directive);
                false
            }
            Err(error) => {
                log::debug!("#{directive} at {}: {error}", directive.location());
                error.report(self.sink);
                false
            }
        }
    }

    /// Evaluate an expression; `Ok(None)` when there is nothing to evaluate
    pub fn evaluate(&mut self, tokens: Vec<Token>) -> Result<Option<Value>, ExprError> {
        self.parse(tokens)?.map(|expr| expr.evaluate()).transpose()
    }

    /// Parse an expression; `Ok(None)` when there is nothing to parse
    pub fn parse(&mut self, tokens: Vec<Token>) -> Result<Option<Expr>, ExprError> {
        if let Some(assignment) = tokens.iter().find(|t| ASSIGNMENTS.contains(&t.text())) {
            return Err(ExprError::Assignment(assignment.clone()));
        }

        let mut queue = TokenQueue::new(tokens);
        let mut operands: Vec<Expr> = Vec::new();
        let mut operators: Vec<Pending> = Vec::new();
        let mut expect_operand = true;

        while let Some(token) = queue.read_next_token() {
            if token.is_whitespace() || token.is_newline() {
                continue;
            }
            match token.text() {
                "(" if expect_operand => operators.push(Pending::Open(token)),
                ")" if !expect_operand => {
                    loop {
                        match operators.pop() {
                            Some(Pending::Open(_)) => break,
                            Some(pending) => reduce(pending, &mut operands)?,
                            None => return Err(ExprError::Invalid(token)),
                        }
                    }
                }
                "?" if !expect_operand => {
                    reduce_while(&mut operators, &mut operands, |p| p < CONDITIONAL_PRECEDENCE)?;
                    operators.push(Pending::Question(token));
                    expect_operand = true;
                }
                ":" if !expect_operand => {
                    loop {
                        match operators.pop() {
                            Some(Pending::Question(_)) => {
                                operators.push(Pending::Colon(token));
                                break;
                            }
                            Some(Pending::Open(_)) | None => return Err(ExprError::Invalid(token)),
                            Some(pending) => reduce(pending, &mut operands)?,
                        }
                    }
                    expect_operand = true;
                }
                text if expect_operand && UnaryOp::from_text(text).is_some() => {
                    if let Some(op) = UnaryOp::from_text(text) {
                        operators.push(Pending::Unary(op, token));
                    }
                }
                text if !expect_operand && InfixOp::from_text(text).is_some() => {
                    if let Some(op) = InfixOp::from_text(text) {
                        let precedence = op.precedence();
                        reduce_while(&mut operators, &mut operands, |p| p <= precedence)?;
                        operators.push(Pending::Infix(op, token));
                        expect_operand = true;
                    }
                }
                _ if !expect_operand => return Err(ExprError::Invalid(token)),
                _ => {
                    if let Some(operand) = self.operand(token, &mut queue)? {
                        operands.push(operand);
                        expect_operand = false;
                    }
                }
            }
        }

        while let Some(pending) = operators.pop() {
            reduce(pending, &mut operands)?;
        }
        match operands.len() {
            0 => Ok(None),
            1 => Ok(operands.pop()),
            // An operand directly after another is rejected while scanning,
            // so this only guards the stack discipline
            _ => Err(ExprError::Invalid(operands[1].token().clone())),
        }
    }

    /// Turn `token` into an operand
    ///
    /// Returns `None` when `token` was a macro whose expansion has been
    /// pushed back into `queue`.
    fn operand(&mut self, token: Token, queue: &mut TokenQueue<'_>) -> Result<Option<Expr>, ExprError> {
        let text = token.text();
        if text == "defined" {
            return self.defined(token, queue).map(Some);
        }
        if token.is_identifier() {
            if !token.hideset().contains(text)
                && let Some(mac) = self.macros.resolve(text)
            {
                let name = token.clone();
                let mut expander = Expander::new(self.macros, self.factory, &mut *self.sink);
                return match expander.expand(&mac, token, queue) {
                    Expansion::Expanded => Ok(None),
                    Expansion::NotInvoked(token) => Ok(Some(self.undefined(token))),
                    Expansion::Failed => Err(ExprError::MacroCall(name)),
                };
            }
            return Ok(Some(match text {
                "true" => Expr::Boolean(token, true),
                "false" => Expr::Boolean(token, false),
                _ => self.undefined(token),
            }));
        }
        if is_quoted_literal(text) {
            return Err(ExprError::StringLiteral(token));
        }
        match Literal::parse(text) {
            Some(literal) if literal.is_floating() => Err(ExprError::FloatingPoint(token)),
            Some(literal) => {
                let value = literal.value();
                Ok(Some(Expr::Integer(token, value)))
            }
            None if is_punctuator(text) => Err(ExprError::Invalid(token)),
            None => Ok(Some(self.undefined(token))),
        }
    }

    fn undefined(&mut self, token: Token) -> Expr {
        self.sink.undefined_identifier(&token);
        Expr::Boolean(token, false)
    }

    /// Parse the operand of `defined`, with or without parentheses
    fn defined(&mut self, defined: Token, queue: &mut TokenQueue<'_>) -> Result<Expr, ExprError> {
        let operand = queue.skip(|t| t.is_whitespace() || t.is_newline());
        let (name, parenthesized) = match operand {
            Some(open) if open.is("(") => (queue.skip(|t| t.is_whitespace() || t.is_newline()), true),
            other => (other, false),
        };
        let name = match name {
            Some(name) if name.is_identifier() => name,
            other => {
                return Err(ExprError::DefinedOperand {
                    defined,
                    operand: other,
                });
            }
        };
        if parenthesized {
            match queue.skip(|t| t.is_whitespace() || t.is_newline()) {
                Some(close) if close.is(")") => {}
                other => {
                    return Err(ExprError::DefinedOperand {
                        defined,
                        operand: other,
                    });
                }
            }
        }
        let value = self.macros.is_defined(name.text());
        Ok(Expr::Defined { name, value })
    }
}

fn is_quoted_literal(text: &str) -> bool {
    let unprefixed = ["u8", "L", "u", "U"]
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text);
    unprefixed.starts_with('"') || unprefixed.starts_with('\'')
}

fn is_punctuator(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_ascii_punctuation() && c != '_')
}
