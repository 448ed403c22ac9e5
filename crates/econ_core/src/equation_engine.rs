use crate::error::{ParseError, ParseErrorKind};
use std::fmt;
use std::str::FromStr;

/// OpCodes for the stack-based virtual machine.
/// The VM operates on a stack of `f64` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant onto the stack.
    LoadConst(f64),
    /// Pushes the current value of `q` onto the stack.
    LoadVar,
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b), or NaN when b is exactly zero.
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
}

impl OpCode {
    fn from_operator(op: char) -> Self {
        match op {
            '+' => OpCode::Add,
            '-' => OpCode::Sub,
            '*' => OpCode::Mul,
            '/' => OpCode::Div,
            _ => OpCode::Pow,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::LoadConst(value) => write!(f, "{value}"),
            OpCode::LoadVar => f.write_str("q"),
            OpCode::Add => f.write_str("+"),
            OpCode::Sub => f.write_str("-"),
            OpCode::Mul => f.write_str("*"),
            OpCode::Div => f.write_str("/"),
            OpCode::Pow => f.write_str("^"),
        }
    }
}

/// A parsed expression in postfix order, ready to be evaluated for any `q`.
///
/// The instruction list is validated when it is built, so evaluation never
/// underflows the stack. Evaluation only touches a local stack, which makes a
/// single instance safe to share between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    ops: Vec<OpCode>,
    max_depth: usize,
}

impl CompiledExpression {
    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    /// Evaluates the expression at `q`.
    pub fn evaluate(&self, q: f64) -> f64 {
        let mut stack = Vec::with_capacity(self.max_depth);
        VM::execute(self, q, &mut stack)
    }
}

impl FromStr for CompiledExpression {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse(raw)
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

/// Stack-based virtual machine for evaluating compiled expressions.
///
/// The VM is stateless; `execute` takes the instructions, the value of `q`
/// and a scratch stack that is cleared before use.
pub struct VM;

impl VM {
    pub fn execute(expression: &CompiledExpression, q: f64, stack: &mut Vec<f64>) -> f64 {
        stack.clear();

        for op in &expression.ops {
            match op {
                OpCode::LoadConst(value) => stack.push(*value),
                OpCode::LoadVar => stack.push(q),
                OpCode::Add => {
                    let (a, b) = pop_operands(stack);
                    stack.push(a + b);
                }
                OpCode::Sub => {
                    let (a, b) = pop_operands(stack);
                    stack.push(a - b);
                }
                OpCode::Mul => {
                    let (a, b) = pop_operands(stack);
                    stack.push(a * b);
                }
                OpCode::Div => {
                    let (a, b) = pop_operands(stack);
                    stack.push(if b == 0.0 { f64::NAN } else { a / b });
                }
                OpCode::Pow => {
                    let (a, b) = pop_operands(stack);
                    stack.push(a.powf(b));
                }
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => value,
            _ => panic!("compiled expression did not reduce to a single value"),
        }
    }
}

// Operand counts are checked in `to_postfix`, so an underflow here is a bug in
// this module rather than bad user input.
fn pop_operands(stack: &mut Vec<f64>) -> (f64, f64) {
    match (stack.pop(), stack.pop()) {
        (Some(b), Some(a)) => (a, b),
        _ => panic!("compiled expression stack underflow"),
    }
}

// --- Tokenizer ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Number(f64),
    Variable,
    Operator(char),
    LeftParen,
    RightParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

impl Token {
    fn new(kind: TokenKind, position: usize) -> Self {
        Self { kind, position }
    }

    fn ends_term(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Number(_) | TokenKind::Variable | TokenKind::RightParen
        )
    }

    fn starts_term(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Number(_) | TokenKind::Variable | TokenKind::LeftParen
        )
    }
}

/// Parses a raw expression in `q` into a [`CompiledExpression`].
pub fn parse(raw: &str) -> Result<CompiledExpression, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::EmptyExpression,
            "Expression is empty",
        ));
    }

    let tokens = tokenize(raw)?;
    let tokens = insert_implicit_multiplication(tokens);
    to_postfix(&tokens)
}

fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '^')
}

fn is_unary_position(tokens: &[Token]) -> bool {
    match tokens.last() {
        None => true,
        Some(token) => matches!(token.kind, TokenKind::Operator(_) | TokenKind::LeftParen),
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            let mut seen_decimal = false;
            while i < chars.len() {
                let d = chars[i];
                if d.is_ascii_digit() {
                    i += 1;
                } else if d == '.' && !seen_decimal {
                    seen_decimal = true;
                    i += 1;
                } else {
                    break;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal.parse::<f64>().map_err(|_| {
                ParseError::at(
                    ParseErrorKind::InvalidNumber,
                    format!("Invalid number '{literal}'"),
                    start,
                )
            })?;
            tokens.push(Token::new(TokenKind::Number(value), start));
            continue;
        }

        match c {
            'q' | 'Q' => tokens.push(Token::new(TokenKind::Variable, i)),
            '(' => tokens.push(Token::new(TokenKind::LeftParen, i)),
            ')' => tokens.push(Token::new(TokenKind::RightParen, i)),
            op if is_operator(op) => {
                if is_unary_position(&tokens) {
                    match op {
                        '+' => {
                            i += 1;
                            continue;
                        }
                        // Unary minus becomes `0 - x`.
                        '-' => tokens.push(Token::new(TokenKind::Number(0.0), i)),
                        _ => {}
                    }
                }
                tokens.push(Token::new(TokenKind::Operator(op), i));
            }
            other => {
                return Err(ParseError::at(
                    ParseErrorKind::UnexpectedCharacter,
                    format!("Unexpected character '{other}'"),
                    i,
                ))
            }
        }
        i += 1;
    }

    Ok(tokens)
}

/// Inserts `*` between adjacent tokens such as `2q`, `q(q+1)` or `(q+1)(q-1)`.
fn insert_implicit_multiplication(tokens: Vec<Token>) -> Vec<Token> {
    if tokens.len() < 2 {
        return tokens;
    }

    let mut result = Vec::with_capacity(tokens.len() * 2);
    for (i, token) in tokens.iter().enumerate() {
        result.push(*token);
        if let Some(next) = tokens.get(i + 1) {
            if token.ends_term() && next.starts_term() {
                result.push(Token::new(TokenKind::Operator('*'), next.position));
            }
        }
    }
    result
}

fn precedence(op: char) -> u8 {
    match op {
        '+' | '-' => 1,
        '*' | '/' => 2,
        '^' => 3,
        _ => 0,
    }
}

fn is_right_associative(op: char) -> bool {
    op == '^'
}

/// Postfix output plus the operand depth bookkeeping used to reject
/// operators that would underflow the VM stack.
struct PostfixWriter {
    ops: Vec<OpCode>,
    depth: usize,
    max_depth: usize,
}

impl PostfixWriter {
    fn push_operand(&mut self, op: OpCode) {
        self.ops.push(op);
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn push_operator(&mut self, op: char, position: usize) -> Result<(), ParseError> {
        if self.depth < 2 {
            return Err(ParseError::at(
                ParseErrorKind::MissingOperand,
                format!("Operator '{op}' is missing an operand"),
                position,
            ));
        }
        self.ops.push(OpCode::from_operator(op));
        self.depth -= 1;
        Ok(())
    }
}

/// Shunting-yard conversion to postfix.
fn to_postfix(tokens: &[Token]) -> Result<CompiledExpression, ParseError> {
    let mut output = PostfixWriter {
        ops: Vec::with_capacity(tokens.len()),
        depth: 0,
        max_depth: 0,
    };
    let mut operators: Vec<Token> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::Number(value) => output.push_operand(OpCode::LoadConst(value)),
            TokenKind::Variable => output.push_operand(OpCode::LoadVar),
            TokenKind::Operator(op) => {
                while let Some(top) = operators.last() {
                    let TokenKind::Operator(top_op) = top.kind else {
                        break;
                    };
                    let pops = precedence(top_op) > precedence(op)
                        || (precedence(top_op) == precedence(op) && !is_right_associative(op));
                    if !pops {
                        break;
                    }
                    output.push_operator(top_op, top.position)?;
                    operators.pop();
                }
                operators.push(*token);
            }
            TokenKind::LeftParen => operators.push(*token),
            TokenKind::RightParen => {
                let mut matched = false;
                while let Some(top) = operators.pop() {
                    match top.kind {
                        TokenKind::LeftParen => {
                            matched = true;
                            break;
                        }
                        TokenKind::Operator(op) => output.push_operator(op, top.position)?,
                        _ => {}
                    }
                }
                if !matched {
                    return Err(ParseError::at(
                        ParseErrorKind::UnbalancedParenthesis,
                        "Unmatched closing parenthesis",
                        token.position,
                    ));
                }
            }
        }
    }

    while let Some(top) = operators.pop() {
        match top.kind {
            TokenKind::Operator(op) => output.push_operator(op, top.position)?,
            _ => {
                return Err(ParseError::at(
                    ParseErrorKind::UnbalancedParenthesis,
                    "Unclosed parenthesis",
                    top.position,
                ))
            }
        }
    }

    if output.depth != 1 {
        let position = tokens.first().map(|t| t.position).unwrap_or(0);
        return Err(ParseError::at(
            ParseErrorKind::MissingOperand,
            "Expression has no value",
            position,
        ));
    }

    Ok(CompiledExpression {
        ops: output.ops,
        max_depth: output.max_depth,
    })
}
