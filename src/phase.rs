//! Phase expressions (`phi_expr`) entered for 2D/3D and animated runs.
//!
//! Expressions are checked locally before a request is sent: first a
//! character whitelist, then a full parse and a trial evaluation at `t = 0`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PhaseError;

static WHITELIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+*/().,\s0-9]|sin|cos|tan|exp|abs|sqrt|log|pow|pi|PI|E|e|t)*$")
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Abs,
    Sqrt,
    Log,
    Pow,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "exp" => Some(Func::Exp),
            "abs" => Some(Func::Abs),
            "sqrt" => Some(Func::Sqrt),
            "log" => Some(Func::Log),
            "pow" => Some(Func::Pow),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        if self == Func::Pow {
            2
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Time,
    Neg(Box<Node>),
    Bin(char, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    fn eval(&self, t: f64) -> f64 {
        match self {
            Node::Num(v) => *v,
            Node::Time => t,
            Node::Neg(inner) => -inner.eval(t),
            Node::Bin(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(t), rhs.eval(t));
                match op {
                    '+' => a + b,
                    '-' => a - b,
                    '*' => a * b,
                    _ => a / b,
                }
            }
            Node::Call(func, args) => {
                let a = args[0].eval(t);
                match func {
                    Func::Sin => a.sin(),
                    Func::Cos => a.cos(),
                    Func::Tan => a.tan(),
                    Func::Exp => a.exp(),
                    Func::Abs => a.abs(),
                    Func::Sqrt => a.sqrt(),
                    Func::Log => a.ln(),
                    Func::Pow => a.powf(args[1].eval(t)),
                }
            }
        }
    }

    fn uses_time(&self) -> bool {
        match self {
            Node::Num(_) => false,
            Node::Time => true,
            Node::Neg(inner) => inner.uses_time(),
            Node::Bin(_, lhs, rhs) => lhs.uses_time() || rhs.uses_time(),
            Node::Call(_, args) => args.iter().any(Node::uses_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, PhaseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() || c == '.' {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent suffix, only when followed by digits
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| PhaseError::Syntax {
                pos: start,
                reason: format!("bad number '{}'", text),
            })?;
            tokens.push((start, Token::Num(value)));
            continue;
        }
        if c.is_ascii_alphabetic() {
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
            continue;
        }
        let token = match c {
            '+' | '-' | '*' | '/' => Token::Op(c),
            '(' => Token::Open,
            ')' => Token::Close,
            ',' => Token::Comma,
            _ => return Err(PhaseError::Disallowed),
        };
        tokens.push((start, token));
        i += 1;
    }
    Ok(tokens)
}

const MAX_DEPTH: usize = 256;
const MAX_TOKENS: usize = 4096;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(at, _)| *at)
    }

    fn error(&self, reason: &str) -> PhaseError {
        PhaseError::Syntax {
            pos: self.offset(),
            reason: reason.to_string(),
        }
    }

    fn expect(&mut self, want: &Token, reason: &str) -> Result<(), PhaseError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(reason))
        }
    }

    fn expr(&mut self) -> Result<Node, PhaseError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node, PhaseError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, PhaseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let node = self.unary_inner();
        self.depth -= 1;
        node
    }

    fn unary_inner(&mut self) -> Result<Node, PhaseError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Node, PhaseError> {
        let token = match self.tokens.get(self.pos) {
            Some((_, token)) => token.clone(),
            None => return Err(self.error("unexpected end of expression")),
        };
        self.pos += 1;
        match token {
            Token::Num(value) => Ok(Node::Num(value)),
            Token::Open => {
                let inner = self.expr()?;
                self.expect(&Token::Close, "expected ')'")?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "t" => Ok(Node::Time),
                "pi" | "PI" => Ok(Node::Num(std::f64::consts::PI)),
                "e" | "E" => Ok(Node::Num(std::f64::consts::E)),
                _ => {
                    let func = Func::from_name(&name)
                        .ok_or_else(|| PhaseError::Unknown(name.clone()))?;
                    self.expect(&Token::Open, "expected '(' after function name")?;
                    let mut args = vec![self.expr()?];
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.expr()?);
                    }
                    self.expect(&Token::Close, "expected ')'")?;
                    if args.len() != func.arity() {
                        return Err(self.error("wrong number of arguments"));
                    }
                    Ok(Node::Call(func, args))
                }
            },
            _ => {
                self.pos -= 1;
                Err(self.error("unexpected token"))
            }
        }
    }
}

/// A validated phase expression, evaluable at any time `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseExpr {
    source: String,
    root: Node,
}

impl PhaseExpr {
    pub fn parse(source: &str) -> Result<Self, PhaseError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(PhaseError::Empty);
        }
        if !WHITELIST.is_match(trimmed) {
            return Err(PhaseError::Disallowed);
        }
        let tokens = tokenize(trimmed)?;
        // Left-deep chains like `1+1+...` grow the tree without nesting.
        if tokens.len() > MAX_TOKENS {
            return Err(PhaseError::Syntax {
                pos: tokens[MAX_TOKENS].0,
                reason: "expression too long".to_string(),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: trimmed.chars().count(),
            depth: 0,
        };
        let root = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing input"));
        }
        if !root.eval(0.0).is_finite() {
            return Err(PhaseError::NonFinite);
        }
        Ok(PhaseExpr {
            source: trimmed.to_string(),
            root,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, t: f64) -> f64 {
        self.root.eval(t)
    }

    pub fn depends_on_time(&self) -> bool {
        self.root.uses_time()
    }
}

pub fn validate(source: &str) -> Result<(), PhaseError> {
    PhaseExpr::parse(source).map(|_| ())
}
