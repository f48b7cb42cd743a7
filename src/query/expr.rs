//! WHERE-clause expressions over feature properties.
//!
//! A clause is tokenized, parsed by recursive descent into an [`Expr`] tree
//! and evaluated directly against a property map. Nothing is executed beyond
//! the comparisons the grammar allows.
//!
//! ```text
//! expr       := or
//! or         := and ( OR and )*
//! and        := not ( AND not )*
//! not        := NOT not | predicate
//! predicate  := '(' expr ')' | operand tail?
//! tail       := cmp operand
//!             | IS [NOT] NULL
//!             | [NOT] IN '(' literal ( ',' literal )* ')'
//!             | [NOT] LIKE string
//!             | [NOT] BETWEEN operand AND operand
//! operand    := identifier | literal
//! ```
//!
//! Evaluation uses SQL three-valued logic: comparisons involving `NULL` or a
//! missing property are unknown, and a clause matches only when it is
//! definitely true.

use crate::error::{GeoscopeError, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Nesting limit for parentheses and `NOT` chains.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Minus,
    And,
    Or,
    Not,
    Is,
    Null,
    In,
    Like,
    Between,
    True,
    False,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Str(s) => write!(f, "string '{}'", s),
            Token::Num(n) => write!(f, "number {}", n),
            Token::Eq => f.write_str("'='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::LtEq => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::GtEq => f.write_str("'>='"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
            Token::Minus => f.write_str("'-'"),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Not => f.write_str("NOT"),
            Token::Is => f.write_str("IS"),
            Token::Null => f.write_str("NULL"),
            Token::In => f.write_str("IN"),
            Token::Like => f.write_str("LIKE"),
            Token::Between => f.write_str("BETWEEN"),
            Token::True => f.write_str("TRUE"),
            Token::False => f.write_str("FALSE"),
        }
    }
}

fn syntax_error(message: impl fmt::Display, offset: usize) -> GeoscopeError {
    GeoscopeError::InvalidInput(format!("WHERE clause: {} at offset {}", message, offset))
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "IS" => Token::Is,
        "NULL" => Token::Null,
        "IN" => Token::In,
        "LIKE" => Token::Like,
        "BETWEEN" => Token::Between,
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        _ => return None,
    })
}

/// Split a clause into `(token, byte offset)` pairs.
fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => tokens.push((Token::LParen, offset)),
            ')' => tokens.push((Token::RParen, offset)),
            ',' => tokens.push((Token::Comma, offset)),
            '-' => tokens.push((Token::Minus, offset)),
            '=' => tokens.push((Token::Eq, offset)),
            '!' => {
                if chars.get(i + 1).map(|&(_, c)| c) != Some('=') {
                    return Err(syntax_error("expected '=' after '!'", offset));
                }
                tokens.push((Token::NotEq, offset));
                i += 1;
            }
            '<' => match chars.get(i + 1).map(|&(_, c)| c) {
                Some('=') => {
                    tokens.push((Token::LtEq, offset));
                    i += 1;
                }
                Some('>') => {
                    tokens.push((Token::NotEq, offset));
                    i += 1;
                }
                _ => tokens.push((Token::Lt, offset)),
            },
            '>' => {
                if chars.get(i + 1).map(|&(_, c)| c) == Some('=') {
                    tokens.push((Token::GtEq, offset));
                    i += 1;
                } else {
                    tokens.push((Token::Gt, offset));
                }
            }
            '\'' | '"' => {
                // Single quotes delimit strings, double quotes identifiers.
                // A doubled quote inside either is an escaped quote.
                let quote = c;
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j).map(|&(_, c)| c) {
                        None => return Err(syntax_error("unterminated quote", offset)),
                        Some(q) if q == quote => {
                            if chars.get(j + 1).map(|&(_, c)| c) == Some(quote) {
                                text.push(quote);
                                j += 2;
                            } else {
                                break;
                            }
                        }
                        Some(other) => {
                            text.push(other);
                            j += 1;
                        }
                    }
                }
                tokens.push((
                    if quote == '\'' {
                        Token::Str(text)
                    } else {
                        Token::Ident(text)
                    },
                    offset,
                ));
                i = j;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut j = i;
                while let Some(&(_, d)) = chars.get(j) {
                    let exponent_sign = (d == '+' || d == '-')
                        && j > i
                        && matches!(chars[j - 1].1, 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        j += 1;
                    } else {
                        break;
                    }
                }
                let end = chars.get(j).map_or(input.len(), |&(o, _)| o);
                let raw = &input[offset..end];
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| syntax_error(format!("invalid number '{}'", raw), offset))?;
                tokens.push((Token::Num(value), offset));
                i = j;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i;
                while let Some(&(_, d)) = chars.get(j) {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        j += 1;
                    } else {
                        break;
                    }
                }
                let end = chars.get(j).map_or(input.len(), |&(o, _)| o);
                let word = &input[offset..end];
                tokens.push((keyword(word).unwrap_or_else(|| Token::Ident(word.to_string())), offset));
                i = j;
                continue;
            }
            other => {
                return Err(syntax_error(format!("unexpected character '{}'", other), offset));
            }
        }
        i += 1;
    }
    Ok(tokens)
}

/// A constant in a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Literal {
    fn from_json(value: &Value) -> Option<Literal> {
        match value {
            Value::Null => Some(Literal::Null),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Literal::Number),
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Parsed WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    In {
        operand: Operand,
        values: Vec<Literal>,
        negated: bool,
    },
    Like {
        operand: Operand,
        pattern: String,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |&(_, o)| o)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        let offset = self.offset();
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(syntax_error(format!("expected {}, found {}", expected, t), offset)),
            None => Err(syntax_error(format!("expected {}, found end of input", expected), offset)),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax_error("expression nested too deeply", self.offset()));
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr> {
        if self.eat(&Token::LParen) {
            self.enter()?;
            let inner = self.or()?;
            self.depth -= 1;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        let operand = self.operand()?;
        let offset = self.offset();
        let op = match self.peek() {
            Some(Token::Eq) => Some(CompareOp::Eq),
            Some(Token::NotEq) => Some(CompareOp::NotEq),
            Some(Token::Lt) => Some(CompareOp::Lt),
            Some(Token::LtEq) => Some(CompareOp::LtEq),
            Some(Token::Gt) => Some(CompareOp::Gt),
            Some(Token::GtEq) => Some(CompareOp::GtEq),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let right = self.operand()?;
            return Ok(Expr::Compare {
                left: operand,
                op,
                right,
            });
        }

        if self.eat(&Token::Is) {
            let negated = self.eat(&Token::Not);
            self.expect(&Token::Null)?;
            return Ok(Expr::IsNull { operand, negated });
        }

        let negated = self.eat(&Token::Not);
        match self.advance() {
            Some(Token::In) => {
                self.expect(&Token::LParen)?;
                let mut values = vec![self.literal()?];
                while self.eat(&Token::Comma) {
                    values.push(self.literal()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Expr::In {
                    operand,
                    values,
                    negated,
                })
            }
            Some(Token::Like) => {
                let offset = self.offset();
                match self.advance() {
                    Some(Token::Str(pattern)) => Ok(Expr::Like {
                        operand,
                        pattern,
                        negated,
                    }),
                    _ => Err(syntax_error("LIKE needs a quoted pattern", offset)),
                }
            }
            Some(Token::Between) => {
                let low = self.operand()?;
                self.expect(&Token::And)?;
                let high = self.operand()?;
                Ok(Expr::Between {
                    operand,
                    low,
                    high,
                    negated,
                })
            }
            Some(t) => Err(syntax_error(format!("expected a comparison, found {}", t), offset)),
            None => Err(syntax_error("expected a comparison, found end of input", offset)),
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        if let Some(Token::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            return Ok(Operand::Field(name));
        }
        self.literal().map(Operand::Literal)
    }

    fn literal(&mut self) -> Result<Literal> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Str(s)) => Ok(Literal::String(s)),
            Some(Token::Num(n)) => Ok(Literal::Number(n)),
            Some(Token::Minus) => match self.advance() {
                Some(Token::Num(n)) => Ok(Literal::Number(-n)),
                _ => Err(syntax_error("expected a number after '-'", offset)),
            },
            Some(Token::True) => Ok(Literal::Bool(true)),
            Some(Token::False) => Ok(Literal::Bool(false)),
            Some(Token::Null) => Ok(Literal::Null),
            Some(t) => Err(syntax_error(format!("expected a value, found {}", t), offset)),
            None => Err(syntax_error("expected a value, found end of input", offset)),
        }
    }
}

/// Parse a WHERE clause.
///
/// # Examples
///
/// ```
/// use geoscope::query::expr::parse_where;
/// use serde_json::json;
///
/// let clause = parse_where("population > 1000000 AND name LIKE 'San%'").unwrap();
/// let props = json!({"name": "San Jose", "population": 1013240});
/// assert!(clause.matches(props.as_object().unwrap()));
///
/// assert!(parse_where("name = 'x'; DROP TABLE cities").is_err());
/// ```
pub fn parse_where(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(syntax_error("empty expression", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let expr = parser.or()?;
    if let Some(token) = parser.peek() {
        return Err(syntax_error(format!("unexpected {}", token), parser.offset()));
    }
    Ok(expr)
}

fn resolve(operand: &Operand, properties: &Map<String, Value>) -> Option<Literal> {
    match operand {
        Operand::Literal(lit) => Some(lit.clone()),
        Operand::Field(name) => match properties.get(name) {
            Some(value) => Literal::from_json(value),
            None => Some(Literal::Null),
        },
    }
}

/// Order two non-null values. Numeric strings compare against numbers
/// numerically; other mixed-type pairs are incomparable.
fn compare(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Number(x), Literal::Number(y)) => x.partial_cmp(y),
        (Literal::String(x), Literal::String(y)) => Some(x.cmp(y)),
        (Literal::Bool(x), Literal::Bool(y)) => Some(x.cmp(y)),
        (Literal::Number(x), Literal::String(s)) => s.trim().parse::<f64>().ok().and_then(|y| x.partial_cmp(&y)),
        (Literal::String(s), Literal::Number(y)) => s.trim().parse::<f64>().ok().and_then(|x| x.partial_cmp(y)),
        _ => None,
    }
}

fn is_null(lit: &Option<Literal>) -> bool {
    matches!(lit, None | Some(Literal::Null))
}

/// `%` matches any run of characters, `_` exactly one.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    // matched[j]: pattern[..j] matches text[..i] for the current i.
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }
    for &c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p == c,
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

fn negate(value: Option<bool>, negated: bool) -> Option<bool> {
    if negated { value.map(|v| !v) } else { value }
}

impl Expr {
    /// Three-valued evaluation: `None` is SQL's unknown.
    pub fn evaluate(&self, properties: &Map<String, Value>) -> Option<bool> {
        match self {
            Expr::Or(a, b) => match (a.evaluate(properties), b.evaluate(properties)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Expr::And(a, b) => match (a.evaluate(properties), b.evaluate(properties)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Expr::Not(inner) => inner.evaluate(properties).map(|v| !v),
            Expr::Compare { left, op, right } => {
                let (l, r) = (resolve(left, properties), resolve(right, properties));
                if is_null(&l) || is_null(&r) {
                    return None;
                }
                compare(l.as_ref()?, r.as_ref()?).map(|ordering| op.holds(ordering))
            }
            Expr::IsNull { operand, negated } => {
                let null = matches!(resolve(operand, properties), Some(Literal::Null));
                Some(null != *negated)
            }
            Expr::In {
                operand,
                values,
                negated,
            } => {
                let value = resolve(operand, properties);
                if is_null(&value) {
                    return None;
                }
                let value = value?;
                let mut saw_null = false;
                for candidate in values {
                    if *candidate == Literal::Null {
                        saw_null = true;
                    } else if compare(&value, candidate) == Some(Ordering::Equal) {
                        return Some(!*negated);
                    }
                }
                if saw_null { None } else { Some(*negated) }
            }
            Expr::Like {
                operand,
                pattern,
                negated,
            } => match resolve(operand, properties) {
                Some(Literal::String(text)) => Some(like(&text, pattern) != *negated),
                Some(Literal::Number(n)) => Some(like(&n.to_string(), pattern) != *negated),
                _ => None,
            },
            Expr::Between {
                operand,
                low,
                high,
                negated,
            } => {
                let (v, lo, hi) = (
                    resolve(operand, properties),
                    resolve(low, properties),
                    resolve(high, properties),
                );
                if is_null(&v) || is_null(&lo) || is_null(&hi) {
                    return None;
                }
                let (v, lo, hi) = (v?, lo?, hi?);
                let above = compare(&v, &lo)? != Ordering::Less;
                let below = compare(&v, &hi)? != Ordering::Greater;
                negate(Some(above && below), *negated)
            }
        }
    }

    /// True only when the clause is definitely true for `properties`.
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        self.evaluate(properties) == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn check(clause: &str, properties: &Value) -> bool {
        parse_where(clause).unwrap().matches(&props(properties.clone()))
    }

    #[test]
    fn test_comparisons() {
        let city = json!({"name": "Oakland", "pop": 433031, "coastal": true, "zip": "94607"});
        assert!(check("pop >= 433031", &city));
        assert!(check("pop <> 1", &city));
        assert!(check("pop != 1", &city));
        assert!(!check("pop < 400000", &city));
        assert!(check("name = 'Oakland'", &city));
        assert!(check("coastal = TRUE", &city));
        assert!(check("zip > 90000", &city));
        assert!(check("100 < pop", &city));
        assert!(check("pop > -5", &city));
    }

    #[test]
    fn test_precedence_and_grouping() {
        let row = json!({"a": 1, "b": 2, "c": 3});
        assert!(check("a = 1 OR b = 0 AND c = 0", &row));
        assert!(!check("(a = 1 OR b = 0) AND c = 0", &row));
        assert!(check("NOT a = 2 AND NOT (b = 3)", &row));
    }

    #[test]
    fn test_null_handling() {
        let row = json!({"a": null, "b": 5});
        assert!(check("a IS NULL", &row));
        assert!(check("missing IS NULL", &row));
        assert!(check("b IS NOT NULL", &row));
        assert!(!check("a = 1", &row));
        assert!(!check("NOT a = 1", &row));
        assert!(check("a = 1 OR b = 5", &row));
        assert!(!check("b NOT IN (1, NULL)", &row));
    }

    #[test]
    fn test_in_like_between() {
        let row = json!({"kind": "park", "name": "Golden Gate Park", "area": 412.0});
        assert!(check("kind IN ('park', 'garden')", &row));
        assert!(check("kind NOT IN ('road')", &row));
        assert!(check("name LIKE 'Golden%'", &row));
        assert!(check("name LIKE '%Gate%'", &row));
        assert!(check("kind LIKE 'p_rk'", &row));
        assert!(!check("kind LIKE 'p_k'", &row));
        assert!(check("name NOT LIKE '%Zoo%'", &row));
        assert!(check("area BETWEEN 400 AND 500", &row));
        assert!(check("area NOT BETWEEN 0 AND 100", &row));
    }

    #[test]
    fn test_quoting() {
        let row = json!({"owner name": "O'Brien"});
        assert!(check(r#""owner name" = 'O''Brien'"#, &row));
    }

    #[test]
    fn test_rejects_malformed_input() {
        for bad in [
            "",
            "a =",
            "a = 1 AND",
            "(a = 1",
            "a = 1)",
            "a == 1",
            "a LIKE b",
            "name = 'unterminated",
            "a = 1; b = 2",
            "a IS 5",
            "a BETWEEN 1 OR 2",
            "process.exit()",
        ] {
            assert!(
                matches!(parse_where(bad), Err(GeoscopeError::InvalidInput(_))),
                "accepted {:?}",
                bad
            );
        }
        let deep = format!("{}a = 1{}", "(".repeat(100), ")".repeat(100));
        assert!(parse_where(&deep).is_err());
    }
}
