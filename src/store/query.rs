//! Restricted graph query language understood by [`MemoryStore`]
//!
//! Only read queries over a single node variable are supported:
//!
//! ```text
//! MATCH (n) [WHERE <expr>] RETURN n [ORDER BY n.<field> [ASC|DESC]] [LIMIT <k>]
//! ```
//!
//! where `<expr>` combines `id(n) IN <list>` and
//! `n.<field> <op> <value>` with `AND`, `OR`, `NOT` and parentheses.
//! Values may be literals or `$name` parameters.
//!
//! [`MemoryStore`]: super::MemoryStore

use crate::model::{Record, RecordId};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Named query parameters
pub type Params = BTreeMap<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("unexpected end of query")]
    UnexpectedEnd,

    #[error("unexpected token {0:?}")]
    Unexpected(String),

    #[error("unknown variable {0:?}")]
    UnknownVariable(String),

    #[error("missing parameter ${0}")]
    MissingParam(String),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("expected a list of record ids")]
    NotAnIdList,
}

/// Comparison operator between a field and a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    StartsWith,
}

/// Filter criterion evaluated against a record
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Matches every record
    All,
    IdIn(Vec<RecordId>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    /// Evaluate criterion against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Criterion::All => true,
            Criterion::IdIn(ids) => ids.contains(&record.id),
            Criterion::Compare { field, op, value } => match record.get(field) {
                Some(actual) => compare(actual, *op, value),
                None => false,
            },
            Criterion::And(criteria) => criteria.iter().all(|c| c.matches(record)),
            Criterion::Or(criteria) => criteria.iter().any(|c| c.matches(record)),
            Criterion::Not(criterion) => !criterion.matches(record),
        }
    }
}

/// A parsed query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filter: Criterion,

    /// Field to sort by, and whether the sort is descending
    pub order_by: Option<(String, bool)>,

    pub limit: Option<usize>,
}

impl Query {
    /// Apply the query to a set of records
    pub fn run<'a>(&self, records: impl Iterator<Item = &'a Record>) -> Vec<Record> {
        let mut matched: Vec<Record> = records.filter(|r| self.filter.matches(r)).cloned().collect();

        if let Some((field, descending)) = &self.order_by {
            matched.sort_by(|a, b| {
                let ordering = order_values(a.get(field), b.get(field));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(actual, expected),
        CompareOp::Ne => !values_equal(actual, expected),
        CompareOp::Lt => partial_cmp(actual, expected) == Some(Ordering::Less),
        CompareOp::Gt => partial_cmp(actual, expected) == Some(Ordering::Greater),
        CompareOp::Le => matches!(
            partial_cmp(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Ge => matches!(
            partial_cmp(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.contains(e.as_str()),
            (Value::Array(items), e) => items.iter().any(|item| values_equal(item, e)),
            _ => false,
        },
        CompareOp::StartsWith => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.starts_with(e.as_str()),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn partial_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order for sorting; missing values sort last
fn order_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => partial_cmp(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(Value),
    Str(String),
    Param(String),
    Symbol(&'static str),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("'{}'", s),
            Token::Param(p) => format!("${}", p),
            Token::Symbol(s) => s.to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, QueryError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' | ')' | '[' | ']' | ',' | '.' | ':' => {
                tokens.push(Token::Symbol(match c {
                    '(' => "(",
                    ')' => ")",
                    '[' => "[",
                    ']' => "]",
                    ',' => ",",
                    '.' => ".",
                    _ => ":",
                }));
                i += 1;
            }
            '=' => {
                tokens.push(Token::Symbol("="));
                i += 1;
            }
            '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let symbol = match (c, next) {
                    ('<', Some('>')) => "<>",
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    _ => ">",
                };
                i += symbol.len();
                tokens.push(Token::Symbol(symbol));
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(QueryError::UnterminatedString),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '$' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Param(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = if let Ok(n) = literal.parse::<i64>() {
                    Value::from(n)
                } else {
                    literal
                        .parse::<f64>()
                        .ok()
                        .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                        .ok_or_else(|| QueryError::Unexpected(literal.clone()))?
                };
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(QueryError::Unexpected(other.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser<'p> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'p Params,
    variable: String,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Token, QueryError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(QueryError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), QueryError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), QueryError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> QueryError {
        match self.peek() {
            Some(token) => QueryError::Unexpected(token.describe()),
            None => QueryError::UnexpectedEnd,
        }
    }

    fn word(&mut self) -> Result<String, QueryError> {
        match self.advance()? {
            Token::Word(w) => Ok(w),
            other => Err(QueryError::Unexpected(other.describe())),
        }
    }

    fn variable(&mut self) -> Result<(), QueryError> {
        let name = self.word()?;
        if name == self.variable {
            Ok(())
        } else {
            Err(QueryError::UnknownVariable(name))
        }
    }

    /// `n.<field>`
    fn property(&mut self) -> Result<String, QueryError> {
        self.variable()?;
        self.expect_symbol(".")?;
        self.word()
    }

    fn query(&mut self) -> Result<Query, QueryError> {
        self.expect_keyword("MATCH")?;
        self.expect_symbol("(")?;
        self.variable = self.word()?;
        if self.eat_symbol(":") {
            // Labels are accepted and ignored; records carry no labels
            self.word()?;
        }
        self.expect_symbol(")")?;

        let filter = if self.eat_keyword("WHERE") {
            self.expr()?
        } else {
            Criterion::All
        };

        self.expect_keyword("RETURN")?;
        self.variable()?;

        let mut order_by = None;
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let field = self.property()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            order_by = Some((field, descending));
        }

        let mut limit = None;
        if self.eat_keyword("LIMIT") {
            match self.value()? {
                Value::Number(n) => limit = n.as_u64().map(|n| n as usize),
                other => return Err(QueryError::Unexpected(other.to_string())),
            }
        }

        if self.peek().is_some() {
            return Err(self.unexpected());
        }
        Ok(Query {
            filter,
            order_by,
            limit,
        })
    }

    fn expr(&mut self) -> Result<Criterion, QueryError> {
        let mut terms = vec![self.term()?];
        while self.eat_keyword("OR") {
            terms.push(self.term()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Criterion::Or(terms)
        })
    }

    fn term(&mut self) -> Result<Criterion, QueryError> {
        let mut factors = vec![self.factor()?];
        while self.eat_keyword("AND") {
            factors.push(self.factor()?);
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            Criterion::And(factors)
        })
    }

    fn factor(&mut self) -> Result<Criterion, QueryError> {
        if self.eat_keyword("NOT") {
            return Ok(Criterion::Not(Box::new(self.factor()?)));
        }
        if self.eat_symbol("(") {
            let inner = self.expr()?;
            self.expect_symbol(")")?;
            return Ok(inner);
        }
        if self.peek_keyword("id") {
            self.pos += 1;
            self.expect_symbol("(")?;
            self.variable()?;
            self.expect_symbol(")")?;
            self.expect_keyword("IN")?;
            return Ok(Criterion::IdIn(id_list(self.value()?)?));
        }

        let field = self.property()?;
        let op = match self.advance()? {
            Token::Symbol("=") => CompareOp::Eq,
            Token::Symbol("<>") => CompareOp::Ne,
            Token::Symbol("<") => CompareOp::Lt,
            Token::Symbol(">") => CompareOp::Gt,
            Token::Symbol("<=") => CompareOp::Le,
            Token::Symbol(">=") => CompareOp::Ge,
            Token::Word(w) if w.eq_ignore_ascii_case("CONTAINS") => CompareOp::Contains,
            Token::Word(w) if w.eq_ignore_ascii_case("STARTS") => {
                self.expect_keyword("WITH")?;
                CompareOp::StartsWith
            }
            other => return Err(QueryError::Unexpected(other.describe())),
        };
        let value = self.value()?;
        Ok(Criterion::Compare { field, op, value })
    }

    fn value(&mut self) -> Result<Value, QueryError> {
        match self.advance()? {
            Token::Number(n) => Ok(n),
            Token::Str(s) => Ok(Value::String(s)),
            Token::Param(name) => self
                .params
                .get(&name)
                .cloned()
                .ok_or(QueryError::MissingParam(name)),
            Token::Word(w) if w.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Token::Word(w) if w.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Token::Word(w) if w.eq_ignore_ascii_case("null") => Ok(Value::Null),
            Token::Symbol("[") => {
                let mut items = Vec::new();
                if !self.eat_symbol("]") {
                    loop {
                        items.push(self.value()?);
                        if self.eat_symbol("]") {
                            break;
                        }
                        self.expect_symbol(",")?;
                    }
                }
                Ok(Value::Array(items))
            }
            other => Err(QueryError::Unexpected(other.describe())),
        }
    }
}

fn id_list(value: Value) -> Result<Vec<RecordId>, QueryError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => n.as_u64().map(RecordId).ok_or(QueryError::NotAnIdList),
                Value::String(s) => s.parse().map_err(|_| QueryError::NotAnIdList),
                _ => Err(QueryError::NotAnIdList),
            })
            .collect(),
        _ => Err(QueryError::NotAnIdList),
    }
}

/// Parse a query, substituting `$name` parameters
pub fn parse(text: &str, params: &Params) -> Result<Query, QueryError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
        params,
        variable: String::new(),
    };
    parser.query()
}
