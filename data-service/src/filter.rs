//! Filter expression parser.
//!
//! Turns the `filter` query parameter into a [`Predicate`]. Column names are
//! checked against the table schema and literals become bound values, so the
//! text never reaches the SQL statement itself.
//!
//! ```text
//! expr     := and_expr ( OR and_expr )*
//! and_expr := unary ( AND unary )*
//! unary    := NOT unary | primary
//! primary  := '(' expr ')' | column tail
//! tail     := cmp_op literal | IS [NOT] NULL
//!           | [NOT] IN '(' literal ( ',' literal )* ')'
//!           | [NOT] LIKE string | [NOT] BETWEEN literal AND literal
//! ```

use common::errors::{AppError, AppResult};

use crate::query::{CompareOp, Predicate, SqlValue, TableSchema};

/// Deepest allowed nesting of parentheses and NOTs.
const MAX_DEPTH: usize = 32;

/// Most conditions a single filter may combine.
const MAX_CONDITIONS: usize = 256;

/// Parses `input` into a predicate over the columns of `schema`.
pub fn parse_filter(input: &str, schema: &TableSchema) -> AppResult<Predicate> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(invalid("filter is empty"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        conditions: 0,
        schema,
    };
    let predicate = parser.expr(0)?;
    match parser.peek() {
        None => Ok(predicate),
        Some(token) => Err(invalid(format!("unexpected {}", token.describe()))),
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidFilter(message.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare word: a column name or a keyword.
    Word(String),
    /// Backtick-quoted column name; never a keyword.
    Quoted(String),
    Str(String),
    Number(SqlValue),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("`{w}`"),
            Token::Quoted(q) => format!("`{q}`"),
            Token::Str(_) => "string literal".to_string(),
            Token::Number(_) => "number".to_string(),
            Token::Op(op) => format!("operator `{}`", op.as_sql()),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

fn tokenize(input: &str) -> AppResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let (text, next) = read_quoted(&chars, i, c)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            '`' => {
                let (text, next) = read_quoted(&chars, i, '`')?;
                tokens.push(Token::Quoted(text));
                i = next;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
                || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(invalid(format!("unexpected character {other:?}"))),
        }
    }
    Ok(tokens)
}

/// Reads a literal delimited by `quote`, starting at `start`.
///
/// A doubled delimiter stands for itself; inside string literals a backslash
/// escapes the next character. Returns the text and the index after the
/// closing delimiter.
fn read_quoted(chars: &[char], start: usize, quote: char) -> AppResult<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return Ok((text, i + 1));
        }
        if c == '\\' && quote != '`' {
            if let Some(&escaped) = chars.get(i + 1) {
                text.push(escaped);
                i += 2;
                continue;
            }
        }
        text.push(c);
        i += 1;
    }
    Err(invalid(format!("unterminated {quote} literal")))
}

fn parse_number(text: &str) -> AppResult<SqlValue> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(SqlValue::Int(n));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(SqlValue::Float)
        .ok_or_else(|| invalid(format!("invalid number `{text}`")))
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    conditions: usize,
    schema: &'a TableSchema,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> AppResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{keyword}`")))
        }
    }

    fn expect(&mut self, expected: Token) -> AppResult<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> AppError {
        match self.peek() {
            Some(token) => invalid(format!("expected {expected}, found {}", token.describe())),
            None => invalid(format!("expected {expected}, found end of filter")),
        }
    }

    fn expr(&mut self, depth: usize) -> AppResult<Predicate> {
        let mut left = self.and_expr(depth)?;
        while self.eat_keyword("OR") {
            let right = self.and_expr(depth)?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self, depth: usize) -> AppResult<Predicate> {
        let mut left = self.unary(depth)?;
        while self.eat_keyword("AND") {
            let right = self.unary(depth)?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self, depth: usize) -> AppResult<Predicate> {
        if depth >= MAX_DEPTH {
            return Err(invalid("filter is nested too deeply"));
        }
        if self.eat_keyword("NOT") {
            let inner = self.unary(depth + 1)?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.expr(depth + 1)?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.condition()
    }

    fn column(&mut self) -> AppResult<String> {
        let name = match self.peek() {
            Some(Token::Word(w)) if !is_reserved(w) => w.clone(),
            Some(Token::Quoted(q)) => q.clone(),
            _ => return Err(self.unexpected("column name")),
        };
        self.pos += 1;
        Ok(self.schema.require_column(&name)?.to_string())
    }

    fn condition(&mut self) -> AppResult<Predicate> {
        self.conditions += 1;
        if self.conditions > MAX_CONDITIONS {
            return Err(invalid(format!(
                "filter combines more than {MAX_CONDITIONS} conditions"
            )));
        }
        let column = self.column()?;

        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let value = self.literal()?;
            return Ok(Predicate::Compare { column, op, value });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Predicate::IsNull { column, negated });
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut values = vec![self.literal()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.literal()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Predicate::In {
                column,
                values,
                negated,
            });
        }
        if self.eat_keyword("LIKE") {
            return match self.next() {
                Some(Token::Str(pattern)) => Ok(Predicate::Like {
                    column,
                    pattern,
                    negated,
                }),
                _ => Err(invalid("LIKE expects a string pattern")),
            };
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.literal()?;
            self.expect_keyword("AND")?;
            let high = self.literal()?;
            return Ok(Predicate::Between {
                column,
                low,
                high,
                negated,
            });
        }

        Err(self.unexpected("comparison"))
    }

    fn literal(&mut self) -> AppResult<SqlValue> {
        let value = match self.peek() {
            Some(Token::Str(s)) => SqlValue::Text(s.clone()),
            Some(Token::Number(n)) => n.clone(),
            Some(t) if t.is_keyword("TRUE") => SqlValue::Bool(true),
            Some(t) if t.is_keyword("FALSE") => SqlValue::Bool(false),
            Some(t) if t.is_keyword("NULL") => {
                return Err(invalid("compare with NULL using IS NULL or IS NOT NULL"))
            }
            _ => return Err(self.unexpected("literal value")),
        };
        self.pos += 1;
        Ok(value)
    }
}

fn is_reserved(word: &str) -> bool {
    const RESERVED: [&str; 10] = [
        "AND", "OR", "NOT", "IS", "NULL", "IN", "LIKE", "BETWEEN", "TRUE", "FALSE",
    ];
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}
