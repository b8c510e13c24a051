//! Parser for data-quality rulesets of the form
//!
//! ```text
//! Rules = [
//!     ColumnCount > 0,
//!     RowCount >= 1,
//!     IsComplete "CASHTAG",
//!     IsUnique "CASHTAG"
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, expected: f64) -> bool {
        match self {
            Comparison::Gt => observed > expected,
            Comparison::Ge => observed >= expected,
            Comparison::Lt => observed < expected,
            Comparison::Le => observed <= expected,
            Comparison::Eq => observed == expected,
            Comparison::Ne => observed != expected,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    RowCount(Comparison, f64),
    ColumnCount(Comparison, f64),
    IsComplete(String),
    IsUnique(String),
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::RowCount(op, n) => write!(f, "RowCount {} {}", op.symbol(), n),
            Rule::ColumnCount(op, n) => write!(f, "ColumnCount {} {}", op.symbol(), n),
            Rule::IsComplete(col) => write!(f, "IsComplete \"{}\"", col),
            Rule::IsUnique(col) => write!(f, "IsUnique \"{}\"", col),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Op(Comparison),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '[' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ']' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '"' => {
                chars.next();
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => quoted.push(ch),
                        None => return Err(EtlError::Ruleset("unterminated quoted column name".to_string())),
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            '>' | '<' | '=' | '!' => {
                chars.next();
                let followed_by_eq = chars.peek() == Some(&'=');
                if followed_by_eq {
                    chars.next();
                }
                let op = match (c, followed_by_eq) {
                    ('>', false) => Comparison::Gt,
                    ('>', true) => Comparison::Ge,
                    ('<', false) => Comparison::Lt,
                    ('<', true) => Comparison::Le,
                    ('=', _) => Comparison::Eq,
                    ('!', true) => Comparison::Ne,
                    _ => return Err(EtlError::Ruleset("'!' must be followed by '='".to_string())),
                };
                tokens.push(Token::Op(op));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '.' || ch == '_' || ch == '-' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word.is_empty() {
                    return Err(EtlError::Ruleset(format!("unexpected character '{}'", c)));
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            other => Err(EtlError::Ruleset(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn threshold(&mut self, rule: &str) -> Result<(Comparison, f64)> {
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => return Err(EtlError::Ruleset(format!("{} needs a comparison, found {:?}", rule, other))),
        };
        let value = match self.next() {
            Some(Token::Word(w)) => w
                .parse::<f64>()
                .map_err(|_| EtlError::Ruleset(format!("{} threshold '{}' is not a number", rule, w)))?,
            other => return Err(EtlError::Ruleset(format!("{} needs a threshold, found {:?}", rule, other))),
        };
        Ok((op, value))
    }

    fn column(&mut self, rule: &str) -> Result<String> {
        match self.next() {
            Some(Token::Quoted(col)) => Ok(col),
            other => Err(EtlError::Ruleset(format!("{} needs a quoted column, found {:?}", rule, other))),
        }
    }

    fn rule(&mut self) -> Result<Rule> {
        let name = match self.next() {
            Some(Token::Word(w)) => w,
            other => return Err(EtlError::Ruleset(format!("expected a rule, found {:?}", other))),
        };
        match name.as_str() {
            "RowCount" => {
                let (op, n) = self.threshold(&name)?;
                Ok(Rule::RowCount(op, n))
            }
            "ColumnCount" => {
                let (op, n) = self.threshold(&name)?;
                Ok(Rule::ColumnCount(op, n))
            }
            "IsComplete" => Ok(Rule::IsComplete(self.column(&name)?)),
            "IsUnique" => Ok(Rule::IsUnique(self.column(&name)?)),
            other => Err(EtlError::Ruleset(format!("unsupported rule '{}'", other))),
        }
    }
}

impl Ruleset {
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = Parser {
            tokens: tokenize(text)?,
            pos: 0,
        };

        parser.expect(Token::Word("Rules".to_string()), "'Rules'")?;
        parser.expect(Token::Op(Comparison::Eq), "'='")?;
        parser.expect(Token::Open, "'['")?;

        let mut rules = Vec::new();
        loop {
            rules.push(parser.rule()?);
            match parser.next() {
                Some(Token::Comma) => continue,
                Some(Token::Close) => break,
                other => return Err(EtlError::Ruleset(format!("expected ',' or ']', found {:?}", other))),
            }
        }

        if let Some(trailing) = parser.next() {
            return Err(EtlError::Ruleset(format!("unexpected {:?} after ']'", trailing)));
        }

        Ok(Self { rules })
    }
}

impl FromStr for Ruleset {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rules = [")?;
        for (i, rule) in self.rules.iter().enumerate() {
            let sep = if i + 1 < self.rules.len() { "," } else { "" };
            writeln!(f, "    {}{}", rule, sep)?;
        }
        write!(f, "]")
    }
}
