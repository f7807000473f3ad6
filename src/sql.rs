use std::fmt::{Display, Formatter, Result as FmtResult, Write};

use crate::schema::{CasePolicy, quote_identifier};

pub mod filters;
pub mod select;

/// A value bound into a statement, either as a `?` placeholder or inlined
/// as escaped SQL text when bind variables are disabled.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Render as inline SQL. Strings double embedded single quotes,
    /// binary renders as a hex literal.
    pub fn to_sql(&self) -> String {
        use Literal::*;
        match self {
            Null => "NULL".to_string(),
            Boolean(true) => "TRUE".to_string(),
            Boolean(false) => "FALSE".to_string(),
            Int(v) => v.to_string(),
            Float(v) => v.to_string(),
            Str(v) => format!("'{}'", v.replace('\'', "''")),
            Bytes(v) => {
                let mut out = String::with_capacity(v.len() * 2 + 3);
                out.push_str("X'");
                for byte in v {
                    let _ = write!(out, "{:02X}", byte);
                }
                out.push('\'');
                out
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.to_sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Raw SQL text.
    Sql(String),
    /// An identifier, already quoted.
    Identifier(String),
    /// A `?` placeholder, consuming the next bound parameter in order.
    Param,
}

/// An immutable SQL statement: ordered fragments plus the parameters bound
/// to its placeholder slots. Built once by [`SqlWriter`], never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    fragments: Vec<Fragment>,
    params: Vec<Literal>,
}

impl SqlStatement {
    /// A statement of raw text with no parameters, for session commands and
    /// caller-supplied pre/post actions.
    pub fn raw(text: impl Into<String>) -> Self {
        SqlStatement {
            fragments: vec![Fragment::Sql(text.into())],
            params: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(sql) => out.push_str(sql),
                Fragment::Identifier(ident) => out.push_str(ident),
                Fragment::Param => out.push('?'),
            }
        }
        out
    }

    pub fn params(&self) -> &[Literal] {
        &self.params
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

impl Display for SqlStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.text())
    }
}

/// Accumulates fragments for a statement under construction. When `bind` is
/// false, literals are inlined instead of producing placeholder slots.
#[derive(Debug)]
pub(crate) struct SqlWriter {
    bind: bool,
    fragments: Vec<Fragment>,
    params: Vec<Literal>,
}

impl SqlWriter {
    pub(crate) fn new(bind: bool) -> Self {
        SqlWriter {
            bind,
            fragments: Vec::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn sql(&mut self, text: impl Into<String>) -> &mut Self {
        self.fragments.push(Fragment::Sql(text.into()));
        self
    }

    pub(crate) fn identifier(&mut self, name: &str, policy: CasePolicy) -> &mut Self {
        self.fragments
            .push(Fragment::Identifier(quote_identifier(name, policy)));
        self
    }

    pub(crate) fn literal(&mut self, literal: Literal) -> &mut Self {
        if self.bind {
            self.fragments.push(Fragment::Param);
            self.params.push(literal);
        } else {
            self.fragments.push(Fragment::Sql(literal.to_sql()));
        }
        self
    }

    /// Splice another writer's output in place, preserving parameter order.
    pub(crate) fn merge(&mut self, other: SqlWriter) -> &mut Self {
        self.fragments.extend(other.fragments);
        self.params.extend(other.params);
        self
    }

    /// Splice a finished statement, carrying its bound parameters along.
    pub(crate) fn statement(&mut self, statement: &SqlStatement) -> &mut Self {
        self.fragments.extend(statement.fragments.iter().cloned());
        self.params.extend(statement.params.iter().cloned());
        self
    }

    pub(crate) fn finish(self) -> SqlStatement {
        SqlStatement {
            fragments: self.fragments,
            params: self.params,
        }
    }
}
