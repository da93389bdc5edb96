//! Unevaluated Python expressions and signature pieces.
//!
//! The model never evaluates expressions; it stores them as the source text
//! the front end saw (`"int | None"`, `"Base[T]"`, `"..."`). Downstream
//! consumers decide how much to interpret.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An unevaluated expression, stored as source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expr(String);

impl Expr {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the `...` placeholder stubs use for "value elided".
    pub fn is_ellipsis(&self) -> bool {
        self.0.trim() == "..."
    }

    /// True when the expression is a plain (possibly dotted) name, with no
    /// subscripts, calls, or operators.
    pub fn is_dotted_name(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .split('.')
                .all(|seg| {
                    !seg.is_empty()
                        && seg
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_')
                        && !seg.starts_with(|c: char| c.is_ascii_digit())
                })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Expr {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// A declared type parameter (`class C[T: bound = default]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Expr>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bound: None,
            default: None,
        }
    }
}

/// How a parameter binds at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// A function parameter. Order within the owning function is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Expr>,
}

impl Param {
    /// A plain positional-or-keyword parameter with no annotation or default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            annotation: None,
            default: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<Expr>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Expr>) -> Self {
        self.default = Some(default.into());
        self
    }
}
