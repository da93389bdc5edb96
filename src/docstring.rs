//! Docstring cleaning, section model, and style inference.
//!
//! The crate does not implement any section grammar itself. Per-style
//! parsers (google, numpy, sphinx) are external collaborators registered in
//! a [`StyleRegistry`]; this module only decides *which* grammar applies:
//!
//! - `heuristics`: match a fixed battery of per-style section regexes
//!   against the raw text and take the first style in the configured order
//!   with any hit.
//! - `max_sections`: parse with every registered style and keep the one
//!   producing the most sections (ties break by order position; the parsed
//!   sections of the winner are returned to avoid a second parse).
//!
//! # Empty docstrings
//!
//! Observed behavior differs across versions of the original system on
//! whether parsing an empty docstring with no style yields an empty section
//! list or a single empty text section. That choice is explicit here:
//! [`ParseOptions::empty_docstring_yields_section`], default `false`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::span::Span;

// ============================================================================
// Docstring Text
// ============================================================================

/// A raw docstring as the front end saw it, with its source span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docstring {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Docstring {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// Strip leading/trailing blank lines and the common indentation of every
/// line after the first.
pub fn clean(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim_start().to_string());
        } else {
            let rest = line.get(indent..).unwrap_or_else(|| line.trim_start());
            cleaned.push(rest.trim_end().to_string());
        }
    }

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

// ============================================================================
// Sections
// ============================================================================

/// The closed set of section kinds per-style parsers may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    Text,
    Parameters,
    OtherParameters,
    Returns,
    Yields,
    Raises,
    Warns,
    Attributes,
    Examples,
    SeeAlso,
    Notes,
    Deprecated,
}

/// One parsed docstring section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Section {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: SectionKind::Text,
            title: None,
            text: text.into(),
        }
    }

    pub fn new(kind: SectionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            title: None,
            text: text.into(),
        }
    }
}

// ============================================================================
// Styles and Parsers
// ============================================================================

/// The closed set of docstring authoring styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Google,
    Numpy,
    Sphinx,
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Style::Google => "google",
            Style::Numpy => "numpy",
            Style::Sphinx => "sphinx",
        };
        f.write_str(name)
    }
}

/// Options handed through to parsing and the no-style fallback.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// With no style given, whether an empty docstring yields one empty text
    /// section (`true`) or no sections at all (`false`).
    pub empty_docstring_yields_section: bool,
}

/// An external per-style section parser.
pub trait StyleParser {
    fn parse(&self, docstring: &str, options: &ParseOptions) -> Vec<Section>;
}

/// Registry of per-style parsers the resolver dispatches to.
#[derive(Default)]
pub struct StyleRegistry {
    parsers: HashMap<Style, Box<dyn StyleParser>>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, style: Style, parser: Box<dyn StyleParser>) {
        self.parsers.insert(style, parser);
    }

    pub fn get(&self, style: Style) -> Option<&dyn StyleParser> {
        self.parsers.get(&style).map(|p| p.as_ref())
    }
}

/// Errors from style dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    /// No parser registered for the requested style.
    #[error("no parser registered for docstring style '{style}'")]
    UnknownStyle { style: Style },
}

/// Result type for style dispatch.
pub type StyleResult<T> = Result<T, StyleError>;

/// Parse a docstring with an explicit style, or wrap the cleaned text in a
/// single text section when no style is given.
pub fn parse(
    docstring: &Docstring,
    style: Option<Style>,
    registry: &StyleRegistry,
    options: &ParseOptions,
) -> StyleResult<Vec<Section>> {
    match style {
        Some(style) => {
            let parser = registry
                .get(style)
                .ok_or(StyleError::UnknownStyle { style })?;
            Ok(parser.parse(&docstring.value, options))
        }
        None => {
            let cleaned = clean(&docstring.value);
            if cleaned.is_empty() && !options.empty_docstring_yields_section {
                Ok(Vec::new())
            } else {
                Ok(vec![Section::text(cleaned)])
            }
        }
    }
}

// ============================================================================
// Style Inference
// ============================================================================

/// How to infer the style of an unlabeled docstring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferMethod {
    /// Regex battery per style, first hit in order wins.
    #[default]
    Heuristics,
    /// Parse with every style, keep the one with the most sections.
    MaxSections,
}

/// Options for [`infer_style`].
#[derive(Debug, Clone)]
pub struct InferOptions {
    pub method: InferMethod,
    /// Priority order. The default puts sphinx first: its field-list markers
    /// are the least likely to match plain prose.
    pub style_order: Vec<Style>,
    /// Fallback when heuristics match nothing. Not consulted by
    /// [`InferMethod::MaxSections`].
    pub default: Option<Style>,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            method: InferMethod::Heuristics,
            style_order: vec![Style::Sphinx, Style::Google, Style::Numpy],
            default: None,
        }
    }
}

static SPHINX_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*:(param|parameter|arg|argument|key|keyword|type|var|ivar|cvar|vartype|returns?|rtype|raises?|except|exception|yields?)\b[^:\n]*:",
    )
    .expect("sphinx marker regex")
});

static GOOGLE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(Args|Arguments|Params|Parameters|Keyword Args|Keyword Arguments|Other Args|Other Arguments|Attributes|Returns|Yields|Receives|Raises|Warns|Examples?|Notes?|Warnings?|See Also|Methods|Todo)[ \t]*:[ \t]*$",
    )
    .expect("google marker regex")
});

static NUMPY_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(Parameters|Other Parameters|Attributes|Returns|Yields|Receives|Raises|Warns|Examples|Notes|Warnings|See Also|Methods)[ \t]*\n[ \t]*-{3,}[ \t]*$",
    )
    .expect("numpy marker regex")
});

fn style_matches(style: Style, text: &str) -> bool {
    match style {
        Style::Google => GOOGLE_MARKERS.is_match(text),
        Style::Numpy => NUMPY_MARKERS.is_match(text),
        Style::Sphinx => SPHINX_MARKERS.is_match(text),
    }
}

/// Infer the style of a docstring.
///
/// Returns the inferred style (or the configured default) and, for
/// [`InferMethod::MaxSections`], the sections already produced by the
/// winning parse.
pub fn infer_style(
    docstring: &Docstring,
    registry: &StyleRegistry,
    infer: &InferOptions,
    options: &ParseOptions,
) -> (Option<Style>, Option<Vec<Section>>) {
    match infer.method {
        InferMethod::Heuristics => {
            for &style in &infer.style_order {
                if style_matches(style, &docstring.value) {
                    tracing::trace!(%style, "docstring style matched by heuristics");
                    return (Some(style), None);
                }
            }
            (infer.default, None)
        }
        InferMethod::MaxSections => {
            let mut best: Option<(Style, Vec<Section>)> = None;
            for &style in &infer.style_order {
                let Some(parser) = registry.get(style) else {
                    tracing::debug!(%style, "no parser registered, skipping in inference");
                    continue;
                };
                let sections = parser.parse(&docstring.value, options);
                let beats = match &best {
                    Some((_, current)) => sections.len() > current.len(),
                    None => true,
                };
                if beats {
                    best = Some((style, sections));
                }
            }
            match best {
                Some((style, sections)) => (Some(style), Some(sections)),
                None => (None, None),
            }
        }
    }
}
