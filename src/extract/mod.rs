//! Field extraction: turns message text into named fields.
//!
//! Each field is a rule: an ordered list of anchors (the primary pattern
//! first, then fallbacks) and a default for when none of them hit. The
//! first anchor that matches wins. Absence is an explicit
//! `FieldValue::Unknown`, never an empty string unless the rule says so.

pub mod dates;

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::error::ExtractError;
use crate::mailbox::{BodyView, Headers};

/// Where an anchor looks for its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The `Subject` header.
    Subject,
    /// The transport-encoded message source.
    Raw,
    /// A decoded MIME part, addressed by child indexes from the root.
    Part(Vec<usize>),
}

/// How much body a set of rules needs fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BodyNeed {
    None,
    Decoded,
    Raw,
}

impl BodyNeed {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Decoded => "decoded",
            Self::Raw => "raw",
        }
    }
}

impl Source {
    fn need(&self) -> BodyNeed {
        match self {
            Self::Subject => BodyNeed::None,
            Self::Part(_) => BodyNeed::Decoded,
            Self::Raw => BodyNeed::Raw,
        }
    }
}

/// One pattern tried against one source.
///
/// The captured value is the `value` named group if present, otherwise
/// group 1, otherwise the whole match.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub source: Source,
    pub pattern: Regex,
}

/// What a field becomes when no anchor matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDefault {
    /// Extraction fails for the whole message.
    Required,
    /// The field is recorded as unknown.
    Unknown,
    /// The field is the given literal (often empty).
    Literal(String),
}

/// A named field and how to find it.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub anchors: Vec<Anchor>,
    pub default: FieldDefault,
}

impl FieldRule {
    pub fn body_need(&self) -> BodyNeed {
        self.anchors
            .iter()
            .map(|a| a.source.need())
            .max()
            .unwrap_or(BodyNeed::None)
    }
}

/// Result of extracting one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Matched by the anchor at `anchor` (0 = primary).
    Found { text: String, anchor: usize },
    /// No anchor matched; the rule's literal default applies.
    Defaulted(String),
    /// No anchor matched and the rule has no default.
    Unknown,
}

impl FieldValue {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Found { text, .. } | Self::Defaulted(text) => Some(text),
            Self::Unknown => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Found { anchor, .. } if *anchor > 0)
    }
}

/// Extracted fields by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Text of a field; `None` when unknown or never extracted.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(FieldValue::text)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Strip carriage returns so CRLF sources don't leak into task bodies.
pub fn normalize_newlines(text: &str) -> String {
    text.replace('\r', "")
}

fn source_text<'a>(source: &Source, headers: &'a Headers, body: &'a BodyView) -> Option<&'a str> {
    match source {
        Source::Subject => headers.subject(),
        Source::Raw => body.raw(),
        Source::Part(path) => body.part_text(path),
    }
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    let caps = pattern.captures(haystack)?;
    let m = caps
        .name("value")
        .or_else(|| caps.get(1))
        .or_else(|| caps.get(0))?;
    Some(m.as_str().to_string())
}

/// Run one rule.
pub fn extract_field(
    template: &str,
    rule: &FieldRule,
    headers: &Headers,
    body: &BodyView,
) -> Result<FieldValue, ExtractError> {
    for (idx, anchor) in rule.anchors.iter().enumerate() {
        let Some(haystack) = source_text(&anchor.source, headers, body) else {
            continue;
        };
        if let Some(text) = capture(&anchor.pattern, haystack) {
            if idx > 0 {
                debug!(
                    template,
                    field = %rule.name,
                    anchor = idx,
                    "Primary anchor missed, fallback matched"
                );
            }
            return Ok(FieldValue::Found {
                text: normalize_newlines(&text),
                anchor: idx,
            });
        }
    }

    match &rule.default {
        FieldDefault::Required => Err(ExtractError::RequiredFieldMissing {
            template: template.to_string(),
            field: rule.name.clone(),
        }),
        FieldDefault::Unknown => {
            debug!(template, field = %rule.name, "No anchor matched, field unknown");
            Ok(FieldValue::Unknown)
        }
        FieldDefault::Literal(value) => {
            debug!(template, field = %rule.name, "No anchor matched, using default");
            Ok(FieldValue::Defaulted(value.clone()))
        }
    }
}

/// Run every rule of a template, in order.
pub fn extract_fields(
    template: &str,
    rules: &[FieldRule],
    headers: &Headers,
    body: &BodyView,
) -> Result<Fields, ExtractError> {
    let mut fields = Fields::default();
    for rule in rules {
        let value = extract_field(template, rule, headers, body)?;
        fields.insert(rule.name.clone(), value);
    }
    Ok(fields)
}
