//! Mailbox data types: headers, messages, threads and decoded bodies.

use std::collections::BTreeMap;

use mail_parser::{MessageParser, MimeHeaders, PartType};
use serde::{Deserialize, Serialize};

// ── Headers ─────────────────────────────────────────────────────────

/// Message headers keyed by their exact name (`Subject`, `From`, `To`).
///
/// Lookups never fail: an absent header is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header. A repeated name keeps the last value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("Subject")
    }

    pub fn from(&self) -> Option<&str> {
        self.get("From")
    }

    pub fn to(&self) -> Option<&str> {
        self.get("To")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

// ── Messages and threads ────────────────────────────────────────────

/// A message id as returned by a list query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// A thread id as returned by a list query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    pub id: String,
}

/// Summary of one message inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub id: String,
    /// Milliseconds since the epoch, as reported by the mailbox.
    pub internal_date: i64,
}

/// Pick the most recent message of a thread.
pub fn newest_entry(entries: &[ThreadEntry]) -> Option<&ThreadEntry> {
    entries.iter().max_by_key(|e| e.internal_date)
}

/// How much of a message to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Headers only.
    Metadata,
    /// Headers plus the decoded MIME tree.
    Full,
    /// Headers plus the transport-encoded source.
    Raw,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Full => "full",
            Self::Raw => "raw",
        }
    }
}

/// A label known to the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// A fetched message. Never mutated by the classifier.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub id: String,
    pub headers: Headers,
    pub body: BodyView,
}

// ── Bodies ──────────────────────────────────────────────────────────

/// One node of a decoded MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyPart {
    pub mime_type: String,
    /// Decoded text of a leaf part; empty for containers.
    pub text: String,
    pub parts: Vec<BodyPart>,
}

impl BodyPart {
    pub fn leaf(mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            text: text.into(),
            parts: Vec::new(),
        }
    }

    pub fn container(mime_type: impl Into<String>, parts: Vec<BodyPart>) -> Self {
        Self {
            mime_type: mime_type.into(),
            text: String::new(),
            parts,
        }
    }
}

/// What a handler gets to read: the raw source and/or the decoded tree.
///
/// `root` mirrors the mailbox payload: its own text is the single-part body,
/// its children are the MIME parts.
#[derive(Debug, Clone, Default)]
pub struct BodyView {
    pub raw: Option<String>,
    pub root: Option<BodyPart>,
}

impl BodyView {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            root: None,
        }
    }

    pub fn from_root(root: BodyPart) -> Self {
        Self {
            raw: None,
            root: Some(root),
        }
    }

    /// Parse an RFC822 source into both representations.
    pub fn from_rfc822(bytes: &[u8]) -> Option<Self> {
        let parsed = MessageParser::default().parse(bytes)?;
        let root = convert_part(&parsed, 0);
        Some(Self {
            raw: Some(String::from_utf8_lossy(bytes).into_owned()),
            root,
        })
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Text of the part at `path` (child indexes from the root).
    /// An empty path is the root's own body.
    pub fn part_text(&self, path: &[usize]) -> Option<&str> {
        let mut node = self.root.as_ref()?;
        for &idx in path {
            node = node.parts.get(idx)?;
        }
        if node.text.is_empty() {
            None
        } else {
            Some(node.text.as_str())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_none() && self.root.is_none()
    }
}

fn convert_part(message: &mail_parser::Message<'_>, index: u32) -> Option<BodyPart> {
    let part = message.part(index)?;
    let mime_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string());

    let node = match &part.body {
        PartType::Text(text) | PartType::Html(text) => BodyPart::leaf(mime_type, text.as_ref()),
        PartType::Multipart(children) => BodyPart::container(
            mime_type,
            children
                .iter()
                .filter_map(|&child| convert_part(message, child))
                .collect(),
        ),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            BodyPart::leaf(mime_type, String::from_utf8_lossy(bytes))
        }
        PartType::Message(_) => BodyPart::leaf(mime_type, String::new()),
    };
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_none() {
        let headers = Headers::new().with("From", "a@example.com");
        assert_eq!(headers.subject(), None);
        assert_eq!(headers.from(), Some("a@example.com"));
    }

    #[test]
    fn headers_from_pairs() {
        let headers: Headers = [("Subject", "Hi"), ("To", "b@example.com")]
            .into_iter()
            .collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.to(), Some("b@example.com"));
    }

    #[test]
    fn newest_entry_uses_internal_date() {
        let entry = |id: &str, internal_date| ThreadEntry {
            id: id.into(),
            internal_date,
        };
        let entries = vec![entry("a", 300), entry("b", 900), entry("c", 600)];
        assert_eq!(newest_entry(&entries).map(|e| e.id.as_str()), Some("b"));
        assert!(newest_entry(&[]).is_none());
    }

    #[test]
    fn part_text_walks_the_tree() {
        let root = BodyPart::container(
            "multipart/alternative",
            vec![
                BodyPart::container(
                    "multipart/related",
                    vec![BodyPart::leaf("text/html", "<span>deep</span>")],
                ),
                BodyPart::leaf("text/plain", "plain"),
            ],
        );
        let view = BodyView::from_root(root);
        assert_eq!(view.part_text(&[0, 0]), Some("<span>deep</span>"));
        assert_eq!(view.part_text(&[1]), Some("plain"));
        assert_eq!(view.part_text(&[]), None);
        assert_eq!(view.part_text(&[5]), None);
    }

    #[test]
    fn rfc822_source_decodes_parts() {
        let source = concat!(
            "From: Shop <orders@shop.example>\r\n",
            "Subject: Receipt\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Order Total: $12.00\r\n",
            "--XX\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<b>Order Total: $12.00</b>\r\n",
            "--XX--\r\n",
        );
        let view = BodyView::from_rfc822(source.as_bytes()).unwrap();
        assert!(view.raw().unwrap().contains("Subject: Receipt"));
        let root = view.root.as_ref().unwrap();
        assert_eq!(root.mime_type, "multipart/alternative");
        assert_eq!(root.parts.len(), 2);
        assert!(view.part_text(&[0]).unwrap().contains("Order Total: $12.00"));
        assert_eq!(root.parts[1].mime_type, "text/html");
    }
}
