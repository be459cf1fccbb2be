//! Header predicates that decide whether a template applies to a message.

use regex::Regex;

use crate::mailbox::Headers;

/// A test over a single header value.
#[derive(Debug, Clone)]
pub enum Test {
    Equals(String),
    Contains(String),
    /// Case-sensitive regex search.
    Matches(Regex),
}

impl Test {
    pub fn check(&self, value: &str) -> bool {
        match self {
            Self::Equals(expected) => value == expected,
            Self::Contains(needle) => value.contains(needle.as_str()),
            Self::Matches(re) => re.is_match(value),
        }
    }
}

/// A test bound to a header name.
#[derive(Debug, Clone)]
pub struct Condition {
    pub header: String,
    pub test: Test,
}

impl Condition {
    /// An absent header never matches.
    pub fn check(&self, headers: &Headers) -> bool {
        headers
            .get(&self.header)
            .is_some_and(|value| self.test.check(value))
    }
}

/// Conjunction of conditions. A matcher with no conditions matches nothing.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    conditions: Vec<Condition>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, header: &str, test: Test) -> Self {
        self.conditions.push(Condition {
            header: header.to_string(),
            test,
        });
        self
    }

    pub fn matches(&self, headers: &Headers) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.check(headers))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(subject: Option<&str>, from: Option<&str>) -> Headers {
        let mut h = Headers::new();
        if let Some(s) = subject {
            h.insert("Subject", s);
        }
        if let Some(f) = from {
            h.insert("From", f);
        }
        h
    }

    #[test]
    fn exact_and_substring() {
        let m = Matcher::new()
            .with("Subject", Test::Equals("Transfer Money Notice".into()))
            .with("From", Test::Contains("capitalone.com".into()));
        assert!(m.matches(&headers(
            Some("Transfer Money Notice"),
            Some("Capital One <alerts@notification.capitalone.com>")
        )));
        assert!(!m.matches(&headers(
            Some("Transfer Money Notice!"),
            Some("alerts@capitalone.com")
        )));
        assert!(!m.matches(&headers(Some("Transfer Money Notice"), Some("x@example.com"))));
    }

    #[test]
    fn regex_search_is_case_sensitive() {
        let m = Matcher::new().with(
            "Subject",
            Test::Matches(Regex::new(r"Important Notice: Your .* Statement").unwrap()),
        );
        assert!(m.matches(&headers(
            Some("Important Notice: Your Gold Card Statement"),
            None
        )));
        assert!(!m.matches(&headers(
            Some("important notice: your gold card statement"),
            None
        )));
    }

    #[test]
    fn absent_header_is_false() {
        let m = Matcher::new().with("Subject", Test::Contains("statement".into()));
        assert!(!m.matches(&headers(None, Some("bank@example.com"))));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        assert!(!Matcher::new().matches(&headers(Some("x"), Some("y"))));
    }
}
