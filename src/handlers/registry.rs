//! Handler registry: an ordered set of handlers built by explicit
//! registration. Lookup walks handlers in registration order and the first
//! match wins.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::handlers::Handler;
use crate::mailbox::Headers;

/// Registry of message handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in sender template.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for template in super::builtin::templates()? {
            registry.register(Arc::new(template))?;
        }
        Ok(registry)
    }

    /// Register a handler after all existing ones. Names must be unique.
    pub fn register(&mut self, handler: Arc<dyn Handler>) -> Result<(), RegistryError> {
        let name = handler.name().to_string();
        if self.handlers.iter().any(|h| h.name() == name) {
            warn!(handler = %name, "Rejected duplicate handler registration");
            return Err(RegistryError::Duplicate(name));
        }
        debug!(handler = %name, position = self.handlers.len(), "Registered handler");
        self.handlers.push(handler);
        Ok(())
    }

    /// First handler, in registration order, whose matcher accepts the headers.
    pub fn find(&self, headers: &Headers) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|handler| {
            let hit = handler.matches(headers);
            debug!(handler = %handler.name(), hit, "matching");
            hit
        })
    }

    /// Every handler whose matcher accepts the headers. More than one means
    /// overlapping templates.
    pub fn all_matching(&self, headers: &Headers) -> Vec<&str> {
        self.handlers
            .iter()
            .filter(|h| h.matches(headers))
            .map(|h| h.name())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{TaskSpec, Template};

    fn template(name: &str, subject: &str) -> Arc<dyn Handler> {
        Arc::new(
            Template::builder(name)
                .subject_contains(subject)
                .task(TaskSpec::new(name, "@home"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn first_registered_match_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(template("broad", "statement")).unwrap();
        registry.register(template("narrow", "card statement")).unwrap();

        let headers = Headers::new().with("Subject", "Your card statement");
        assert_eq!(registry.find(&headers).map(|h| h.name()), Some("broad"));
        assert_eq!(registry.all_matching(&headers), vec!["broad", "narrow"]);
    }

    #[test]
    fn no_match_is_none() {
        let mut registry = HandlerRegistry::new();
        registry.register(template("a", "invoice")).unwrap();
        assert!(registry.find(&Headers::new().with("Subject", "hello")).is_none());
        assert!(registry.find(&Headers::new()).is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register(template("a", "x")).unwrap();
        let err = registry.register(template("a", "y")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn order_is_registration_order() {
        let mut registry = HandlerRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(template(name, name)).unwrap();
        }
        assert_eq!(registry.names(), vec!["c", "a", "b"]);
        assert!(registry.get("a").is_some());
    }
}
