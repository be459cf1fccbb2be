//! Label name to id lookup, fetched once per scan pass.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::MailboxError;
use crate::mailbox::Mailbox;

/// Caches the mailbox's label list. `clear` at the start of each pass.
#[derive(Debug, Default)]
pub struct LabelCache {
    ids: Mutex<Option<HashMap<String, String>>>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a label name to its id, listing labels on first use.
    pub async fn resolve(&self, mailbox: &dyn Mailbox, name: &str) -> Result<String, MailboxError> {
        let mut guard = self.ids.lock().await;
        if guard.is_none() {
            let labels = mailbox.list_labels().await?;
            debug!(count = labels.len(), "Fetched label list");
            *guard = Some(labels.into_iter().map(|l| (l.name, l.id)).collect());
        }
        guard
            .as_ref()
            .and_then(|ids| ids.get(name).cloned())
            .ok_or_else(|| MailboxError::LabelNotFound(name.to_string()))
    }

    pub async fn clear(&self) {
        *self.ids.lock().await = None;
    }
}
