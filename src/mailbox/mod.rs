//! Mailbox and calendar collaborators.
//!
//! The classifier only ever talks to these traits. `GoogleClient` is the
//! production implementation; tests use in-memory fakes.

pub mod google;
pub mod labels;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;

pub use google::GoogleClient;
pub use labels::LabelCache;
pub use types::{
    BodyPart, BodyView, Headers, Label, Message, MessageFormat, MessageRef, ThreadEntry,
    ThreadRef, newest_entry,
};

/// Query for unread inbox messages.
pub const INBOX_QUERY: &str = "in:inbox is:unread";

/// Label removed from a message once it has been filed.
pub const INBOX_LABEL: &str = "INBOX";

/// Query for threads filed under a context label.
pub fn context_query(context: &str) -> String {
    format!("in:{context}")
}

/// Mailbox capability: query, fetch, and relabel messages and threads.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Messages matching a search query.
    async fn list_messages(&self, query: &str) -> Result<Vec<MessageRef>, MailboxError>;

    /// Threads matching a search query.
    async fn list_threads(&self, query: &str) -> Result<Vec<ThreadRef>, MailboxError>;

    /// Fetch a message. `Metadata` leaves the body empty.
    async fn get_message(&self, id: &str, format: MessageFormat)
    -> Result<Message, MailboxError>;

    /// Message ids and timestamps of a thread.
    async fn get_thread(&self, id: &str) -> Result<Vec<ThreadEntry>, MailboxError>;

    async fn list_labels(&self) -> Result<Vec<Label>, MailboxError>;

    async fn modify_message(&self, id: &str, remove_label_ids: &[String])
    -> Result<(), MailboxError>;

    async fn modify_thread(&self, id: &str, remove_label_ids: &[String])
    -> Result<(), MailboxError>;
}

/// Resolve a label name to its id.
pub async fn resolve_label(mailbox: &dyn Mailbox, name: &str) -> Result<String, MailboxError> {
    mailbox
        .list_labels()
        .await?
        .into_iter()
        .find(|label| label.name == name)
        .map(|label| label.id)
        .ok_or_else(|| MailboxError::LabelNotFound(name.to_string()))
}

// ── Calendar ────────────────────────────────────────────────────────

/// A calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Assigned by the calendar; `None` before insertion.
    pub id: Option<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Calendar capability: list, insert, and delete events.
#[async_trait]
pub trait Calendar: Send + Sync {
    /// Events overlapping `[time_min, time_max)` whose text matches `query`.
    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        query: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, MailboxError>;

    async fn insert_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, MailboxError>;

    async fn delete_event(&self, id: &str) -> Result<(), MailboxError>;
}
