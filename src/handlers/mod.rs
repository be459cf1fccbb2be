//! Message handlers, one per known sender template.
//!
//! A handler says whether it applies to a set of headers, which body it
//! needs, and turns a matched message into the tasks to capture. It never
//! touches the mailbox or the sink itself; the dispatcher owns those calls
//! and the archive policy.

pub mod builtin;
pub mod matcher;
pub mod registry;
pub mod template;

use chrono::NaiveDate;

use crate::error::ExtractError;
use crate::extract::{BodyNeed, Fields};
use crate::mailbox::{BodyView, Headers};
use crate::task::TaskRecord;

pub use matcher::{Condition, Matcher, Test};
pub use registry::HandlerRegistry;
pub use template::{BodyLine, ScheduleSpec, TaskSpec, Template, TemplateBuilder};

/// Everything a handler may read.
#[derive(Debug, Clone, Copy)]
pub struct HandlerInput<'a> {
    pub message_id: &'a str,
    pub headers: &'a Headers,
    pub body: &'a BodyView,
    /// Prefix of the link back to the message.
    pub link_base: &'a str,
    /// Date used for "now" schedules and year inference.
    pub today: NaiveDate,
}

impl HandlerInput<'_> {
    pub fn message_link(&self) -> String {
        format!("{}{}", self.link_base, self.message_id)
    }
}

/// What a handler produced for one message.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub fields: Fields,
    /// Captured in order; each only after the previous one succeeded.
    pub tasks: Vec<TaskRecord>,
    /// Whether the message should leave the inbox once every task is filed.
    pub archive: bool,
}

/// A sender template.
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    /// Pure and total over the headers.
    fn matches(&self, headers: &Headers) -> bool;

    fn body_need(&self) -> BodyNeed;

    fn handle(&self, input: &HandlerInput<'_>) -> Result<HandlerOutcome, ExtractError>;
}
