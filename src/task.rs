//! Task records and their encoding for the capture endpoint.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Priority used by every built-in template.
pub const DEFAULT_PRIORITY: &str = "#C";

/// When a task is scheduled: a single day or a delivery window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheduled {
    On(NaiveDate),
    Between(NaiveDate, NaiveDate),
}

fn stamp(date: &NaiveDate) -> String {
    format!("<{}>", date.format("%Y-%m-%d %a"))
}

impl fmt::Display for Scheduled {
    /// `<2020-12-21 Mon>` or `<2020-12-21 Mon>--<2020-12-23 Wed>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On(date) => f.write_str(&stamp(date)),
            Self::Between(start, end) => write!(f, "{}--{}", stamp(start), stamp(end)),
        }
    }
}

/// A task ready for capture. Built once per dispatch, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub heading: String,
    pub context: String,
    pub priority: String,
    pub scheduled: Scheduled,
    pub body: String,
}

impl TaskRecord {
    /// Build a record; the heading is lowercased.
    pub fn new(
        heading: &str,
        context: &str,
        priority: &str,
        scheduled: Scheduled,
        body: &str,
    ) -> Self {
        let record = Self {
            heading: heading.to_lowercase(),
            context: context.to_string(),
            priority: priority.to_string(),
            scheduled,
            body: body.to_string(),
        };
        debug!(
            priority = %record.priority,
            heading = %record.heading,
            context = %record.context,
            scheduled = %record.scheduled,
            "TODO"
        );
        record
    }

    /// `[#C] heading  :context:`
    pub fn title(&self) -> String {
        format!("[{}] {}  :{}:", self.priority, self.heading, self.context)
    }

    /// `SCHEDULED: <date>\nbody`
    pub fn full_body(&self) -> String {
        format!("SCHEDULED: {}\n{}", self.scheduled, self.body)
    }

    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            title: encode_component(&self.title()),
            body: encode_component(&self.full_body()),
        }
    }
}

/// Percent-encode everything outside `A-Z a-z 0-9 - _ . ~`.
pub fn encode_component(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Path segments sent to the capture endpoint, already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub title: String,
    pub body: String,
}

impl CaptureRequest {
    pub fn path(&self) -> String {
        format!("/capture/b/LINK/{}/{}", self.title, self.body)
    }
}
