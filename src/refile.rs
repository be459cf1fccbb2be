//! Context refiler: turns any message sitting in a context folder into a
//! generic task tagged with that context.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{error, info, warn};

use crate::config::{DEFAULT_LINK_BASE, DEFAULT_OWNER};
use crate::error::MailboxError;
use crate::mailbox::{Headers, LabelCache, Mailbox};
use crate::sink::TaskSink;
use crate::task::{DEFAULT_PRIORITY, Scheduled, TaskRecord};

/// Context whose tasks are attributed to the counterparty.
pub const WAITING_CONTEXT: &str = "@waiting";

static DISPLAY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""?(.*?)"?\s<"#).expect("valid regex"));
static LOCAL_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<?(.*?)@").expect("valid regex"));

/// Short tag for an address: the display name if there is one, otherwise
/// the local part. Lowercased, with `.` and spaces turned into `_`.
///
/// `"Jeff Kowalski" <jeff@example.com>` gives `jeff_kowalski`.
pub fn friendly_name(addr: &str) -> Option<String> {
    let name = [&*DISPLAY_NAME, &*LOCAL_PART]
        .into_iter()
        .filter_map(|re| re.captures(addr)?.get(1))
        .map(|m| m.as_str().trim())
        .find(|name| !name.is_empty())?;
    Some(name.to_lowercase().replace(['.', ' '], "_"))
}

/// Full context for a refiled task.
///
/// Waiting tasks are qualified with the other party: the recipient, or the
/// sender when the recipient is the mailbox owner.
pub fn qualify_context(context: &str, headers: &Headers, owner: &str) -> String {
    if context != WAITING_CONTEXT {
        return context.to_string();
    }
    let counterparty = match headers.to().and_then(friendly_name) {
        Some(to) if to != owner => Some(to),
        _ => headers.from().and_then(friendly_name),
    };
    match counterparty {
        Some(name) => format!("{name}:{context}"),
        None => {
            warn!(context, "No counterparty in headers, filing unqualified");
            context.to_string()
        }
    }
}

/// Refiles messages found under context labels.
pub struct Refiler {
    mailbox: Arc<dyn Mailbox>,
    sink: Arc<dyn TaskSink>,
    labels: Arc<LabelCache>,
    owner: String,
    link_base: String,
    dry_run: bool,
    today: Option<NaiveDate>,
}

impl Refiler {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        sink: Arc<dyn TaskSink>,
        labels: Arc<LabelCache>,
    ) -> Self {
        Self {
            mailbox,
            sink,
            labels,
            owner: DEFAULT_OWNER.to_string(),
            link_base: DEFAULT_LINK_BASE.to_string(),
            dry_run: false,
            today: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Build the generic task for a message in `context`.
    pub fn task_for(
        &self,
        context: &str,
        message_id: &str,
        headers: &Headers,
    ) -> Option<TaskRecord> {
        let heading = headers.subject().map(str::trim).filter(|s| !s.is_empty())?;
        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        Some(TaskRecord::new(
            heading,
            &qualify_context(context, headers, &self.owner),
            DEFAULT_PRIORITY,
            Scheduled::On(today),
            &format!("{}{}", self.link_base, message_id),
        ))
    }

    /// Capture a task for the newest message of a thread. Returns whether
    /// the sink accepted it; the caller then removes the context label.
    /// A dry run reports success without calling the sink.
    pub async fn refile(
        &self,
        context: &str,
        thread_id: &str,
        message_id: &str,
        headers: &Headers,
    ) -> bool {
        info!(
            context,
            thread = %thread_id,
            id = %message_id,
            subject = headers.subject().unwrap_or_default(),
            from = headers.from().unwrap_or_default(),
            "Refiling message"
        );

        let Some(task) = self.task_for(context, message_id, headers) else {
            error!(context, id = %message_id, "Message has no subject to use as a heading");
            return false;
        };

        if self.dry_run {
            info!(context, title = %task.title(), "Dry run, not capturing");
            return true;
        }

        match self.sink.capture(&task.capture_request()).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                error!(
                    context,
                    code = response.code,
                    message = %response.message,
                    "Capture endpoint rejected task"
                );
                false
            }
            Err(e) => {
                error!(context, error = %e, "Capture request failed");
                false
            }
        }
    }

    /// Remove a context label from a whole thread. `Ok(false)` in dry-run mode.
    pub async fn unlabel_thread(
        &self,
        thread_id: &str,
        label_name: &str,
    ) -> Result<bool, MailboxError> {
        if self.dry_run {
            info!(thread = %thread_id, label = label_name, "Dry run, not unlabeling");
            return Ok(false);
        }
        let label = self.labels.resolve(self.mailbox.as_ref(), label_name).await?;
        self.mailbox.modify_thread(thread_id, &[label]).await?;
        info!(thread = %thread_id, label = label_name, "Removed context label");
        Ok(true)
    }
}
