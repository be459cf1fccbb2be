//! Dispatcher: picks the handler for a message, runs it, captures its
//! tasks, and archives the message once every task is filed.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_LINK_BASE;
use crate::error::{self, ExtractError, MailboxError};
use crate::extract::BodyNeed;
use crate::handlers::{Handler, HandlerInput, HandlerOutcome, HandlerRegistry};
use crate::mailbox::{BodyView, Headers, INBOX_LABEL, LabelCache, Mailbox, MessageFormat};
use crate::sink::TaskSink;
use crate::task::TaskRecord;

/// What happened to one inbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A template claimed the message. `success` is true when every task was
    /// captured; `archived` when the inbox label was then removed.
    Matched {
        template: String,
        success: bool,
        archived: bool,
    },
    /// No template applies. Nothing was touched.
    Unmatched,
}

impl DispatchOutcome {
    fn failed(template: &str) -> Self {
        Self::Matched {
            template: template.to_string(),
            success: false,
            archived: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Matched { success: true, .. })
    }
}

/// Routes inbox messages to their template.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    mailbox: Arc<dyn Mailbox>,
    sink: Arc<dyn TaskSink>,
    labels: Arc<LabelCache>,
    link_base: String,
    dry_run: bool,
    today: Option<NaiveDate>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        mailbox: Arc<dyn Mailbox>,
        sink: Arc<dyn TaskSink>,
        labels: Arc<LabelCache>,
    ) -> Self {
        Self {
            registry,
            mailbox,
            sink,
            labels,
            link_base: DEFAULT_LINK_BASE.to_string(),
            dry_run: false,
            today: None,
        }
    }

    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into();
        self
    }

    /// Classify and log, but skip sink calls and label changes.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Dispatch one message. Never fails: every error is logged and reported
    /// as an unsuccessful match so the scan can move on.
    pub async fn dispatch(&self, message_id: &str, headers: &Headers) -> DispatchOutcome {
        info!(
            id = %message_id,
            subject = headers.subject().unwrap_or_default(),
            from = headers.from().unwrap_or_default(),
            "Dispatching message"
        );

        let Some(handler) = self.registry.find(headers) else {
            debug!(id = %message_id, "No template matched");
            return DispatchOutcome::Unmatched;
        };
        let template = handler.name().to_string();
        info!(id = %message_id, template = %template, "Template matched");

        let body = match self.fetch_body(message_id, &template, handler.body_need()).await {
            Ok(body) => body,
            Err(e) => {
                error!(
                    id = %message_id,
                    template = %template,
                    error = %e,
                    "Failed to fetch message body"
                );
                return DispatchOutcome::failed(&template);
            }
        };

        let input = HandlerInput {
            message_id,
            headers,
            body: &body,
            link_base: &self.link_base,
            today: self.today(),
        };
        let outcome = match run_handler(handler.as_ref(), &input) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(id = %message_id, template = %template, error = %e, "Extraction failed");
                return DispatchOutcome::failed(&template);
            }
        };

        if !self.capture_all(&template, &outcome.tasks).await {
            return DispatchOutcome::failed(&template);
        }

        let archived = if outcome.archive {
            match self.archive(message_id).await {
                Ok(archived) => archived,
                Err(e) => {
                    error!(id = %message_id, error = %e, "Failed to archive message");
                    false
                }
            }
        } else {
            false
        };

        DispatchOutcome::Matched {
            template,
            success: true,
            archived,
        }
    }

    /// Fetch only as much of the message as the handler reads. A body
    /// missing the requested representation is an error.
    async fn fetch_body(
        &self,
        message_id: &str,
        template: &str,
        need: BodyNeed,
    ) -> error::Result<BodyView> {
        let format = match need {
            BodyNeed::None => return Ok(BodyView::default()),
            BodyNeed::Decoded => MessageFormat::Full,
            BodyNeed::Raw => MessageFormat::Raw,
        };
        debug!(id = %message_id, format = format.as_str(), "Fetching body");
        let body = self.mailbox.get_message(message_id, format).await?.body;
        if !provides(&body, need) {
            return Err(ExtractError::BodyUnavailable {
                template: template.to_string(),
                need: need.label().to_string(),
            }
            .into());
        }
        Ok(body)
    }

    /// Capture tasks in order, stopping at the first failure.
    async fn capture_all(&self, template: &str, tasks: &[TaskRecord]) -> bool {
        for (idx, task) in tasks.iter().enumerate() {
            if self.dry_run {
                info!(
                    template,
                    title = %task.title(),
                    scheduled = %task.scheduled,
                    "Dry run, not capturing"
                );
                continue;
            }

            match self.sink.capture(&task.capture_request()).await {
                Ok(response) if response.is_success() => {
                    debug!(template, title = %task.title(), "Captured task");
                }
                Ok(response) => {
                    error!(
                        template,
                        code = response.code,
                        message = %response.message,
                        "Capture endpoint rejected task"
                    );
                    skip_remaining(template, tasks.len() - idx - 1);
                    return false;
                }
                Err(e) => {
                    error!(template, error = %e, "Capture request failed");
                    skip_remaining(template, tasks.len() - idx - 1);
                    return false;
                }
            }
        }
        true
    }

    /// Remove the inbox label. `Ok(false)` in dry-run mode.
    async fn archive(&self, message_id: &str) -> Result<bool, MailboxError> {
        if self.dry_run {
            info!(id = %message_id, "Dry run, not archiving");
            return Ok(false);
        }
        let label = self.labels.resolve(self.mailbox.as_ref(), INBOX_LABEL).await?;
        self.mailbox.modify_message(message_id, &[label]).await?;
        info!(id = %message_id, "Archived message");
        Ok(true)
    }
}

fn provides(body: &BodyView, need: BodyNeed) -> bool {
    match need {
        BodyNeed::None => true,
        BodyNeed::Decoded => body.root.is_some(),
        BodyNeed::Raw => body.raw.is_some(),
    }
}

fn skip_remaining(template: &str, remaining: usize) {
    if remaining > 0 {
        warn!(template, remaining, "Skipping chained tasks after failed capture");
    }
}

/// Run a handler, turning a panic into an extraction error.
fn run_handler(
    handler: &dyn Handler,
    input: &HandlerInput<'_>,
) -> Result<HandlerOutcome, ExtractError> {
    catch_unwind(AssertUnwindSafe(|| handler.handle(input))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ExtractError::Panicked {
            template: handler.name().to_string(),
            reason,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Fields;
    use crate::mailbox::BodyPart;

    struct Exploding;

    impl Handler for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        fn matches(&self, _headers: &Headers) -> bool {
            true
        }
        fn body_need(&self) -> BodyNeed {
            BodyNeed::None
        }
        fn handle(&self, _input: &HandlerInput<'_>) -> Result<HandlerOutcome, ExtractError> {
            panic!("index out of range");
        }
    }

    struct Empty;

    impl Handler for Empty {
        fn name(&self) -> &str {
            "empty"
        }
        fn matches(&self, _headers: &Headers) -> bool {
            true
        }
        fn body_need(&self) -> BodyNeed {
            BodyNeed::None
        }
        fn handle(&self, _input: &HandlerInput<'_>) -> Result<HandlerOutcome, ExtractError> {
            Ok(HandlerOutcome {
                fields: Fields::default(),
                tasks: vec![],
                archive: false,
            })
        }
    }

    fn input<'a>(headers: &'a Headers, body: &'a BodyView) -> HandlerInput<'a> {
        HandlerInput {
            message_id: "m1",
            headers,
            body,
            link_base: "",
            today: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        }
    }

    #[test]
    fn panics_become_errors() {
        let headers = Headers::new();
        let body = BodyView::default();
        let err = run_handler(&Exploding, &input(&headers, &body)).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Panicked { ref template, ref reason }
                if template == "exploding" && reason == "index out of range"
        ));
    }

    #[test]
    fn normal_outcomes_pass_through() {
        let headers = Headers::new();
        let body = BodyView::default();
        let outcome = run_handler(&Empty, &input(&headers, &body)).unwrap();
        assert!(outcome.tasks.is_empty());
        assert!(!outcome.archive);
    }

    #[test]
    fn body_must_carry_requested_representation() {
        let raw = BodyView::from_raw("Subject: hi\r\n\r\nbody");
        let decoded = BodyView::from_root(BodyPart::leaf("text/plain", "body"));
        assert!(provides(&raw, BodyNeed::Raw));
        assert!(!provides(&raw, BodyNeed::Decoded));
        assert!(provides(&decoded, BodyNeed::Decoded));
        assert!(!provides(&decoded, BodyNeed::Raw));
        assert!(provides(&BodyView::default(), BodyNeed::None));
    }

    #[test]
    fn outcome_success() {
        assert!(!DispatchOutcome::Unmatched.is_success());
        assert!(!DispatchOutcome::failed("x").is_success());
        assert!(
            DispatchOutcome::Matched {
                template: "x".into(),
                success: true,
                archived: false
            }
            .is_success()
        );
    }
}
