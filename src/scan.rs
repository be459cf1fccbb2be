//! One full scan pass: unread inbox messages first, then each context folder.
//!
//! Everything runs sequentially. A failing collaborator call is logged and
//! skips only the message (or the context) it belongs to.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{DEFAULT_CONTEXTS, DEFAULT_LINK_BASE, DEFAULT_OWNER, TenderConfig};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::MailboxError;
use crate::handlers::HandlerRegistry;
use crate::mailbox::{
    Headers, INBOX_QUERY, LabelCache, Mailbox, MessageFormat, context_query, newest_entry,
};
use crate::refile::Refiler;
use crate::sink::TaskSink;

/// Knobs for a scan pass.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub link_base: String,
    pub owner: String,
    pub contexts: Vec<String>,
    pub dry_run: bool,
    /// Fixed date for schedules; the local date when `None`.
    pub today: Option<NaiveDate>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            link_base: DEFAULT_LINK_BASE.to_string(),
            owner: DEFAULT_OWNER.to_string(),
            contexts: DEFAULT_CONTEXTS.iter().map(|s| s.to_string()).collect(),
            dry_run: false,
            today: None,
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &TenderConfig, dry_run: bool) -> Self {
        Self {
            link_base: config.link_base.clone(),
            owner: config.owner.clone(),
            contexts: config.contexts.clone(),
            dry_run,
            today: None,
        }
    }
}

/// Tally of one pass, logged when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Unread inbox messages seen.
    pub inbox: usize,
    pub matched: usize,
    pub archived: usize,
    pub unmatched: usize,
    /// Matched messages whose extraction, capture, or fetch failed.
    pub failed: usize,
    /// Context threads seen.
    pub context_threads: usize,
    pub refiled: usize,
    pub refile_failed: usize,
    /// Listing calls that failed and skipped a whole section.
    pub section_errors: usize,
}

/// Runs scan passes against one mailbox and sink.
pub struct Scanner {
    mailbox: Arc<dyn Mailbox>,
    dispatcher: Dispatcher,
    refiler: Refiler,
    labels: Arc<LabelCache>,
    contexts: Vec<String>,
}

impl Scanner {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        sink: Arc<dyn TaskSink>,
        registry: Arc<HandlerRegistry>,
        options: ScanOptions,
    ) -> Self {
        let labels = Arc::new(LabelCache::new());

        let mut dispatcher = Dispatcher::new(
            registry,
            Arc::clone(&mailbox),
            Arc::clone(&sink),
            Arc::clone(&labels),
        )
        .with_link_base(options.link_base.clone())
        .with_dry_run(options.dry_run);

        let mut refiler = Refiler::new(Arc::clone(&mailbox), sink, Arc::clone(&labels))
            .with_owner(options.owner)
            .with_link_base(options.link_base)
            .with_dry_run(options.dry_run);

        if let Some(today) = options.today {
            dispatcher = dispatcher.with_today(today);
            refiler = refiler.with_today(today);
        }

        Self {
            mailbox,
            dispatcher,
            refiler,
            labels,
            contexts: options.contexts,
        }
    }

    /// Run one pass: the inbox, then every context in order.
    pub async fn run(&self) -> ScanReport {
        self.labels.clear().await;
        let mut report = ScanReport::default();

        if let Err(e) = self.scan_inbox(&mut report).await {
            error!(error = %e, "Inbox scan failed");
            report.section_errors += 1;
        }

        for context in &self.contexts {
            if let Err(e) = self.scan_context(context, &mut report).await {
                error!(context = %context, error = %e, "Context scan failed");
                report.section_errors += 1;
            }
        }

        info!(
            inbox = report.inbox,
            matched = report.matched,
            archived = report.archived,
            unmatched = report.unmatched,
            failed = report.failed,
            refiled = report.refiled,
            refile_failed = report.refile_failed,
            section_errors = report.section_errors,
            "Scan finished"
        );
        report
    }

    async fn scan_inbox(&self, report: &mut ScanReport) -> Result<(), MailboxError> {
        let messages = self.mailbox.list_messages(INBOX_QUERY).await?;
        info!(count = messages.len(), "Unread messages found in inbox");

        for message in messages {
            report.inbox += 1;
            let headers = match self.headers(&message.id).await {
                Ok(headers) => headers,
                Err(e) => {
                    error!(id = %message.id, error = %e, "Failed to fetch headers");
                    report.failed += 1;
                    continue;
                }
            };

            match self.dispatcher.dispatch(&message.id, &headers).await {
                DispatchOutcome::Unmatched => report.unmatched += 1,
                DispatchOutcome::Matched {
                    success, archived, ..
                } => {
                    report.matched += 1;
                    if !success {
                        report.failed += 1;
                    }
                    if archived {
                        report.archived += 1;
                    }
                }
            }
        }
        Ok(())
    }

    async fn scan_context(
        &self,
        context: &str,
        report: &mut ScanReport,
    ) -> Result<(), MailboxError> {
        let threads = self.mailbox.list_threads(&context_query(context)).await?;
        info!(context, count = threads.len(), "Threads found in context");

        for thread in threads {
            report.context_threads += 1;
            match self.refile_thread(context, &thread.id).await {
                Ok(true) => report.refiled += 1,
                Ok(false) => report.refile_failed += 1,
                Err(e) => {
                    error!(context, thread = %thread.id, error = %e, "Failed to refile thread");
                    report.refile_failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Refile the newest message of a thread and unlabel the thread on success.
    async fn refile_thread(&self, context: &str, thread_id: &str) -> Result<bool, MailboxError> {
        let entries = self.mailbox.get_thread(thread_id).await?;
        let newest = newest_entry(&entries)
            .ok_or_else(|| MailboxError::EmptyThread(thread_id.to_string()))?;
        debug!(thread = %thread_id, id = %newest.id, "Newest message in thread");

        let headers = self.headers(&newest.id).await?;
        if !self
            .refiler
            .refile(context, thread_id, &newest.id, &headers)
            .await
        {
            return Ok(false);
        }
        self.refiler.unlabel_thread(thread_id, context).await?;
        Ok(true)
    }

    async fn headers(&self, message_id: &str) -> Result<Headers, MailboxError> {
        let message = self
            .mailbox
            .get_message(message_id, MessageFormat::Metadata)
            .await?;
        for (name, value) in message.headers.iter() {
            debug!(id = %message_id, header = name, value, "Header");
        }
        Ok(message.headers)
    }
}
