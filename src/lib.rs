//! Mail Tender: files known inbox mail as scheduled tasks.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod logging;
pub mod mailbox;
pub mod refile;
pub mod scan;
pub mod sink;
pub mod task;
