//! Runtime configuration, built from environment variables.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default capture endpoint.
pub const DEFAULT_SINK_URL: &str = "http://carbon:3333";

/// Default prefix of the deep link back to a message.
pub const DEFAULT_LINK_BASE: &str = "https://mail.google.com/mail/u/0/#inbox/";

/// Default mailbox owner, as produced by `friendly_name`.
pub const DEFAULT_OWNER: &str = "jeff_kowalski";

/// Context folders scanned every pass, in order.
pub const DEFAULT_CONTEXTS: &[&str] = &[
    "@agendas", "@calls", "@errands", "@home", "@quicken", "@view", "@waiting", "@work",
];

/// Scan configuration.
#[derive(Debug, Clone)]
pub struct TenderConfig {
    /// Capture endpoint base URL.
    pub sink_url: String,
    /// Bearer token for the mailbox API.
    pub access_token: SecretString,
    /// Friendly name of the mailbox owner.
    pub owner: String,
    /// Context labels scanned after the inbox.
    pub contexts: Vec<String>,
    /// Prefix for links back to the source message.
    pub link_base: String,
    /// Log file used when file logging is on.
    pub log_file: PathBuf,
}

impl TenderConfig {
    /// Build config from environment variables.
    ///
    /// The access token comes from `MAIL_TENDER_ACCESS_TOKEN`, or failing
    /// that from the file named by `MAIL_TENDER_TOKEN_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = home_dir();

        let token_path = std::env::var("MAIL_TENDER_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".credentials").join("mail-tender.token"));

        let access_token = match std::env::var("MAIL_TENDER_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => SecretString::from(token.trim().to_string()),
            _ => read_token_file(&token_path)?,
        };

        let sink_url = std::env::var("MAIL_TENDER_SINK_URL")
            .unwrap_or_else(|_| DEFAULT_SINK_URL.to_string());
        if !sink_url.starts_with("http://") && !sink_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_TENDER_SINK_URL".into(),
                message: format!("expected an http(s) URL, got {sink_url}"),
            });
        }

        let owner = std::env::var("MAIL_TENDER_OWNER").unwrap_or_else(|_| DEFAULT_OWNER.into());

        let contexts = std::env::var("MAIL_TENDER_CONTEXTS")
            .map(|s| parse_contexts(&s))
            .unwrap_or_else(|_| DEFAULT_CONTEXTS.iter().map(|s| s.to_string()).collect());

        let link_base =
            std::env::var("MAIL_TENDER_LINK_BASE").unwrap_or_else(|_| DEFAULT_LINK_BASE.into());

        let log_file = std::env::var("MAIL_TENDER_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".mail-tender.log"));

        Ok(Self {
            sink_url: sink_url.trim_end_matches('/').to_string(),
            access_token,
            owner,
            contexts,
            link_base,
            log_file,
        })
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Split a comma-separated context list, dropping blanks.
pub fn parse_contexts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read a bearer token from a file, trimming surrounding whitespace.
pub fn read_token_file(path: &Path) -> Result<SecretString, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingRequired {
            key: "MAIL_TENDER_ACCESS_TOKEN".into(),
            hint: format!(
                "Set the variable or write an OAuth access token to {}",
                path.display()
            ),
        });
    }
    let token = std::fs::read_to_string(path)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: path.display().to_string(),
            message: "token file is empty".into(),
        });
    }
    Ok(SecretString::from(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parse_contexts_trims_and_drops_blanks() {
        assert_eq!(
            parse_contexts(" @home, ,@work ,"),
            vec!["@home".to_string(), "@work".to_string()]
        );
    }

    #[test]
    fn default_contexts_in_scan_order() {
        assert_eq!(DEFAULT_CONTEXTS.first(), Some(&"@agendas"));
        assert_eq!(DEFAULT_CONTEXTS.last(), Some(&"@work"));
        assert_eq!(DEFAULT_CONTEXTS.len(), 8);
    }

    #[test]
    fn token_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "ya29.abc\n").unwrap();
        let token = read_token_file(&path).unwrap();
        assert_eq!(token.expose_secret(), "ya29.abc");
    }

    #[test]
    fn missing_token_file_reports_hint() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_token_file(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn empty_token_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(
            read_token_file(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
