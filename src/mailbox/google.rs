//! Google REST client: Gmail v1 for the mailbox, Calendar v3 for events.
//!
//! Authentication is a pre-obtained OAuth bearer token; acquiring and
//! refreshing it is handled outside this crate.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::MailboxError;
use crate::mailbox::types::{
    BodyPart, BodyView, Headers, Label, Message, MessageFormat, MessageRef, ThreadEntry,
    ThreadRef,
};
use crate::mailbox::{Calendar, CalendarEvent, Mailbox};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars/primary";

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<IdOnly>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListThreadsResponse {
    #[serde(default)]
    threads: Vec<IdOnly>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    #[serde(default)]
    messages: Vec<ThreadMessageWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadMessageWire {
    id: String,
    /// Gmail sends int64 values as strings.
    internal_date: String,
}

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct MessageWire {
    id: String,
    payload: Option<PartWire>,
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartWire {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<HeaderWire>,
    body: Option<PartBodyWire>,
    #[serde(default)]
    parts: Vec<PartWire>,
}

#[derive(Debug, Deserialize)]
struct HeaderWire {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBodyWire {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventWire>,
}

#[derive(Debug, Deserialize)]
struct EventWire {
    id: String,
    #[serde(default)]
    summary: String,
    description: Option<String>,
    start: EventTimeWire,
    end: EventTimeWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTimeWire {
    date_time: Option<DateTime<Utc>>,
    date: Option<chrono::NaiveDate>,
}

impl EventTimeWire {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        self.date_time
            .or_else(|| self.date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc()))
    }
}

// ── Decoding helpers ────────────────────────────────────────────────

/// Decode Gmail's URL-safe base64, with or without padding.
pub fn decode_base64url(data: &str) -> Result<String, MailboxError> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .map_err(|e| MailboxError::Decode(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn convert_part(part: &PartWire) -> Result<BodyPart, MailboxError> {
    let text = match part.body.as_ref().and_then(|b| b.data.as_deref()) {
        Some(data) => decode_base64url(data)?,
        None => String::new(),
    };
    let parts = part
        .parts
        .iter()
        .map(convert_part)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BodyPart {
        mime_type: part.mime_type.clone(),
        text,
        parts,
    })
}

fn convert_message(wire: MessageWire, format: MessageFormat) -> Result<Message, MailboxError> {
    let headers: Headers = wire
        .payload
        .as_ref()
        .map(|p| {
            p.headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let body = match format {
        MessageFormat::Metadata => BodyView::default(),
        MessageFormat::Full => match wire.payload.as_ref() {
            Some(payload) => BodyView::from_root(convert_part(payload)?),
            None => BodyView::default(),
        },
        MessageFormat::Raw => {
            let raw = wire.raw.as_deref().ok_or_else(|| MailboxError::InvalidResponse {
                endpoint: "messages.get".into(),
                reason: format!("message {} has no raw body", wire.id),
            })?;
            let decoded = decode_base64url(raw)?;
            BodyView::from_rfc822(decoded.as_bytes()).unwrap_or_else(|| BodyView::from_raw(decoded))
        }
    };

    // Raw responses carry no payload headers; recover them from the source.
    let headers = if headers.is_empty() {
        body.raw()
            .map(headers_from_source)
            .unwrap_or_default()
    } else {
        headers
    };

    Ok(Message {
        id: wire.id,
        headers,
        body,
    })
}

/// Parse the header block of an RFC822 source.
fn headers_from_source(source: &str) -> Headers {
    let Some(parsed) = mail_parser::MessageParser::default().parse(source.as_bytes()) else {
        return Headers::new();
    };
    parsed
        .headers_raw()
        .map(|(name, value)| (name.to_string(), value.trim().to_string()))
        .collect()
}

// ── Client ──────────────────────────────────────────────────────────

/// Gmail + Calendar over HTTPS.
pub struct GoogleClient {
    http: reqwest::Client,
    token: SecretString,
}

impl GoogleClient {
    pub fn new(token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, MailboxError> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| MailboxError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailboxError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailboxError> {
        debug!(endpoint, url, "GET");
        let response = self.send(endpoint, self.http.get(url).query(query)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| MailboxError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove_labels(
        &self,
        endpoint: &str,
        url: &str,
        remove_label_ids: &[String],
    ) -> Result<(), MailboxError> {
        let body = serde_json::json!({ "removeLabelIds": remove_label_ids });
        self.send(endpoint, self.http.post(url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailbox for GoogleClient {
    async fn list_messages(&self, query: &str) -> Result<Vec<MessageRef>, MailboxError> {
        let url = format!("{GMAIL_BASE}/messages");
        let mut refs = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let mut params = vec![("q", query)];
            if let Some(ref token) = page {
                params.push(("pageToken", token.as_str()));
            }
            let resp: ListMessagesResponse =
                self.get_json("messages.list", &url, &params).await?;
            refs.extend(resp.messages.into_iter().map(|m| MessageRef { id: m.id }));
            match resp.next_page_token {
                Some(token) => page = Some(token),
                None => break,
            }
        }
        Ok(refs)
    }

    async fn list_threads(&self, query: &str) -> Result<Vec<ThreadRef>, MailboxError> {
        let url = format!("{GMAIL_BASE}/threads");
        let mut refs = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let mut params = vec![("q", query)];
            if let Some(ref token) = page {
                params.push(("pageToken", token.as_str()));
            }
            let resp: ListThreadsResponse = self.get_json("threads.list", &url, &params).await?;
            refs.extend(resp.threads.into_iter().map(|t| ThreadRef { id: t.id }));
            match resp.next_page_token {
                Some(token) => page = Some(token),
                None => break,
            }
        }
        Ok(refs)
    }

    async fn get_message(
        &self,
        id: &str,
        format: MessageFormat,
    ) -> Result<Message, MailboxError> {
        let url = format!("{GMAIL_BASE}/messages/{id}");
        let wire: MessageWire = self
            .get_json("messages.get", &url, &[("format", format.as_str())])
            .await?;
        convert_message(wire, format)
    }

    async fn get_thread(&self, id: &str) -> Result<Vec<ThreadEntry>, MailboxError> {
        let url = format!("{GMAIL_BASE}/threads/{id}");
        let resp: ThreadResponse = self
            .get_json("threads.get", &url, &[("fields", "messages(id,internalDate)")])
            .await?;
        resp.messages
            .into_iter()
            .map(|m| {
                let internal_date =
                    m.internal_date
                        .parse::<i64>()
                        .map_err(|e| MailboxError::InvalidResponse {
                            endpoint: "threads.get".into(),
                            reason: format!("bad internalDate {:?}: {e}", m.internal_date),
                        })?;
                Ok(ThreadEntry {
                    id: m.id,
                    internal_date,
                })
            })
            .collect()
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailboxError> {
        let url = format!("{GMAIL_BASE}/labels");
        let resp: LabelsResponse = self.get_json("labels.list", &url, &[]).await?;
        Ok(resp.labels)
    }

    async fn modify_message(
        &self,
        id: &str,
        remove_label_ids: &[String],
    ) -> Result<(), MailboxError> {
        let url = format!("{GMAIL_BASE}/messages/{id}/modify");
        self.remove_labels("messages.modify", &url, remove_label_ids)
            .await
    }

    async fn modify_thread(
        &self,
        id: &str,
        remove_label_ids: &[String],
    ) -> Result<(), MailboxError> {
        let url = format!("{GMAIL_BASE}/threads/{id}/modify");
        self.remove_labels("threads.modify", &url, remove_label_ids)
            .await
    }
}

#[async_trait]
impl Calendar for GoogleClient {
    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        query: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, MailboxError> {
        let url = format!("{CALENDAR_BASE}/events");
        let min = time_min.to_rfc3339();
        let max = time_max.to_rfc3339();
        let mut params = vec![
            ("timeMin", min.as_str()),
            ("timeMax", max.as_str()),
            ("singleEvents", "true"),
        ];
        if let Some(q) = query {
            params.push(("q", q));
        }
        let resp: EventsResponse = self.get_json("events.list", &url, &params).await?;
        Ok(convert_events(resp))
    }

    async fn insert_event(&self, event: &CalendarEvent) -> Result<CalendarEvent, MailboxError> {
        let url = format!("{CALENDAR_BASE}/events");
        let response = self
            .send("events.insert", self.http.post(&url).json(&event_body(event)))
            .await?;
        let created: EventWire =
            response
                .json()
                .await
                .map_err(|e| MailboxError::InvalidResponse {
                    endpoint: "events.insert".into(),
                    reason: e.to_string(),
                })?;
        Ok(CalendarEvent {
            id: Some(created.id),
            ..event.clone()
        })
    }

    async fn delete_event(&self, id: &str) -> Result<(), MailboxError> {
        let url = format!("{CALENDAR_BASE}/events/{id}");
        self.send("events.delete", self.http.delete(&url)).await?;
        Ok(())
    }
}

fn event_body(event: &CalendarEvent) -> serde_json::Value {
    let mut body = serde_json::json!({
        "summary": event.summary,
        "start": { "dateTime": event.start.to_rfc3339() },
        "end": { "dateTime": event.end.to_rfc3339() },
    });
    if let Some(ref desc) = event.description {
        body["description"] = serde_json::json!(desc);
    }
    body
}

fn convert_events(resp: EventsResponse) -> Vec<CalendarEvent> {
    resp.items
        .into_iter()
        .filter_map(|item| {
            Some(CalendarEvent {
                start: item.start.resolve()?,
                end: item.end.resolve()?,
                id: Some(item.id),
                summary: item.summary,
                description: item.description,
            })
        })
        .collect()
}
