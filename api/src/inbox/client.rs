//! The external mailbox collaborator interface and a bundled
//! IMAP adapter. The IMAP server itself is out of scope .md; this
//! is one concrete, swappable implementation of the trait it names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;

#[derive(Clone, Debug)]
pub struct RawMessage {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_date: DateTime<Utc>,
    pub headers: serde_json::Value,
    pub labels: Vec<String>,
}

#[async_trait]
pub trait InboxClient: Send + Sync {
    async fn poll_unread(&self, since: DateTime<Utc>) -> Result<Vec<RawMessage>, CoreError>;
}

pub struct ImapInboxClient {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl ImapInboxClient {
    pub fn new(host: String, port: u16, username: String, password: String) -> Self {
        Self { host, port, username, password }
    }
}

#[async_trait]
impl InboxClient for ImapInboxClient {
    async fn poll_unread(&self, since: DateTime<Utc>) -> Result<Vec<RawMessage>, CoreError> {
        let tcp = tokio::net::TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        let tls = async_native_tls::TlsConnector::new();
        let tls_stream = tls
            .connect(self.host.as_str(), tcp)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.username, &self.password)
            .await
            .map_err(|(e, _)| CoreError::Blocked(e.to_string()))?;

        session.select("INBOX").await.map_err(|e| CoreError::Transient(e.to_string()))?;

        let since_str = since.format("%d-%b-%Y").to_string();
        let uids = session
            .uid_search(format!("UNSEEN SINCE {since_str}"))
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        if uids.is_empty() {
            session.logout().await.ok();
            return Ok(Vec::new());
        }

        let sequence = uids.iter().map(|u| u.to_string()).collect::<Vec<_>>().join(",");
        let mut messages = Vec::new();
        {
            use futures::TryStreamExt;
            let mut stream = session
                .uid_fetch(&sequence, "RFC822")
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?;
            while let Some(fetch) = stream.try_next().await.map_err(|e| CoreError::Transient(e.to_string()))? {
                if let Some(body) = fetch.body() {
                    if let Ok(parsed) = mailparse::parse_mail(body) {
                        messages.push(to_raw_message(&parsed));
                    }
                }
            }
        }
        session.logout().await.ok();
        Ok(messages)
    }
}

fn to_raw_message(parsed: &mailparse::ParsedMail) -> RawMessage {
    let headers: serde_json::Map<String, serde_json::Value> = parsed
        .headers
        .iter()
        .map(|h| (h.get_key(), serde_json::Value::String(h.get_value())))
        .collect();

    let message_id = headers
        .get("Message-ID")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim_matches(|c| c == '<' || c == '>')
        .to_string();
    let sender = extract_email_address(headers.get("From").and_then(|v| v.as_str()).unwrap_or_default());
    let subject = headers.get("Subject").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let received_date = headers
        .get("Date")
        .and_then(|v| v.as_str())
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut body_text = None;
    let mut body_html = None;
    collect_bodies(parsed, &mut body_text, &mut body_html);

    RawMessage {
        message_id,
        sender,
        subject,
        body_text,
        body_html,
        received_date,
        headers: serde_json::Value::Object(headers),
        labels: Vec::new(),
    }
}

fn collect_bodies(part: &mailparse::ParsedMail, text: &mut Option<String>, html: &mut Option<String>) {
    if part.subparts.is_empty() {
        match part.ctype.mimetype.as_str() {
            "text/plain" if text.is_none() => *text = part.get_body().ok(),
            "text/html" if html.is_none() => *html = part.get_body().ok(),
            _ => {}
        }
        return;
    }
    for sub in &part.subparts {
        collect_bodies(sub, text, html);
    }
}

fn extract_email_address(from_header: &str) -> String {
    from_header
        .rsplit_once('<')
        .map(|(_, addr)| addr.trim_end_matches('>').to_string())
        .unwrap_or_else(|| from_header.trim().to_string())
        .to_lowercase()
}
