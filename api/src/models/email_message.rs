use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::email_messages;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, serde::Deserialize)]
#[diesel(table_name = email_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailMessage {
    pub id: i64,
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_date: DateTime<Utc>,
    pub status: String,
    pub article_id: Option<i64>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error: Option<String>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub headers: Option<serde_json::Value>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = email_messages)]
pub struct NewEmailMessage {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_date: DateTime<Utc>,
    pub status: String,
    pub max_retries: i32,
    pub headers: Option<serde_json::Value>,
    pub labels: Vec<String>,
}
