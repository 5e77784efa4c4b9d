//! Wire models for the task scheduler API.
//!
//! Everything here is a projection of server state; the client never
//! fabricates these values. Read models:
//! - [`Task`] from `GET /tasks/` and `GET /tasks/{id}`
//! - [`Run`] from `GET /tasks/{id}/runs`
//! - [`DeadLetterEntry`] from `GET /tasks/{id}/dlq`
//! - [`AnalyticsSummary`] from `GET /analytics/summary`
//!
//! Write models ([`TaskCreate`], [`TaskUpdate`]) carry headers and body,
//! which the server stores encrypted and never echoes back.
//!
//! ```json
//! {
//!   "url": "https://example.com/hook",
//!   "method": "POST",
//!   "headers": {"X-Api-Key": "secret"},
//!   "body": "{\"ping\":true}",
//!   "schedule_cron": "*/5 * * * *",
//!   "enabled": true
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type HeadersMap = BTreeMap<String, String>;

/// HTTP verbs a task may use for delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub schedule_cron: Option<String>,
    pub enabled: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.pad("success"),
            RunStatus::Failure => f.pad("failure"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Run {
    pub id: i64,
    pub task_id: i64,
    pub status: RunStatus,
    /// Kept signed and optional so malformed rows still decode; consumers
    /// clamp to zero via [`Run::latency`].
    #[serde(default)]
    pub latency_ms: Option<i64>,
    #[serde(default)]
    pub response_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub failure_class: Option<String>,
    #[serde(default)]
    pub failure_explanation: Option<String>,
}

impl Run {
    /// Latency in milliseconds, missing or negative values read as 0
    pub fn latency(&self) -> u64 {
        self.latency_ms.map(|ms| ms.max(0) as u64).unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeadLetterEntry {
    pub id: i64,
    pub task_id: i64,
    pub error: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AnalyticsSummary {
    pub total_tasks: u64,
    pub total_runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub average_latency_ms: f64,
}

/// Payload for `POST /tasks/`
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TaskCreate {
    pub url: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeadersMap>,
    pub body: Option<String>,
    pub schedule_cron: Option<String>,
    pub enabled: bool,
}

/// Payload for `PATCH /tasks/{id}`; absent fields are left untouched
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeadersMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl TaskUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

/// `{"ok": true}` acknowledgement returned by deletes
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub ok: bool,
}

/// Result of `POST /tasks/{id}/dlq/{dlq_id}/replay`.
///
/// Older servers answer with a bare `{"ok": true}`, so everything but `ok`
/// is optional.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub ok: bool,
    #[serde(default)]
    pub response_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<i64>,
}

/// Error body shape: `{"detail": "..."}`
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Detail as display text; structured details are rendered as JSON
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Timestamps arrive either as RFC 3339 or as naive ISO-8601 (taken as UTC)
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_decodes_naive_timestamp() {
        let task: Task = serde_json::from_value(json!({
            "id": 3,
            "user_id": "dev_user",
            "url": "https://example.com/hook",
            "method": "POST",
            "schedule_cron": "*/5 * * * *",
            "enabled": true,
            "created_at": "2025-01-02T03:04:05.123456"
        }))
        .unwrap();

        assert_eq!(task.method, HttpMethod::Post);
        assert_eq!(task.created_at.to_rfc3339(), "2025-01-02T03:04:05.123456+00:00");
    }

    #[test]
    fn run_latency_is_clamped() {
        let mut run: Run = serde_json::from_value(json!({
            "id": 1,
            "task_id": 3,
            "status": "failure",
            "latency_ms": -40,
            "response_code": null,
            "created_at": "2025-01-02T03:04:05Z"
        }))
        .unwrap();

        assert_eq!(run.latency(), 0);
        run.latency_ms = None;
        assert_eq!(run.latency(), 0);
        run.latency_ms = Some(412);
        assert_eq!(run.latency(), 412);
    }

    #[test]
    fn task_update_omits_absent_fields() {
        let body = serde_json::to_value(TaskUpdate::enabled(false)).unwrap();
        assert_eq!(body, json!({"enabled": false}));
    }

    #[test]
    fn replay_outcome_accepts_bare_ack() {
        let outcome: ReplayOutcome = serde_json::from_value(json!({"ok": true})).unwrap();
        assert!(outcome.ok);
        assert!(outcome.response_code.is_none());
    }

    #[test]
    fn error_detail_text() {
        let plain: ErrorResponse = serde_json::from_value(json!({"detail": "Task not found"})).unwrap();
        assert_eq!(plain.detail_text().as_deref(), Some("Task not found"));

        let structured: ErrorResponse =
            serde_json::from_value(json!({"detail": [{"msg": "bad method"}]})).unwrap();
        assert_eq!(structured.detail_text().as_deref(), Some(r#"[{"msg":"bad method"}]"#));

        let missing: ErrorResponse = serde_json::from_value(json!({})).unwrap();
        assert!(missing.detail_text().is_none());
    }

    #[test]
    fn method_parses_only_known_verbs() {
        assert_eq!("PATCH".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("OPTIONS".parse::<HttpMethod>().is_err());
        assert!("post".parse::<HttpMethod>().is_err());
    }
}
