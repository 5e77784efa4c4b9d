use bon::Builder;
use thiserror::Error;

use super::models::{HeadersMap, HttpMethod, TaskCreate, TaskUpdate};

/// Client-side rejections raised before any request is sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please provide a valid http(s) URL")]
    InvalidUrl(String),
    #[error("method must be one of GET, POST, PUT, DELETE, PATCH (got '{0}')")]
    UnsupportedMethod(String),
    #[error("Headers must be valid JSON, e.g. {{\"X-Api-Key\":\"abc\"}}")]
    MalformedHeaders,
    #[error("Headers must be a JSON object of string values")]
    HeadersNotAnObject,
}

/// Raw task form input as typed by the user
#[derive(Debug, Clone, Default, Builder)]
pub struct TaskForm {
    #[builder(into)]
    pub url: String,
    #[builder(into)]
    pub method: String,
    /// Headers as JSON object text; blank means "none"
    #[builder(into)]
    pub headers: Option<String>,
    #[builder(into)]
    pub body: Option<String>,
    #[builder(into)]
    pub schedule_cron: Option<String>,
    #[builder(default = true)]
    pub enabled: bool,
}

impl TaskForm {
    /// Validate into a create payload
    pub fn to_create(&self) -> Result<TaskCreate, ValidationError> {
        Ok(TaskCreate {
            url: validate_url(&self.url)?,
            method: validate_method(&self.method)?,
            headers: parse_headers(self.headers.as_deref())?,
            body: non_blank(self.body.as_deref()),
            schedule_cron: non_blank(self.schedule_cron.as_deref()),
            enabled: self.enabled,
        })
    }

    /// Validate into a full-replacement update payload.
    ///
    /// Headers and body are write-only: leaving them blank keeps whatever
    /// the server already stores.
    pub fn to_update(&self) -> Result<TaskUpdate, ValidationError> {
        Ok(TaskUpdate {
            url: Some(validate_url(&self.url)?),
            method: Some(validate_method(&self.method)?),
            headers: parse_headers(self.headers.as_deref())?,
            body: non_blank(self.body.as_deref()),
            schedule_cron: non_blank(self.schedule_cron.as_deref()),
            enabled: Some(self.enabled),
        })
    }
}

pub fn validate_url(url: &str) -> Result<String, ValidationError> {
    let trimmed = url.trim();
    let scheme_end = trimmed.find("://").unwrap_or(0);
    let scheme = trimmed[..scheme_end].to_ascii_lowercase();

    if (scheme != "http" && scheme != "https") || trimmed.len() == scheme_end + 3 {
        return Err(ValidationError::InvalidUrl(url.to_string()));
    }

    Ok(trimmed.to_string())
}

pub fn validate_method(method: &str) -> Result<HttpMethod, ValidationError> {
    method
        .trim()
        .to_ascii_uppercase()
        .parse::<HttpMethod>()
        .map_err(|_| ValidationError::UnsupportedMethod(method.to_string()))
}

pub fn parse_headers(raw: Option<&str>) -> Result<Option<HeadersMap>, ValidationError> {
    let Some(raw) = raw.filter(|text| !text.trim().is_empty()) else {
        return Ok(None);
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| ValidationError::MalformedHeaders)?;

    let object = value.as_object().ok_or(ValidationError::HeadersNotAnObject)?;

    let mut headers = HeadersMap::new();
    for (name, value) in object {
        let text = value.as_str().ok_or(ValidationError::HeadersNotAnObject)?;
        headers.insert(name.clone(), text.to_string());
    }

    Ok(Some(headers))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
