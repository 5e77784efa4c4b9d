use super::models::Config;
use thiserror::Error;

/// Upper bound on `dispatch.max_attempts`
pub const MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("api.base_url must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("Page size must be positive: {field} = 0")]
    ZeroPageSize { field: &'static str },

    #[error("dispatch.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("dispatch.max_attempts must be at most {max}, got {got}")]
    TooManyAttempts { max: u32, got: u32 },

    #[error("api.request_timeout must be positive")]
    ZeroRequestTimeout,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_api(config)?;
    validate_pagination(config)?;
    validate_dispatch(config)?;
    Ok(())
}

fn validate_api(config: &Config) -> Result<(), ValidationError> {
    let base_url = config.api.base_url.trim();
    let lower = base_url.to_ascii_lowercase();
    let has_scheme = lower.starts_with("http://") || lower.starts_with("https://");

    if !has_scheme || reqwest::Url::parse(base_url).is_err() {
        return Err(ValidationError::InvalidBaseUrl(config.api.base_url.clone()));
    }

    if config.api.request_timeout.is_zero() {
        return Err(ValidationError::ZeroRequestTimeout);
    }

    Ok(())
}

fn validate_pagination(config: &Config) -> Result<(), ValidationError> {
    let limits = [
        ("pagination.tasks_limit", config.pagination.tasks_limit),
        ("pagination.runs_limit", config.pagination.runs_limit),
        ("pagination.dlq_limit", config.pagination.dlq_limit),
    ];

    for (field, value) in limits {
        if value == 0 {
            return Err(ValidationError::ZeroPageSize { field });
        }
    }

    Ok(())
}

fn validate_dispatch(config: &Config) -> Result<(), ValidationError> {
    match config.dispatch.max_attempts {
        0 => Err(ValidationError::ZeroAttempts),
        got if got > MAX_ATTEMPTS => Err(ValidationError::TooManyAttempts {
            max: MAX_ATTEMPTS,
            got,
        }),
        _ => Ok(()),
    }
}
