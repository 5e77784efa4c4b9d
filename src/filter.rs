//! Client-side status filter for run and dead-letter pages.

use std::fmt;
use std::str::FromStr;

use crate::client::{DeadLetterEntry, Run, RunStatus};

/// Rows that carry a run outcome
pub trait HasStatus {
    fn status(&self) -> RunStatus;
}

impl HasStatus for Run {
    fn status(&self) -> RunStatus {
        self.status
    }
}

/// Dead letters only exist for failed deliveries
impl HasStatus for DeadLetterEntry {
    fn status(&self) -> RunStatus {
        RunStatus::Failure
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Success,
    Failure,
}

impl StatusFilter {
    pub fn matches(&self, status: RunStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Success => status == RunStatus::Success,
            StatusFilter::Failure => status == RunStatus::Failure,
        }
    }

    /// Narrow an already fetched page; never triggers a request
    pub fn apply<'a, T: HasStatus>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter().filter(|row| self.matches(row.status())).collect()
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Success => f.write_str("success"),
            StatusFilter::Failure => f.write_str("failure"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "success" => Ok(StatusFilter::Success),
            "failure" => Ok(StatusFilter::Failure),
            other => Err(format!(
                "unknown status '{}', expected all, success or failure",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn run(id: i64, status: RunStatus) -> Run {
        Run {
            id,
            task_id: 1,
            status,
            latency_ms: Some(10),
            response_code: None,
            error: None,
            created_at: Utc::now(),
            failure_class: None,
            failure_explanation: None,
        }
    }

    #[test]
    fn filters_runs_by_status() {
        let runs = vec![
            run(1, RunStatus::Success),
            run(2, RunStatus::Failure),
            run(3, RunStatus::Success),
        ];

        let ids = |filter: StatusFilter| -> Vec<i64> {
            filter.apply(&runs).iter().map(|run| run.id).collect()
        };
        assert_eq!(ids(StatusFilter::All), [1, 2, 3]);
        assert_eq!(ids(StatusFilter::Success), [1, 3]);
        assert_eq!(ids(StatusFilter::Failure), [2]);
    }

    #[test]
    fn dead_letters_are_failures() {
        let entries = vec![DeadLetterEntry {
            id: 7,
            task_id: 3,
            error: "HTTP 500".into(),
            created_at: Utc::now(),
        }];
        assert!(StatusFilter::Success.apply(&entries).is_empty());
        assert_eq!(StatusFilter::Failure.apply(&entries).len(), 1);
    }

    #[test]
    fn parses_cli_values() {
        assert_eq!("Failure".parse::<StatusFilter>(), Ok(StatusFilter::Failure));
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
