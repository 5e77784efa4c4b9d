use std::time::Duration;
use tracing::{debug, info, warn};

use super::Mutation;
use crate::cache::QueryCache;
use crate::client::{self, ApiError, MutationResponse};
use crate::config::DispatchConfig;

/// Sends mutations and invalidates the cache once the server accepts them
#[derive(Clone)]
pub struct MutationDispatcher {
    cache: QueryCache,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl MutationDispatcher {
    pub fn new(cache: QueryCache, config: &DispatchConfig) -> Self {
        Self {
            cache,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff.as_duration(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Validate, send, and on success mark the affected keys stale.
    ///
    /// On failure nothing in the cache changes.
    pub async fn dispatch(&self, mutation: Mutation) -> client::Result<MutationResponse> {
        let metrics = self.cache.metrics();

        let payload = match mutation.payload() {
            Ok(payload) => payload,
            Err(err) => {
                metrics.mutation_failed();
                debug!(%mutation, error = %err, "Mutation rejected before sending");
                return Err(err);
            }
        };

        match self.send_with_retry(&mutation, payload).await {
            Ok(response) => {
                let touched: usize = mutation
                    .invalidates()
                    .iter()
                    .map(|prefix| self.cache.invalidate(prefix))
                    .sum();
                metrics.mutation_succeeded();
                info!(%mutation, invalidated = touched, "Mutation applied");
                Ok(response)
            }
            Err(err) => {
                metrics.mutation_failed();
                warn!(%mutation, code = err.code(), error = %err, "Mutation failed");
                Err(err)
            }
        }
    }

    async fn send_with_retry(
        &self,
        mutation: &Mutation,
        payload: serde_json::Value,
    ) -> client::Result<MutationResponse> {
        let api = self.cache.api();
        let attempts_allowed = if mutation.is_idempotent() {
            self.max_attempts
        } else {
            1
        };
        let mut attempts = 0;

        loop {
            attempts += 1;

            let result = api
                .mutate(
                    mutation.resource(),
                    mutation.target(),
                    mutation.op(),
                    payload.clone(),
                )
                .await;

            match result {
                Ok(response) => {
                    if attempts > 1 {
                        debug!(%mutation, attempts, "Mutation succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err @ ApiError::Network(_)) if attempts < attempts_allowed => {
                    let backoff = backoff_for(self.retry_backoff, attempts);
                    warn!(%mutation, attempts, ?backoff, error = %err, "Mutation did not reach the server, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Delay before retry number `attempts`, doubling from `base`
fn backoff_for(base: Duration, attempts: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempts.saturating_sub(1)))
}
