use std::sync::Arc;

use crate::cache::QueryCache;
use crate::client::{self, HttpResourceClient, ResourceApi};
use crate::config::Config;
use crate::mutation::MutationDispatcher;
use crate::observability::Metrics;
use crate::pagination::{PaginationError, Pager};
use crate::session::{Identity, SessionProvider, StaticSession};
use crate::views::{AnalyticsView, DeadLetterView, RunHistoryView, TaskListView};

/// Everything a view needs: one cache, one dispatcher, shared counters
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: QueryCache,
    pub dispatcher: MutationDispatcher,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn ResourceApi>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let cache = QueryCache::from_config(api, &config.cache).with_metrics(metrics.clone());
        let dispatcher = MutationDispatcher::new(cache.clone(), &config.dispatch);

        Self {
            config: Arc::new(config),
            cache,
            dispatcher,
            metrics,
        }
    }

    /// Wire the HTTP client, authenticating with the configured token if any
    pub fn connect(config: Config) -> client::Result<Self> {
        let mut http = HttpResourceClient::new(&config.api)?;

        if let Some(token) = config.auth.token.clone() {
            let session: Arc<dyn SessionProvider> = Arc::new(StaticSession::new(Some(Identity {
                user: config.auth.user.clone().unwrap_or_else(|| "cli".to_string()),
                token: Some(token),
            })));
            http = http.with_session(session);
        }

        Ok(Self::new(config, Arc::new(http)))
    }

    pub fn task_list(&self) -> Result<TaskListView, PaginationError> {
        Ok(TaskListView::new(
            self.cache.clone(),
            self.dispatcher.clone(),
            Pager::new(self.config.pagination.tasks_limit)?,
        ))
    }

    pub fn run_history(&self, task_id: i64) -> Result<RunHistoryView, PaginationError> {
        Ok(RunHistoryView::new(
            self.cache.clone(),
            task_id,
            Pager::new(self.config.pagination.runs_limit)?,
        ))
    }

    pub fn dead_letters(&self, task_id: i64) -> Result<DeadLetterView, PaginationError> {
        Ok(DeadLetterView::new(
            self.cache.clone(),
            self.dispatcher.clone(),
            task_id,
            Pager::new(self.config.pagination.dlq_limit)?,
        ))
    }

    pub fn analytics(&self) -> AnalyticsView {
        AnalyticsView::new(self.cache.clone())
    }
}
