//! Thin view controllers over the shared cache.
//!
//! A view owns its pager and filter, turns them into a [`QueryKey`], and
//! reads through the cache. A view holds the key it shows as a cache
//! observer; when its parameters change, or the view goes away, it lets go
//! of that key, and the fetch is abandoned once no other view still shows it.
//! While a new window loads, the previous window's rows stay visible as a
//! placeholder.

use std::sync::Arc;

use crate::analytics::{self, LATENCY_BUCKET_WIDTH_MS, LatencyBucket};
use crate::cache::{QueryCache, QueryData, QueryError, QueryKey};
use crate::client::{
    self, AnalyticsSummary, DeadLetterEntry, MutationResponse, ReplayOutcome, Run, Task, TaskForm,
};
use crate::filter::{HasStatus, StatusFilter};
use crate::mutation::{Mutation, MutationDispatcher};
use crate::pagination::{PaginationError, Pager};

/// Row types a paged view can pull out of cached data
pub trait PageRow: Clone {
    fn rows(data: &QueryData) -> Option<&[Self]>;
}

impl PageRow for Task {
    fn rows(data: &QueryData) -> Option<&[Self]> {
        data.tasks()
    }
}

impl PageRow for Run {
    fn rows(data: &QueryData) -> Option<&[Self]> {
        data.runs()
    }
}

impl PageRow for DeadLetterEntry {
    fn rows(data: &QueryData) -> Option<&[Self]> {
        data.dead_letters()
    }
}

/// What a paged view renders right now
#[derive(Debug, Clone)]
pub struct ViewState<T> {
    pub rows: Vec<T>,
    /// Nothing to show yet, first fetch in progress
    pub loading: bool,
    pub fetching: bool,
    pub stale: bool,
    /// `rows` belong to the previous window
    pub placeholder: bool,
    /// User-facing text of the last read failure
    pub error: Option<String>,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Tasks,
    Runs(i64),
    DeadLetters(i64),
}

struct PagedQuery {
    cache: QueryCache,
    pager: Pager,
    scope: Scope,
    placeholder: Option<Arc<QueryData>>,
}

impl PagedQuery {
    fn new(cache: QueryCache, scope: Scope, pager: Pager) -> Self {
        let query = Self {
            cache,
            pager,
            scope,
            placeholder: None,
        };
        query.cache.retain(&query.key());
        query
    }

    fn key(&self) -> QueryKey {
        let page = self.pager.page();
        match self.scope {
            Scope::Tasks => QueryKey::Tasks { page },
            Scope::Runs(task_id) => QueryKey::Runs { task_id, page },
            Scope::DeadLetters(task_id) => QueryKey::DeadLetters { task_id, page },
        }
    }

    fn read<T: PageRow>(&mut self, keep: impl Fn(&T) -> bool) -> ViewState<T> {
        let snapshot = self.cache.read(&self.key());

        let (data, placeholder) = match &snapshot.data {
            Some(data) => {
                self.pager.observe(data.row_count());
                self.placeholder = Some(data.clone());
                (Some(data.clone()), false)
            }
            None => (self.placeholder.clone(), self.placeholder.is_some()),
        };

        let rows = data
            .as_deref()
            .and_then(T::rows)
            .map(|rows| rows.iter().filter(|row| keep(row)).cloned().collect::<Vec<T>>())
            .unwrap_or_default();

        ViewState {
            rows,
            loading: data.is_none() && snapshot.error.is_none(),
            fetching: snapshot.fetching,
            stale: snapshot.stale,
            placeholder,
            error: snapshot.error.as_ref().map(client::ApiError::user_message),
            has_next: self.pager.has_next(),
            has_prev: self.pager.has_prev(),
        }
    }

    async fn load(&mut self) -> Result<Arc<QueryData>, QueryError> {
        let data = self.cache.fetch(&self.key()).await?;
        self.pager.observe(data.row_count());
        self.placeholder = Some(data.clone());
        Ok(data)
    }

    fn refresh(&self) {
        self.cache.refetch(&self.key());
    }

    /// Apply a pager change, moving the observer to the new key if it moved
    fn change<R>(&mut self, apply: impl FnOnce(&mut Pager) -> R) -> R {
        let before = self.key();
        let result = apply(&mut self.pager);
        let after = self.key();
        if after != before {
            self.cache.retain(&after);
            self.cache.release(&before);
        }
        result
    }

    fn dismiss_error(&self) {
        self.cache.dismiss_error(&self.key());
    }
}

impl Drop for PagedQuery {
    fn drop(&mut self) {
        self.cache.release(&self.key());
    }
}

fn filtered<T: PageRow + HasStatus>(data: &QueryData, filter: StatusFilter) -> Vec<T> {
    T::rows(data)
        .map(|rows| filter.apply(rows).into_iter().cloned().collect())
        .unwrap_or_default()
}

pub struct TaskListView {
    query: PagedQuery,
    dispatcher: MutationDispatcher,
}

impl TaskListView {
    pub fn new(cache: QueryCache, dispatcher: MutationDispatcher, pager: Pager) -> Self {
        Self {
            query: PagedQuery::new(cache, Scope::Tasks, pager),
            dispatcher,
        }
    }

    pub fn key(&self) -> QueryKey {
        self.query.key()
    }

    pub fn read(&mut self) -> ViewState<Task> {
        self.query.read(|_| true)
    }

    pub async fn load(&mut self) -> Result<Vec<Task>, QueryError> {
        let data = self.query.load().await?;
        Ok(data.tasks().map(<[Task]>::to_vec).unwrap_or_default())
    }

    pub fn next(&mut self) -> bool {
        self.query.change(Pager::next)
    }

    pub fn prev(&mut self) -> bool {
        self.query.change(Pager::prev)
    }

    pub fn set_limit(&mut self, limit: usize) -> Result<(), PaginationError> {
        self.query.change(|pager| pager.set_limit(limit))
    }

    pub fn seek(&mut self, offset: usize) {
        self.query.change(|pager| pager.seek(offset))
    }

    pub fn refresh(&self) {
        self.query.refresh()
    }

    pub fn dismiss_error(&self) {
        self.query.dismiss_error()
    }

    /// Single task, served from the cache when fresh
    pub async fn task(&self, id: i64) -> Result<Task, QueryError> {
        let data = self.query.cache.fetch(&QueryKey::Task { id }).await?;
        data.task().cloned().ok_or_else(|| {
            QueryError::Request(client::ApiError::Decode(format!("no task in response for {}", id)))
        })
    }

    pub async fn create(&self, form: TaskForm) -> client::Result<Task> {
        expect_task(self.dispatcher.dispatch(Mutation::CreateTask(form)).await?)
    }

    pub async fn update(&self, id: i64, form: TaskForm) -> client::Result<Task> {
        expect_task(
            self.dispatcher
                .dispatch(Mutation::UpdateTask { id, form })
                .await?,
        )
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> client::Result<Task> {
        expect_task(
            self.dispatcher
                .dispatch(Mutation::SetEnabled { id, enabled })
                .await?,
        )
    }

    pub async fn delete(&self, id: i64) -> client::Result<()> {
        self.dispatcher.dispatch(Mutation::DeleteTask { id }).await?;
        Ok(())
    }
}

fn expect_task(response: MutationResponse) -> client::Result<Task> {
    match response {
        MutationResponse::Task(task) => Ok(task),
        other => Err(client::ApiError::Decode(format!(
            "expected a task, got {:?}",
            other
        ))),
    }
}

pub struct RunHistoryView {
    query: PagedQuery,
    task_id: i64,
    filter: StatusFilter,
}

impl RunHistoryView {
    pub fn new(cache: QueryCache, task_id: i64, pager: Pager) -> Self {
        Self {
            query: PagedQuery::new(cache, Scope::Runs(task_id), pager),
            task_id,
            filter: StatusFilter::All,
        }
    }

    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    pub fn key(&self) -> QueryKey {
        self.query.key()
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// Narrows the rows shown; the cached page and window stay as they are
    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    pub fn read(&mut self) -> ViewState<Run> {
        let filter = self.filter;
        self.query.read(move |run: &Run| filter.matches(run.status()))
    }

    /// Fetch the current window and return the rows passing the filter
    pub async fn load(&mut self) -> Result<Vec<Run>, QueryError> {
        let data = self.query.load().await?;
        Ok(filtered(&data, self.filter))
    }

    /// Latency histogram of the rows currently shown
    pub fn histogram(&mut self) -> Vec<LatencyBucket> {
        analytics::latency_histogram(&self.read().rows, LATENCY_BUCKET_WIDTH_MS)
    }

    /// Totals of the rows currently shown
    pub fn stats(&mut self) -> AnalyticsSummary {
        analytics::page_stats(&self.read().rows)
    }

    pub fn next(&mut self) -> bool {
        self.query.change(Pager::next)
    }

    pub fn prev(&mut self) -> bool {
        self.query.change(Pager::prev)
    }

    pub fn set_limit(&mut self, limit: usize) -> Result<(), PaginationError> {
        self.query.change(|pager| pager.set_limit(limit))
    }

    pub fn seek(&mut self, offset: usize) {
        self.query.change(|pager| pager.seek(offset))
    }

    pub fn refresh(&self) {
        self.query.refresh()
    }

    pub fn dismiss_error(&self) {
        self.query.dismiss_error()
    }
}

pub struct DeadLetterView {
    query: PagedQuery,
    dispatcher: MutationDispatcher,
    task_id: i64,
    filter: StatusFilter,
}

impl DeadLetterView {
    pub fn new(
        cache: QueryCache,
        dispatcher: MutationDispatcher,
        task_id: i64,
        pager: Pager,
    ) -> Self {
        Self {
            query: PagedQuery::new(cache, Scope::DeadLetters(task_id), pager),
            dispatcher,
            task_id,
            filter: StatusFilter::All,
        }
    }

    pub fn key(&self) -> QueryKey {
        self.query.key()
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// Narrows the rows shown; the cached page and window stay as they are
    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    pub fn read(&mut self) -> ViewState<DeadLetterEntry> {
        let filter = self.filter;
        self.query
            .read(move |entry: &DeadLetterEntry| filter.matches(entry.status()))
    }

    pub async fn load(&mut self) -> Result<Vec<DeadLetterEntry>, QueryError> {
        let data = self.query.load().await?;
        Ok(filtered(&data, self.filter))
    }

    pub fn next(&mut self) -> bool {
        self.query.change(Pager::next)
    }

    pub fn prev(&mut self) -> bool {
        self.query.change(Pager::prev)
    }

    pub fn seek(&mut self, offset: usize) {
        self.query.change(|pager| pager.seek(offset))
    }

    pub fn set_limit(&mut self, limit: usize) -> Result<(), PaginationError> {
        self.query.change(|pager| pager.set_limit(limit))
    }

    pub fn refresh(&self) {
        self.query.refresh()
    }

    pub fn dismiss_error(&self) {
        self.query.dismiss_error()
    }

    /// Re-deliver one dead letter; the outcome is whatever the server reports
    pub async fn replay(&self, dlq_id: i64) -> client::Result<ReplayOutcome> {
        let response = self
            .dispatcher
            .dispatch(Mutation::ReplayDeadLetter {
                task_id: self.task_id,
                dlq_id,
            })
            .await?;

        match response {
            MutationResponse::Replay(outcome) => Ok(outcome),
            MutationResponse::Ack(ack) => Ok(ReplayOutcome {
                ok: ack.ok,
                response_code: None,
                error: None,
                latency_ms: None,
            }),
            other => Err(client::ApiError::Decode(format!(
                "expected a replay outcome, got {:?}",
                other
            ))),
        }
    }
}

pub struct AnalyticsView {
    cache: QueryCache,
}

impl AnalyticsView {
    pub fn new(cache: QueryCache) -> Self {
        cache.retain(&QueryKey::AnalyticsSummary);
        Self { cache }
    }

    /// Cached summary, if any; starts a refresh when stale
    pub fn read(&self) -> Option<AnalyticsSummary> {
        self.cache
            .read(&QueryKey::AnalyticsSummary)
            .data
            .and_then(|data| data.summary().cloned())
    }

    pub async fn load(&self) -> Result<AnalyticsSummary, QueryError> {
        let data = self.cache.fetch(&QueryKey::AnalyticsSummary).await?;
        data.summary().cloned().ok_or_else(|| {
            QueryError::Request(client::ApiError::Decode("no summary in response".into()))
        })
    }

    pub fn refresh(&self) {
        self.cache.refetch(&QueryKey::AnalyticsSummary);
    }
}

impl Drop for AnalyticsView {
    fn drop(&mut self) {
        self.cache.release(&QueryKey::AnalyticsSummary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Page, RunStatus};
    use crate::config::DispatchConfig;
    use crate::testing::{FakeApi, wait_until};
    use std::time::Duration;

    fn setup() -> (Arc<FakeApi>, QueryCache, MutationDispatcher) {
        let api = Arc::new(FakeApi::new());
        let cache = QueryCache::new(api.clone(), Duration::from_secs(3600));
        let dispatcher = MutationDispatcher::new(cache.clone(), &DispatchConfig::default());
        (api, cache, dispatcher)
    }

    #[tokio::test]
    async fn task_list_reads_then_settles() {
        let (api, cache, dispatcher) = setup();
        api.seed_task("https://a.test", true);
        let mut view = TaskListView::new(cache, dispatcher, Pager::new(50).unwrap());

        let first = view.read();
        assert!(first.loading);
        assert!(first.rows.is_empty());

        view.load().await.unwrap();
        let settled = view.read();
        assert!(!settled.loading);
        assert_eq!(settled.rows.len(), 1);
        assert!(!settled.has_next);
    }

    #[tokio::test]
    async fn paging_cancels_the_abandoned_key() {
        let (api, cache, dispatcher) = setup();
        for i in 0..3 {
            api.seed_task(&format!("https://{}.test", i), true);
        }
        let mut view = TaskListView::new(cache.clone(), dispatcher, Pager::new(2).unwrap());
        view.load().await.unwrap();
        assert!(view.read().has_next);

        let _gate = api.hold_next_read();
        assert!(view.next());
        let pending = view.read();
        assert!(pending.placeholder);
        assert_eq!(pending.rows.len(), 2);
        let second_page = view.key();
        wait_until(|| api.read_calls() == 2).await;

        view.prev();
        assert!(!cache.peek(&second_page).unwrap().fetching);
        assert_eq!(view.key(), QueryKey::Tasks { page: Page::new(2, 0) });
    }

    #[tokio::test]
    async fn short_page_blocks_next() {
        let (api, cache, dispatcher) = setup();
        api.seed_task("https://a.test", true);
        let mut view = TaskListView::new(cache, dispatcher, Pager::new(2).unwrap());

        view.load().await.unwrap();
        assert!(!view.next());
        assert_eq!(view.key(), QueryKey::Tasks { page: Page::new(2, 0) });
    }

    #[tokio::test]
    async fn run_filter_does_not_refetch() {
        let (api, cache, _dispatcher) = setup();
        let task = api.seed_task("https://a.test", true);
        api.seed_run(task.id, RunStatus::Success, 120);
        api.seed_run(task.id, RunStatus::Failure, 450);
        api.seed_run(task.id, RunStatus::Failure, 470);

        let mut view = RunHistoryView::new(cache, task.id, Pager::new(100).unwrap());
        assert_eq!(view.load().await.unwrap().len(), 3);

        view.set_filter(StatusFilter::Failure);
        let state = view.read();
        assert_eq!(state.rows.len(), 2);
        assert_eq!(view.key().to_string(), format!("runs:{}:limit=100:offset=0", task.id));

        let buckets = view.histogram();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].label(), "400-599ms");
        assert_eq!(buckets[0].count, 2);
        assert_eq!(view.stats().failures, 2);
        assert_eq!(api.read_calls(), 1);
    }

    #[tokio::test]
    async fn read_error_keeps_rows_visible() {
        let (api, cache, _dispatcher) = setup();
        let task = api.seed_task("https://a.test", true);
        api.seed_run(task.id, RunStatus::Success, 120);
        let mut view = RunHistoryView::new(cache.clone(), task.id, Pager::new(100).unwrap());
        view.load().await.unwrap();

        api.fail_next_read(client::ApiError::Network("offline".into()));
        view.refresh();
        wait_until(|| cache.metrics().snapshot().fetches_failed == 1).await;

        let state = view.read();
        assert_eq!(state.rows.len(), 1);
        assert_eq!(
            state.error.as_deref(),
            Some("Could not reach the server. Check your connection and retry.")
        );

        view.dismiss_error();
        assert!(view.read().error.is_none());
    }

    #[tokio::test]
    async fn replay_refreshes_dead_letters() {
        let (api, cache, dispatcher) = setup();
        let task = api.seed_task("https://a.test", true);
        let dead = api.seed_dead_letter(task.id, "HTTP 502");
        let mut view = DeadLetterView::new(cache, dispatcher, task.id, Pager::new(100).unwrap());
        assert_eq!(view.load().await.unwrap().len(), 1);

        let outcome = view.replay(dead.id).await.unwrap();
        assert!(outcome.ok);
        assert!(view.read().stale);
        assert!(view.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropping_a_view_cancels_its_fetch() {
        let (api, cache, _dispatcher) = setup();
        let _gate = api.hold_next_read();
        let view = AnalyticsView::new(cache.clone());

        assert!(view.read().is_none());
        wait_until(|| api.read_calls() == 1).await;
        drop(view);

        let snapshot = cache.peek(&QueryKey::AnalyticsSummary).unwrap();
        assert!(!snapshot.fetching);
    }

    #[tokio::test]
    async fn dead_letter_filter_narrows_without_refetch() {
        let (api, cache, dispatcher) = setup();
        let task = api.seed_task("https://a.test", true);
        api.seed_dead_letter(task.id, "HTTP 502");
        api.seed_dead_letter(task.id, "timeout");
        let mut view = DeadLetterView::new(cache, dispatcher, task.id, Pager::new(100).unwrap());
        assert_eq!(view.load().await.unwrap().len(), 2);

        view.set_filter(StatusFilter::Success);
        assert!(view.read().rows.is_empty());
        assert!(view.load().await.unwrap().is_empty());

        view.set_filter(StatusFilter::Failure);
        assert_eq!(view.read().rows.len(), 2);
        assert_eq!(api.read_calls(), 1);
    }

    #[tokio::test]
    async fn leaving_view_keeps_fetch_shared_with_another() {
        let (api, cache, _dispatcher) = setup();
        let task = api.seed_task("https://a.test", true);
        api.seed_run(task.id, RunStatus::Success, 120);
        let gate = api.hold_next_read();

        let mut first = RunHistoryView::new(cache.clone(), task.id, Pager::new(100).unwrap());
        let mut second = RunHistoryView::new(cache.clone(), task.id, Pager::new(100).unwrap());
        assert!(first.read().loading);
        wait_until(|| api.read_calls() == 1).await;

        let (rows, _) = tokio::join!(second.load(), async {
            tokio::task::yield_now().await;
            drop(first);
            gate.send(()).unwrap();
        });

        assert_eq!(rows.unwrap().len(), 1);
        assert_eq!(api.read_calls(), 1);
        assert_eq!(cache.observers(&second.key()), 1);
    }
}
