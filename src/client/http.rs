//! reqwest-backed implementation of [`ResourceApi`]

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Url, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::ApiError;
use super::models::{Ack, AnalyticsSummary, DeadLetterEntry, ErrorResponse, ReplayOutcome, Run, Task};
use super::utils::{join_path, normalize_base_url, parse_content_type};
use super::{Collection, Entity, MutationOp, MutationResponse, Page, Resource, ResourceApi, Result};
use crate::config::ApiConfig;
use crate::session::SessionProvider;

/// HTTP client for the task scheduler API
pub struct HttpResourceClient {
    client: Client,
    base_url: Url,
    session: Option<Arc<dyn SessionProvider>>,
}

impl HttpResourceClient {
    /// Create a new client; the transport's timeouts are the only timeouts
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout.as_duration())
            .timeout(config.request_timeout.as_duration())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url)?,
            session: None,
        })
    }

    /// Attach bearer credentials from the session provider to every request
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = join_path(&self.base_url, path)?;
        let mut request = self.client.request(method, url);

        if let Some(token) = self
            .session
            .as_ref()
            .and_then(|session| session.current())
            .and_then(|identity| identity.token)
        {
            request = request.bearer_auth(token);
        }

        Ok(request)
    }

    /// Send once (no retry) and decode the JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Request did not reach the server");
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        let url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body: Bytes = response.bytes().await?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorResponse>(&body)
                .ok()
                .and_then(|error| error.detail_text());
            debug!(%url, status = status.as_u16(), ?detail, "Request failed");
            return Err(ApiError::from_status(status, detail));
        }

        if let Some(content_type) = content_type {
            parse_content_type(&content_type)?;
        }

        debug!(%url, status = status.as_u16(), size = body.len(), "Request completed");

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ResourceApi for HttpResourceClient {
    async fn list(&self, resource: Resource, page: Page) -> Result<Collection> {
        let request = self
            .request(Method::GET, &resource.path())?
            .query(&[("limit", page.limit), ("offset", page.offset)]);

        match resource {
            Resource::Tasks => Ok(Collection::Tasks(self.send::<Vec<Task>>(request).await?)),
            Resource::Runs { .. } => Ok(Collection::Runs(self.send::<Vec<Run>>(request).await?)),
            Resource::DeadLetters { .. } => Ok(Collection::DeadLetters(
                self.send::<Vec<DeadLetterEntry>>(request).await?,
            )),
            Resource::Analytics => Err(ApiError::Unsupported("list analytics".into())),
        }
    }

    async fn get(&self, resource: Resource, id: Option<i64>) -> Result<Entity> {
        match (resource, id) {
            (Resource::Tasks, Some(id)) => {
                let request = self.request(Method::GET, &format!("tasks/{}", id))?;
                Ok(Entity::Task(self.send::<Task>(request).await?))
            }
            (Resource::Analytics, None) => {
                let request = self.request(Method::GET, &resource.path())?;
                Ok(Entity::Summary(self.send::<AnalyticsSummary>(request).await?))
            }
            (resource, id) => Err(ApiError::Unsupported(format!("get {} {:?}", resource, id))),
        }
    }

    async fn mutate(
        &self,
        resource: Resource,
        id: Option<i64>,
        op: MutationOp,
        payload: Value,
    ) -> Result<MutationResponse> {
        match (resource, id, op) {
            (Resource::Tasks, None, MutationOp::Create) => {
                let request = self.request(Method::POST, "tasks/")?.json(&payload);
                Ok(MutationResponse::Task(self.send::<Task>(request).await?))
            }
            (Resource::Tasks, Some(id), MutationOp::Update) => {
                let request = self
                    .request(Method::PATCH, &format!("tasks/{}", id))?
                    .json(&payload);
                Ok(MutationResponse::Task(self.send::<Task>(request).await?))
            }
            (Resource::Tasks, Some(id), MutationOp::Delete) => {
                let request = self.request(Method::DELETE, &format!("tasks/{}", id))?;
                Ok(MutationResponse::Ack(self.send::<Ack>(request).await?))
            }
            (Resource::DeadLetters { task_id }, Some(dlq_id), MutationOp::Replay) => {
                let request = self
                    .request(
                        Method::POST,
                        &format!("tasks/{}/dlq/{}/replay", task_id, dlq_id),
                    )?
                    .json(&payload);
                Ok(MutationResponse::Replay(
                    self.send::<ReplayOutcome>(request).await?,
                ))
            }
            (resource, id, op) => Err(ApiError::Unsupported(format!(
                "{} {} {:?}",
                op, resource, id
            ))),
        }
    }
}
