//! HTTP client for the remote progress API.
//!
//! Idempotent requests (GET, PUT) are retried on 429, 5xx and transport
//! errors with exponential backoff. POST is sent once: a retried create could
//! leave two records for the same subject.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::catalog::InstrumentId;
use crate::models::progress::{NewProgress, ProgressPatch, ProgressRecord};
use crate::sync::store::ProgressStore;
use crate::sync::PersistenceError;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 200;

#[derive(Clone)]
pub struct HttpProgressStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpProgressStore {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request built by `build`, retrying when `idempotent`.
    /// Non-retryable responses (including 4xx) are returned to the caller.
    async fn send<F>(&self, build: F, idempotent: bool) -> Result<Response, PersistenceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = if idempotent { MAX_RETRIES } else { 1 };
        let mut last_error: Option<PersistenceError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // 200ms, 400ms
                let delay = Duration::from_millis(BASE_BACKOFF_MS * (1 << (attempt - 1)));
                warn!(
                    "Progress API attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.authorize(build()).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(PersistenceError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Progress API returned {}: {}", status, body);
                last_error = Some(PersistenceError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(PersistenceError::RetriesExhausted { attempts }))
    }
}

async fn read_record(response: Response) -> Result<ProgressRecord, PersistenceError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(PersistenceError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let record: ProgressRecord = response.json().await?;
    if record.id.is_none() {
        return Err(PersistenceError::MissingIdentity);
    }
    Ok(record)
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn fetch(
        &self,
        subject_id: &str,
        instrument: InstrumentId,
    ) -> Result<Option<ProgressRecord>, PersistenceError> {
        let url = self.url("/progress");
        let response = self
            .send(
                || {
                    self.client
                        .get(&url)
                        .query(&[("subjectId", subject_id), ("instrument", instrument.as_str())])
                },
                true,
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No stored progress for {subject_id} on {instrument}");
            return Ok(None);
        }
        read_record(response).await.map(Some)
    }

    async fn create(&self, draft: &NewProgress) -> Result<ProgressRecord, PersistenceError> {
        let url = self.url("/progress");
        let response = self.send(|| self.client.post(&url).json(draft), false).await?;
        let record = read_record(response).await?;
        debug!(
            "Created progress record {:?} for {}",
            record.id, draft.subject_id
        );
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord, PersistenceError> {
        let url = self.url(&format!("/progress/{id}"));
        let response = self.send(|| self.client.put(&url).json(patch), true).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        read_record(response).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde::Deserialize;
    use tokio::sync::Mutex;

    use super::*;
    use crate::models::progress::ProgressState;

    const TOKEN: &str = "test-token";

    #[derive(Default)]
    struct FakeApi {
        records: Mutex<Vec<ProgressRecord>>,
        posts: AtomicU32,
        post_failures: AtomicU32,
        put_failures: AtomicU32,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Lookup {
        subject_id: String,
        instrument: InstrumentId,
    }

    fn authorized(headers: &HeaderMap) -> Result<(), AxumStatus> {
        let expected = format!("Bearer {TOKEN}");
        match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => Ok(()),
            _ => Err(AxumStatus::UNAUTHORIZED),
        }
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn get_progress(
        State(api): State<Arc<FakeApi>>,
        headers: HeaderMap,
        Query(lookup): Query<Lookup>,
    ) -> Result<Json<ProgressRecord>, AxumStatus> {
        authorized(&headers)?;
        api.records
            .lock()
            .await
            .iter()
            .find(|r| r.subject_id == lookup.subject_id && r.instrument == lookup.instrument)
            .cloned()
            .map(Json)
            .ok_or(AxumStatus::NOT_FOUND)
    }

    async fn post_progress(
        State(api): State<Arc<FakeApi>>,
        headers: HeaderMap,
        Json(mut record): Json<ProgressRecord>,
    ) -> Result<Json<ProgressRecord>, AxumStatus> {
        authorized(&headers)?;
        let n = api.posts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&api.post_failures) {
            return Err(AxumStatus::SERVICE_UNAVAILABLE);
        }
        record.id = Some(format!("p-{n}"));
        api.records.lock().await.push(record.clone());
        Ok(Json(record))
    }

    async fn put_progress(
        State(api): State<Arc<FakeApi>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(patch): Json<ProgressPatch>,
    ) -> Result<Json<ProgressRecord>, AxumStatus> {
        authorized(&headers)?;
        if take_failure(&api.put_failures) {
            return Err(AxumStatus::SERVICE_UNAVAILABLE);
        }
        let mut records = api.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id.as_str()))
            .ok_or(AxumStatus::NOT_FOUND)?;
        patch.apply_to(&mut record.state);
        Ok(Json(record.clone()))
    }

    async fn spawn_fake(api: Arc<FakeApi>) -> HttpProgressStore {
        let router = Router::new()
            .route("/progress", get(get_progress).post(post_progress))
            .route("/progress/:id", put(put_progress))
            .with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        HttpProgressStore::new(
            &format!("http://{addr}/"),
            Some(TOKEN.to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn draft() -> NewProgress {
        NewProgress {
            subject_id: "user-7".to_string(),
            instrument: InstrumentId::Holland,
            state: ProgressState {
                current_index: 3,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_fetch_missing_record_is_none() {
        let store = spawn_fake(Arc::new(FakeApi::default())).await;
        let found = store.fetch("nobody", InstrumentId::Holland).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_then_fetch_round_trip() {
        let store = spawn_fake(Arc::new(FakeApi::default())).await;
        let created = store.create(&draft()).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("p-0"));
        let fetched = store
            .fetch("user-7", InstrumentId::Holland)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.state.current_index, 3);
        assert!(store
            .fetch("user-7", InstrumentId::Chaside)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_retries_server_errors() {
        let api = Arc::new(FakeApi::default());
        let store = spawn_fake(api.clone()).await;
        let id = store.create(&draft()).await.unwrap().id.unwrap();
        api.put_failures.store(2, Ordering::SeqCst);
        let patch = ProgressPatch {
            current_index: Some(8),
            ..Default::default()
        };
        let updated = store.update(&id, &patch).await.unwrap();
        assert_eq!(updated.state.current_index, 8);
    }

    #[tokio::test]
    async fn test_create_is_not_retried() {
        let api = Arc::new(FakeApi::default());
        let store = spawn_fake(api.clone()).await;
        api.post_failures.store(1, Ordering::SeqCst);
        let err = store.create(&draft()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Api { status: 503, .. }));
        assert_eq!(api.posts.load(Ordering::SeqCst), 1);
        assert!(api.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_record_is_not_found() {
        let store = spawn_fake(Arc::new(FakeApi::default())).await;
        let err = store
            .update("p-404", &ProgressPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(id) if id == "p-404"));
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let api = Arc::new(FakeApi::default());
        let authed = spawn_fake(api).await;
        let anonymous = HttpProgressStore {
            token: None,
            ..authed
        };
        let err = anonymous
            .fetch("user-7", InstrumentId::Holland)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Api { status: 401, .. }));
    }
}
