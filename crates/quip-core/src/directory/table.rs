//! Single-flight TTL cache around an asynchronous fetch.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ApiResult;

/// How a [`CachedRemoteTable`] answers once its value has expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Wait for the refresh and return the fresh value.
    #[default]
    AwaitFresh,
    /// Return the expired value immediately and refresh in the background.
    ServeStale,
}

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;
type SharedFetch<T> = Shared<BoxFuture<'static, ApiResult<Arc<T>>>>;

struct TableState<T> {
    value: Option<Arc<T>>,
    fetched_at: Option<Instant>,
    in_flight: Option<SharedFetch<T>>,
}

struct TableInner<T> {
    name: &'static str,
    ttl: Duration,
    policy: RefreshPolicy,
    fetch: FetchFn<T>,
    state: Mutex<TableState<T>>,
}

/// A TTL cache that never has more than one fetch outstanding.
///
/// Callers arriving while a fetch is in flight await that same fetch. A failed
/// fetch is handed to every waiter and leaves the previous value in place.
/// Cloning yields another handle to the same cache.
pub struct CachedRemoteTable<T> {
    inner: Arc<TableInner<T>>,
}

impl<T> Clone for CachedRemoteTable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for CachedRemoteTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedRemoteTable")
            .field("name", &self.inner.name)
            .field("ttl", &self.inner.ttl)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> CachedRemoteTable<T> {
    /// Creates an empty table around `fetch`.
    pub fn new<F, Fut>(name: &'static str, ttl: Duration, policy: RefreshPolicy, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(TableInner {
                name,
                ttl,
                policy,
                fetch: Arc::new(move || fetch().boxed()),
                state: Mutex::new(TableState {
                    value: None,
                    fetched_at: None,
                    in_flight: None,
                }),
            }),
        }
    }

    /// Returns the table's name, as used in logs.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Returns the refresh policy.
    pub fn policy(&self) -> RefreshPolicy {
        self.inner.policy
    }

    /// Returns the cached value, fetching first if it is missing or expired.
    pub async fn get(&self) -> ApiResult<Arc<T>> {
        let pending = {
            let mut state = self.inner.state.lock();
            let fresh = state
                .fetched_at
                .is_some_and(|at| at.elapsed() < self.inner.ttl);

            match state.value.clone() {
                Some(value) if fresh => return Ok(value),
                Some(stale) if self.inner.policy == RefreshPolicy::ServeStale => {
                    let (pending, started) = self.start_fetch(&mut state);
                    if started {
                        tokio::spawn(async move {
                            // Outcome is recorded (or logged) by the fetch itself.
                            let _ = pending.await;
                        });
                    }
                    return Ok(stale);
                }
                _ => self.start_fetch(&mut state).0,
            }
        };

        pending.await
    }

    /// Returns the cached value without fetching, fresh or not.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.inner.state.lock().value.clone()
    }

    /// Returns when the cached value was fetched.
    pub fn fetched_at(&self) -> Option<Instant> {
        self.inner.state.lock().fetched_at
    }

    /// Fetches now, regardless of freshness, and returns the new value.
    ///
    /// Joins the outstanding fetch if there is one.
    pub async fn refresh(&self) -> ApiResult<Arc<T>> {
        let pending = {
            let mut state = self.inner.state.lock();
            self.start_fetch(&mut state).0
        };
        pending.await
    }

    /// Drops the cached value; the next [`get`](Self::get) fetches.
    pub fn invalidate(&self) {
        let mut state = self.inner.state.lock();
        state.value = None;
        state.fetched_at = None;
    }

    fn start_fetch(&self, state: &mut TableState<T>) -> (SharedFetch<T>, bool) {
        if let Some(pending) = &state.in_flight {
            return (pending.clone(), false);
        }

        let fetch = (self.inner.fetch)();
        let table = Arc::downgrade(&self.inner);
        let name = self.inner.name;

        let pending = async move {
            let result = fetch.await.map(Arc::new);
            if let Some(inner) = Weak::upgrade(&table) {
                let mut state = inner.state.lock();
                state.in_flight = None;
                match &result {
                    Ok(value) => {
                        state.value = Some(Arc::clone(value));
                        state.fetched_at = Some(Instant::now());
                        debug!(table = name, "Table refreshed");
                    }
                    Err(e) => warn!(table = name, error = %e, "Table refresh failed"),
                }
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight = Some(pending.clone());
        (pending, true)
    }
}
