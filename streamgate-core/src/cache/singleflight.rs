//! Coalescing of concurrent identical upstream calls
//!
//! Wraps the `async_singleflight` crate so that when many requests miss the
//! cache for the same key at once, exactly one of them calls upstream and the
//! rest await its result.

use std::future::Future;
use std::sync::Arc;

use crate::Error;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SingleFlightError {
    /// The leading task was dropped or panicked and no retry succeeded
    #[error("single-flight leader dropped before producing a result")]
    WorkerFailed,
    #[error("{0}")]
    Inner(Error),
}

impl From<SingleFlightError> for Error {
    fn from(err: SingleFlightError) -> Self {
        match err {
            SingleFlightError::WorkerFailed => Self::Internal(err.to_string()),
            SingleFlightError::Inner(inner) => inner,
        }
    }
}

/// Per-key in-flight marker shared by all callers.
///
/// The marker is released as soon as the leading call completes, whether it
/// succeeded or failed, so a failure is never replayed to later callers.
#[derive(Clone)]
pub struct SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    group: Arc<async_singleflight::Group<String, V, Error>>,
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            group: Arc::new(async_singleflight::Group::new()),
        }
    }

    /// Run `f` unless a call for `key` is already in flight, in which case
    /// wait for and share that call's result.
    pub async fn do_work<Fut>(&self, key: String, f: Fut) -> Result<V, SingleFlightError>
    where
        Fut: Future<Output = Result<V, Error>> + Send,
    {
        // Err(None) means the leader went away without a result.
        self.group.work(&key, f).await.map_err(|opt_err| match opt_err {
            Some(inner) => SingleFlightError::Inner(inner),
            None => SingleFlightError::WorkerFailed,
        })
    }
}

impl<V> Default for SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight").finish_non_exhaustive()
    }
}
