//! Lazy record sequences for streamed exports
//!
//! Record sources hand the writer a [`RecordStream`] instead of a vector.
//! Stores that can only do bulk fetches are wrapped with [`deferred`], which
//! still defers the fetch until the header row is already on the wire; a
//! store with real incremental iteration can return its own stream.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{ExporterError, Result};

/// Fallible, lazily produced sequence of records.
pub type RecordStream<'a, R> = BoxStream<'a, Result<R>>;

/// Stream whose records come from one bulk fetch, run on first poll.
pub fn deferred<'a, R, F>(fetch: F) -> RecordStream<'a, R>
where
    R: Send + 'a,
    F: Future<Output = Result<Vec<R>>> + Send + 'a,
{
    stream::once(fetch)
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<R, ExporterError>)))
        .try_flatten()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_deferred_fetch_runs_on_first_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut records = deferred(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["a", "b"])
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(records.try_next().await.unwrap(), Some("a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(records.try_next().await.unwrap(), Some("b"));
        assert_eq!(records.try_next().await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deferred_error_surfaces() {
        let mut records = deferred::<u8, _>(async { Err(ExporterError::from("store down")) });
        assert!(records.try_next().await.is_err());
    }
}
