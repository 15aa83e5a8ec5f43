//! Helpers for running work in the background.

use std::future::Future;

use tracing::Instrument as _;

use crate::prelude::*;

/// Run `future` as its own task, and wait for it.
///
/// The task runs to completion even if the caller stops waiting. Use this for
/// work that must not be abandoned halfway, like a request/reply exchange over
/// a pipe.
pub async fn spawn_propagating_panics<F>(future: F) -> Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::spawn(future.in_current_span()).await {
        Ok(output) => Ok(output),
        // Propagate any panics from the background task.
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(anyhow!(err).context("background task was cancelled")),
    }
}

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics from
/// the background task.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    match tokio::task::spawn_blocking(move || span.in_scope(f)).await {
        Ok(output) => Ok(output),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(anyhow!(err).context("background task was cancelled")),
    }
}
