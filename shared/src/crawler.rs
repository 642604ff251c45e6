use std::sync::atomic::{self, AtomicBool};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::pin_mut;
use futures_core::stream::Stream;
use futures_core::Future;
use futures_util::stream::StreamExt;
use tokio::signal;
use tokio::time::sleep;
use tokio_retry::RetryIf;

use crate::error::MainError;
use crate::retry::RetryPolicy;

fn cycles(limit: Option<u64>) -> impl Stream<Item = u64> {
    stream! {
        for i in 0..limit.unwrap_or(u64::MAX) {
            yield i;
        }
    }
}

/// Level-triggered polling loop.
///
/// Each cycle runs `f`, retrying transient errors according to `retry`, then
/// sleeps `delay` before the next cycle whatever the outcome. Cycle errors
/// are logged and swallowed. A slow cycle pushes the next one out, so a loop
/// never overlaps itself.
pub async fn poll<F, Fut>(
    name: &'static str,
    f: F,
    delay: Duration,
    retry: RetryPolicy,
) -> Result<(), MainError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), MainError>>,
{
    let must_exit = must_exit_handle();
    run_cycles(name, f, delay, retry, None, must_exit).await
}

/// Runs at most `limit` cycles. Used by tests and one-shot runs.
pub async fn poll_n<F, Fut>(
    name: &'static str,
    f: F,
    delay: Duration,
    retry: RetryPolicy,
    limit: u64,
) -> Result<(), MainError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), MainError>>,
{
    let must_exit = Arc::new(AtomicBool::new(false));
    run_cycles(name, f, delay, retry, Some(limit), must_exit).await
}

async fn run_cycles<F, Fut>(
    name: &'static str,
    f: F,
    delay: Duration,
    retry: RetryPolicy,
    limit: Option<u64>,
    must_exit: Arc<AtomicBool>,
) -> Result<(), MainError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), MainError>>,
{
    let s = cycles(limit);
    pin_mut!(s);

    while let Some(cycle) = s.next().await {
        if must_exit.load(atomic::Ordering::Relaxed) {
            break;
        }

        let result = RetryIf::spawn(
            retry.strategy(),
            || f(),
            |e: &MainError| {
                let retry = !must_exit.load(atomic::Ordering::Relaxed)
                    && e.is_transient();
                if retry {
                    tracing::warn!(loop_name = name, cycle, %e, "Retrying...");
                }
                retry
            },
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(loop_name = name, cycle, "Cycle done")
            }
            Err(MainError::NoAction) => {
                tracing::debug!(loop_name = name, cycle, "Nothing to do")
            }
            Err(MainError::DuplicateCycle) => tracing::warn!(
                loop_name = name,
                cycle,
                "Snapshot already persisted, skipping"
            ),
            Err(e) if e.is_transient() => tracing::error!(
                loop_name = name,
                cycle,
                attempts = retry.max_attempts,
                %e,
                "Retries exhausted, waiting for next cycle"
            ),
            Err(e) => {
                tracing::error!(loop_name = name, cycle, %e, "Cycle failed")
            }
        }

        if limit.is_some_and(|limit| cycle + 1 >= limit) {
            break;
        }
        sleep(delay).await;
    }

    Ok(())
}

fn must_exit_handle() -> Arc<AtomicBool> {
    let handle = Arc::new(AtomicBool::new(false));
    let task_handle = Arc::clone(&handle);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => task_handle.store(true, atomic::Ordering::Relaxed),
            Err(e) => tracing::error!("Error receiving interrupt signal: {e}"),
        }
    });
    handle
}
