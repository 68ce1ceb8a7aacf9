use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Runs `f` over every item on its own task, at most `max_concurrency` at a time.
///
/// Waits for all tasks. Items whose task fails or panics are logged and left out;
/// the rest come back in input order. Dropping the returned future aborts every
/// task still running.
pub async fn run_isolated<T, R, E, F, Fut>(items: Vec<T>, max_concurrency: usize, f: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let work = f(item);
        tasks.spawn(async move {
            // Held until the work finishes; the semaphore is never closed
            let _permit = semaphore.acquire_owned().await;
            (index, work.await)
        });
    }

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut failed = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(value))) => slots[index] = Some(value),
            Ok((index, Err(e))) => {
                failed += 1;
                warn!("Dropping item {}: {}", index, e);
            }
            Err(e) if e.is_panic() => {
                failed += 1;
                error!("Worker task panicked: {}", e);
            }
            Err(e) => {
                failed += 1;
                warn!("Worker task cancelled: {}", e);
            }
        }
    }

    debug!("Task group finished: {} of {} items succeeded", total - failed, total);
    slots.into_iter().flatten().collect()
}
