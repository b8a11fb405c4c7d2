use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;

pub async fn wait_for<T, F, Fut>(description: &str, timeout: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut sleep_for = Duration::from_millis(10);

    loop {
        if Instant::now() >= deadline {
            anyhow::bail!("timeout waiting for {description}");
        }

        if let Some(value) = f().await.with_context(|| format!("poll {description}"))? {
            return Ok(value);
        }

        tokio::time::sleep(sleep_for).await;
        sleep_for = (sleep_for * 2).min(Duration::from_millis(250));
    }
}

/// Receives until `pick` accepts an event, skipping the rest.
pub async fn next_matching<E, T>(
    description: &str,
    timeout: Duration,
    events: &mut mpsc::Receiver<E>,
    mut pick: impl FnMut(E) -> Option<T>,
) -> Result<T> {
    tokio::time::timeout(timeout, async {
        while let Some(event) = events.recv().await {
            if let Some(found) = pick(event) {
                return Ok(found);
            }
        }
        anyhow::bail!("event stream closed waiting for {description}")
    })
    .await
    .with_context(|| format!("timeout waiting for {description}"))?
}
