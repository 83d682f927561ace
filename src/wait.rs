//! Bounded poll-until-predicate primitive.
//!
//! Used wherever the browser gives no completion event: document readiness
//! after a navigation and detail panel content after a card click.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::{Result, WatchError};

/// Poll `probe` every `interval` until it yields `Some(value)` or `deadline` elapses.
///
/// The probe is always evaluated at least once, and once more right at the
/// deadline, so a condition that becomes true during the last sleep is not
/// reported as a timeout. Probe errors are returned immediately.
pub async fn await_condition<T, F, Fut>(interval: Duration, deadline: Duration, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let until = started + deadline;

    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= until {
            return Err(WatchError::Timeout(format!(
                "condition not met within {}ms",
                deadline.as_millis()
            )));
        }

        sleep(interval.min(until - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn returns_value_once_condition_holds() {
        let calls = Cell::new(0);
        let value = await_condition(Duration::from_millis(120), Duration::from_secs(7), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok((n >= 3).then_some(n)) }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_deadline() {
        let started = Instant::now();
        let result: Result<()> =
            await_condition(Duration::from_millis(120), Duration::from_secs(2), || async {
                Ok(None)
            })
            .await;

        assert!(matches!(result, Err(WatchError::Timeout(_))));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_millis(2200));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_short_circuits() {
        let result: Result<()> =
            await_condition(Duration::from_millis(10), Duration::from_secs(1), || async {
                Err(WatchError::TransportLost("closed".to_string()))
            })
            .await;

        assert!(matches!(result, Err(WatchError::TransportLost(_))));
    }
}
