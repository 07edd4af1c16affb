use std::time::Duration;

/// Retry a visibility probe until it reports true or `attempts` runs out.
///
/// Pauses grow linearly, the wait after attempt `n` is `n * step`. No pause
/// follows the last attempt. Returns whether the probe ever succeeded.
pub async fn poll_until(attempts: u32, step: Duration, mut probe: impl FnMut() -> bool) -> bool {
    for attempt in 1..=attempts {
        if probe() {
            return true;
        }
        if attempt < attempts {
            tokio::time::sleep(step * attempt).await;
        }
    }
    false
}
