use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::page::Page;

use super::selector_to_js;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll until `selector` resolves or `timeout` elapses.
/// Returns whether the element showed up.
pub async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<bool> {
    let check_js = format!(
        r#"(() => {{ const el = {selector_js}; return el !== null && el !== undefined; }})()"#,
        selector_js = selector_to_js(selector)?
    );

    let check_js = check_js.as_str();
    poll_until(timeout, || async move {
        let found: bool = page
            .evaluate(check_js)
            .await
            .with_context(|| format!("Failed to check for {}", selector))?
            .into_value()
            .context("Selector check returned a non-boolean")?;
        Ok::<_, anyhow::Error>(found)
    })
    .await
}

/// Run `check` every poll interval until it reports `true` or `timeout`
/// elapses. A failed check ends the wait with its error.
pub(crate) async fn poll_until<F, Fut>(timeout: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_poll_until_returns_once_check_passes() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let found = poll_until(Duration::from_secs(2), || async move {
            Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .await
        .unwrap();
        assert!(found);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out_as_false() {
        let found = poll_until(Duration::from_millis(150), || async { Ok(false) })
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_poll_until_surfaces_check_errors() {
        let err = poll_until(Duration::from_secs(2), || async {
            Err::<bool, _>(anyhow::anyhow!("Execution context was destroyed"))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Execution context was destroyed"));
    }
}
