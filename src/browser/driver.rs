//! The page capabilities the assertion pipeline relies on.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::Page;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{HarnessError, Result};
use crate::interaction::{click, keyboard, selector_to_js, viewport, wait};

/// First element matched by a selector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementInfo {
    /// Lower-cased tag name.
    pub tag: String,
}

/// Operations against a loaded page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Evaluate `script` in page context and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementInfo>>;

    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()>;

    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Poll until `selector` resolves, giving up after `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Fixed settle delay for async UI work with no completion signal.
    async fn wait_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// [`PageDriver`] over a live chromiumoxide page.
#[derive(Clone)]
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

fn interaction_error(selector: &str, e: anyhow::Error) -> HarnessError {
    HarnessError::Interaction {
        selector: selector.to_string(),
        reason: format!("{:#}", e),
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| HarnessError::Evaluation(e.to_string()))?;
        Ok(result.into_value().unwrap_or(Value::Null))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementInfo>> {
        let js = format!(
            r#"(() => {{
                const el = {selector_js};
                if (!el) return null;
                return {{ tag: el.tagName.toLowerCase() }};
            }})()"#,
            selector_js = selector_to_js(selector).map_err(|e| interaction_error(selector, e))?
        );

        let value = self.evaluate(&js).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| HarnessError::Evaluation(format!("bad element info for {}: {}", selector, e)))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        keyboard::fill(&self.page, selector, value)
            .await
            .map_err(|e| interaction_error(selector, e))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let method = click::hybrid_click(&self.page, selector)
            .await
            .map_err(|e| interaction_error(selector, e))?;
        tracing::debug!("Clicked {} via {:?}", selector, method);
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        viewport::set_viewport(&self.page, width, height)
            .await
            .map_err(|e| HarnessError::Viewport {
                width,
                height,
                reason: format!("{:#}", e),
            })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        viewport::is_visible(&self.page, selector)
            .await
            .map_err(|e| interaction_error(selector, e))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        wait::wait_for_selector(&self.page, selector, timeout)
            .await
            .map_err(|e| interaction_error(selector, e))
    }
}
