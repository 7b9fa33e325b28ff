use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;

use super::launcher;
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Launched,
    Navigating,
    Loaded,
    Closed,
}

/// One Chrome process, one private profile, one page.
///
/// `close` consumes the session; callers must reach it on every exit path.
pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    page: Page,
    state: SessionState,
    // Profile directory lives as long as the browser.
    _profile: TempDir,
}

impl BrowserSession {
    /// Launch Chrome with a fresh profile and open a blank page.
    pub async fn launch(headless: bool) -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("page-boot-check-")
            .tempdir()
            .map_err(|e| HarnessError::Launch(format!("failed to create profile dir: {}", e)))?;

        let config = launcher::browser_config(headless, profile.path())
            .map_err(|e| HarnessError::Launch(format!("{:#}", e)))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarnessError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {
                // Drive the CDP connection
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                // Don't leave the process behind when the first page fails.
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(HarnessError::Launch(format!(
                    "failed to open initial page: {}",
                    e
                )));
            }
        };

        tracing::info!("Browser session started (headless: {})", headless);

        Ok(Self {
            browser,
            handler_task,
            page,
            state: SessionState::Launched,
            _profile: profile,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate and wait for the document to be parsed, bounded by `timeout`.
    pub async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.state = SessionState::Navigating;
        tracing::info!("Navigating to: {}", url);

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(HarnessError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(HarnessError::Navigation {
                    url: url.to_string(),
                    reason: format!("DOM-ready not reached within {:?}", timeout),
                })
            }
        }

        let ready_state: String = self
            .page
            .evaluate("document.readyState")
            .await
            .map_err(|e| HarnessError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .into_value()
            .unwrap_or_default();
        if ready_state == "loading" {
            return Err(HarnessError::Navigation {
                url: url.to_string(),
                reason: "document still loading after navigation".into(),
            });
        }

        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Close the browser and reap its process.
    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
        self.handler_task.abort();
        tracing::info!("Browser session closed (was {:?})", self.state);
        self.state = SessionState::Closed;

        closed
            .map(|_| ())
            .map_err(|e| HarnessError::Teardown(e.to_string()))
    }
}
