//! Console and page-error capture.
//!
//! Listeners must be attached before the first navigation; anything the page
//! logs during initial script execution is otherwise gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::log::{
    EnableParams as LogEnableParams, EventEntryAdded, LogEntryLevel, LogEntrySource,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EnableParams, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::page::Page;
use futures::{stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser::PageDriver;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

static FLUSH_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ConsoleLog,
    ConsoleError,
    PageError,
}

/// One captured event. `ordinal` is its position in capture order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub kind: EventKind,
    pub text: String,
    pub ordinal: u64,
}

/// Append-only event log shared between the listener task and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, kind: EventKind, text: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        let ordinal = entries.len() as u64;
        entries.push(CapturedEvent {
            kind,
            text: text.into(),
            ordinal,
        });
    }

    /// Point-in-time copy; events recorded later are not reflected.
    pub async fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            events: self.entries.lock().await.clone(),
        }
    }

    /// Poll until a console log with exactly `text` has been recorded.
    pub async fn wait_for_log(&self, text: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let seen = self
                .entries
                .lock()
                .await
                .iter()
                .any(|e| e.kind == EventKind::ConsoleLog && e.text == text);
            if seen {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventSnapshot {
    events: Vec<CapturedEvent>,
}

impl EventSnapshot {
    pub fn events(&self) -> &[CapturedEvent] {
        &self.events
    }

    /// Console errors and uncaught page errors, in capture order.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::ConsoleError | EventKind::PageError))
            .map(|e| e.text.as_str())
    }

    /// Console logs containing any of `markers`.
    pub fn notable_logs<'a>(&'a self, markers: &'a [String]) -> impl Iterator<Item = &'a str> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::ConsoleLog)
            .filter(move |e| markers.iter().any(|m| e.text.contains(m.as_str())))
            .map(|e| e.text.as_str())
    }
}

/// The listener task feeding an [`EventLog`]. Aborted on drop.
pub struct Capture {
    pub log: EventLog,
    task: JoinHandle<()>,
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Raw CDP events from the three subscriptions, merged into one stream.
#[derive(Debug)]
enum PageEvent {
    Console(Arc<EventConsoleApiCalled>),
    Exception(Arc<EventExceptionThrown>),
    Log(Arc<EventEntryAdded>),
}

/// Subscribe to console messages, uncaught exceptions and browser log
/// entries on `page`.
///
/// A single task consumes all three subscriptions, so ordinals are assigned
/// by one writer.
pub async fn attach(page: &Page) -> Result<Capture> {
    page.execute(EnableParams::default())
        .await
        .context("Failed to enable Runtime domain")?;
    page.execute(LogEnableParams::default())
        .await
        .context("Failed to enable Log domain")?;

    let console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .context("Failed to subscribe to console events")?;
    let exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .context("Failed to subscribe to page errors")?;
    let entries = page
        .event_listener::<EventEntryAdded>()
        .await
        .context("Failed to subscribe to log entries")?;

    let mut events = stream::select(
        console.map(PageEvent::Console),
        stream::select(
            exceptions.map(PageEvent::Exception),
            entries.map(PageEvent::Log),
        ),
    );

    let log = EventLog::new();
    let sink = log.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Some((kind, text)) = classify(&event) {
                tracing::debug!("{:?}: {}", kind, text);
                sink.record(kind, text).await;
            }
        }
    });

    Ok(Capture { log, task })
}

/// Map a raw event to what the log keeps. Console types other than `log`
/// and `error`, non-error log entries and worker entries are dropped.
fn classify(event: &PageEvent) -> Option<(EventKind, String)> {
    match event {
        PageEvent::Console(call) => {
            let text = console_text(&call.args);
            match call.r#type {
                ConsoleApiCalledType::Error => Some((EventKind::ConsoleError, text)),
                ConsoleApiCalledType::Log => Some((EventKind::ConsoleLog, text)),
                ref other => {
                    tracing::trace!("Ignoring console.{:?}: {}", other, text);
                    None
                }
            }
        }
        PageEvent::Exception(thrown) => {
            let details = &thrown.exception_details;
            let text = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            Some((EventKind::PageError, text))
        }
        PageEvent::Log(added) => {
            let entry = &added.entry;
            if !matches!(entry.level, LogEntryLevel::Error)
                || matches!(entry.source, LogEntrySource::Worker)
            {
                return None;
            }
            Some((EventKind::ConsoleError, entry.text.clone()))
        }
    }
}

/// Make sure every event the page emitted so far has been recorded.
///
/// Logs a fresh token through the page and waits for it to come back out
/// of the listener task. Returns `false` if it did not show up in `timeout`.
pub async fn flush<D>(driver: &D, log: &EventLog, timeout: Duration) -> crate::error::Result<bool>
where
    D: PageDriver + ?Sized,
{
    let token = format!(
        "page-boot-check:flush:{}",
        FLUSH_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    driver.evaluate(&flush_script(&token)).await?;
    Ok(log.wait_for_log(&token, timeout).await)
}

fn flush_script(token: &str) -> String {
    format!(
        "console.log({})",
        serde_json::to_string(token).unwrap_or_else(|_| "\"\"".into())
    )
}

/// Render console arguments the way DevTools joins them.
fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match &arg.value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => arg.description.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
