//! One full run: serve, launch, capture, navigate, assert, tear down.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::browser::{BrowserSession, ChromePage};
use crate::capture;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::pipeline::{self, PipelineOutcome};
use crate::report::RunOutcome;
use crate::server;

/// Execute one run. The server and browser are both released before this
/// returns, whatever the outcome.
pub async fn run(config: &HarnessConfig) -> RunOutcome {
    tracing::info!("📦 Starting HTTP server on port {}...", config.port);
    let mut server = match server::start(&config.root, &config.host, config.port).await {
        Ok(server) => server,
        Err(e) => {
            tracing::debug!("Server start failed: {}", e);
            return RunOutcome::Aborted(e);
        }
    };

    if !server::await_ready(&mut server, config.ready_timeout).await {
        let err = HarnessError::ServerNotReady {
            addr: server.addr(),
            timeout: config.ready_timeout,
        };
        tracing::debug!("Server at {} never became ready", server.addr());
        server.shutdown().await;
        return RunOutcome::Aborted(err);
    }
    tracing::info!("✅ Server started successfully ({})", server.root().display());

    let url = config.target_url(server.port());
    let outcome = run_browser(config, &url).await;

    server.shutdown().await;
    outcome
}

async fn run_browser(config: &HarnessConfig, url: &str) -> RunOutcome {
    tracing::info!("🌐 Launching browser...");
    let mut session = match BrowserSession::launch(config.headless).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!("Launch failed: {}", e);
            return RunOutcome::Aborted(e);
        }
    };

    let result = AssertUnwindSafe(drive(&mut session, config, url))
        .catch_unwind()
        .await;

    if let Err(e) = session.close().await {
        tracing::warn!("{}", e);
    }

    match result {
        Ok(Ok(outcome)) => RunOutcome::Completed(outcome),
        Ok(Err(e)) => RunOutcome::Aborted(e),
        Err(panic) => RunOutcome::Crashed(panic_message(panic.as_ref())),
    }
}

async fn drive(
    session: &mut BrowserSession,
    config: &HarnessConfig,
    url: &str,
) -> Result<PipelineOutcome> {
    // Listeners go on before navigation so load-time errors are kept.
    let capture = capture::attach(session.page())
        .await
        .map_err(|e| HarnessError::Launch(format!("failed to attach event capture: {:#}", e)))?;

    tracing::info!("📂 Loading: {}", url);
    session.navigate(url, config.navigation_timeout).await?;

    let driver = ChromePage::new(session.page().clone());
    // Stage one reads the log, so everything already emitted must be in it.
    if !capture::flush(&driver, &capture.log, config.capture_flush_timeout).await? {
        tracing::warn!(
            "Console capture did not settle within {:?}",
            config.capture_flush_timeout
        );
    }

    Ok(pipeline::run(&driver, &capture.log, config).await)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
