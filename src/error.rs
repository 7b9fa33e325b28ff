//! Error types for the harness.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the server, the browser session or the driver seam.
///
/// Server and launch failures abort a run outright. Navigation, evaluation
/// and interaction failures surface as a failing stage instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The static server could not bind its listener.
    #[error("failed to bind static server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The served root is missing or is not a directory.
    #[error("invalid served root {}: not a directory", path.display())]
    InvalidRoot { path: PathBuf },

    /// The server never accepted a connection within the readiness window.
    #[error("static server at {addr} was not ready after {timeout:?}")]
    ServerNotReady { addr: SocketAddr, timeout: Duration },

    /// Chrome could not be found or started.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// The browser did not shut down cleanly.
    #[error("failed to close browser: {0}")]
    Teardown(String),

    /// The page never reached DOM-ready.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// An evaluated script threw or returned something unusable.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// Filling or clicking an element failed.
    #[error("interaction with {selector} failed: {reason}")]
    Interaction { selector: String, reason: String },

    /// The viewport override was rejected.
    #[error("failed to set viewport to {width}x{height}: {reason}")]
    Viewport {
        width: u32,
        height: u32,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_name_what_failed() {
        let err = HarnessError::InvalidRoot { path: "/nope".into() };
        assert_eq!(err.to_string(), "invalid served root /nope: not a directory");
        let err = HarnessError::Teardown("connection closed".into());
        assert_eq!(err.to_string(), "failed to close browser: connection closed");
    }

    #[test]
    fn test_error_messages_name_the_target() {
        let err = HarnessError::Interaction {
            selector: "#city".into(),
            reason: "Element not found".into(),
        };
        assert_eq!(err.to_string(), "interaction with #city failed: Element not found");
    }
}
