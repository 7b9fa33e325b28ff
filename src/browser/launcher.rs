use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chromiumoxide::browser::BrowserConfig;

/// Window size before any viewport override.
pub const DESKTOP_WIDTH: u32 = 1280;
pub const DESKTOP_HEIGHT: u32 = 720;

/// Find the Chrome/Chromium binary on the current platform.
pub fn find_chrome_binary() -> Result<PathBuf> {
    let candidates = chrome_candidates();

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        tracing::debug!("Found Chrome at: {}", path.display());
        return Ok(path);
    }

    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium-browser",
        "chromium",
    ] {
        if let Ok(path) = which::which(name) {
            tracing::debug!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    bail!(
        "Could not find Chrome or Chromium. Searched:\n{}",
        candidates.join("\n")
    )
}

fn chrome_candidates() -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    #[cfg(target_os = "macos")]
    {
        candidates.extend([
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".into(),
            "/Applications/Chromium.app/Contents/MacOS/Chromium".into(),
        ]);
    }

    #[cfg(target_os = "linux")]
    {
        candidates.extend([
            "/usr/bin/google-chrome".into(),
            "/usr/bin/google-chrome-stable".into(),
            "/usr/bin/chromium-browser".into(),
            "/usr/bin/chromium".into(),
            "/snap/bin/chromium".into(),
        ]);
    }

    #[cfg(target_os = "windows")]
    {
        for var in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(base) = std::env::var(var) {
                candidates.push(format!("{}\\Google\\Chrome\\Application\\chrome.exe", base));
            }
        }
    }

    candidates
}

/// Chrome flags for a throwaway, quiet test profile.
pub fn harness_chrome_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--no-sandbox",
        "--disable-background-networking",
        "--disable-client-side-phishing-detection",
        "--disable-default-apps",
        "--disable-extensions",
        "--disable-hang-monitor",
        "--disable-popup-blocking",
        "--disable-sync",
        "--disable-translate",
        "--metrics-recording-only",
    ];

    if headless {
        args.push("--headless=new");
    }

    args
}

/// Build the launch config for an isolated profile under `profile_dir`.
pub fn browser_config(headless: bool, profile_dir: &Path) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(find_chrome_binary()?)
        .user_data_dir(profile_dir)
        .window_size(DESKTOP_WIDTH, DESKTOP_HEIGHT);

    if !headless {
        builder = builder.with_head();
    }
    for arg in harness_chrome_args(headless) {
        builder = builder.arg(arg);
    }

    builder.build().map_err(|e| anyhow::anyhow!("{}", e))
}
