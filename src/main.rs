use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use page_boot_check::config::{HarnessConfig, DEFAULT_PAGE, DEFAULT_PORT};
use page_boot_check::{harness, report};

/// page-boot-check: serve a page locally and verify it starts cleanly in headless Chrome
#[derive(Parser)]
#[command(name = "page-boot-check", version, about)]
struct Cli {
    /// Run Chrome with a visible window (default: headless)
    #[arg(long)]
    headed: bool,

    /// Port for the local static server
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory to serve (default: current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Page under test, relative to the served root
    #[arg(long, default_value = DEFAULT_PAGE)]
    page: String,
}

impl Cli {
    /// Overrides on top of the fixed configuration. Without flags the result
    /// is exactly `HarnessConfig::default()`.
    fn into_config(self) -> HarnessConfig {
        HarnessConfig {
            headless: !self.headed,
            port: self.port,
            root: self.root,
            page: self.page,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Log to stderr; stdout carries the verdict trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();

    let config = Cli::parse().into_config();

    tracing::info!("🧪 Page boot check (headless: {})", config.headless);

    let outcome = harness::run(&config).await;
    report::exit_code(report::report(&outcome))
}
