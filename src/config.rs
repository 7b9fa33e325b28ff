use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PAGE: &str = "roi-finder-test.html";
pub const TEST_MODE_QUERY: &str = "e2e_test_mode=true";

/// Component constructors the page must expose on `window`.
pub const REQUIRED_GLOBALS: [&str; 7] = [
    "ComponentLoader",
    "ComponentLoaderCompactModern",
    "CompactModernLayout",
    "PropertyHeroSection",
    "FinancialSummaryCompactModern",
    "InvestmentVerdictCompactModern",
    "MarketComparisonCompactModern",
];

/// Labelled selectors that must resolve after DOM-ready.
pub const REQUIRED_ELEMENTS: [(&str, &str); 7] = [
    ("Form", "#property-form"),
    ("Submit Button", r#"button[type="submit"]"#),
    ("Address Field", "#address"),
    ("City Field", "#city"),
    ("Price Field", "#price"),
    ("Sidebar", ".cm-sidebar"),
    ("Main Content", ".cm-main-content"),
];

/// Console-log substrings that mark the page's own init diagnostics.
pub const NOTABLE_LOG_MARKERS: [&str; 2] = ["[INIT]", "[TEST MODE]"];

/// The singleton the page publishes, and the constructors it must come from.
#[derive(Debug, Clone)]
pub struct SingletonSpec {
    pub name: String,
    pub base_ctor: String,
    pub specialized_ctor: String,
}

/// Sample submission for the property form.
#[derive(Debug, Clone)]
pub struct FormSpec {
    pub fields: Vec<(String, String)>,
    pub submit_selector: String,
    pub success_selector: String,
    pub settle: Duration,
}

#[derive(Debug, Clone)]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
    pub sidebar_selector: String,
    pub settle: Duration,
}

/// Everything one run needs. `Default` reproduces the fixed configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    pub page: String,
    pub headless: bool,
    pub ready_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Upper bound on waiting for in-flight console events after load.
    pub capture_flush_timeout: Duration,
    pub required_globals: Vec<String>,
    pub singleton: SingletonSpec,
    pub required_elements: Vec<(String, String)>,
    pub form: FormSpec,
    pub mobile: ViewportSpec,
    pub notable_markers: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            root: PathBuf::from("."),
            page: DEFAULT_PAGE.into(),
            headless: true,
            ready_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(30),
            capture_flush_timeout: Duration::from_secs(2),
            required_globals: REQUIRED_GLOBALS.iter().map(|s| s.to_string()).collect(),
            singleton: SingletonSpec {
                name: "componentLoader".into(),
                base_ctor: "ComponentLoader".into(),
                specialized_ctor: "ComponentLoaderCompactModern".into(),
            },
            required_elements: REQUIRED_ELEMENTS
                .iter()
                .map(|(label, sel)| (label.to_string(), sel.to_string()))
                .collect(),
            form: FormSpec {
                fields: vec![
                    ("#address".into(), "123 Test Street".into()),
                    ("#city".into(), "Test City".into()),
                    ("#price".into(), "500000".into()),
                ],
                submit_selector: r#"button[type="submit"]"#.into(),
                success_selector: "#results-container .cm-success".into(),
                settle: Duration::from_millis(1500),
            },
            mobile: ViewportSpec {
                width: 375,
                height: 667,
                sidebar_selector: ".cm-sidebar".into(),
                settle: Duration::from_millis(500),
            },
            notable_markers: NOTABLE_LOG_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HarnessConfig {
    /// URL of the page under test, including the test-mode query.
    pub fn target_url(&self, port: u16) -> String {
        let page = self.page.trim_start_matches('/');
        format!("http://{}:{}/{}?{}", self.host, port, page, TEST_MODE_QUERY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_url() {
        let config = HarnessConfig::default();
        assert_eq!(
            config.target_url(config.port),
            "http://localhost:8080/roi-finder-test.html?e2e_test_mode=true"
        );
    }

    #[test]
    fn test_target_url_uses_bound_port_and_strips_slash() {
        let config = HarnessConfig {
            page: "/nested/page.html".into(),
            ..Default::default()
        };
        assert_eq!(
            config.target_url(41234),
            "http://localhost:41234/nested/page.html?e2e_test_mode=true"
        );
    }

    #[test]
    fn test_default_tables_are_complete() {
        let config = HarnessConfig::default();
        assert_eq!(config.required_globals.len(), 7);
        assert_eq!(config.required_elements.len(), 7);
        assert_eq!(config.form.fields.len(), 3);
        assert_eq!(config.form.settle, Duration::from_millis(1500));
        assert_eq!((config.mobile.width, config.mobile.height), (375, 667));
    }
}
