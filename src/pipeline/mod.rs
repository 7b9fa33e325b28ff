//! The ordered, fail-fast assertion stages run against a loaded page.

pub mod scripts;

use std::fmt;

use crate::browser::PageDriver;
use crate::capture::EventLog;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

use scripts::{ComponentPresenceReport, SingletonCheck};

/// At most this many captured errors are listed when stage one fails.
const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NoErrors,
    GlobalsPresent,
    SingletonType,
    ElementsPresent,
    FormSubmission,
    ResponsiveLayout,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::NoErrors,
        Stage::GlobalsPresent,
        Stage::SingletonType,
        Stage::ElementsPresent,
        Stage::FormSubmission,
        Stage::ResponsiveLayout,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Stage::NoErrors => "Checking for JavaScript errors",
            Stage::GlobalsPresent => "Checking component initialization",
            Stage::SingletonType => "Checking component loader instance",
            Stage::ElementsPresent => "Checking UI elements",
            Stage::FormSubmission => "Testing form interaction",
            Stage::ResponsiveLayout => "Testing mobile responsiveness",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionResult {
    Pass,
    PassWithWarning(String),
    Fail(String),
}

impl AssertionResult {
    pub fn is_fail(&self) -> bool {
        matches!(self, AssertionResult::Fail(_))
    }
}

/// What one stage concluded, plus its per-item trace lines.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub result: AssertionResult,
    pub details: Vec<String>,
}

impl StageReport {
    fn new(stage: Stage, result: AssertionResult, details: Vec<String>) -> Self {
        Self {
            stage,
            result,
            details,
        }
    }
}

/// Reports for every stage that ran. A run stops after the first `Fail`.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub stages: Vec<StageReport>,
    pub notable_logs: Vec<String>,
}

impl PipelineOutcome {
    pub fn passed(&self) -> bool {
        self.failure().is_none()
    }

    pub fn failure(&self) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.result.is_fail())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().filter_map(|s| match &s.result {
            AssertionResult::PassWithWarning(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

/// Run every stage in order against `driver`, halting at the first failure.
///
/// Driver errors inside a stage fail that stage; they never escape.
pub async fn run<D>(driver: &D, events: &EventLog, config: &HarnessConfig) -> PipelineOutcome
where
    D: PageDriver + ?Sized,
{
    let mut outcome = PipelineOutcome::default();

    for stage in Stage::ALL {
        tracing::debug!("Running stage: {}", stage);
        let report = match run_stage(stage, driver, events, config).await {
            Ok(report) => report,
            Err(e) => StageReport::new(stage, AssertionResult::Fail(e.to_string()), Vec::new()),
        };

        tracing::debug!("Stage {:?} finished: {:?}", stage, report.result);

        let failed = report.result.is_fail();
        outcome.stages.push(report);
        if failed {
            break;
        }
    }

    outcome.notable_logs = events
        .snapshot()
        .await
        .notable_logs(&config.notable_markers)
        .map(str::to_string)
        .collect();

    outcome
}

async fn run_stage<D>(
    stage: Stage,
    driver: &D,
    events: &EventLog,
    config: &HarnessConfig,
) -> Result<StageReport>
where
    D: PageDriver + ?Sized,
{
    match stage {
        Stage::NoErrors => Ok(check_no_errors(events).await),
        Stage::GlobalsPresent => check_globals(driver, config).await,
        Stage::SingletonType => check_singleton(driver, config).await,
        Stage::ElementsPresent => check_elements(driver, config).await,
        Stage::FormSubmission => check_form(driver, config).await,
        Stage::ResponsiveLayout => check_responsive(driver, config).await,
    }
}

async fn check_no_errors(events: &EventLog) -> StageReport {
    let snapshot = events.snapshot().await;
    let errors: Vec<&str> = snapshot.errors().collect();

    if errors.is_empty() {
        return StageReport::new(
            Stage::NoErrors,
            AssertionResult::Pass,
            vec!["No JavaScript errors detected".into()],
        );
    }

    let details = errors
        .iter()
        .take(MAX_REPORTED_ERRORS)
        .map(|e| format!("- {}", e))
        .collect();
    StageReport::new(
        Stage::NoErrors,
        AssertionResult::Fail(format!("Found {} console errors", errors.len())),
        details,
    )
}

async fn check_globals<D>(driver: &D, config: &HarnessConfig) -> Result<StageReport>
where
    D: PageDriver + ?Sized,
{
    let value = driver.evaluate(&scripts::globals_script(config)).await?;
    let report = ComponentPresenceReport::from_value(&value, config);

    let details = report
        .entries
        .iter()
        .map(|e| {
            let mark = if e.type_tag == scripts::UNDEFINED { "❌" } else { "✅" };
            format!("{} {}: {}", mark, e.name, e.type_tag)
        })
        .collect();

    let missing = report.missing_required();
    let result = if missing.is_empty() {
        AssertionResult::Pass
    } else {
        AssertionResult::Fail(format!(
            "Not all components loaded properly: {} undefined",
            missing.join(", ")
        ))
    };
    Ok(StageReport::new(Stage::GlobalsPresent, result, details))
}

async fn check_singleton<D>(driver: &D, config: &HarnessConfig) -> Result<StageReport>
where
    D: PageDriver + ?Sized,
{
    let singleton = &config.singleton;
    let value = driver.evaluate(&scripts::singleton_script(singleton)).await?;
    let check: SingletonCheck = serde_json::from_value(value).map_err(|e| {
        HarnessError::Evaluation(format!("unexpected component loader check result: {}", e))
    })?;

    let result = if !check.exists {
        AssertionResult::Fail(format!("Component loader `{}` not found", singleton.name))
    } else if !check.is_specialized {
        AssertionResult::Fail(format!(
            "Component loader is not a {} instance (found {}{})",
            singleton.specialized_ctor,
            check.class_name,
            if check.is_base {
                format!(", a plain {}", singleton.base_ctor)
            } else {
                String::new()
            }
        ))
    } else {
        AssertionResult::Pass
    };

    let details = if check.exists {
        vec![format!("Component loader initialized: {}", check.class_name)]
    } else {
        Vec::new()
    };
    Ok(StageReport::new(Stage::SingletonType, result, details))
}

async fn check_elements<D>(driver: &D, config: &HarnessConfig) -> Result<StageReport>
where
    D: PageDriver + ?Sized,
{
    let mut details = Vec::new();
    let mut missing = Vec::new();

    for (label, selector) in &config.required_elements {
        match driver.query_selector(selector).await? {
            Some(element) => details.push(format!("✅ {} <{}>", label, element.tag)),
            None => {
                details.push(format!("❌ {}", label));
                missing.push(format!("{} ({})", label, selector));
            }
        }
    }

    let result = if missing.is_empty() {
        AssertionResult::Pass
    } else {
        AssertionResult::Fail(format!("Not all UI elements present: {}", missing.join(", ")))
    };
    Ok(StageReport::new(Stage::ElementsPresent, result, details))
}

async fn check_form<D>(driver: &D, config: &HarnessConfig) -> Result<StageReport>
where
    D: PageDriver + ?Sized,
{
    let form = &config.form;
    for (selector, value) in &form.fields {
        driver.fill(selector, value).await?;
    }
    driver.click(&form.submit_selector).await?;

    // Poll instead of sleeping the whole settle window.
    let appeared = driver
        .wait_for_selector(&form.success_selector, form.settle)
        .await?;

    let result = if appeared {
        AssertionResult::Pass
    } else {
        AssertionResult::Fail(format!(
            "Form submission did not produce {} within {}ms",
            form.success_selector,
            form.settle.as_millis()
        ))
    };
    let details = if appeared {
        vec!["Form submission handled successfully".into()]
    } else {
        Vec::new()
    };
    Ok(StageReport::new(Stage::FormSubmission, result, details))
}

/// Advisory: a visible sidebar on mobile warns but never fails.
async fn check_responsive<D>(driver: &D, config: &HarnessConfig) -> Result<StageReport>
where
    D: PageDriver + ?Sized,
{
    let mobile = &config.mobile;
    driver.set_viewport(mobile.width, mobile.height).await?;
    driver.wait_ms(mobile.settle.as_millis() as u64).await;

    let report = if driver.is_visible(&mobile.sidebar_selector).await? {
        StageReport::new(
            Stage::ResponsiveLayout,
            AssertionResult::PassWithWarning(
                "Sidebar visible on mobile (should be hidden by default)".into(),
            ),
            Vec::new(),
        )
    } else {
        StageReport::new(
            Stage::ResponsiveLayout,
            AssertionResult::Pass,
            vec!["Sidebar hidden on mobile".into()],
        )
    };
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::browser::ElementInfo;
    use crate::capture::EventKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted page that records every call made against it.
    pub(crate) struct MockPage {
        config: HarnessConfig,
        pub globals: Value,
        pub singleton: Value,
        pub present: HashSet<String>,
        pub marker_after_submit: bool,
        pub sidebar_visible_on_mobile: bool,
        pub fail_evaluate: bool,
        pub fail_wait: bool,
        /// When set, `console.log("<token>")` scripts are echoed into this log.
        pub console: Option<EventLog>,
        submitted: Mutex<bool>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockPage {
        /// A page satisfying every required check.
        pub(crate) fn healthy(config: &HarnessConfig) -> Self {
            let mut globals = serde_json::Map::new();
            for name in &config.required_globals {
                globals.insert(name.clone(), json!("function"));
            }
            globals.insert(
                config.singleton.name.clone(),
                json!(config.singleton.specialized_ctor),
            );
            Self {
                config: config.clone(),
                globals: Value::Object(globals),
                singleton: json!({
                    "exists": true,
                    "isBase": true,
                    "isSpecialized": true,
                    "className": config.singleton.specialized_ctor,
                }),
                present: config
                    .required_elements
                    .iter()
                    .map(|(_, sel)| sel.clone())
                    .collect(),
                marker_after_submit: true,
                sidebar_visible_on_mobile: false,
                fail_evaluate: false,
                fail_wait: false,
                console: None,
                submitted: Mutex::new(false),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn called(&self, prefix: &str) -> bool {
            self.calls().iter().any(|c| c.starts_with(prefix))
        }
    }

    #[async_trait]
    impl PageDriver for MockPage {
        async fn evaluate(&self, script: &str) -> Result<Value> {
            self.record("evaluate".into());
            if self.fail_evaluate {
                return Err(HarnessError::Evaluation("ReferenceError: boom".into()));
            }
            if let Some(log) = &self.console {
                if let Some(arg) = script
                    .strip_prefix("console.log(")
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    let text: String = serde_json::from_str(arg).unwrap();
                    log.record(EventKind::ConsoleLog, text).await;
                    return Ok(Value::Null);
                }
            }
            if script == scripts::globals_script(&self.config) {
                Ok(self.globals.clone())
            } else if script == scripts::singleton_script(&self.config.singleton) {
                Ok(self.singleton.clone())
            } else {
                Ok(Value::Null)
            }
        }

        async fn query_selector(&self, selector: &str) -> Result<Option<ElementInfo>> {
            self.record(format!("query {}", selector));
            Ok(self
                .present
                .contains(selector)
                .then(|| ElementInfo { tag: "div".into() }))
        }

        async fn fill(&self, selector: &str, value: &str) -> Result<()> {
            self.record(format!("fill {}={}", selector, value));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<()> {
            self.record(format!("click {}", selector));
            *self.submitted.lock().unwrap() = true;
            Ok(())
        }

        async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
            self.record(format!("viewport {}x{}", width, height));
            Ok(())
        }

        async fn is_visible(&self, selector: &str) -> Result<bool> {
            self.record(format!("visible {}", selector));
            Ok(self.sidebar_visible_on_mobile)
        }

        async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
            self.record(format!("wait_for {} {}ms", selector, timeout.as_millis()));
            if self.fail_wait {
                return Err(HarnessError::Interaction {
                    selector: selector.to_string(),
                    reason: "Execution context was destroyed".into(),
                });
            }
            Ok(self.marker_after_submit && *self.submitted.lock().unwrap())
        }

        async fn wait_ms(&self, ms: u64) {
            self.record(format!("wait {}ms", ms));
        }
    }

    fn failed_stage(outcome: &PipelineOutcome) -> Option<Stage> {
        outcome.failure().map(|r| r.stage)
    }

    fn fail_message(outcome: &PipelineOutcome) -> String {
        match &outcome.failure().expect("expected a failure").result {
            AssertionResult::Fail(msg) => msg.clone(),
            other => panic!("not a failure: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_healthy_page_passes_every_stage() {
        let config = HarnessConfig::default();
        let page = MockPage::healthy(&config);
        let outcome = run(&page, &EventLog::new(), &config).await;

        assert!(outcome.passed());
        assert_eq!(outcome.stages.len(), 6);
        assert_eq!(outcome.warnings().count(), 0);

        let calls = page.calls();
        assert!(calls.contains(&"fill #address=123 Test Street".to_string()));
        assert!(calls.contains(&"fill #city=Test City".to_string()));
        assert!(calls.contains(&"fill #price=500000".to_string()));
        assert!(calls.contains(&"wait_for #results-container .cm-success 1500ms".to_string()));
        assert!(calls.contains(&"viewport 375x667".to_string()));
        assert!(calls.contains(&"wait 500ms".to_string()));
    }

    #[tokio::test]
    async fn test_base_type_singleton_fails_stage_three() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.singleton = json!({
            "exists": true,
            "isBase": true,
            "isSpecialized": false,
            "className": "ComponentLoader",
        });

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::SingletonType));
        let msg = fail_message(&outcome);
        assert!(msg.contains("not a ComponentLoaderCompactModern instance"), "{}", msg);
        assert!(msg.contains("ComponentLoader"), "{}", msg);
        assert!(!page.called("query"));
        assert!(!page.called("fill"));
    }

    #[tokio::test]
    async fn test_console_error_fails_before_any_page_call() {
        let config = HarnessConfig::default();
        let page = MockPage::healthy(&config);
        let events = EventLog::new();
        events
            .record(EventKind::ConsoleError, "Uncaught TypeError: x is undefined")
            .await;

        let outcome = run(&page, &events, &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::NoErrors));
        assert_eq!(outcome.stages.len(), 1);
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn test_only_first_five_errors_are_listed() {
        let config = HarnessConfig::default();
        let page = MockPage::healthy(&config);
        let events = EventLog::new();
        for i in 0..8 {
            events.record(EventKind::PageError, format!("error {}", i)).await;
        }

        let outcome = run(&page, &events, &config).await;
        let report = outcome.failure().unwrap();
        assert_eq!(fail_message(&outcome), "Found 8 console errors");
        assert_eq!(report.details.len(), 5);
        assert_eq!(report.details[0], "- error 0");
    }

    #[tokio::test]
    async fn test_visible_sidebar_on_mobile_only_warns() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.sidebar_visible_on_mobile = true;

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert!(outcome.passed());
        let warnings: Vec<&str> = outcome.warnings().collect();
        assert_eq!(warnings, vec!["Sidebar visible on mobile (should be hidden by default)"]);
    }

    #[tokio::test]
    async fn test_any_missing_global_fails_stage_two() {
        let config = HarnessConfig::default();
        for name in &config.required_globals {
            let mut page = MockPage::healthy(&config);
            page.globals[name.as_str()] = json!("undefined");

            let outcome = run(&page, &EventLog::new(), &config).await;
            assert_eq!(failed_stage(&outcome), Some(Stage::GlobalsPresent), "{}", name);
            assert!(fail_message(&outcome).contains(name.as_str()));
            assert!(!page.called("query"), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_missing_singleton_is_caught_by_type_stage() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.globals["componentLoader"] = json!("undefined");
        page.singleton = json!({ "exists": false });

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::SingletonType));
        assert_eq!(fail_message(&outcome), "Component loader `componentLoader` not found");
        assert!(matches!(outcome.stages[1].result, AssertionResult::Pass));
    }

    #[tokio::test]
    async fn test_any_missing_selector_fails_stage_four() {
        let config = HarnessConfig::default();
        for (label, selector) in &config.required_elements {
            let mut page = MockPage::healthy(&config);
            page.present.remove(selector);

            let outcome = run(&page, &EventLog::new(), &config).await;
            assert_eq!(failed_stage(&outcome), Some(Stage::ElementsPresent), "{}", selector);
            let msg = fail_message(&outcome);
            assert!(msg.contains(selector.as_str()), "{}", msg);
            assert!(msg.contains(label.as_str()), "{}", msg);
            assert!(!page.called("fill"), "form touched after {} went missing", selector);
        }
    }

    #[tokio::test]
    async fn test_missing_success_marker_stops_before_viewport() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.marker_after_submit = false;

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::FormSubmission));
        assert!(fail_message(&outcome).contains("#results-container .cm-success"));
        assert!(page.called("click"));
        assert!(!page.called("viewport"));
    }

    #[tokio::test]
    async fn test_evaluation_error_fails_the_stage() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.fail_evaluate = true;

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::GlobalsPresent));
        assert!(fail_message(&outcome).contains("ReferenceError: boom"));
        assert_eq!(outcome.stages.len(), 2);
    }

    #[tokio::test]
    async fn test_notable_logs_are_collected() {
        let config = HarnessConfig::default();
        let page = MockPage::healthy(&config);
        let events = EventLog::new();
        events.record(EventKind::ConsoleLog, "[INIT] loader ready").await;
        events.record(EventKind::ConsoleLog, "noise").await;

        let outcome = run(&page, &events, &config).await;
        assert_eq!(outcome.notable_logs, vec!["[INIT] loader ready".to_string()]);
    }

    #[tokio::test]
    async fn test_stages_run_in_declared_order() {
        let config = HarnessConfig::default();
        let page = MockPage::healthy(&config);
        let outcome = run(&page, &EventLog::new(), &config).await;
        let order: Vec<Stage> = outcome.stages.iter().map(|s| s.stage).collect();
        assert_eq!(order, Stage::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_malformed_singleton_result_is_an_evaluation_failure() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.singleton = json!("oops");

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::SingletonType));
        let msg = fail_message(&outcome);
        assert!(msg.starts_with("script evaluation failed"), "{}", msg);
        assert!(!msg.contains("not found"), "{}", msg);
    }

    #[tokio::test]
    async fn test_wait_error_fails_form_stage_with_its_cause() {
        let config = HarnessConfig::default();
        let mut page = MockPage::healthy(&config);
        page.fail_wait = true;

        let outcome = run(&page, &EventLog::new(), &config).await;
        assert_eq!(failed_stage(&outcome), Some(Stage::FormSubmission));
        let msg = fail_message(&outcome);
        assert!(msg.contains("Execution context was destroyed"), "{}", msg);
        assert!(!msg.contains("did not produce"), "{}", msg);
    }

    #[tokio::test]
    async fn test_element_details_name_the_matched_tag() {
        let config = HarnessConfig::default();
        let page = MockPage::healthy(&config);
        let outcome = run(&page, &EventLog::new(), &config).await;

        let elements = &outcome.stages[3];
        assert_eq!(elements.stage, Stage::ElementsPresent);
        assert_eq!(elements.details[0], "✅ Form <div>");
    }
}
