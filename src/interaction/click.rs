use anyhow::{Context, Result};
use chromiumoxide::page::Page;

use super::selector_to_js;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMethod {
    MouseEvents,
    JsClick,
}

/// Hybrid click strategy:
/// 1. Resolve selector to element
/// 2. Scroll into view
/// 3. Check visibility and obstruction
/// 4. Mouse event sequence if visible, bare `el.click()` otherwise
pub async fn hybrid_click(page: &Page, selector: &str) -> Result<ClickMethod> {
    let selector_js = selector_to_js(selector)?;

    let check_js = format!(
        r#"(() => {{
            const el = {selector_js};
            if (!el) return {{ error: 'Element not found: ' + {sel_str} }};

            el.scrollIntoView({{ block: 'center', inline: 'center', behavior: 'instant' }});

            const rect = el.getBoundingClientRect();
            const centerX = rect.left + rect.width / 2;
            const centerY = rect.top + rect.height / 2;

            const style = getComputedStyle(el);
            if (rect.width === 0 || rect.height === 0 ||
                style.display === 'none' || style.visibility === 'hidden') {{
                return {{ visible: false }};
            }}

            const topEl = document.elementFromPoint(centerX, centerY);
            const unobscured = !!topEl && (el === topEl || el.contains(topEl) || topEl.contains(el));
            return {{ visible: true, unobscured }};
        }})()"#,
        selector_js = selector_js,
        sel_str = serde_json::to_string(selector)?
    );

    let check: serde_json::Value = page
        .evaluate(check_js.as_str())
        .await
        .context("Failed to evaluate click check")?
        .into_value()
        .context("Failed to parse click check result")?;

    if let Some(error) = check.get("error").and_then(|e| e.as_str()) {
        anyhow::bail!("{}", error);
    }

    let visible = check["visible"].as_bool().unwrap_or(false);
    let unobscured = check["unobscured"].as_bool().unwrap_or(false);

    // Let scroll/layout settle
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    if visible && unobscured {
        let click_js = format!(
            r#"(() => {{
                const el = {selector_js};
                const rect = el.getBoundingClientRect();
                const opts = {{
                    bubbles: true, cancelable: true, button: 0,
                    clientX: rect.left + rect.width / 2,
                    clientY: rect.top + rect.height / 2
                }};
                el.dispatchEvent(new MouseEvent('mousemove', opts));
                el.dispatchEvent(new MouseEvent('mousedown', opts));
                el.dispatchEvent(new MouseEvent('mouseup', opts));
                el.click();
                return true;
            }})()"#,
            selector_js = selector_js
        );

        page.evaluate(click_js.as_str())
            .await
            .context("Failed to dispatch mouse events")?;
        Ok(ClickMethod::MouseEvents)
    } else {
        let js_click = format!(
            r#"(() => {{
                const el = {selector_js};
                if (!el) throw new Error('Element not found');
                el.click();
                return true;
            }})()"#,
            selector_js = selector_js
        );

        page.evaluate(js_click.as_str())
            .await
            .context("Failed to JS click")?;
        Ok(ClickMethod::JsClick)
    }
}
