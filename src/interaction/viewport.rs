use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::page::Page;

use super::selector_to_js;

/// Widths below this are emulated as a mobile device.
const MOBILE_MAX_WIDTH: u32 = 768;

pub async fn set_viewport(page: &Page, width: u32, height: u32) -> Result<()> {
    let params = SetDeviceMetricsOverrideParams::builder()
        .width(width as i64)
        .height(height as i64)
        .device_scale_factor(1.0)
        .mobile(width < MOBILE_MAX_WIDTH)
        .build()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    page.execute(params)
        .await
        .context("Failed to override device metrics")?;
    Ok(())
}

/// Visible means attached, a non-empty bounding box, and not
/// `visibility: hidden`. A missing element is not visible.
pub async fn is_visible(page: &Page, selector: &str) -> Result<bool> {
    let js = format!(
        r#"(() => {{
            const el = {selector_js};
            if (!el) return false;
            const style = getComputedStyle(el);
            if (style.visibility === 'hidden' || style.display === 'none') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }})()"#,
        selector_js = selector_to_js(selector)?
    );

    let visible: bool = page
        .evaluate(js.as_str())
        .await
        .context("Failed to evaluate visibility")?
        .into_value()
        .context("Failed to parse visibility result")?;
    Ok(visible)
}
