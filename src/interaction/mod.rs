pub mod click;
pub mod keyboard;
pub mod viewport;
pub mod wait;

/// JS expression resolving a CSS selector to its first element (or null).
pub fn selector_to_js(selector: &str) -> anyhow::Result<String> {
    Ok(format!(
        "document.querySelector({})",
        serde_json::to_string(selector)?
    ))
}
