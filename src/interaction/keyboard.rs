use anyhow::{Context, Result};
use chromiumoxide::page::Page;

use super::selector_to_js;

/// Replace an input's value the way a user typing it would, firing
/// `input` and `change` so framework bindings see the new value.
pub async fn fill(page: &Page, selector: &str, value: &str) -> Result<()> {
    let selector_js = selector_to_js(selector)?;

    let js = format!(
        r#"(() => {{
            const el = {selector_js};
            if (!el) throw new Error('Element not found: ' + {sel_str});
            el.scrollIntoView({{ block: 'center', behavior: 'instant' }});
            el.focus();
            const text = {value};
            if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {{
                const proto = el.tagName === 'INPUT'
                    ? window.HTMLInputElement.prototype
                    : window.HTMLTextAreaElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set;
                if (setter) {{
                    setter.call(el, text);
                }} else {{
                    el.value = text;
                }}
            }} else if (el.isContentEditable) {{
                el.textContent = text;
            }} else {{
                throw new Error('Element is not fillable: ' + {sel_str});
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        selector_js = selector_js,
        sel_str = serde_json::to_string(selector)?,
        value = serde_json::to_string(value)?
    );

    page.evaluate(js.as_str())
        .await
        .context("Failed to fill element")?;

    Ok(())
}
