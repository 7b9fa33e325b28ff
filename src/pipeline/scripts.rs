//! In-page check scripts and the parsing of what they return.

use serde::Deserialize;
use serde_json::Value;

use crate::config::{HarnessConfig, SingletonSpec};

pub const UNDEFINED: &str = "undefined";

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

/// Object mapping each required global to `typeof window[name]`, plus the
/// singleton's constructor name (or "undefined").
pub fn globals_script(config: &HarnessConfig) -> String {
    let mut fields: Vec<String> = config
        .required_globals
        .iter()
        .map(|name| format!("{key}: typeof window[{key}]", key = js_str(name)))
        .collect();
    fields.push(format!(
        "{key}: window[{key}] ? window[{key}].constructor.name : 'undefined'",
        key = js_str(&config.singleton.name)
    ));
    format!("(() => ({{ {} }}))()", fields.join(", "))
}

pub fn singleton_script(singleton: &SingletonSpec) -> String {
    format!(
        r#"(() => {{
            const inst = window[{name}];
            if (!inst) return {{ exists: false }};
            const base = window[{base}];
            const specialized = window[{specialized}];
            return {{
                exists: true,
                isBase: typeof base === 'function' && inst instanceof base,
                isSpecialized: typeof specialized === 'function' && inst instanceof specialized,
                className: inst.constructor ? inst.constructor.name : typeof inst
            }};
        }})()"#,
        name = js_str(&singleton.name),
        base = js_str(&singleton.base_ctor),
        specialized = js_str(&singleton.specialized_ctor),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPresence {
    pub name: String,
    pub type_tag: String,
    /// The singleton holder is reported but never required.
    pub required: bool,
}

/// Observed type tags for the expected globals, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentPresenceReport {
    pub entries: Vec<GlobalPresence>,
}

impl ComponentPresenceReport {
    /// Read the object produced by [`globals_script`]. Absent or non-string
    /// tags count as "undefined".
    pub fn from_value(value: &Value, config: &HarnessConfig) -> Self {
        let tag = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or(UNDEFINED)
                .to_string()
        };

        let mut entries: Vec<GlobalPresence> = config
            .required_globals
            .iter()
            .map(|name| GlobalPresence {
                name: name.clone(),
                type_tag: tag(name),
                required: true,
            })
            .collect();
        entries.push(GlobalPresence {
            name: config.singleton.name.clone(),
            type_tag: tag(&config.singleton.name),
            required: false,
        });

        Self { entries }
    }

    pub fn missing_required(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.required && e.type_tag == UNDEFINED)
            .map(|e| e.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SingletonCheck {
    pub exists: bool,
    pub is_base: bool,
    pub is_specialized: bool,
    pub class_name: String,
}
