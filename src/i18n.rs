//! Localized texts, addressed by dotted keys such as `plugins.dog.none`.

use rand::seq::SliceRandom;
use serde_json::Value;
use std::fmt::Display;
use std::sync::LazyLock;

static TRANSLATIONS: LazyLock<Value> = LazyLock::new(|| {
    // Embedded at compile time and covered by tests, so a parse failure is a build defect.
    serde_json::from_str(include_str!("../assets/i18n.json")).unwrap_or(Value::Null)
});

/// Look up `id`.
///
/// - objects resolve to their `__` member
/// - arrays resolve to a random element
/// - unknown keys resolve to the key itself
pub fn get_text(id: &str) -> String {
    lookup(&TRANSLATIONS, id).unwrap_or_else(|| id.to_owned())
}

/// Look up `id` and fill its `{}` placeholders from left to right.
pub fn get_text_f(id: &str, args: &[&(dyn Display + Sync)]) -> String {
    format_placeholders(&get_text(id), args)
}

fn lookup(root: &Value, id: &str) -> Option<String> {
    let mut item = root;
    for part in id.split('.') {
        item = item.get(part)?;
    }

    if let Value::Object(map) = item {
        item = map.get("__")?;
    }

    match item {
        Value::String(s) => Some(s.clone()),
        Value::Array(options) => options
            .choose(&mut rand::thread_rng())
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

fn format_placeholders(template: &str, args: &[&(dyn Display + Sync)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut pieces = template.split("{}").peekable();
    while let Some(piece) = pieces.next() {
        out.push_str(piece);
        if pieces.peek().is_some() {
            match args.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push_str("{}"),
            }
        }
    }
    out
}
