use crate::domain::errors::ErrorCode;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("Invalid placeholder regex"))
}

/// Field names referenced as `{{ name }}`, in order of first appearance.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in placeholder_regex().captures_iter(text) {
        let name = &cap[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Names from `required` without a value in `fields`, in the order given.
pub fn missing_fields(required: &[String], fields: &HashMap<String, String>) -> Vec<String> {
    required
        .iter()
        .filter(|name| !fields.contains_key(name.as_str()))
        .cloned()
        .collect()
}

pub fn missing_fields_error(missing: &[String]) -> ApiError {
    ApiError::BadRequest(
        ErrorCode::MissingTemplateFields,
        format!("Missing template fields: {}", missing.join(", ")),
    )
}

/// Substitute every placeholder in `text`.
///
/// Fails with `MISSING_TEMPLATE_FIELDS` naming all absent fields. Values are
/// HTML-escaped when `escape` is set.
pub fn render(text: &str, fields: &HashMap<String, String>, escape: bool) -> ApiResult<String> {
    let missing = missing_fields(&extract_placeholders(text), fields);
    if !missing.is_empty() {
        return Err(missing_fields_error(&missing));
    }

    let rendered = placeholder_regex().replace_all(text, |cap: &Captures| {
        let value = fields.get(&cap[1]).map(String::as_str).unwrap_or_default();
        if escape {
            escape_html(value)
        } else {
            value.to_string()
        }
    });

    Ok(rendered.into_owned())
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
