use reqwest::Url;
#[cfg(test)]
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::Value;
use std::borrow::Cow;

const REDACTION: &str = "***REDACTED***";
const SENSITIVE_KEYS: [&str; 10] = [
    "key",
    "api_key",
    "apikey",
    "token",
    "access_token",
    "authorization",
    "secret",
    "password",
    "x-api-key",
    "x-goog-api-key",
];
const COOKIE_HEADERS: [&str; 2] = ["cookie", "set-cookie"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: 4_000,
        }
    }

    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }
}

pub fn redact_url(url: &Url, enable_redaction: bool) -> String {
    if !enable_redaction || url.query().is_none() {
        return url.to_string();
    }

    let mut masked = url.clone();
    masked
        .query_pairs_mut()
        .clear()
        .extend_pairs(url.query_pairs().map(|(name, value)| {
            let value = if is_sensitive_key(&name) {
                Cow::Borrowed(REDACTION)
            } else {
                value
            };
            (name, value)
        }));
    masked.into()
}

#[cfg(test)]
pub fn redact_headers(headers: &HeaderMap, enable_redaction: bool) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            format!(
                "{}: {}",
                name.as_str(),
                redact_header_value(name.as_str(), value, enable_redaction)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Masks credentials in a header value. Cookie headers keep their cookie
/// names, bearer-style values keep their scheme.
pub fn redact_header_value(name: &str, value: &HeaderValue, enable_redaction: bool) -> String {
    let Ok(text) = value.to_str() else {
        return "<non-utf8>".to_string();
    };
    if !enable_redaction {
        return text.to_string();
    }

    let name = name.to_ascii_lowercase();
    if COOKIE_HEADERS.contains(&name.as_str()) {
        return redact_cookie_list(text);
    }
    if !is_sensitive_key(&name) {
        return text.to_string();
    }

    match text.split_once(' ') {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("bearer") => {
            format!("{scheme} {REDACTION}")
        }
        _ => REDACTION.to_string(),
    }
}

fn redact_cookie_list(raw: &str) -> String {
    raw.split(';')
        .map(|pair| {
            let pair = pair.trim();
            match pair.split_once('=') {
                Some((name, _)) => format!("{name}={REDACTION}"),
                None => pair.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn redact_text_body(raw: &str, enable_redaction: bool) -> String {
    if !enable_redaction {
        return raw.to_string();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(mut json) => {
            redact_json_value(&mut json);
            serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
        }
        Err(_) => raw.to_string(),
    }
}

pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some((cut, _)) => {
            let dropped = input[cut..].chars().count();
            format!("{}... <truncated {dropped} chars>", &input[..cut])
        }
    }
}

fn redact_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_sensitive_key(key) {
                    *item = Value::String(REDACTION.to_string());
                } else {
                    redact_json_value(item);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json_value),
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(key))
}
