//! Config redaction: mask secrets before showing or logging a config.

use serde_json::Value;

const SENSITIVE_KEYS: &[&str] = &[
    "apiToken",
    "api_token",
    "apiKey",
    "api_key",
    "token",
    "accessToken",
    "access_token",
    "authorization",
    "secret",
    "password",
];

/// Replace every sensitive string field with a short hint plus `***`.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn redact_string(s: &str, key: &str) -> Value {
    if !is_sensitive_key(key) || s.is_empty() {
        return Value::String(s.to_string());
    }
    // Long secrets keep their first four characters as a hint.
    if s.chars().count() > 8 {
        Value::String(format!("{}***", s.chars().take(4).collect::<String>()))
    } else {
        Value::String("***".to_string())
    }
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) => redact_string(s, key),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                result.insert(k.clone(), redact_recursive(v, k));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_api_token() {
        let v = json!({ "endpoint": { "url": "http://x", "apiToken": "sk-abcdef123456" } });
        let redacted = redact(&v);
        assert_eq!(redacted["endpoint"]["apiToken"], "sk-a***");
        assert_eq!(redacted["endpoint"]["url"], "http://x");
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        let redacted = redact(&json!({ "token": "abc" }));
        assert_eq!(redacted["token"], "***");
    }

    #[test]
    fn passthrough_non_sensitive() {
        let v = json!({ "logging": { "level": "debug" }, "models": [{ "id": "gpt-4" }] });
        assert_eq!(redact(&v), v);
    }
}
