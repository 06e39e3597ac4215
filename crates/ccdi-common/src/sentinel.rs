//! Stored values that stand for "no data".

use serde_json::Value;

pub const NUMERIC_SENTINEL: i64 = -999;
pub const INVALID_VALUE: &str = "invalid value";

/// True for blank strings, `"-999"` and the "Invalid value" marker.
pub fn is_sentinel_text(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case(INVALID_VALUE)
        || trimmed == NUMERIC_SENTINEL.to_string()
}

/// True for null, `-999`, blank strings and "Invalid value".
pub fn is_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(NUMERIC_SENTINEL as f64),
        Value::String(s) => is_sentinel_text(s),
        _ => false,
    }
}

/// Trimmed string form of a scalar, or `None` when it is a sentinel.
pub fn clean_text(value: &Value) -> Option<String> {
    if is_sentinel(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer form of a numeric or numeric-string value, `None` for sentinels.
pub fn clean_int(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => {
            let t = s.trim().trim_matches(|c| c == '\'' || c == '"');
            t.parse::<i64>()
                .ok()
                .or_else(|| t.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }?;
    (n != NUMERIC_SENTINEL).then_some(n)
}

/// Flatten a scalar-or-list value into cleaned `;`-separated tokens.
pub fn split_tokens(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |v: &Value| {
        if let Some(text) = clean_text(v) {
            for token in text.split(';') {
                if !is_sentinel_text(token) {
                    out.push(token.trim().to_string());
                }
            }
        }
    };
    match value {
        Value::Array(items) => items.iter().for_each(&mut push),
        other => push(other),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinels() {
        assert!(is_sentinel(&json!(null)));
        assert!(is_sentinel(&json!(-999)));
        assert!(is_sentinel(&json!(-999.0)));
        assert!(is_sentinel(&json!("  Invalid Value ")));
        assert!(is_sentinel(&json!("")));
        assert!(is_sentinel(&json!(" -999")));
        assert!(!is_sentinel(&json!(0)));
        assert!(!is_sentinel(&json!("-0999")));
        assert!(!is_sentinel(&json!("Not Reported")));
    }

    #[test]
    fn test_clean_int() {
        assert_eq!(clean_int(&json!(12)), Some(12));
        assert_eq!(clean_int(&json!(12.0)), Some(12));
        assert_eq!(clean_int(&json!("'70925'")), Some(70925));
        assert_eq!(clean_int(&json!(-999)), None);
        assert_eq!(clean_int(&json!("abc")), None);
    }

    #[test]
    fn test_split_tokens_handles_lists_and_delimiters() {
        assert_eq!(split_tokens(&json!("Bone; Lung")), vec!["Bone", "Lung"]);
        assert_eq!(
            split_tokens(&json!(["Bone", "Invalid value", "Liver;Skin"])),
            vec!["Bone", "Liver", "Skin"]
        );
        assert!(split_tokens(&json!(null)).is_empty());
    }
}
