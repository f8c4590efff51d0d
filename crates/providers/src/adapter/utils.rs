use rand::RngExt;
use reqwest::Response;
use serde_json::{Map, Value};

use super::error::ProviderError;

/// Read a JSON body, turning any non-2xx status into [`ProviderError::Upstream`]
/// with the raw body preserved. Empty bodies read as `null`.
pub async fn read_json(provider: &'static str, response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Upstream {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Walk nested object keys.
#[inline]
pub fn json_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

/// First present string among several candidate paths. Numbers are stringified.
pub fn first_string(value: &Value, candidates: &[&[&str]]) -> Option<String> {
    candidates.iter().find_map(|path| match json_path(value, path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Insert `value` unless it is absent or `null`.
#[inline]
pub fn insert_present(bag: &mut Map<String, Value>, key: &str, value: Option<&Value>) {
    if let Some(v) = value.filter(|v| !v.is_null()) {
        bag.insert(key.to_string(), v.clone());
    }
}

/// Random decimal string of `len` digits, leading digit non-zero.
pub fn random_digits(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|i| {
            let digit = if i == 0 {
                rng.random_range(1..10u8)
            } else {
                rng.random_range(0..10u8)
            };
            char::from(b'0' + digit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_path() {
        let v = json!({"a": {"b": {"c": "x"}}});
        assert_eq!(json_path(&v, &["a", "b", "c"]), Some(&json!("x")));
        assert_eq!(json_path(&v, &["a", "z"]), None);
    }

    #[test]
    fn test_first_string() {
        let v = json!({"id": 42, "other": {"txid": "abc"}});
        assert_eq!(first_string(&v, &[&["missing"], &["id"]]), Some("42".into()));
        assert_eq!(
            first_string(&v, &[&["other", "txid"], &["id"]]),
            Some("abc".into())
        );
        assert_eq!(first_string(&v, &[&["nope"]]), None);
    }

    #[test]
    fn test_insert_present_skips_null() {
        let mut bag = Map::new();
        insert_present(&mut bag, "a", Some(&json!(null)));
        insert_present(&mut bag, "b", None);
        insert_present(&mut bag, "c", Some(&json!("x")));
        assert_eq!(Value::Object(bag), json!({"c": "x"}));
    }

    #[test]
    fn test_random_digits() {
        for _ in 0..50 {
            let n = random_digits(8);
            assert_eq!(n.len(), 8);
            assert!(n.chars().all(|c| c.is_ascii_digit()));
            assert!(!n.starts_with('0'));
        }
    }
}
