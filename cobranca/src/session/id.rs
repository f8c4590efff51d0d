use sha2::{Digest, Sha256};
use serde_json::Value;

/// Serialize with object keys sorted recursively; arrays keep their order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 hex of `{"providerId":..,"tenantId":..,"credentials":..}` with the
/// credentials canonicalized, so field order never changes the id.
pub fn derive_session_id(provider_id: &str, credentials: &Value, tenant_id: Option<&str>) -> String {
    let fingerprint = format!(
        r#"{{"providerId":{},"tenantId":{},"credentials":{}}}"#,
        Value::from(provider_id),
        tenant_id.map_or(Value::Null, Value::from),
        canonical_json(credentials),
    );
    hex::encode(Sha256::digest(fingerprint.as_bytes()))
}
