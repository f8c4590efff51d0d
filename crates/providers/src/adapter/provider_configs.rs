//! Provider-specific configuration types and utilities.
//!
//! Provider configuration holds non-secret operational settings (webhook URL,
//! agreement and wallet numbers). A baseline is supplied when the session is
//! created and a single charge request may overlay it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProviderError;

/// Cora configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoraConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Sicredi configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SicrediConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Document species (default: "DUPLICATA_MERCANTIL_INDICACAO")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub especie_documento: Option<String>,
}

impl SicrediConfig {
    pub fn especie_documento(&self) -> &str {
        self.especie_documento
            .as_deref()
            .unwrap_or("DUPLICATA_MERCANTIL_INDICACAO")
    }
}

/// Itau configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ItauConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Beneficiary id; boleto issuance is unavailable without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beneficiario_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conta_corrente: Option<String>,
    /// Receiving PIX key; PIX issuance is unavailable without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_key: Option<String>,
    /// Wallet code (default: "109")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carteira: Option<String>,
}

impl ItauConfig {
    pub fn carteira(&self) -> &str {
        self.carteira.as_deref().unwrap_or("109")
    }
}

/// Banco do Brasil configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BancoDoBrasilConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Agreement number (default: "0000000")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convenio: Option<String>,
    /// Wallet (default: "17")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carteira: Option<String>,
    /// Wallet variation (default: "19")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variacao_carteira: Option<String>,
}

impl BancoDoBrasilConfig {
    pub fn convenio(&self) -> &str {
        self.convenio.as_deref().unwrap_or("0000000")
    }

    pub fn carteira(&self) -> &str {
        self.carteira.as_deref().unwrap_or("17")
    }

    pub fn variacao_carteira(&self) -> &str {
        self.variacao_carteira.as_deref().unwrap_or("19")
    }

    /// The agreement number is embedded in the 20-digit client title number,
    /// so it must be at most 7 ASCII digits.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let convenio = self.convenio();
        if convenio.is_empty() || convenio.len() > 7 || !convenio.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProviderError::config(format!(
                "banco_do_brasil convenio must be 1 to 7 digits, got '{convenio}'"
            )));
        }
        Ok(())
    }
}

/// Deserialize a typed config, treating `null` as empty.
pub fn parse_provider_config<T: DeserializeOwned + Default>(
    config: &Value,
) -> Result<T, ProviderError> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone())
        .map_err(|e| ProviderError::config(format!("invalid provider config: {e}")))
}

/// Pull a provider config out of a free-form session context.
///
/// Both `providerConfig` and `provider_config` are accepted; only objects count.
pub fn extract_provider_config(context: Option<&Value>) -> Option<Value> {
    let context = context?.as_object()?;
    context
        .get("providerConfig")
        .or_else(|| context.get("provider_config"))
        .filter(|v| v.is_object())
        .cloned()
}

/// Merge two JSON objects, with overlay taking precedence.
///
/// Shallow merge: nested objects in the overlay replace the base value, and
/// `null` overlay values are ignored.
pub fn merge_provider_config(base: Option<Value>, overlay: Option<Value>) -> Option<Value> {
    match (base, overlay) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(Value::Object(mut base_map)), Some(Value::Object(overlay_map))) => {
            for (k, v) in overlay_map {
                if !v.is_null() {
                    base_map.insert(k, v);
                }
            }
            Some(Value::Object(base_map))
        }
        (_, Some(o)) => Some(o),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_camel_case() {
        let context = json!({"providerConfig": {"convenio": "1234567"}, "other": 1});
        assert_eq!(
            extract_provider_config(Some(&context)),
            Some(json!({"convenio": "1234567"}))
        );
    }

    #[test]
    fn test_extract_snake_case() {
        let context = json!({"provider_config": {"pix_key": "k"}});
        assert_eq!(
            extract_provider_config(Some(&context)),
            Some(json!({"pix_key": "k"}))
        );
    }

    #[test]
    fn test_extract_ignores_non_objects() {
        assert_eq!(extract_provider_config(None), None);
        assert_eq!(extract_provider_config(Some(&json!("x"))), None);
        assert_eq!(
            extract_provider_config(Some(&json!({"providerConfig": "x"}))),
            None
        );
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = json!({"convenio": "1", "carteira": "17"});
        let overlay = json!({"convenio": "2", "carteira": null});
        assert_eq!(
            merge_provider_config(Some(base), Some(overlay)),
            Some(json!({"convenio": "2", "carteira": "17"}))
        );
    }

    #[test]
    fn test_merge_none() {
        assert!(merge_provider_config(None, None).is_none());
    }

    #[test]
    fn test_typed_defaults() {
        let bb: BancoDoBrasilConfig = parse_provider_config(&Value::Null).unwrap();
        assert_eq!(bb.convenio(), "0000000");
        assert_eq!(bb.carteira(), "17");

        let itau: ItauConfig = parse_provider_config(&json!({"pix_key": "chave"})).unwrap();
        assert_eq!(itau.carteira(), "109");
        assert_eq!(itau.pix_key.as_deref(), Some("chave"));
    }

    #[test]
    fn test_invalid_config_is_configuration_error() {
        let err = parse_provider_config::<CoraConfig>(&json!({"webhook_url": 3})).unwrap_err();
        assert!(err.is_configuration());
    }
}
