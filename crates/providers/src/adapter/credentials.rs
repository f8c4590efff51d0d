//! Provider identifiers and per-provider credential schemas.
//!
//! Credentials arrive as free-form JSON and are validated eagerly against the
//! schema for their provider, so a bad credential fails at adapter
//! construction instead of on the first bank call. All issues are reported
//! together.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Cora,
    Sicredi,
    Itau,
    BancoDoBrasil,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Cora,
        ProviderId::Sicredi,
        ProviderId::Itau,
        ProviderId::BancoDoBrasil,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cora => "cora",
            Self::Sicredi => "sicredi",
            Self::Itau => "itau",
            Self::BancoDoBrasil => "banco_do_brasil",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cora" => Ok(Self::Cora),
            "sicredi" => Ok(Self::Sicredi),
            "itau" => Ok(Self::Itau),
            "banco_do_brasil" | "bb" => Ok(Self::BancoDoBrasil),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

/// A credential string that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoraCredentials {
    pub client_id: String,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<Secret>,
    /// PEM client certificate for mTLS.
    #[serde(default, alias = "certificate", skip_serializing_if = "Option::is_none")]
    pub cert: Option<Secret>,
    #[serde(default, alias = "privateKey", skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Secret>,
    #[serde(default)]
    pub sandbox: bool,
}

impl CoraCredentials {
    pub fn uses_certificate(&self) -> bool {
        self.cert.is_some() && self.private_key.is_some()
    }
}

impl CredentialSchema for CoraCredentials {
    const PROVIDER: ProviderId = ProviderId::Cora;
    const REQUIRED: &'static [&'static str] = &["client_id", "account_id"];

    fn check(&self, issues: &mut Vec<String>) {
        match (&self.cert, &self.private_key) {
            (Some(_), None) => issues.push("cert requires private_key".into()),
            (None, Some(_)) => issues.push("private_key requires cert".into()),
            _ => {}
        }
        let has_secret = self.client_secret.as_ref().is_some_and(|s| !s.is_blank());
        let has_certificate = self.cert.is_some() || self.private_key.is_some();
        match (has_secret, has_certificate) {
            (false, false) => {
                issues.push("either client_secret or cert + private_key is required".into())
            }
            (true, true) => issues.push(
                "client_secret and cert + private_key are mutually exclusive; supply one".into(),
            ),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SicrediCredentials {
    pub cooperativa: String,
    pub posto: String,
    pub codigo_beneficiario: String,
    pub api_key: Secret,
    #[serde(default)]
    pub sandbox: bool,
}

impl CredentialSchema for SicrediCredentials {
    const PROVIDER: ProviderId = ProviderId::Sicredi;
    const REQUIRED: &'static [&'static str] =
        &["cooperativa", "posto", "codigo_beneficiario", "api_key"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItauCredentials {
    pub client_id: String,
    pub client_secret: Secret,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_key: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
}

impl CredentialSchema for ItauCredentials {
    const PROVIDER: ProviderId = ProviderId::Itau;
    const REQUIRED: &'static [&'static str] = &["client_id", "client_secret"];

    fn check(&self, issues: &mut Vec<String>) {
        if self.cert.is_some() != self.cert_key.is_some() {
            issues.push("cert and cert_key must be supplied together".into());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BancoDoBrasilCredentials {
    pub client_id: String,
    pub client_secret: Secret,
    pub developer_application_key: String,
    pub account_number: String,
    pub account_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    /// Scopes granted to the application, when the caller knows them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_key: Option<Secret>,
    /// Extra PEM CA certificates trusted for the mTLS endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
}

impl BancoDoBrasilCredentials {
    pub fn has_certificate(&self) -> bool {
        self.cert.is_some() && self.cert_key.is_some()
    }
}

impl CredentialSchema for BancoDoBrasilCredentials {
    const PROVIDER: ProviderId = ProviderId::BancoDoBrasil;
    const REQUIRED: &'static [&'static str] = &[
        "client_id",
        "client_secret",
        "developer_application_key",
        "account_number",
        "account_type",
    ];

    fn check(&self, issues: &mut Vec<String>) {
        if !self.sandbox {
            if self.cert.is_none() {
                issues.push("cert is required in production".into());
            }
            if self.cert_key.is_none() {
                issues.push("cert_key is required in production".into());
            }
        } else if self.cert.is_some() != self.cert_key.is_some() {
            issues.push("cert and cert_key must be supplied together".into());
        }
        if let Some(scopes) = &self.scopes
            && scopes.iter().any(|s| s.trim().is_empty())
        {
            issues.push("scopes must not contain empty entries".into());
        }
    }
}

/// Schema of one provider's credential object.
pub trait CredentialSchema: DeserializeOwned {
    const PROVIDER: ProviderId;
    /// Fields that must be present as non-blank strings.
    const REQUIRED: &'static [&'static str];

    /// Cross-field rules, run after the required fields parsed.
    fn check(&self, _issues: &mut Vec<String>) {}

    fn parse(value: &Value) -> Result<Self, ProviderError> {
        let creds: Self = parse_schema(Self::PROVIDER, value, Self::REQUIRED)?;
        let mut issues = Vec::new();
        creds.check(&mut issues);
        if issues.is_empty() {
            Ok(creds)
        } else {
            Err(invalid(Self::PROVIDER, &issues))
        }
    }
}

/// Validated credentials, one variant per provider.
#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    Cora(CoraCredentials),
    Sicredi(SicrediCredentials),
    Itau(ItauCredentials),
    BancoDoBrasil(BancoDoBrasilCredentials),
}

impl ProviderCredentials {
    /// Validate `value` against the schema for `provider`.
    pub fn parse(provider: ProviderId, value: &Value) -> Result<Self, ProviderError> {
        match provider {
            ProviderId::Cora => CoraCredentials::parse(value).map(Self::Cora),
            ProviderId::Sicredi => SicrediCredentials::parse(value).map(Self::Sicredi),
            ProviderId::Itau => ItauCredentials::parse(value).map(Self::Itau),
            ProviderId::BancoDoBrasil => {
                BancoDoBrasilCredentials::parse(value).map(Self::BancoDoBrasil)
            }
        }
    }

    pub fn provider_id(&self) -> ProviderId {
        match self {
            Self::Cora(_) => ProviderId::Cora,
            Self::Sicredi(_) => ProviderId::Sicredi,
            Self::Itau(_) => ProviderId::Itau,
            Self::BancoDoBrasil(_) => ProviderId::BancoDoBrasil,
        }
    }

    pub fn sandbox(&self) -> bool {
        match self {
            Self::Cora(c) => c.sandbox,
            Self::Sicredi(c) => c.sandbox,
            Self::Itau(c) => c.sandbox,
            Self::BancoDoBrasil(c) => c.sandbox,
        }
    }
}

fn parse_schema<T: DeserializeOwned>(
    provider: ProviderId,
    value: &Value,
    required: &[&str],
) -> Result<T, ProviderError> {
    let Some(object) = value.as_object() else {
        return Err(ProviderError::config(format!(
            "{provider} credentials must be a JSON object"
        )));
    };

    let missing: Vec<String> = required
        .iter()
        .filter(|field| {
            !object
                .get(**field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty())
        })
        .map(|field| format!("{field} is required"))
        .collect();
    if !missing.is_empty() {
        return Err(invalid(provider, &missing));
    }

    serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::config(format!("invalid {provider} credentials: {e}")))
}

fn invalid(provider: ProviderId, issues: &[String]) -> ProviderError {
    ProviderError::config(format!(
        "invalid {provider} credentials: {}",
        issues.join("; ")
    ))
}
