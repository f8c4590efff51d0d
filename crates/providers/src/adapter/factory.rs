use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use super::credentials::ProviderId;
use super::error::ProviderError;
use super::provider_adapter::ProviderAdapter;
use super::providers::{
    banco_do_brasil::BancoDoBrasilAdapter, cora::CoraAdapter, itau::ItauAdapter,
    sicredi::SicrediAdapter,
};
use super::tls::DEFAULT_TIMEOUT;
use crate::codec::CredentialCodec;

/// Decrypted material handed to an adapter constructor.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub client: Client,
    pub credentials: Value,
    pub config: Value,
    pub timeout: Duration,
}

type AdapterConstructor = fn(AdapterContext) -> Result<Box<dyn ProviderAdapter>, ProviderError>;

struct ProviderEntry {
    id: ProviderId,
    constructor: AdapterConstructor,
}

macro_rules! provider_registry {
    ( $( $id:path => $builder:path ),+ $(,)? ) => {
        &[
            $(
                ProviderEntry {
                    id: $id,
                    constructor: |context| {
                        Ok(Box::new($builder(context)?) as Box<dyn ProviderAdapter>)
                    },
                },
            )+
        ]
    };
}

// Static provider registry.
static PROVIDERS: &[ProviderEntry] = provider_registry![
    ProviderId::Cora => CoraAdapter::from_context,
    ProviderId::Sicredi => SicrediAdapter::from_context,
    ProviderId::Itau => ItauAdapter::from_context,
    ProviderId::BancoDoBrasil => BancoDoBrasilAdapter::from_context,
];

/// Builds provider adapters from sealed credential envelopes.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    client: Client,
    codec: Arc<CredentialCodec>,
    timeout: Duration,
}

impl AdapterFactory {
    pub fn new(client: Client, codec: Arc<CredentialCodec>) -> Self {
        Self {
            client,
            codec,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Timeout used for mTLS clients the adapters build themselves.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// Open both envelopes and build the adapter for `provider_id`.
    ///
    /// Both envelopes are required; an adapter without provider config is
    /// built from a sealed `{}`.
    pub fn get_adapter(
        &self,
        provider_id: &str,
        credentials_encrypted: Option<&str>,
        config_encrypted: Option<&str>,
    ) -> Result<Box<dyn ProviderAdapter>, ProviderError> {
        let id: ProviderId = provider_id.parse()?;
        let entry = PROVIDERS
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_id.to_string()))?;

        let credentials_encrypted = credentials_encrypted
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProviderError::config(format!("encrypted credentials for {id} are missing")))?;
        let config_encrypted = config_encrypted
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProviderError::config(format!("encrypted provider config for {id} is missing")))?;
        let credentials: Value = self.codec.decrypt(credentials_encrypted)?;
        let config: Value = self.codec.decrypt(config_encrypted)?;

        debug!(provider = %id, "Building provider adapter");
        (entry.constructor)(AdapterContext {
            client: self.client.clone(),
            credentials,
            config,
            timeout: self.timeout,
        })
    }

    /// Build from plaintext material by sealing it first, so both entry
    /// points share one path.
    pub fn get_adapter_with_plain_credentials(
        &self,
        provider_id: &str,
        credentials: &Value,
        config: Option<&Value>,
    ) -> Result<Box<dyn ProviderAdapter>, ProviderError> {
        let credentials_encrypted = self.codec.encrypt(credentials)?;
        let config_encrypted = match config {
            Some(config) => self.codec.encrypt(config)?,
            None => self.codec.encrypt(&Value::Object(Map::new()))?,
        };
        self.get_adapter(
            provider_id,
            Some(&credentials_encrypted),
            Some(&config_encrypted),
        )
    }
}
