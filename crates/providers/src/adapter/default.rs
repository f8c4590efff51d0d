use std::sync::Arc;

use reqwest::Client;

use super::error::ProviderError;
use super::factory::AdapterFactory;
use super::tls::{DEFAULT_TIMEOUT, build_client};
use crate::codec::CredentialCodec;

/// Shared rustls client (ring provider, platform verifier, no client auth).
pub fn default_client() -> Result<Client, ProviderError> {
    build_client(None, DEFAULT_TIMEOUT)
}

/// Returns a new `AdapterFactory` over the default client.
pub fn default_factory(codec: Arc<CredentialCodec>) -> Result<AdapterFactory, ProviderError> {
    Ok(AdapterFactory::new(default_client()?, codec))
}
