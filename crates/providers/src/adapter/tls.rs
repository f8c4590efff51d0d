//! TLS client construction, including mutual TLS identities.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;

use super::credentials::Secret;
use super::error::ProviderError;

/// Default request timeout applied to every bank call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client certificate, private key and optional extra CA roots (all PEM).
#[derive(Debug, Clone)]
pub struct TlsIdentity {
    cert_pem: Secret,
    key_pem: Secret,
    ca_bundle_pem: Option<String>,
}

impl TlsIdentity {
    pub fn new(cert_pem: Secret, key_pem: Secret, ca_bundle_pem: Option<String>) -> Self {
        Self {
            cert_pem,
            key_pem,
            ca_bundle_pem,
        }
    }

    /// Identity from an optional certificate/key pair.
    pub fn from_pair(
        cert: Option<&Secret>,
        key: Option<&Secret>,
        ca_bundle: Option<&str>,
    ) -> Option<Self> {
        match (cert, key) {
            (Some(cert), Some(key)) => Some(Self::new(
                cert.clone(),
                key.clone(),
                ca_bundle.map(str::to_owned),
            )),
            _ => None,
        }
    }

    fn certificates(&self) -> Result<Vec<CertificateDer<'static>>, ProviderError> {
        let certs = parse_certificates(self.cert_pem.expose().as_bytes())?;
        if certs.is_empty() {
            return Err(ProviderError::Tls("client certificate PEM holds no certificate".into()));
        }
        Ok(certs)
    }

    fn private_key(&self) -> Result<PrivateKeyDer<'static>, ProviderError> {
        PrivateKeyDer::from_pem_slice(self.key_pem.expose().as_bytes())
            .map_err(|e| ProviderError::Tls(format!("invalid client private key: {e}")))
    }
}

fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ProviderError> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProviderError::Tls(format!("invalid certificate PEM: {e}")))
}

fn tls_error(e: rustls::Error) -> ProviderError {
    ProviderError::Tls(e.to_string())
}

/// Build a rustls-backed client, presenting `identity` when given.
pub fn build_client(identity: Option<&TlsIdentity>, timeout: Duration) -> Result<Client, ProviderError> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?;

    let tls_config = match identity {
        None => builder
            .with_platform_verifier()
            .map_err(tls_error)?
            .with_no_client_auth(),
        Some(identity) => {
            let certs = identity.certificates()?;
            let key = identity.private_key()?;
            let builder = match &identity.ca_bundle_pem {
                Some(bundle) => {
                    let mut roots = RootCertStore::empty();
                    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                    for cert in parse_certificates(bundle.as_bytes())? {
                        roots.add(cert).map_err(tls_error)?;
                    }
                    builder.with_root_certificates(roots)
                }
                None => builder.with_platform_verifier().map_err(tls_error)?,
            };
            builder.with_client_auth_cert(certs, key).map_err(tls_error)?
        }
    };

    Ok(Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(timeout)
        .build()?)
}

/// The shared client plus, when certificates were supplied, an mTLS client
/// built once for the adapter's lifetime.
#[derive(Debug, Clone)]
pub struct HttpClients {
    plain: Client,
    mtls: Option<Client>,
}

impl HttpClients {
    pub fn new(plain: Client, identity: Option<&TlsIdentity>, timeout: Duration) -> Result<Self, ProviderError> {
        let mtls = identity.map(|id| build_client(Some(id), timeout)).transpose()?;
        Ok(Self { plain, mtls })
    }

    pub fn plain_only(plain: Client) -> Self {
        Self { plain, mtls: None }
    }

    pub fn has_mtls(&self) -> bool {
        self.mtls.is_some()
    }

    pub fn plain(&self) -> &Client {
        &self.plain
    }

    /// mTLS client when configured, plain TLS otherwise.
    pub fn preferred(&self) -> &Client {
        self.mtls.as_ref().unwrap_or(&self.plain)
    }

    /// mTLS client, or a configuration error naming the operation.
    pub fn require_mtls(&self, provider: &str, operation: &str) -> Result<&Client, ProviderError> {
        self.mtls.as_ref().ok_or_else(|| {
            ProviderError::config(format!(
                "{provider} {operation} requires mutual TLS; supply a client certificate and private key"
            ))
        })
    }
}
