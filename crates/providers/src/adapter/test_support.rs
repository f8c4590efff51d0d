//! Shared fixtures for adapter tests.

use serde_json::{Value, json};

use crate::charge::ChargeRequest;
use crate::codec::CredentialCodec;

pub const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub fn codec() -> CredentialCodec {
    CredentialCodec::from_hex(KEY_HEX).unwrap()
}

pub fn bb_credentials(scopes: Option<&[&str]>) -> Value {
    let mut creds = json!({
        "client_id": "bb-client",
        "client_secret": "bb-secret",
        "developer_application_key": "dev-key",
        "account_number": "12345",
        "account_type": "corrente",
        "agency": "1234",
        "sandbox": true
    });
    if let Some(scopes) = scopes {
        creds["scopes"] = json!(scopes);
    }
    creds
}

pub fn sample_request() -> ChargeRequest {
    serde_json::from_value(json!({
        "tenant_id": "tenant-1",
        "amount": 15050,
        "due_date": "2026-11-30",
        "payment_methods": ["boleto", "pix"],
        "customer": {
            "name": "Maria da Silva",
            "document": "123.456.789-09",
            "email": "maria@example.com",
            "address": {
                "zip_code": "01001000",
                "street": "Praça da Sé",
                "number": "100",
                "neighborhood": "Sé",
                "city": "São Paulo",
                "state": "SP"
            }
        },
        "interest": {"type": "percentage", "value": 1.0},
        "fine": {"type": "fixed", "value": 500.0},
        "discounts": [{"type": "fixed", "value": 1000.0, "date": "2026-11-20"}],
        "reference_id": "INV-001"
    }))
    .unwrap()
}

pub fn request_with(methods: &[&str]) -> ChargeRequest {
    let mut request = sample_request();
    request.payment_methods = methods
        .iter()
        .map(|m| serde_json::from_value(json!(m)).unwrap())
        .collect();
    request
}

/// Plain client with the ring provider and no trust roots; tests only talk
/// to local `http://` mock servers.
pub fn test_client() -> reqwest::Client {
    let config = rustls::ClientConfig::builder_with_provider(std::sync::Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_root_certificates(rustls::RootCertStore::empty())
    .with_no_client_auth();
    reqwest::Client::builder()
        .use_preconfigured_tls(config)
        .build()
        .unwrap()
}
