//! Cora charges API.
//!
//! Authenticates either with a client secret (token from `/auth/token`) or
//! with a client certificate, in which case the mTLS channel itself carries
//! the identity and the client id is sent as the bearer value.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::adapter::credentials::{CoraCredentials, CredentialSchema, ProviderId};
use crate::adapter::error::ProviderError;
use crate::adapter::factory::AdapterContext;
use crate::adapter::provider_adapter::ProviderAdapter;
use crate::adapter::provider_configs::{CoraConfig, parse_provider_config};
use crate::adapter::tls::{HttpClients, TlsIdentity};
use crate::adapter::token::{CORA_EXPIRY_BUFFER, TokenCache, TokenResponse, now_ms};
use crate::adapter::utils::{first_string, insert_present, json_path, read_json};
use crate::charge::{
    CancelOutcome, CancelRequest, ChargeRequest, ChargeStatus, CreatedCharge, DataBag,
    RetrievedCharge, StatusTable,
};

const PROVIDER: &str = "cora";

pub const SANDBOX_BASE_URL: &str = "https://sandbox.cora.com.br/v1";
pub const PRODUCTION_BASE_URL: &str = "https://api.cora.com.br/v1";

const CANCEL_UNSUPPORTED: &str = "Cora API does not support charge cancellation. \
    Please contact Cora support to cancel invoices manually.";

pub const STATUS_TABLE: StatusTable = StatusTable::new(
    PROVIDER,
    &[
        ("pending", ChargeStatus::Pending),
        ("waiting_payment", ChargeStatus::Pending),
        ("paid", ChargeStatus::Paid),
        ("confirmed", ChargeStatus::Paid),
        ("canceled", ChargeStatus::Cancelled),
        ("cancelled", ChargeStatus::Cancelled),
        ("expired", ChargeStatus::Cancelled),
    ],
);

#[derive(Debug, Clone)]
pub struct CoraEndpoints {
    pub base_url: String,
}

impl CoraEndpoints {
    pub fn for_environment(sandbox: bool) -> Self {
        let base_url = if sandbox {
            SANDBOX_BASE_URL
        } else {
            PRODUCTION_BASE_URL
        };
        Self {
            base_url: base_url.to_string(),
        }
    }
}

pub struct CoraAdapter {
    credentials: CoraCredentials,
    config: CoraConfig,
    clients: HttpClients,
    endpoints: CoraEndpoints,
    tokens: TokenCache,
}

impl CoraAdapter {
    pub fn new(
        credentials: CoraCredentials,
        config: CoraConfig,
        client: Client,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let identity = TlsIdentity::from_pair(
            credentials.cert.as_ref(),
            credentials.private_key.as_ref(),
            None,
        );
        let clients = HttpClients::new(client, identity.as_ref(), timeout)?;
        let endpoints = CoraEndpoints::for_environment(credentials.sandbox);
        Ok(Self {
            credentials,
            config,
            clients,
            endpoints,
            tokens: TokenCache::new(CORA_EXPIRY_BUFFER),
        })
    }

    pub fn from_context(context: AdapterContext) -> Result<Self, ProviderError> {
        let credentials = CoraCredentials::parse(&context.credentials)?;
        let config = parse_provider_config(&context.config)?;
        Self::new(credentials, config, context.client, context.timeout)
    }

    pub fn with_endpoints(mut self, endpoints: CoraEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if self.credentials.uses_certificate() {
            return Ok(self.credentials.client_id.clone());
        }

        let key = TokenCache::scope_key(Vec::<&str>::new());
        if let Some(token) = self.tokens.get(&key, now_ms()) {
            return Ok(token);
        }

        let secret = self
            .credentials
            .client_secret
            .as_ref()
            .ok_or_else(|| ProviderError::config("cora client_secret is required without a certificate"))?;
        let response = self
            .clients
            .plain()
            .post(self.url("/auth/token"))
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": self.credentials.client_id,
                "client_secret": secret.expose(),
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Authentication {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Authentication {
                provider: PROVIDER,
                status: status.as_u16(),
                body: format!("malformed token response: {e}"),
            })?;
        self.tokens.insert(
            key,
            token.access_token.clone(),
            token.expires_in.unwrap_or(0),
            now_ms(),
        );
        debug!(provider = PROVIDER, expires_in = ?token.expires_in, "Cached access token");
        Ok(token.access_token)
    }

    fn charge_payload(&self, request: &ChargeRequest) -> Value {
        let customer = &request.customer;
        let mut payload = json!({
            "account_id": self.credentials.account_id,
            "amount": request.amount,
            "due_date": request.due_date.format("%Y-%m-%d").to_string(),
            "customer": {
                "name": customer.name,
                "document": customer.document_digits(),
            },
            "payment_methods": request.payment_methods,
            "description": request.description.clone().unwrap_or_else(|| {
                format!(
                    "Cobrança {}",
                    request
                        .reference_id
                        .as_deref()
                        .or(request.tenant_id.as_deref())
                        .unwrap_or_default()
                )
            }),
        });
        if let Some(address) = &customer.address {
            payload["customer"]["address"] = json!({
                "zip_code": address.zip_code,
                "street": address.street,
                "number": address.number,
                "neighborhood": address.neighborhood,
                "city": address.city,
                "state": address.state,
            });
        }
        if let Some(reference) = &request.reference_id {
            payload["reference_id"] = json!(reference);
        }
        if let Some(webhook) = &self.config.webhook_url {
            payload["notification_url"] = json!(webhook);
        }
        payload
    }
}

/// Payment instrument fields shared by create and retrieve responses.
fn instrument_fields(response: &Value, data: &mut DataBag) {
    insert_present(data, "digitable_line", json_path(response, &["boleto", "digitable_line"]));
    insert_present(data, "barcode", json_path(response, &["boleto", "barcode"]));
    insert_present(data, "boleto_pdf_url", json_path(response, &["boleto", "pdf_url"]));
    insert_present(data, "qr_code_text", json_path(response, &["pix", "qr_code_text"]));
    insert_present(data, "qr_code", json_path(response, &["pix", "qr_code"]));
    insert_present(data, "pix_expires_at", json_path(response, &["pix", "expires_at"]));
}

#[async_trait]
impl ProviderAdapter for CoraAdapter {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Cora
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CreatedCharge, ProviderError> {
        request.validate()?;
        let token = self.access_token().await?;

        let response = self
            .clients
            .preferred()
            .post(self.url("/charges"))
            .bearer_auth(token)
            .json(&self.charge_payload(request))
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;

        let charge_id = first_string(&body, &[&["id"]])
            .ok_or_else(|| ProviderError::Upstream {
                provider: PROVIDER,
                status: 200,
                body: format!("charge response without id: {body}"),
            })?;

        let mut data = Map::new();
        data.insert("cora_charge_id".into(), json!(charge_id));
        insert_present(&mut data, "status", body.get("status"));
        insert_present(&mut data, "created_at", body.get("created_at"));
        instrument_fields(&body, &mut data);

        info!(provider = PROVIDER, charge_id = %charge_id, "Charge created");
        Ok(CreatedCharge {
            provider_charge_id: charge_id,
            data,
        })
    }

    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn retrieve_charge(&self, provider_charge_id: &str) -> Result<RetrievedCharge, ProviderError> {
        let token = self.access_token().await?;
        let response = self
            .clients
            .preferred()
            .get(self.url(&format!("/charges/{provider_charge_id}")))
            .bearer_auth(token)
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;

        let native = body.get("status").and_then(Value::as_str);
        let status = STATUS_TABLE.normalize(native);

        let mut data = Map::new();
        insert_present(&mut data, "cora_charge_id", body.get("id"));
        insert_present(&mut data, "cora_status", body.get("status"));
        insert_present(&mut data, "amount", body.get("amount"));
        insert_present(&mut data, "due_date", body.get("due_date"));
        insert_present(&mut data, "created_at", body.get("created_at"));
        insert_present(&mut data, "paid_at", body.get("paid_at"));
        instrument_fields(&body, &mut data);

        debug!(provider = PROVIDER, charge_id = provider_charge_id, %status, "Charge retrieved");
        Ok(RetrievedCharge { status, data })
    }

    async fn cancel_charge(&self, request: &CancelRequest) -> Result<CancelOutcome, ProviderError> {
        debug!(
            provider = PROVIDER,
            charge_id = %request.provider_charge_id,
            "Cancellation requested for a provider without cancellation support"
        );
        Ok(CancelOutcome::failed(CANCEL_UNSUPPORTED))
    }
}
