//! Banco do Brasil cobrança v2 and extratos.
//!
//! A single BB application may be granted charge scopes, statement scopes or
//! both. Granted scopes are discovered once per adapter and gate which
//! operations are offered.

mod auth;
pub mod statement;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::adapter::credentials::{BancoDoBrasilCredentials, CredentialSchema, ProviderId};
use crate::adapter::error::ProviderError;
use crate::adapter::factory::AdapterContext;
use crate::adapter::provider_adapter::ProviderAdapter;
use crate::adapter::provider_configs::{BancoDoBrasilConfig, parse_provider_config};
use crate::adapter::scopes::{CHARGE_SCOPES, STATEMENT_SCOPES, ScopeDiscovery, ScopeSet};
use crate::adapter::tls::{HttpClients, TlsIdentity};
use crate::adapter::token::{OAUTH_EXPIRY_BUFFER, TokenCache};
use crate::adapter::utils::{first_string, insert_present, json_path, random_digits, read_json};
use crate::charge::{
    AccountStatement, CancelOutcome, CancelRequest, ChargeRequest, ChargeRule, ChargeStatus,
    CreatedCharge, PaymentMethod, RetrievedCharge, RuleKind, StatementRequest, StatusTable,
};

pub(crate) const PROVIDER: &str = "banco_do_brasil";

pub const SANDBOX_COBRANCA_URL: &str = "https://api.hm.bb.com.br/cobrancas/v2";
pub const PRODUCTION_COBRANCA_URL: &str = "https://api.bb.com.br/cobrancas/v2";
pub const SANDBOX_OAUTH_URL: &str = "https://oauth.hm.bb.com.br/oauth";
pub const PRODUCTION_OAUTH_URL: &str = "https://oauth.bb.com.br/oauth";
pub const SANDBOX_STATEMENT_URL: &str = "https://api.hm.bb.com.br/extratos/v1";
pub const PRODUCTION_STATEMENT_URL: &str = "https://api-extratos.bb.com.br/extratos/v1";

pub const STATUS_TABLE: StatusTable = StatusTable::new(
    PROVIDER,
    &[
        ("normal", ChargeStatus::Pending),
        ("registro", ChargeStatus::Pending),
        ("em ser", ChargeStatus::Pending),
        ("liquidado", ChargeStatus::Paid),
        ("baixado por pagamento", ChargeStatus::Paid),
        ("baixado_por_pagamento", ChargeStatus::Paid),
        ("cancelado", ChargeStatus::Cancelled),
        ("baixado", ChargeStatus::Cancelled),
        ("protestado", ChargeStatus::Cancelled),
    ],
);

#[derive(Debug, Clone)]
pub struct BancoDoBrasilEndpoints {
    pub cobranca_url: String,
    pub oauth_url: String,
    pub statement_url: String,
}

impl BancoDoBrasilEndpoints {
    pub fn for_environment(sandbox: bool) -> Self {
        let (cobranca, oauth, statement) = if sandbox {
            (SANDBOX_COBRANCA_URL, SANDBOX_OAUTH_URL, SANDBOX_STATEMENT_URL)
        } else {
            (
                PRODUCTION_COBRANCA_URL,
                PRODUCTION_OAUTH_URL,
                PRODUCTION_STATEMENT_URL,
            )
        };
        Self {
            cobranca_url: cobranca.to_string(),
            oauth_url: oauth.to_string(),
            statement_url: statement.to_string(),
        }
    }
}

fn bb_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// BB rule type: 1 fixed value, 2 percentage.
fn rule_fields(rule: &ChargeRule) -> Map<String, Value> {
    let mut fields = Map::new();
    match rule.kind {
        RuleKind::Percentage => {
            fields.insert("tipo".into(), json!(2));
            fields.insert("porcentagem".into(), json!(rule.payload_value()));
        }
        _ => {
            fields.insert("tipo".into(), json!(1));
            fields.insert("valor".into(), json!(rule.payload_value()));
        }
    }
    fields
}

fn cents(value: Option<&Value>) -> Option<Value> {
    value
        .and_then(Value::as_f64)
        .map(|reais| json!((reais * 100.0).round() as i64))
}

pub struct BancoDoBrasilAdapter {
    credentials: BancoDoBrasilCredentials,
    config: BancoDoBrasilConfig,
    clients: HttpClients,
    endpoints: BancoDoBrasilEndpoints,
    tokens: TokenCache,
    discovery: ScopeDiscovery,
}

impl BancoDoBrasilAdapter {
    pub fn new(
        credentials: BancoDoBrasilCredentials,
        config: BancoDoBrasilConfig,
        client: Client,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        config.validate()?;
        let identity = TlsIdentity::from_pair(
            credentials.cert.as_ref(),
            credentials.cert_key.as_ref(),
            credentials.ca_bundle.as_deref(),
        );
        let clients = HttpClients::new(client, identity.as_ref(), timeout)?;
        let endpoints = BancoDoBrasilEndpoints::for_environment(credentials.sandbox);
        let declared = credentials.scopes.as_ref().map(ScopeSet::from_iter);
        Ok(Self {
            credentials,
            config,
            clients,
            endpoints,
            tokens: TokenCache::new(OAUTH_EXPIRY_BUFFER),
            discovery: ScopeDiscovery::new(PROVIDER, declared),
        })
    }

    pub fn from_context(context: AdapterContext) -> Result<Self, ProviderError> {
        let credentials = BancoDoBrasilCredentials::parse(&context.credentials)?;
        let config = parse_provider_config(&context.config)?;
        Self::new(credentials, config, context.client, context.timeout)
    }

    pub fn with_endpoints(mut self, endpoints: BancoDoBrasilEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn cobranca_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.cobranca_url.trim_end_matches('/'), path)
    }

    fn statement_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.statement_url.trim_end_matches('/'), path)
    }

    async fn granted_scopes(&self) -> &ScopeSet {
        &self.discovery.resolve(self).await.scopes
    }

    /// 20 digits: "000", the 7-digit agreement, then a 10-digit sequence.
    fn titulo_cliente(&self) -> String {
        format!("000{:0>7}{}", self.config.convenio(), random_digits(10))
    }

    fn charge_payload(&self, request: &ChargeRequest, titulo_cliente: &str) -> Value {
        let customer = &request.customer;
        let address = customer.address.clone().unwrap_or_default();
        let reference: String = match request.reference_id.as_deref() {
            Some(reference) => reference.chars().take(15).collect(),
            None => titulo_cliente.chars().skip(10).take(15).collect(),
        };
        let mut payload = json!({
            "numeroConvenio": self.config.convenio(),
            "numeroCarteira": self.config.carteira(),
            "numeroVariacaoCarteira": self.config.variacao_carteira(),
            "codigoModalidade": 1,
            "dataEmissao": bb_date(Utc::now().date_naive()),
            "dataVencimento": bb_date(request.due_date),
            "valorOriginal": request.amount_reais(),
            "indicadorAceiteTituloVencido": "N",
            "codigoAceite": "N",
            "codigoTipoTitulo": 2,
            "descricaoTipoTitulo": "DM",
            "indicadorPermissaoRecebimentoParcial": "N",
            "numeroTituloBeneficiario": reference,
            "numeroTituloCliente": titulo_cliente,
            "mensagemBloquetoOcorrencia": format!(
                "Cobrança {}",
                request
                    .reference_id
                    .as_deref()
                    .or(request.tenant_id.as_deref())
                    .unwrap_or_default()
            ),
            "pagador": {
                "tipoInscricao": if customer.is_cpf() { 1 } else { 2 },
                "numeroInscricao": customer.document_digits(),
                "nome": customer.name,
                "endereco": address.street,
                "cep": address.zip_code,
                "cidade": address.city,
                "bairro": address.neighborhood,
                "uf": address.state,
            },
            "indicadorPix": if request.wants(PaymentMethod::Pix) { "S" } else { "N" },
        });
        if let Some(phone) = &customer.phone {
            payload["pagador"]["telefone"] = json!(phone);
        }
        if let Some(interest) = ChargeRule::active(request.interest.as_ref()) {
            payload["jurosMora"] = Value::Object(rule_fields(interest));
        }
        if let Some(fine) = ChargeRule::active(request.fine.as_ref()) {
            let mut multa = rule_fields(fine);
            // Fines accrue from the day after the due date.
            let start = request.due_date.checked_add_days(Days::new(1)).unwrap_or(request.due_date);
            multa.insert("data".into(), json!(bb_date(start)));
            payload["multa"] = Value::Object(multa);
        }
        if let Some(discount) = request.discounts.iter().find(|d| d.kind != RuleKind::None) {
            let mut desconto = rule_fields(&ChargeRule {
                kind: discount.kind,
                value: discount.value,
            });
            desconto.insert("dataExpiracao".into(), json!(bb_date(discount.date)));
            payload["desconto"] = Value::Object(desconto);
        }
        payload
    }

    async fn require_scopes(&self, required: &[&str], operation: &str) -> Result<(), ProviderError> {
        let scopes = self.granted_scopes().await;
        if scopes.contains_all(required) {
            return Ok(());
        }
        Err(ProviderError::unsupported(format!(
            "banco_do_brasil credentials are not authorized for {operation}; granted scopes: {scopes}"
        )))
    }
}

#[async_trait]
impl ProviderAdapter for BancoDoBrasilAdapter {
    fn provider_id(&self) -> ProviderId {
        ProviderId::BancoDoBrasil
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CreatedCharge, ProviderError> {
        request.validate()?;
        if !request.wants(PaymentMethod::Boleto) {
            return Err(ProviderError::unsupported(
                "banco_do_brasil issues PIX only embedded in a boleto; include the boleto payment method",
            ));
        }
        self.require_scopes(CHARGE_SCOPES, "charge creation").await?;

        let token = self.access_token(CHARGE_SCOPES).await?;
        let titulo_cliente = self.titulo_cliente();
        let response = self
            .clients
            .preferred()
            .post(self.cobranca_url("/boletos"))
            .bearer_auth(token)
            .header("X-Developer-Application-Key", &self.credentials.developer_application_key)
            .json(&self.charge_payload(request, &titulo_cliente))
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;

        let charge_id = first_string(&body, &[&["numero"]]).unwrap_or(titulo_cliente);
        let mut data = Map::new();
        data.insert("bb_numero".into(), json!(charge_id));
        insert_present(&mut data, "bb_numero_carteira", body.get("numeroCarteira"));
        insert_present(&mut data, "bb_numero_contrato", body.get("numeroContratoCobranca"));
        insert_present(&mut data, "digitable_line", body.get("linhaDigitavel"));
        insert_present(&mut data, "barcode", body.get("codigoBarraNumerico"));
        if request.wants(PaymentMethod::Pix) {
            insert_present(&mut data, "qr_code_text", json_path(&body, &["qrCode", "emv"]));
            insert_present(&mut data, "qr_code_url", json_path(&body, &["qrCode", "url"]));
            insert_present(&mut data, "pix_txid", json_path(&body, &["qrCode", "txId"]));
            insert_present(&mut data, "pix_txid", json_path(&body, &["qrCode", "txid"]));
        }

        info!(provider = PROVIDER, charge_id = %charge_id, "Charge created");
        Ok(CreatedCharge {
            provider_charge_id: charge_id,
            data,
        })
    }

    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn retrieve_charge(&self, provider_charge_id: &str) -> Result<RetrievedCharge, ProviderError> {
        let token = self.access_token(CHARGE_SCOPES).await?;
        let response = self
            .clients
            .preferred()
            .get(self.cobranca_url(&format!("/boletos/{provider_charge_id}")))
            .query(&[("numeroConvenio", self.config.convenio())])
            .bearer_auth(token)
            .header("X-Developer-Application-Key", &self.credentials.developer_application_key)
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;

        let status = STATUS_TABLE.normalize(body.get("estadoTituloCobranca").and_then(Value::as_str));
        let mut data = Map::new();
        insert_present(&mut data, "bb_numero", body.get("numero"));
        insert_present(&mut data, "bb_estado_titulo", body.get("estadoTituloCobranca"));
        insert_present(&mut data, "bb_numero_carteira", body.get("numeroCarteira"));
        insert_present(&mut data, "data_vencimento", body.get("dataVencimento"));
        insert_present(&mut data, "digitable_line", body.get("linhaDigitavel"));
        insert_present(&mut data, "barcode", body.get("codigoBarraNumerico"));
        insert_present(&mut data, "valor_original", cents(body.get("valorOriginal")).as_ref());
        insert_present(&mut data, "data_pagamento", json_path(&body, &["pagamento", "data"]));
        insert_present(&mut data, "valor_pago", cents(json_path(&body, &["pagamento", "valor"])).as_ref());

        Ok(RetrievedCharge { status, data })
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER, charge_id = %request.provider_charge_id))]
    async fn cancel_charge(&self, request: &CancelRequest) -> Result<CancelOutcome, ProviderError> {
        if request.payment_method == Some(PaymentMethod::Pix) {
            return Ok(CancelOutcome::failed(
                "Banco do Brasil cancels boletos only; the embedded PIX is withdrawn with the boleto",
            ));
        }

        let token = self.access_token(CHARGE_SCOPES).await?;
        let id = &request.provider_charge_id;
        let response = self
            .clients
            .preferred()
            .post(self.cobranca_url(&format!("/boletos/{id}/baixar")))
            .bearer_auth(token)
            .header("X-Developer-Application-Key", &self.credentials.developer_application_key)
            .json(&json!({ "numeroConvenio": self.config.convenio() }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(provider = PROVIDER, status = status.as_u16(), "Boleto write-off rejected");
            return Ok(CancelOutcome::failed(format!(
                "Banco do Brasil cancellation failed: {} - {body}",
                status.as_u16()
            )));
        }

        info!(provider = PROVIDER, "Charge cancelled");
        let mut data = Map::new();
        data.insert("cancelled_at".into(), json!(Utc::now().to_rfc3339()));
        data.insert("provider_charge_id".into(), json!(id));
        data.insert("status".into(), json!(ChargeStatus::Cancelled));
        data.insert("cancellation_type".into(), json!(PaymentMethod::Boleto));
        if let Ok(receipt) = serde_json::from_str::<Value>(&body) {
            insert_present(&mut data, "bb_data_baixa", receipt.get("dataBaixa"));
        }
        Ok(CancelOutcome::succeeded(data))
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER))]
    async fn get_account_statement(
        &self,
        request: &StatementRequest,
    ) -> Result<AccountStatement, ProviderError> {
        request.validate()?;
        let agency = request
            .agency
            .as_deref()
            .or(self.credentials.agency.as_deref())
            .ok_or_else(|| ProviderError::validation("agency is required for statements"))?;
        let account = request
            .account
            .as_deref()
            .unwrap_or(&self.credentials.account_number);

        let client = if self.credentials.sandbox {
            self.clients.preferred()
        } else {
            self.clients.require_mtls(PROVIDER, "account statements")?
        };
        self.require_scopes(STATEMENT_SCOPES, "account statements").await?;

        let token = self.access_token(STATEMENT_SCOPES).await?;
        let response = client
            .get(self.statement_url(&format!(
                "/conta-corrente/agencia/{agency}/conta/{account}"
            )))
            .query(&[("gw-dev-app-key", self.credentials.developer_application_key.as_str())])
            .query(&statement::statement_query(request))
            .bearer_auth(token)
            .send()
            .await?;
        let raw = match read_json(PROVIDER, response).await? {
            Value::Null => statement::empty_page(request),
            raw => raw,
        };

        let data = statement::normalize(&raw, request);
        info!(
            provider = PROVIDER,
            page = data.page,
            total_pages = data.total_pages,
            entries = data.entries.len(),
            "Statement page fetched"
        );
        Ok(AccountStatement { raw, data })
    }

    async fn available_scopes(&self) -> Option<ScopeSet> {
        Some(self.granted_scopes().await.clone())
    }

    async fn has_scope(&self, scope: &str) -> bool {
        self.granted_scopes().await.contains(scope)
    }

    async fn can_create_charges(&self) -> bool {
        self.granted_scopes().await.contains_all(CHARGE_SCOPES)
    }

    async fn can_get_statements(&self) -> bool {
        self.granted_scopes().await.contains_all(STATEMENT_SCOPES)
    }
}
