//! Sicredi boleto/PIX hybrid charges.
//!
//! Sicredi authenticates with a static API key; there is no token to cache.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::adapter::credentials::{CredentialSchema, ProviderId, SicrediCredentials};
use crate::adapter::error::ProviderError;
use crate::adapter::factory::AdapterContext;
use crate::adapter::provider_adapter::ProviderAdapter;
use crate::adapter::provider_configs::{SicrediConfig, parse_provider_config};
use crate::adapter::utils::{first_string, insert_present, random_digits, read_json};
use crate::charge::{
    CancelOutcome, CancelRequest, ChargeRequest, ChargeRule, ChargeStatus, CreatedCharge,
    PaymentMethod, RetrievedCharge, RuleKind, StatusTable,
};

const PROVIDER: &str = "sicredi";

pub const SANDBOX_API_URL: &str = "https://api-parceiro-hm.sicredi.com.br";
pub const PRODUCTION_API_URL: &str = "https://api-parceiro.sicredi.com.br";
pub const SANDBOX_PIX_URL: &str = "https://api-pix-h.sicredi.com.br";
pub const PRODUCTION_PIX_URL: &str = "https://api-pix.sicredi.com.br";

const DEFAULT_CANCEL_REASON: &str = "Cancelamento solicitado pelo beneficiário";

pub const STATUS_TABLE: StatusTable = StatusTable::new(
    PROVIDER,
    &[
        ("emitido", ChargeStatus::Pending),
        ("registro", ChargeStatus::Pending),
        ("aberto", ChargeStatus::Pending),
        ("liquidado", ChargeStatus::Paid),
        ("pago", ChargeStatus::Paid),
        ("cancelado", ChargeStatus::Cancelled),
        ("baixado", ChargeStatus::Cancelled),
        ("vencido", ChargeStatus::Cancelled),
    ],
);

#[derive(Debug, Clone)]
pub struct SicrediEndpoints {
    pub api_url: String,
    pub pix_url: String,
}

impl SicrediEndpoints {
    pub fn for_environment(sandbox: bool) -> Self {
        if sandbox {
            Self {
                api_url: SANDBOX_API_URL.to_string(),
                pix_url: SANDBOX_PIX_URL.to_string(),
            }
        } else {
            Self {
                api_url: PRODUCTION_API_URL.to_string(),
                pix_url: PRODUCTION_PIX_URL.to_string(),
            }
        }
    }
}

/// `tipoCobranca` for the requested rails.
fn charge_type(request: &ChargeRequest) -> &'static str {
    match (
        request.wants(PaymentMethod::Boleto),
        request.wants(PaymentMethod::Pix),
    ) {
        (true, true) => "HIBRIDA",
        (false, true) => "PIX",
        _ => "BOLETO",
    }
}

fn rule_type(rule: &ChargeRule, percent: &'static str, value: &'static str) -> &'static str {
    match rule.kind {
        RuleKind::Percentage => percent,
        _ => value,
    }
}

pub struct SicrediAdapter {
    credentials: SicrediCredentials,
    config: SicrediConfig,
    client: Client,
    endpoints: SicrediEndpoints,
}

impl SicrediAdapter {
    pub fn new(credentials: SicrediCredentials, config: SicrediConfig, client: Client) -> Self {
        let endpoints = SicrediEndpoints::for_environment(credentials.sandbox);
        Self {
            credentials,
            config,
            client,
            endpoints,
        }
    }

    pub fn from_context(context: AdapterContext) -> Result<Self, ProviderError> {
        let credentials = SicrediCredentials::parse(&context.credentials)?;
        let config = parse_provider_config(&context.config)?;
        Ok(Self::new(credentials, config, context.client))
    }

    pub fn with_endpoints(mut self, endpoints: SicrediEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api_url.trim_end_matches('/'), path)
    }

    fn pix_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.pix_url.trim_end_matches('/'), path)
    }

    fn charge_payload(&self, request: &ChargeRequest, nosso_numero: &str) -> Value {
        let customer = &request.customer;
        let mut payload = json!({
            "cooperativa": self.credentials.cooperativa,
            "posto": self.credentials.posto,
            "codigoBeneficiario": self.credentials.codigo_beneficiario,
            "nossoNumero": nosso_numero,
            "valor": request.amount_reais(),
            "dataVencimento": request.due_date.format("%Y-%m-%d").to_string(),
            "tipoCobranca": charge_type(request),
            "especieDocumento": self.config.especie_documento(),
            "pagador": {
                "nome": customer.name,
                "cpfCnpj": customer.document_digits(),
                "tipoPessoa": if customer.is_cpf() { "PESSOA_FISICA" } else { "PESSOA_JURIDICA" },
            },
            "mensagem": format!(
                "Cobrança {}",
                request
                    .reference_id
                    .as_deref()
                    .or(request.tenant_id.as_deref())
                    .unwrap_or_default()
            ),
        });
        if let Some(reference) = &request.reference_id {
            payload["seuNumero"] = json!(reference);
        }
        if let Some(address) = &customer.address {
            payload["pagador"]["endereco"] = json!({
                "logradouro": address.street,
                "numero": address.number,
                "bairro": address.neighborhood,
                "cidade": address.city,
                "uf": address.state,
                "cep": address.zip_code,
            });
        }
        if let Some(interest) = ChargeRule::active(request.interest.as_ref()) {
            payload["juros"] = json!({
                "tipo": rule_type(interest, "PERCENTUAL_DIA", "VALOR_DIA"),
                "valor": interest.payload_value(),
            });
        }
        if let Some(fine) = ChargeRule::active(request.fine.as_ref()) {
            payload["multa"] = json!({
                "tipo": rule_type(fine, "PERCENTUAL", "VALOR"),
                "valor": fine.payload_value(),
            });
        }
        let discounts: Vec<Value> = request
            .discounts
            .iter()
            .filter(|d| d.kind != RuleKind::None)
            .map(|d| {
                json!({
                    "tipo": if d.kind == RuleKind::Percentage { "PERCENTUAL" } else { "VALOR" },
                    "valor": d.payload_value(),
                    "dataLimite": d.date.format("%Y-%m-%d").to_string(),
                })
            })
            .collect();
        if !discounts.is_empty() {
            payload["desconto"] = Value::Array(discounts);
        }
        payload
    }

    /// One write-off attempt. `Ok(Err(..))` carries a non-2xx status and body.
    async fn try_cancel(
        &self,
        method: PaymentMethod,
        request: &CancelRequest,
    ) -> Result<Result<(), (u16, String)>, ProviderError> {
        let id = &request.provider_charge_id;
        let (url, body) = match method {
            PaymentMethod::Boleto => (
                self.pix_url(&format!("/cobranca/v2/boletos/{id}/baixa")),
                json!({
                    "tipoBaixa": "DEVOLVIDA",
                    "descricaoMotivoCancelamento": request.reason.as_deref().unwrap_or(DEFAULT_CANCEL_REASON),
                }),
            ),
            PaymentMethod::Pix => (
                self.pix_url(&format!("/pix/v2/cob/{id}")),
                json!({ "status": "REMOVIDA_PELO_USUARIO_RECEBEDOR" }),
            ),
        };

        let response = self
            .client
            .put(url)
            .bearer_auth(self.credentials.api_key.expose())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(Ok(()));
        }
        let text = response.text().await?;
        Ok(Err((status.as_u16(), text)))
    }
}

#[async_trait]
impl ProviderAdapter for SicrediAdapter {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Sicredi
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CreatedCharge, ProviderError> {
        request.validate()?;
        let nosso_numero = random_digits(8);

        let response = self
            .client
            .post(self.api_url("/v2/cobranca/boleto"))
            .header("x-api-key", self.credentials.api_key.expose())
            .json(&self.charge_payload(request, &nosso_numero))
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;

        let charge_id = first_string(&body, &[&["nossoNumero"]]).unwrap_or(nosso_numero);
        let mut data = Map::new();
        data.insert("sicredi_nosso_numero".into(), json!(charge_id));
        insert_present(&mut data, "sicredi_situacao", body.get("situacao"));
        insert_present(&mut data, "link_boleto", body.get("linkBoleto"));
        insert_present(&mut data, "digitable_line", body.get("linhaDigitavel"));
        insert_present(&mut data, "barcode", body.get("codigoBarras"));
        insert_present(&mut data, "qr_code_text", body.get("pixCopiaECola"));
        insert_present(&mut data, "qr_code", body.get("pixQrCode"));
        insert_present(&mut data, "pix_txid", body.get("txid"));

        info!(provider = PROVIDER, charge_id = %charge_id, tipo = charge_type(request), "Charge created");
        Ok(CreatedCharge {
            provider_charge_id: charge_id,
            data,
        })
    }

    #[instrument(skip(self), fields(provider = PROVIDER))]
    async fn retrieve_charge(&self, provider_charge_id: &str) -> Result<RetrievedCharge, ProviderError> {
        let creds = &self.credentials;
        let url = self.api_url(&format!(
            "/v2/cobranca/boleto/consulta/{}/{}/{}/{}",
            creds.cooperativa, creds.posto, creds.codigo_beneficiario, provider_charge_id
        ));
        let response = self
            .client
            .get(url)
            .header("x-api-key", creds.api_key.expose())
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;

        let status = STATUS_TABLE.normalize(body.get("situacao").and_then(Value::as_str));

        let mut data = Map::new();
        insert_present(&mut data, "sicredi_nosso_numero", body.get("nossoNumero"));
        insert_present(&mut data, "sicredi_situacao", body.get("situacao"));
        insert_present(&mut data, "data_vencimento", body.get("dataVencimento"));
        insert_present(&mut data, "data_pagamento", body.get("dataPagamento"));
        insert_present(&mut data, "pix_txid", body.get("txid"));
        insert_present(&mut data, "qr_code_text", body.get("pixCopiaECola"));
        if let Some(valor) = body.get("valor").and_then(Value::as_f64) {
            data.insert("valor".into(), json!((valor * 100.0).round() as i64));
        }
        if let Some(pago) = body.get("valorPago").and_then(Value::as_f64) {
            data.insert("valor_pago".into(), json!((pago * 100.0).round() as i64));
        }

        debug!(provider = PROVIDER, charge_id = provider_charge_id, %status, "Charge retrieved");
        Ok(RetrievedCharge { status, data })
    }

    #[instrument(skip(self, request), fields(provider = PROVIDER, charge_id = %request.provider_charge_id))]
    async fn cancel_charge(&self, request: &CancelRequest) -> Result<CancelOutcome, ProviderError> {
        let methods: Vec<PaymentMethod> = match request.payment_method {
            Some(method) => vec![method],
            None => vec![PaymentMethod::Boleto, PaymentMethod::Pix],
        };

        let mut failures = Vec::new();
        for method in methods {
            match self.try_cancel(method, request).await? {
                Ok(()) => {
                    info!(provider = PROVIDER, rail = %method, "Charge cancelled");
                    let mut data = Map::new();
                    data.insert("cancelled_at".into(), json!(Utc::now().to_rfc3339()));
                    data.insert("provider_charge_id".into(), json!(request.provider_charge_id));
                    data.insert("status".into(), json!(ChargeStatus::Cancelled));
                    data.insert("cancellation_type".into(), json!(method));
                    return Ok(CancelOutcome::succeeded(data));
                }
                Err((status, body)) => {
                    warn!(provider = PROVIDER, rail = %method, status, "Cancellation attempt rejected");
                    failures.push(format!("{}: {status} - {body}", method.as_str().to_uppercase()));
                }
            }
        }

        Ok(CancelOutcome::failed(format!(
            "Sicredi cancellation failed. {}",
            failures.join(". ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::test_support::{request_with, sample_request, test_client};
    use mockito::Matcher;

    fn adapter(server: &mockito::ServerGuard) -> SicrediAdapter {
        let credentials = SicrediCredentials::parse(&json!({
            "cooperativa": "0101",
            "posto": "03",
            "codigo_beneficiario": "12345",
            "api_key": "sicredi-key"
        }))
        .unwrap();
        SicrediAdapter::new(credentials, SicrediConfig::default(), test_client()).with_endpoints(
            SicrediEndpoints {
                api_url: server.url(),
                pix_url: format!("{}/pix-host", server.url()),
            },
        )
    }

    #[test]
    fn test_status_table() {
        let cases = [
            ("EMITIDO", ChargeStatus::Pending),
            ("registro", ChargeStatus::Pending),
            ("aberto", ChargeStatus::Pending),
            ("LIQUIDADO", ChargeStatus::Paid),
            ("pago", ChargeStatus::Paid),
            ("cancelado", ChargeStatus::Cancelled),
            ("baixado", ChargeStatus::Cancelled),
            ("vencido", ChargeStatus::Cancelled),
            ("protestado", ChargeStatus::Pending),
        ];
        for (native, expected) in cases {
            assert_eq!(STATUS_TABLE.normalize(Some(native)), expected, "{native}");
        }
    }

    #[test]
    fn test_charge_type() {
        assert_eq!(charge_type(&request_with(&["boleto", "pix"])), "HIBRIDA");
        assert_eq!(charge_type(&request_with(&["pix"])), "PIX");
        assert_eq!(charge_type(&request_with(&["boleto"])), "BOLETO");
    }

    #[test]
    fn test_fixed_rules_sent_in_reais() {
        let credentials = SicrediCredentials::parse(&json!({
            "cooperativa": "0101",
            "posto": "03",
            "codigo_beneficiario": "12345",
            "api_key": "sicredi-key"
        }))
        .unwrap();
        let adapter = SicrediAdapter::new(credentials, SicrediConfig::default(), test_client());
        let mut request = sample_request();
        request.interest = Some(ChargeRule {
            kind: RuleKind::Fixed,
            value: 250.0,
        });

        let payload = adapter.charge_payload(&request, "20123456");
        assert_eq!(payload["juros"], json!({"tipo": "VALOR_DIA", "valor": 2.5}));
        assert_eq!(payload["multa"], json!({"tipo": "VALOR", "valor": 5.0}));
        assert_eq!(payload["desconto"][0]["valor"], json!(10.0));
    }

    #[tokio::test]
    async fn test_create_hybrid_charge() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/cobranca/boleto")
            .match_header("x-api-key", "sicredi-key")
            .match_body(Matcher::PartialJson(json!({
                "cooperativa": "0101",
                "posto": "03",
                "codigoBeneficiario": "12345",
                "valor": 150.5,
                "dataVencimento": "2026-11-30",
                "tipoCobranca": "HIBRIDA",
                "seuNumero": "INV-001",
                "pagador": {"nome": "Maria da Silva", "cpfCnpj": "12345678909"},
                "juros": {"tipo": "PERCENTUAL_DIA", "valor": 1.0},
                "multa": {"tipo": "VALOR", "valor": 5.0},
                "desconto": [{"tipo": "VALOR", "valor": 10.0, "dataLimite": "2026-11-20"}]
            })))
            .with_status(201)
            .with_body(
                r#"{"nossoNumero":"20123456","linhaDigitavel":"748912","codigoBarras":"7489X",
                    "situacao":"EMITIDO","linkBoleto":"https://x/b","txid":"tx1","pixCopiaECola":"00020101"}"#,
            )
            .create_async()
            .await;

        let created = adapter(&server).create_charge(&sample_request()).await.unwrap();
        assert_eq!(created.provider_charge_id, "20123456");
        assert_eq!(created.data["digitable_line"], "748912");
        assert_eq!(created.data["pix_txid"], "tx1");
        assert_eq!(created.data["qr_code_text"], "00020101");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retrieve_converts_amounts_to_cents() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/cobranca/boleto/consulta/0101/03/12345/20123456")
            .match_header("x-api-key", "sicredi-key")
            .with_status(200)
            .with_body(
                r#"{"nossoNumero":"20123456","situacao":"LIQUIDADO","valor":150.5,
                    "valorPago":150.5,"dataPagamento":"2026-11-29"}"#,
            )
            .create_async()
            .await;

        let retrieved = adapter(&server).retrieve_charge("20123456").await.unwrap();
        assert_eq!(retrieved.status, ChargeStatus::Paid);
        assert_eq!(retrieved.data["valor"], 15050);
        assert_eq!(retrieved.data["valor_pago"], 15050);
    }

    #[tokio::test]
    async fn test_cancel_falls_back_to_pix() {
        let mut server = mockito::Server::new_async().await;
        let boleto = server
            .mock("PUT", "/pix-host/cobranca/v2/boletos/tx1/baixa")
            .match_header("authorization", "Bearer sicredi-key")
            .with_status(404)
            .with_body("not a boleto")
            .expect(1)
            .create_async()
            .await;
        let pix = server
            .mock("PUT", "/pix-host/pix/v2/cob/tx1")
            .match_body(Matcher::Json(json!({"status": "REMOVIDA_PELO_USUARIO_RECEBEDOR"})))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let outcome = adapter(&server)
            .cancel_charge(&CancelRequest::new("tx1"))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["cancellation_type"], "pix");
        boleto.assert_async().await;
        pix.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancel_reports_both_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", Matcher::Any)
            .with_status(422)
            .with_body("titulo liquidado")
            .expect(2)
            .create_async()
            .await;

        let outcome = adapter(&server)
            .cancel_charge(&CancelRequest::new("20123456"))
            .await
            .unwrap();
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("BOLETO: 422"));
        assert!(error.contains("PIX: 422"));
    }

    #[tokio::test]
    async fn test_cancel_restricted_to_boleto() {
        let mut server = mockito::Server::new_async().await;
        let boleto = server
            .mock("PUT", "/pix-host/cobranca/v2/boletos/20123456/baixa")
            .match_body(Matcher::PartialJson(json!({"tipoBaixa": "DEVOLVIDA"})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let mut request = CancelRequest::new("20123456");
        request.payment_method = Some(PaymentMethod::Boleto);
        let outcome = adapter(&server).cancel_charge(&request).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["cancellation_type"], "boleto");
        boleto.assert_async().await;
    }
}
