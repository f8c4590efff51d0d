//! Provider-neutral charge, cancellation and statement types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::status::ChargeStatus;
use crate::adapter::error::ProviderError;

/// Provider-specific fields preserved for audit and display.
pub type DataBag = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Boleto,
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boleto => "boleto",
            Self::Pix => "pix",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Percentage,
    Fixed,
    None,
}

impl RuleKind {
    /// Value as bank payloads expect it: percentages unchanged, fixed
    /// centavos converted to reais.
    pub fn payload_value(self, value: f64) -> f64 {
        match self {
            Self::Fixed => value / 100.0,
            Self::Percentage | Self::None => value,
        }
    }
}

/// Interest or fine rule. `Fixed` values are in centavos, like `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value: f64,
}

impl ChargeRule {
    /// The rule if it actually charges something.
    pub fn active(rule: Option<&ChargeRule>) -> Option<&ChargeRule> {
        rule.filter(|r| r.kind != RuleKind::None && r.value > 0.0)
    }

    pub fn payload_value(&self) -> f64 {
        self.kind.payload_value(self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value: f64,
    pub date: NaiveDate,
}

impl Discount {
    pub fn payload_value(&self) -> f64 {
        self.kind.payload_value(self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub zip_code: String,
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    /// CPF or CNPJ, punctuation allowed.
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Customer {
    pub fn document_digits(&self) -> String {
        self.document.chars().filter(char::is_ascii_digit).collect()
    }

    /// Eleven digits is a CPF, anything else is treated as a CNPJ.
    pub fn is_cpf(&self) -> bool {
        self.document_digits().len() == 11
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Amount in centavos.
    pub amount: i64,
    pub due_date: NaiveDate,
    pub payment_methods: Vec<PaymentMethod>,
    pub customer: Customer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest: Option<ChargeRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fine: Option<ChargeRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discounts: Vec<Discount>,
    /// Caller-side idempotency reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ChargeRequest {
    pub fn wants(&self, method: PaymentMethod) -> bool {
        self.payment_methods.contains(&method)
    }

    /// Amount in reais, as most bank APIs expect.
    pub fn amount_reais(&self) -> f64 {
        self.amount as f64 / 100.0
    }

    /// Check the request before any network call is made.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let mut issues = Vec::new();

        if self.amount < 1 {
            issues.push("amount must be at least 1 centavo".to_string());
        }
        if self.payment_methods.is_empty() {
            issues.push("at least one payment method is required".to_string());
        }
        if self.customer.name.trim().is_empty() {
            issues.push("customer.name is required".to_string());
        }
        let doc_len = self.customer.document.len();
        if !(11..=20).contains(&doc_len) {
            issues.push(format!(
                "customer.document must have 11 to 20 characters, got {doc_len}"
            ));
        }
        for (field, rule) in [("interest", &self.interest), ("fine", &self.fine)] {
            if let Some(rule) = rule
                && rule.value < 0.0
            {
                issues.push(format!("{field}.value must not be negative"));
            }
        }
        for (i, discount) in self.discounts.iter().enumerate() {
            if discount.value < 0.0 {
                issues.push(format!("discounts[{i}].value must not be negative"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::validation(issues.join("; ")))
        }
    }
}

/// Format centavos as a decimal string with two places ("1234" -> "12.34").
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedCharge {
    pub provider_charge_id: String,
    pub data: DataBag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCharge {
    pub status: ChargeStatus,
    pub data: DataBag,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
    pub provider_charge_id: String,
    /// Restricts the attempt to one rail when the provider supports several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CancelRequest {
    pub fn new(provider_charge_id: impl Into<String>) -> Self {
        Self {
            provider_charge_id: provider_charge_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataBag>,
}

impl CancelOutcome {
    pub fn succeeded(data: DataBag) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }

    pub fn failed_with(error: impl Into<String>, data: DataBag) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl StatementRequest {
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.start_date > self.end_date {
            return Err(ProviderError::validation(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.page == Some(0) || self.page_size == Some(0) {
            return Err(ProviderError::validation("page and page_size start at 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub description: String,
    pub amount_cents: i64,
    pub direction: EntryDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementData {
    pub page: u32,
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    pub entries: Vec<StatementEntry>,
}

/// Statement page: the untouched provider payload plus its normalized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub raw: Value,
    pub data: StatementData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> ChargeRequest {
        serde_json::from_value(json!({
            "tenant_id": "tenant-1",
            "amount": 15050,
            "due_date": "2026-11-30",
            "payment_methods": ["boleto", "pix"],
            "customer": {
                "name": "Maria da Silva",
                "document": "123.456.789-09",
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
            "discounts": [{"type": "fixed", "value": 1000.0, "date": "2026-11-20"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_request() {
        let request = sample_request();
        assert!(request.validate().is_ok());
        assert!(request.wants(PaymentMethod::Pix));
        assert!(request.customer.is_cpf());
        assert_eq!(request.amount_reais(), 150.5);
    }

    #[test]
    fn test_validation_collects_issues() {
        let mut request = sample_request();
        request.amount = 0;
        request.payment_methods.clear();
        request.customer.name = " ".into();
        let err = request.validate().unwrap_err().to_string();
        assert!(err.contains("amount"));
        assert!(err.contains("payment method"));
        assert!(err.contains("customer.name"));
    }

    #[test]
    fn test_cnpj_detection() {
        let mut request = sample_request();
        request.customer.document = "12.345.678/0001-95".into();
        assert!(!request.customer.is_cpf());
        assert_eq!(request.customer.document_digits(), "12345678000195");
    }

    #[test]
    fn test_inactive_rules() {
        let none = ChargeRule {
            kind: RuleKind::None,
            value: 2.0,
        };
        let zero = ChargeRule {
            kind: RuleKind::Percentage,
            value: 0.0,
        };
        assert!(ChargeRule::active(Some(&none)).is_none());
        assert!(ChargeRule::active(Some(&zero)).is_none());
        assert!(ChargeRule::active(None).is_none());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(15050), "150.50");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(-120), "-1.20");
    }

    #[test]
    fn test_statement_range_validation() {
        let request = StatementRequest {
            agency: None,
            account: None,
            start_date: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            page: None,
            page_size: None,
        };
        assert!(matches!(
            request.validate(),
            Err(ProviderError::Validation(_))
        ));
    }
}
