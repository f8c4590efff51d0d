//! Static catalog of what each provider supports.

use serde::Serialize;

use super::credentials::ProviderId;
use super::provider_adapter::Operation;
use crate::charge::PaymentMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ClientSecret,
    Mtls,
    ApiKey,
    OAuth2ClientCredentials,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SupportedOperations {
    pub create_charge: bool,
    pub retrieve_charge: bool,
    pub cancel_charge: bool,
    /// Payment methods whose charges can be cancelled through the API.
    pub cancel_methods: &'static [PaymentMethod],
    pub get_statement: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub name: &'static str,
    pub payment_methods: &'static [PaymentMethod],
    pub auth_methods: &'static [AuthMethod],
    pub operations: SupportedOperations,
    pub notes: &'static [&'static str],
}

impl ProviderInfo {
    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::CreateCharge => self.operations.create_charge,
            Operation::RetrieveCharge => self.operations.retrieve_charge,
            Operation::CancelCharge => self.operations.cancel_charge,
            Operation::GetStatement => self.operations.get_statement,
        }
    }

    pub fn can_cancel(&self, method: PaymentMethod) -> bool {
        self.operations.cancel_charge && self.operations.cancel_methods.contains(&method)
    }
}

static PROVIDERS: [ProviderInfo; 4] = [
    ProviderInfo {
        id: ProviderId::Cora,
        name: "Cora",
        payment_methods: &[PaymentMethod::Boleto, PaymentMethod::Pix],
        auth_methods: &[AuthMethod::ClientSecret, AuthMethod::Mtls],
        operations: SupportedOperations {
            create_charge: true,
            retrieve_charge: true,
            cancel_charge: false,
            cancel_methods: &[],
            get_statement: false,
        },
        notes: &[
            "Invoices cannot be cancelled through the API; cancel them with Cora support",
            "Tokens are refreshed one hour before expiry",
        ],
    },
    ProviderInfo {
        id: ProviderId::Sicredi,
        name: "Sicredi",
        payment_methods: &[PaymentMethod::Boleto, PaymentMethod::Pix],
        auth_methods: &[AuthMethod::ApiKey],
        operations: SupportedOperations {
            create_charge: true,
            retrieve_charge: true,
            cancel_charge: true,
            cancel_methods: &[PaymentMethod::Boleto, PaymentMethod::Pix],
            get_statement: false,
        },
        notes: &["Boleto and PIX are issued together as a hybrid charge"],
    },
    ProviderInfo {
        id: ProviderId::Itau,
        name: "Itaú",
        payment_methods: &[PaymentMethod::Boleto, PaymentMethod::Pix],
        auth_methods: &[AuthMethod::OAuth2ClientCredentials, AuthMethod::Mtls],
        operations: SupportedOperations {
            create_charge: true,
            retrieve_charge: true,
            cancel_charge: true,
            cancel_methods: &[PaymentMethod::Pix],
            get_statement: false,
        },
        notes: &[
            "Boleto issuance requires beneficiario_id in the provider config",
            "PIX issuance requires pix_key in the provider config",
        ],
    },
    ProviderInfo {
        id: ProviderId::BancoDoBrasil,
        name: "Banco do Brasil",
        payment_methods: &[PaymentMethod::Boleto, PaymentMethod::Pix],
        auth_methods: &[AuthMethod::OAuth2ClientCredentials, AuthMethod::Mtls],
        operations: SupportedOperations {
            create_charge: true,
            retrieve_charge: true,
            cancel_charge: true,
            cancel_methods: &[PaymentMethod::Boleto],
            get_statement: true,
        },
        notes: &[
            "PIX is only issued embedded in a boleto",
            "Statements require mutual TLS in production",
            "Available operations depend on the OAuth scopes granted to the application",
        ],
    },
];

pub fn all_providers() -> &'static [ProviderInfo] {
    &PROVIDERS
}

pub fn provider_info(id: ProviderId) -> &'static ProviderInfo {
    match id {
        ProviderId::Cora => &PROVIDERS[0],
        ProviderId::Sicredi => &PROVIDERS[1],
        ProviderId::Itau => &PROVIDERS[2],
        ProviderId::BancoDoBrasil => &PROVIDERS[3],
    }
}
