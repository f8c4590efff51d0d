use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::credentials::ProviderId;
use super::error::ProviderError;
use super::info::provider_info;
use super::scopes::ScopeSet;
use crate::charge::{
    AccountStatement, CancelOutcome, CancelRequest, ChargeRequest, CreatedCharge, RetrievedCharge,
    StatementRequest,
};

/// Operations a caller may be offered for a given adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateCharge,
    RetrieveCharge,
    CancelCharge,
    GetStatement,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::CreateCharge,
        Operation::RetrieveCharge,
        Operation::CancelCharge,
        Operation::GetStatement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateCharge => "create_charge",
            Self::RetrieveCharge => "retrieve_charge",
            Self::CancelCharge => "cancel_charge",
            Self::GetStatement => "get_statement",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common contract of every bank adapter.
///
/// The capability probes have defaults that assume full capability; only
/// providers with partial-scope credentials override them.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    /// Register a charge. Fails with [`ProviderError::UnsupportedOperation`]
    /// when a requested payment method cannot be issued with these credentials.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CreatedCharge, ProviderError>;

    async fn retrieve_charge(&self, provider_charge_id: &str) -> Result<RetrievedCharge, ProviderError>;

    /// Expected non-cancellable states come back as `success: false`; only
    /// transport and authentication failures are errors.
    async fn cancel_charge(&self, request: &CancelRequest) -> Result<CancelOutcome, ProviderError>;

    async fn get_account_statement(
        &self,
        _request: &StatementRequest,
    ) -> Result<AccountStatement, ProviderError> {
        Err(ProviderError::unsupported(format!(
            "{} does not provide account statements",
            self.provider_id()
        )))
    }

    /// Granted scopes, for providers that track them.
    async fn available_scopes(&self) -> Option<ScopeSet> {
        None
    }

    async fn has_scope(&self, _scope: &str) -> bool {
        true
    }

    async fn can_create_charges(&self) -> bool {
        true
    }

    async fn can_get_statements(&self) -> bool {
        true
    }
}

/// Operations the provider supports that these credentials are authorized for.
pub async fn operation_surface(adapter: &dyn ProviderAdapter) -> Vec<Operation> {
    let info = provider_info(adapter.provider_id());
    let mut surface = Vec::with_capacity(Operation::ALL.len());
    for operation in Operation::ALL {
        if !info.supports(operation) {
            continue;
        }
        let authorized = match operation {
            Operation::CreateCharge => adapter.can_create_charges().await,
            Operation::GetStatement => adapter.can_get_statements().await,
            Operation::RetrieveCharge | Operation::CancelCharge => true,
        };
        if authorized {
            surface.push(operation);
        }
    }
    surface
}
