//! Provider adapters for Brazilian banking charge APIs.
//!
//! The crate exposes one [`ProviderAdapter`](adapter::ProviderAdapter) contract
//! implemented by Cora, Sicredi, Itau and Banco do Brasil, an
//! [`AdapterFactory`](adapter::AdapterFactory) that builds adapters from
//! encrypted credential envelopes, and the [`CredentialCodec`](codec::CredentialCodec)
//! used to seal those envelopes.

pub mod adapter;
pub mod charge;
pub mod codec;

pub use adapter::error::ProviderError;
pub use adapter::{AdapterFactory, ProviderAdapter, ProviderId, default_client, default_factory};
pub use charge::{
    AccountStatement, CancelOutcome, CancelRequest, ChargeRequest, ChargeStatus, CreatedCharge,
    PaymentMethod, RetrievedCharge, StatementRequest,
};
pub use codec::{CodecError, CredentialCodec};
