pub mod credentials;
pub mod error;
pub mod factory;
pub mod info;
pub mod provider_adapter;
pub mod provider_configs;
pub mod providers;
pub mod scopes;
pub mod tls;
pub mod token;
pub mod utils;
mod default;

#[cfg(test)]
pub(crate) mod test_support;

pub use credentials::{ProviderCredentials, ProviderId, Secret};
pub use default::{default_client, default_factory};
pub use error::ProviderError;
pub use factory::{AdapterContext, AdapterFactory};
pub use info::{ProviderInfo, all_providers, provider_info};
pub use provider_adapter::{Operation, ProviderAdapter, operation_surface};
pub use scopes::{DiscoveredScopes, ScopeSet, ScopeSource};
