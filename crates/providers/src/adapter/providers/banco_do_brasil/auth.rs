//! OAuth tokens per scope set, plus the probes used by scope discovery.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{BancoDoBrasilAdapter, PROVIDER};
use crate::adapter::error::ProviderError;
use crate::adapter::scopes::{Introspection, ProbeGrant, STATEMENT_SCOPE, ScopeProbe};
use crate::adapter::token::{
    ClientCredentialsGrant, TokenCache, TokenResponse, now_ms, request_client_credentials,
};
use crate::adapter::utils::read_json;

impl BancoDoBrasilAdapter {
    fn oauth_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.oauth_url.trim_end_matches('/'), path)
    }

    fn app_key_query(&self) -> [(&str, &str); 1] {
        [("gw-dev-app-key", self.credentials.developer_application_key.as_str())]
    }

    /// Token endpoint client. mTLS when certificates are configured.
    fn oauth_client(&self) -> &Client {
        self.clients.preferred()
    }

    async fn grant(&self, scopes: &[&str]) -> Result<TokenResponse, ProviderError> {
        let token_url = self.oauth_url("/token");
        let scope = TokenCache::scope_key(scopes.iter().copied());
        let query = self.app_key_query();
        request_client_credentials(
            self.oauth_client(),
            ClientCredentialsGrant {
                provider: PROVIDER,
                token_url: &token_url,
                client_id: &self.credentials.client_id,
                client_secret: self.credentials.client_secret.expose(),
                scope: Some(scope.as_str()),
                query: &query,
            },
        )
        .await
    }

    /// Cached token for exactly this scope set.
    pub(super) async fn access_token(&self, scopes: &[&str]) -> Result<String, ProviderError> {
        let key = TokenCache::scope_key(scopes.iter().copied());
        if let Some(token) = self.tokens.get(&key, now_ms()) {
            return Ok(token);
        }

        let token = self.grant(scopes).await?;
        self.tokens.insert(
            key,
            token.access_token.clone(),
            token.expires_in.unwrap_or(0),
            now_ms(),
        );
        Ok(token.access_token)
    }
}

#[async_trait]
impl ScopeProbe for BancoDoBrasilAdapter {
    async fn probe_token(&self) -> Result<ProbeGrant, ProviderError> {
        let token = self.grant(&[STATEMENT_SCOPE]).await?;
        self.tokens.insert(
            TokenCache::scope_key([STATEMENT_SCOPE]),
            token.access_token.clone(),
            token.expires_in.unwrap_or(0),
            now_ms(),
        );
        Ok(ProbeGrant {
            access_token: token.access_token,
            scope: token.scope,
        })
    }

    async fn introspect(&self, token: &str) -> Result<Introspection, ProviderError> {
        let response = self
            .oauth_client()
            .post(self.oauth_url("/introspect"))
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose()),
            )
            .query(&self.app_key_query())
            .form(&[("token", token), ("token_type_hint", "access_token")])
            .send()
            .await?;
        let body = read_json(PROVIDER, response).await?;
        let introspection: Introspection = serde_json::from_value(body)?;
        debug!(provider = PROVIDER, active = introspection.active, "Token introspected");
        Ok(introspection)
    }
}
