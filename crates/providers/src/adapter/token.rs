//! Adapter-owned OAuth token cache and client-credentials grant.
//!
//! Each adapter instance owns one [`TokenCache`]; tokens never leave it, so two
//! tenants' adapters cannot observe each other's tokens. Entries are keyed by
//! the scope fingerprint of the grant.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use super::error::ProviderError;

/// Safety buffer for OAuth2 client-credentials tokens.
pub const OAUTH_EXPIRY_BUFFER: Duration = Duration::from_secs(300);
/// Cora tokens are dropped a full hour early.
pub const CORA_EXPIRY_BUFFER: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCacheEntry {
    pub token: String,
    pub expires_at_ms: i64,
}

#[derive(Debug)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, TokenCacheEntry>>,
    buffer_ms: i64,
}

impl TokenCache {
    pub fn new(buffer: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            buffer_ms: buffer.as_millis() as i64,
        }
    }

    /// Sorted, deduplicated, space-joined scope list.
    pub fn scope_key<I, S>(scopes: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scopes: Vec<String> = scopes
            .into_iter()
            .flat_map(|s| {
                s.as_ref()
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes.join(" ")
    }

    /// Token for `key` if `now_ms` is still before the buffered expiry.
    pub fn get(&self, key: &str, now_ms: i64) -> Option<String> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        (now_ms < entry.expires_at_ms - self.buffer_ms).then(|| entry.token.clone())
    }

    pub fn insert(&self, key: impl Into<String>, token: impl Into<String>, expires_in_secs: u64, now_ms: i64) {
        let expires_in_ms = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let expires_at_ms = now_ms.saturating_add(expires_in_ms);
        self.entries.lock().insert(
            key.into(),
            TokenCacheEntry {
                token: token.into(),
                expires_at_ms,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Current wall-clock time in epoch milliseconds.
#[inline]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Missing lifetimes are treated as zero, so the token is never reused.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Granted scopes, when the server echoes them.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Parameters for a client-credentials grant.
#[derive(Debug, Clone, Copy)]
pub struct ClientCredentialsGrant<'a> {
    pub provider: &'static str,
    pub token_url: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub scope: Option<&'a str>,
    /// Extra query parameters some gateways require on the token URL.
    pub query: &'a [(&'a str, &'a str)],
}

/// Run an OAuth2 client-credentials grant with HTTP Basic authentication.
pub async fn request_client_credentials(
    client: &Client,
    grant: ClientCredentialsGrant<'_>,
) -> Result<TokenResponse, ProviderError> {
    let mut form = vec![("grant_type", "client_credentials")];
    if let Some(scope) = grant.scope {
        form.push(("scope", scope));
    }

    let response = client
        .post(grant.token_url)
        .basic_auth(grant.client_id, Some(grant.client_secret))
        .query(grant.query)
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Authentication {
            provider: grant.provider,
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse =
        serde_json::from_str(&body).map_err(|e| ProviderError::Authentication {
            provider: grant.provider,
            status: status.as_u16(),
            body: format!("malformed token response: {e}"),
        })?;

    tracing::debug!(
        provider = grant.provider,
        expires_in = ?token.expires_in,
        scope = ?token.scope,
        "Obtained access token"
    );

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_scope_key_is_order_independent() {
        assert_eq!(
            TokenCache::scope_key(["b", "a", "a"]),
            TokenCache::scope_key(["a b"])
        );
        assert_eq!(TokenCache::scope_key(Vec::<String>::new()), "");
    }

    #[test]
    fn test_reused_until_buffer_boundary() {
        let cache = TokenCache::new(OAUTH_EXPIRY_BUFFER);
        cache.insert("s", "tok", 3600, T0);

        let boundary = T0 + (3600 - 300) * 1000;
        assert_eq!(cache.get("s", T0).as_deref(), Some("tok"));
        assert_eq!(cache.get("s", boundary - 1).as_deref(), Some("tok"));
        assert_eq!(cache.get("s", boundary), None);
        assert_eq!(cache.get("s", boundary + 1), None);
    }

    #[test]
    fn test_cora_buffer() {
        let cache = TokenCache::new(CORA_EXPIRY_BUFFER);
        cache.insert("", "tok", 86_400, T0);
        let boundary = T0 + (86_400 - 3600) * 1000;
        assert!(cache.get("", boundary - 1).is_some());
        assert!(cache.get("", boundary).is_none());
    }

    #[test]
    fn test_short_lived_token_never_reused() {
        let cache = TokenCache::new(OAUTH_EXPIRY_BUFFER);
        cache.insert("s", "tok", 120, T0);
        assert!(cache.get("s", T0).is_none());
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let cache = TokenCache::new(OAUTH_EXPIRY_BUFFER);
        cache.insert("s", "tok", u64::MAX, T0);
        assert_eq!(cache.get("s", T0).as_deref(), Some("tok"));
        cache.insert("s", "tok", i64::MAX as u64 + 1, T0);
        assert_eq!(cache.get("s", T0).as_deref(), Some("tok"));
    }

    #[test]
    fn test_keys_are_isolated() {
        let cache = TokenCache::new(OAUTH_EXPIRY_BUFFER);
        cache.insert("extrato-info", "a", 3600, T0);
        cache.insert("cobrancas.boletos-info", "b", 3600, T0);
        assert_eq!(cache.get("extrato-info", T0).as_deref(), Some("a"));
        assert_eq!(cache.len(), 2);
        cache.invalidate("extrato-info");
        assert!(cache.get("extrato-info", T0).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
