//! Read-through session resolution over a [`SessionStore`].

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use cobranca_providers::adapter::ProviderCredentials;
use cobranca_providers::adapter::provider_configs::{extract_provider_config, merge_provider_config};
use cobranca_providers::{AdapterFactory, CredentialCodec, ProviderAdapter};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::id::derive_session_id;
use super::store::SessionStore;
use super::types::{ResolvedSession, SessionCacheEntry, SessionRequest};
use crate::error::Result;

const SESSION_KEY_PREFIX: &str = "session";

#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    codec: Arc<CredentialCodec>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, codec: Arc<CredentialCodec>) -> Self {
        Self { store, codec }
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// `session:[prefix:]<id>`
    pub fn key(session_id: &str, prefix: Option<&str>) -> String {
        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{SESSION_KEY_PREFIX}:{prefix}:{session_id}"),
            None => format!("{SESSION_KEY_PREFIX}:{session_id}"),
        }
    }

    /// Cached entry, if any. Unparseable entries are deleted and read as a miss.
    pub async fn get(&self, session_id: &str, prefix: Option<&str>) -> Result<Option<SessionCacheEntry>> {
        let key = Self::key(session_id, prefix);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(session_id, error = %e, "Dropping corrupt session entry");
                self.store.delete(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn put(
        &self,
        entry: &SessionCacheEntry,
        ttl_seconds: u64,
        prefix: Option<&str>,
    ) -> Result<()> {
        let key = Self::key(&entry.session_id, prefix);
        let raw = serde_json::to_string(entry)?;
        self.store.set_ex(&key, &raw, ttl_seconds).await
    }

    pub async fn invalidate_session(&self, session_id: &str, prefix: Option<&str>) -> Result<()> {
        debug!(session_id, "Invalidating session");
        self.store.delete(&Self::key(session_id, prefix)).await
    }

    /// Validate the request's plaintext credentials and seal a fresh entry.
    ///
    /// The config envelope is always present; a context without provider
    /// config seals `{}`.
    fn build_entry(&self, session_id: String, request: &SessionRequest) -> Result<SessionCacheEntry> {
        ProviderCredentials::parse(request.provider_id, &request.credentials)?;

        let created_at = Utc::now();
        let ttl = i64::try_from(request.options.ttl_seconds).unwrap_or(i64::MAX);
        let provider_config = extract_provider_config(request.context.as_ref())
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(SessionCacheEntry {
            session_id,
            provider_id: request.provider_id.as_str().to_string(),
            tenant_id: request.tenant_id.clone(),
            credentials_encrypted: self.codec.encrypt(&request.credentials)?,
            provider_config_encrypted: Some(self.codec.encrypt(&provider_config)?),
            created_at,
            expires_at: created_at + ChronoDuration::seconds(ttl),
            context: request.context.clone(),
        })
    }

    /// Copy of `baseline` carrying `override_config` layered over its config.
    fn with_override(&self, baseline: &SessionCacheEntry, override_config: &Value) -> Result<SessionCacheEntry> {
        let base_config: Option<Value> = baseline
            .provider_config_encrypted
            .as_deref()
            .map(|envelope| self.codec.decrypt(envelope))
            .transpose()?;
        let merged = merge_provider_config(base_config, Some(override_config.clone()))
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut context = match &baseline.context {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        context.remove("provider_config");
        context.insert("providerConfig".into(), merged.clone());

        let mut entry = baseline.clone();
        entry.provider_config_encrypted = Some(self.codec.encrypt(&merged)?);
        entry.context = Some(Value::Object(context));
        Ok(entry)
    }

    /// Return the cached session or build, persist and return a new one.
    ///
    /// A `config_override` is applied to the returned entry only; the stored
    /// entry always keeps the baseline config.
    #[instrument(skip_all, fields(provider = %request.provider_id))]
    pub async fn resolve_session(
        &self,
        request: &SessionRequest,
        config_override: Option<&Value>,
    ) -> Result<ResolvedSession> {
        let options = &request.options;
        options.validate()?;
        let prefix = options.key_prefix.as_deref();
        let session_id = derive_session_id(
            request.provider_id.as_str(),
            &request.credentials,
            request.tenant_id.as_deref(),
        );

        if options.cache_enabled && request.force_refresh {
            self.invalidate_session(&session_id, prefix).await?;
        }

        let cached = if options.cache_enabled && !request.force_refresh {
            self.get(&session_id, prefix).await?
        } else {
            None
        };
        let cache_hit = cached.is_some();

        let baseline = match cached {
            Some(entry) => {
                debug!(session_id = %session_id, "Session cache hit");
                entry
            }
            None => {
                let entry = self.build_entry(session_id.clone(), request)?;
                if options.cache_enabled {
                    self.put(&entry, options.ttl_seconds, prefix).await?;
                    info!(session_id = %session_id, ttl = options.ttl_seconds, "Session cached");
                }
                entry
            }
        };

        let entry = match config_override.filter(|c| c.is_object()) {
            Some(config) => self.with_override(&baseline, config)?,
            None => baseline,
        };
        Ok(ResolvedSession { entry, cache_hit })
    }

    /// Build the adapter a session entry describes.
    pub fn adapter_for_session(
        factory: &AdapterFactory,
        entry: &SessionCacheEntry,
    ) -> Result<Box<dyn ProviderAdapter>> {
        Ok(factory.get_adapter(
            &entry.provider_id,
            Some(&entry.credentials_encrypted),
            entry.provider_config_encrypted.as_deref(),
        )?)
    }
}
