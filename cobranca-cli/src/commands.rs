use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cobranca::{AppConfig, SessionCache, SessionRequest, derive_session_id};
use cobranca_providers::adapter::{all_providers, operation_surface};
use cobranca_providers::{
    AdapterFactory, CancelRequest, ChargeRequest, ProviderAdapter, StatementRequest,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::cli::{ChargeAction, Commands, Target};

pub fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn session_request(target: &Target) -> Result<SessionRequest> {
    let mut request = SessionRequest::new(target.provider, read_json(&target.credentials)?);
    request.tenant_id = target.tenant.clone();
    if let Some(path) = &target.config {
        request.context = Some(json!({ "providerConfig": read_json(path)? }));
    }
    Ok(request)
}

pub struct CommandExecutor {
    config: AppConfig,
    pretty: bool,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, pretty: bool) -> Self {
        Self { config, pretty }
    }

    /// Run `command` and return what should be printed on stdout.
    pub async fn execute(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Encrypt { input } => {
                let value = read_json(&input)?;
                Ok(self.config.codec.encrypt(&value)?)
            }
            Commands::Decrypt { envelope, file } => {
                let envelope = match (envelope, file) {
                    (Some(envelope), _) => envelope,
                    (None, Some(path)) => fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    (None, None) => anyhow::bail!("pass an envelope or --file"),
                };
                let value: Value = self.config.codec.decrypt(envelope.trim())?;
                render(&value, self.pretty)
            }
            Commands::SessionId { target } => {
                let credentials = read_json(&target.credentials)?;
                Ok(derive_session_id(
                    target.provider.as_str(),
                    &credentials,
                    target.tenant.as_deref(),
                ))
            }
            Commands::Session {
                target,
                config_override,
                force_refresh,
            } => {
                let mut request = session_request(&target)?;
                request.options = self.config.session.clone();
                request.force_refresh = force_refresh;
                let config_override = config_override.as_deref().map(read_json).transpose()?;

                let cache = self.config.session_cache().await?;
                let resolved = cache.resolve_session(&request, config_override.as_ref()).await?;
                render(
                    &json!({ "cacheHit": resolved.cache_hit, "session": resolved.entry }),
                    self.pretty,
                )
            }
            Commands::Providers => render(&all_providers(), self.pretty),
            Commands::Operations { target } => {
                let adapter = self.adapter(&target).await?;
                render(&operation_surface(adapter.as_ref()).await, self.pretty)
            }
            Commands::Charge { action } => self.charge(action).await,
            Commands::Statement {
                target,
                start,
                end,
                page,
                page_size,
                agency,
                account,
            } => {
                let request = StatementRequest {
                    agency,
                    account,
                    start_date: start,
                    end_date: end,
                    page,
                    page_size,
                };
                request.validate()?;
                let adapter = self.adapter(&target).await?;
                render(&adapter.get_account_statement(&request).await?, self.pretty)
            }
        }
    }

    async fn charge(&self, action: ChargeAction) -> Result<String> {
        match action {
            ChargeAction::Create { target, request } => {
                let request: ChargeRequest = serde_json::from_value(read_json(&request)?)
                    .context("Invalid charge request")?;
                let adapter = self.adapter(&target).await?;
                render(&adapter.create_charge(&request).await?, self.pretty)
            }
            ChargeAction::Get { target, id } => {
                let adapter = self.adapter(&target).await?;
                render(&adapter.retrieve_charge(&id).await?, self.pretty)
            }
            ChargeAction::Cancel {
                target,
                id,
                method,
                reason,
            } => {
                let mut request = CancelRequest::new(id);
                request.tenant_id = target.tenant.clone();
                request.payment_method = method.map(Into::into);
                request.reason = reason;
                let adapter = self.adapter(&target).await?;
                render(&adapter.cancel_charge(&request).await?, self.pretty)
            }
        }
    }

    /// Resolve the target's session and build its adapter from the sealed entry.
    async fn adapter(&self, target: &Target) -> Result<Box<dyn ProviderAdapter>> {
        let mut request = session_request(target)?;
        request.options = self.config.session.clone();

        let cache = self.config.session_cache().await?;
        let resolved = cache.resolve_session(&request, None).await?;
        debug!(
            session_id = %resolved.entry.session_id,
            cache_hit = resolved.cache_hit,
            "Resolved session"
        );

        let factory: AdapterFactory = self.config.adapter_factory()?;
        Ok(SessionCache::adapter_for_session(&factory, &resolved.entry)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use std::io::Write;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn executor() -> CommandExecutor {
        let config = AppConfig::from_lookup(|name| {
            (name == cobranca::config::ENCRYPTION_KEY_VAR).then(|| KEY.to_string())
        })
        .unwrap();
        CommandExecutor::new(config, false)
    }

    fn json_file(value: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["cobranca"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap().command
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt() {
        let executor = executor();
        let creds = json_file(&json!({"client_id": "abc", "sandbox": true}));
        let path = creds.path().to_str().unwrap();

        let envelope = executor.execute(parse(&["encrypt", path])).await.unwrap();
        let envelope_file = tempfile::NamedTempFile::new().unwrap();
        fs::write(envelope_file.path(), format!("{envelope}\n")).unwrap();

        let opened = executor
            .execute(parse(&["decrypt", "--file", envelope_file.path().to_str().unwrap()]))
            .await
            .unwrap();
        let opened: Value = serde_json::from_str(&opened).unwrap();
        assert_eq!(opened, json!({"client_id": "abc", "sandbox": true}));
    }

    #[tokio::test]
    async fn test_session_id_matches_library() {
        let executor = executor();
        let credentials = json!({"client_id": "abc", "client_secret": "s"});
        let creds = json_file(&credentials);

        let id = executor
            .execute(parse(&[
                "session-id",
                "--provider",
                "itau",
                "--credentials",
                creds.path().to_str().unwrap(),
                "--tenant",
                "t1",
            ]))
            .await
            .unwrap();
        assert_eq!(id, derive_session_id("itau", &credentials, Some("t1")));
        assert_eq!(id.len(), 64);
    }

    #[tokio::test]
    async fn test_providers_listing() {
        let output = executor().execute(parse(&["providers"])).await.unwrap();
        let providers: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(providers.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_decrypt_requires_input() {
        let result = executor().execute(parse(&["decrypt"])).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_read_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_json(file.path()).unwrap_err();
        assert!(err.to_string().contains("is not valid JSON"));
    }
}
