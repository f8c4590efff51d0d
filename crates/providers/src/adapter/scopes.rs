//! Scope-based capability discovery.
//!
//! Providers whose single credential may or may not authorize charge creation
//! resolve their granted [`ScopeSet`] once per adapter instance by walking an
//! ordered list of strategies. Discovery never fails: when no strategy yields
//! an answer the adapter assumes the statement-read scope only.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::ProviderError;

/// Statement read scope, also the minimal probing scope.
pub const STATEMENT_SCOPE: &str = "extrato-info";
/// Scopes that must all be granted to register and query charges.
pub const CHARGE_SCOPES: &[&str] = &["cobrancas.boletos-requisicao", "cobrancas.boletos-info"];
/// Scopes required to read account statements.
pub const STATEMENT_SCOPES: &[&str] = &[STATEMENT_SCOPE];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Parse a space-delimited OAuth `scope` value.
    pub fn parse(scope: &str) -> Self {
        scope.split_whitespace().collect()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    pub fn contains_all(&self, required: &[&str]) -> bool {
        required.iter().all(|scope| self.contains(scope))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(" "))
    }
}

/// Where a resolved scope set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSource {
    Declared,
    Introspection,
    TokenEcho,
    SafeDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredScopes {
    pub scopes: ScopeSet,
    pub source: ScopeSource,
}

/// Token issued for the probing scope.
#[derive(Debug, Clone)]
pub struct ProbeGrant {
    pub access_token: String,
    /// `scope` echoed by the token endpoint, if any.
    pub scope: Option<String>,
}

/// RFC 7662 introspection response.
#[derive(Debug, Clone, Deserialize)]
pub struct Introspection {
    pub active: bool,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Network operations discovery needs from the adapter.
#[async_trait]
pub trait ScopeProbe: Send + Sync {
    /// Acquire a token restricted to [`STATEMENT_SCOPE`].
    async fn probe_token(&self) -> Result<ProbeGrant, ProviderError>;

    /// Introspect a previously issued token.
    async fn introspect(&self, token: &str) -> Result<Introspection, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Declared,
    Introspection,
    TokenEcho,
}

/// Tried in order; the first resolved answer wins.
const STRATEGIES: [Strategy; 3] = [
    Strategy::Declared,
    Strategy::Introspection,
    Strategy::TokenEcho,
];

enum Attempt {
    Resolved(ScopeSet),
    Next,
    /// Stop walking and fall back to the safe default.
    GiveUp,
}

/// State shared by the strategies of a single discovery run.
#[derive(Default)]
struct ProbeState {
    grant: Option<Option<ProbeGrant>>,
    introspection_failed: bool,
}

impl ProbeState {
    async fn grant(&mut self, probe: &dyn ScopeProbe) -> Option<&ProbeGrant> {
        if self.grant.is_none() {
            let grant = match probe.probe_token().await {
                Ok(grant) => Some(grant),
                Err(e) => {
                    warn!(error = %e, "Scope probe token request failed");
                    None
                }
            };
            self.grant = Some(grant);
        }
        self.grant.as_ref().and_then(Option::as_ref)
    }
}

/// Memoized scope discovery for one adapter instance.
#[derive(Debug)]
pub struct ScopeDiscovery {
    provider: &'static str,
    declared: Option<ScopeSet>,
    resolved: OnceCell<DiscoveredScopes>,
}

impl ScopeDiscovery {
    pub fn new(provider: &'static str, declared: Option<ScopeSet>) -> Self {
        Self {
            provider,
            declared,
            resolved: OnceCell::new(),
        }
    }

    /// The narrowest assumption: statement read only.
    pub fn safe_default() -> ScopeSet {
        ScopeSet::from_iter(STATEMENT_SCOPES)
    }

    /// Resolve once, then serve the memoized answer.
    pub async fn resolve(&self, probe: &dyn ScopeProbe) -> &DiscoveredScopes {
        self.resolved.get_or_init(|| self.discover(probe)).await
    }

    /// Already-resolved answer, without triggering discovery.
    pub fn cached(&self) -> Option<&DiscoveredScopes> {
        self.resolved.get()
    }

    async fn discover(&self, probe: &dyn ScopeProbe) -> DiscoveredScopes {
        let mut state = ProbeState::default();

        for strategy in STRATEGIES {
            match self.attempt(strategy, probe, &mut state).await {
                Attempt::Resolved(scopes) => {
                    let source = match strategy {
                        Strategy::Declared => ScopeSource::Declared,
                        Strategy::Introspection => ScopeSource::Introspection,
                        Strategy::TokenEcho => ScopeSource::TokenEcho,
                    };
                    info!(provider = self.provider, ?source, scopes = %scopes, "Resolved granted scopes");
                    return DiscoveredScopes { scopes, source };
                }
                Attempt::Next => continue,
                Attempt::GiveUp => break,
            }
        }

        let scopes = Self::safe_default();
        warn!(provider = self.provider, scopes = %scopes, "Scope discovery inconclusive, assuming safe default");
        DiscoveredScopes {
            scopes,
            source: ScopeSource::SafeDefault,
        }
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        probe: &dyn ScopeProbe,
        state: &mut ProbeState,
    ) -> Attempt {
        match strategy {
            Strategy::Declared => match &self.declared {
                Some(scopes) => Attempt::Resolved(scopes.clone()),
                None => Attempt::Next,
            },
            Strategy::Introspection => {
                let Some(token) = state.grant(probe).await.map(|g| g.access_token.clone()) else {
                    return Attempt::Next;
                };
                match probe.introspect(&token).await {
                    Ok(Introspection {
                        active: true,
                        scope: Some(scope),
                    }) if !scope.trim().is_empty() => Attempt::Resolved(ScopeSet::parse(&scope)),
                    Ok(result) => {
                        debug!(provider = self.provider, active = result.active, "Introspection returned no usable scope");
                        Attempt::GiveUp
                    }
                    Err(e) => {
                        debug!(provider = self.provider, error = %e, "Token introspection unavailable");
                        state.introspection_failed = true;
                        Attempt::Next
                    }
                }
            }
            Strategy::TokenEcho => {
                if !state.introspection_failed {
                    return Attempt::Next;
                }
                match state.grant(probe).await.and_then(|g| g.scope.as_deref()) {
                    Some(scope) if !scope.trim().is_empty() => {
                        Attempt::Resolved(ScopeSet::parse(scope))
                    }
                    _ => Attempt::Next,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProbe {
        grant: Option<ProbeGrant>,
        introspection: Option<Introspection>,
        token_calls: AtomicUsize,
        introspect_calls: AtomicUsize,
    }

    impl FakeProbe {
        fn new(grant: Option<ProbeGrant>, introspection: Option<Introspection>) -> Self {
            Self {
                grant,
                introspection,
                token_calls: AtomicUsize::new(0),
                introspect_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScopeProbe for FakeProbe {
        async fn probe_token(&self) -> Result<ProbeGrant, ProviderError> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            self.grant
                .clone()
                .ok_or_else(|| ProviderError::Authentication {
                    provider: "test",
                    status: 401,
                    body: "denied".into(),
                })
        }

        async fn introspect(&self, _token: &str) -> Result<Introspection, ProviderError> {
            self.introspect_calls.fetch_add(1, Ordering::SeqCst);
            self.introspection
                .clone()
                .ok_or_else(|| ProviderError::Upstream {
                    provider: "test",
                    status: 403,
                    body: "insufficient_scope".into(),
                })
        }
    }

    fn grant(scope: Option<&str>) -> Option<ProbeGrant> {
        Some(ProbeGrant {
            access_token: "tok".into(),
            scope: scope.map(str::to_owned),
        })
    }

    #[tokio::test]
    async fn test_declared_scopes_skip_network() {
        let probe = FakeProbe::new(None, None);
        let discovery = ScopeDiscovery::new("test", Some(ScopeSet::from_iter(["extrato-info"])));
        let resolved = discovery.resolve(&probe).await;
        assert_eq!(resolved.source, ScopeSource::Declared);
        assert!(resolved.scopes.contains("extrato-info"));
        assert_eq!(probe.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_introspection_result_used() {
        let probe = FakeProbe::new(
            grant(Some("extrato-info")),
            Some(Introspection {
                active: true,
                scope: Some("extrato-info cobrancas.boletos-info cobrancas.boletos-requisicao".into()),
            }),
        );
        let discovery = ScopeDiscovery::new("test", None);
        let resolved = discovery.resolve(&probe).await;
        assert_eq!(resolved.source, ScopeSource::Introspection);
        assert!(resolved.scopes.contains_all(CHARGE_SCOPES));
    }

    #[tokio::test]
    async fn test_token_echo_when_introspection_fails() {
        let probe = FakeProbe::new(grant(Some("extrato-info cobrancas.boletos-info")), None);
        let discovery = ScopeDiscovery::new("test", None);
        let resolved = discovery.resolve(&probe).await;
        assert_eq!(resolved.source, ScopeSource::TokenEcho);
        assert!(resolved.scopes.contains("cobrancas.boletos-info"));
        // The probe token is fetched once and shared by both strategies.
        assert_eq!(probe.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inactive_token_falls_back_to_safe_default() {
        let probe = FakeProbe::new(
            grant(Some("cobrancas.boletos-info")),
            Some(Introspection {
                active: false,
                scope: None,
            }),
        );
        let discovery = ScopeDiscovery::new("test", None);
        let resolved = discovery.resolve(&probe).await;
        assert_eq!(resolved.source, ScopeSource::SafeDefault);
        assert_eq!(resolved.scopes, ScopeDiscovery::safe_default());
    }

    #[tokio::test]
    async fn test_token_failure_falls_back_to_safe_default() {
        let probe = FakeProbe::new(None, None);
        let discovery = ScopeDiscovery::new("test", None);
        let resolved = discovery.resolve(&probe).await;
        assert_eq!(resolved.source, ScopeSource::SafeDefault);
        assert!(!resolved.scopes.contains_all(CHARGE_SCOPES));
        assert_eq!(probe.introspect_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_memoized_after_first_resolution() {
        let probe = FakeProbe::new(grant(Some("extrato-info")), None);
        let discovery = ScopeDiscovery::new("test", None);
        assert!(discovery.cached().is_none());
        discovery.resolve(&probe).await;
        discovery.resolve(&probe).await;
        discovery.resolve(&probe).await;
        assert_eq!(probe.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.introspect_calls.load(Ordering::SeqCst), 1);
        assert!(discovery.cached().is_some());
    }

    #[test]
    fn test_scope_set_parsing() {
        let set = ScopeSet::parse("  b a  a ");
        assert_eq!(set.to_string(), "a b");
        assert!(set.contains_all(&["a", "b"]));
        assert!(!set.contains_all(&["a", "c"]));
        assert!(ScopeSet::parse("").is_empty());
    }
}
