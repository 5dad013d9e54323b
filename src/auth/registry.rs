use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{
    gate::{AuthError, AuthGate, OperatorPolicy, SignUp},
    identity::Session,
    provider::{Credentials, IdentityProvider},
};
use crate::dao::game_store::GameStore;

struct CachedGate {
    gate: Arc<AuthGate>,
    /// After this instant the token is checked with the provider again.
    revalidate_at: Instant,
}

/// One [`AuthGate`] per client session, keyed by access token.
///
/// A cached token is trusted until its deadline: the earlier of the configured revalidation
/// interval and the expiry the provider reported. Past it, the next request resolves the token
/// again; a token the provider refuses is evicted and its gate turns anonymous.
pub struct SessionRegistry {
    provider: Arc<dyn IdentityProvider>,
    policy: Arc<OperatorPolicy>,
    revalidate_after: Duration,
    gates: DashMap<String, CachedGate>,
}

impl SessionRegistry {
    /// Empty registry trusting cached tokens for at most `revalidate_after`.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        policy: OperatorPolicy,
        revalidate_after: Duration,
    ) -> Self {
        Self {
            provider,
            policy: Arc::new(policy),
            revalidate_after,
            gates: DashMap::new(),
        }
    }

    fn new_gate(&self) -> Arc<AuthGate> {
        Arc::new(AuthGate::new(self.provider.clone(), self.policy.clone()))
    }

    fn deadline(&self, session: &Session) -> Instant {
        let remaining = session
            .expires_at
            .map(|expires_at| {
                expires_at
                    .duration_since(SystemTime::now())
                    .unwrap_or(Duration::ZERO)
            })
            .map_or(self.revalidate_after, |left| left.min(self.revalidate_after));
        Instant::now() + remaining
    }

    fn register(&self, gate: Arc<AuthGate>, session: &Session) {
        self.prune_lapsed();
        self.gates.insert(
            session.access_token.clone(),
            CachedGate {
                gate,
                revalidate_at: self.deadline(session),
            },
        );
    }

    /// Forget gates nobody revalidated in time; they would need a provider round trip anyway.
    fn prune_lapsed(&self) {
        let now = Instant::now();
        self.gates.retain(|_, cached| cached.revalidate_at > now);
    }

    /// Create an account through a fresh gate, registering it when a session was issued.
    pub async fn sign_up(
        &self,
        store: &dyn GameStore,
        credentials: Credentials,
    ) -> Result<SignUp, AuthError> {
        let gate = self.new_gate();
        let outcome = gate.sign_up(store, credentials).await?;
        if let SignUp::SignedIn(session) = &outcome {
            self.register(gate, session);
        }
        Ok(outcome)
    }

    /// Sign in through a fresh gate and register it under the issued token.
    pub async fn sign_in(
        &self,
        store: &dyn GameStore,
        credentials: Credentials,
    ) -> Result<(Arc<AuthGate>, Session), AuthError> {
        let gate = self.new_gate();
        let session = gate.sign_in(store, credentials).await?;
        self.register(gate.clone(), &session);
        Ok((gate, session))
    }

    /// Gate of `access_token` if it is cached and still within its deadline. Never does I/O.
    pub fn cached(&self, access_token: &str) -> Option<Arc<AuthGate>> {
        self.gates
            .get(access_token)
            .filter(|cached| cached.revalidate_at > Instant::now())
            .map(|cached| cached.gate.clone())
    }

    /// Gate owning `access_token`. Unknown tokens are adopted from the provider and lapsed ones
    /// are resolved again.
    pub async fn gate_for(
        &self,
        store: &dyn GameStore,
        access_token: &str,
    ) -> Result<Arc<AuthGate>, AuthError> {
        if let Some(gate) = self.cached(access_token) {
            return Ok(gate);
        }

        let lapsed = self
            .gates
            .get(access_token)
            .map(|cached| cached.gate.clone());
        let gate = lapsed.unwrap_or_else(|| self.new_gate());

        match gate.adopt(store, access_token.to_owned()).await {
            Ok(session) => {
                debug!(user_id = %session.user_id, "access token resolved by the provider");
                self.register(gate.clone(), &session);
                Ok(gate)
            }
            Err(AuthError::InvalidCredentials) => {
                if self.gates.remove(access_token).is_some() {
                    debug!("provider no longer accepts a cached access token; evicted");
                }
                gate.invalidate().await;
                Err(AuthError::InvalidCredentials)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop the gate of `access_token` and sign it out. Tokens unknown here are still revoked at
    /// the provider; a failed revoke never fails the sign-out.
    pub async fn sign_out(&self, access_token: &str) {
        match self.gates.remove(access_token) {
            Some((_, cached)) => cached.gate.sign_out().await,
            None => {
                if let Err(err) = self.provider.revoke(access_token.to_owned()).await {
                    warn!(error = %err, "failed to revoke unregistered access token");
                }
            }
        }
    }

    /// Number of cached gates.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Whether no gate is cached.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{identity::Identity, provider::StaticProvider},
        config::StaticAccount,
        dao::game_store::memory::MemoryGameStore,
    };
    use uuid::Uuid;

    fn registry() -> SessionRegistry {
        let provider = StaticProvider::new(vec![StaticAccount {
            id: Uuid::new_v4(),
            email: "fan@example.com".into(),
            password: "secret".into(),
            roles: vec![],
            email_verified: true,
        }]);
        SessionRegistry::new(
            Arc::new(provider),
            OperatorPolicy::default(),
            Duration::from_secs(300),
        )
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "fan@example.com".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn token_maps_back_to_its_gate() {
        let store = MemoryGameStore::new();
        let registry = registry();
        let (gate, session) = registry.sign_in(&store, credentials()).await.unwrap();

        let found = registry
            .gate_for(&store, &session.access_token)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&gate, &found));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn sign_out_forgets_the_token() {
        let store = MemoryGameStore::new();
        let registry = registry();
        let (gate, session) = registry.sign_in(&store, credentials()).await.unwrap();

        registry.sign_out(&session.access_token).await;
        assert!(registry.is_empty());
        assert_eq!(gate.current_identity(), Identity::Anonymous);
        assert!(matches!(
            registry.gate_for(&store, &session.access_token).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let store = MemoryGameStore::new();
        let registry = registry();
        assert!(registry.gate_for(&store, "nope").await.is_err());
    }

    /// Accounts whose tokens can be revoked behind the registry's back.
    fn revocable() -> (Arc<StaticProvider>, SessionRegistry) {
        let provider = Arc::new(StaticProvider::new(vec![StaticAccount {
            id: Uuid::new_v4(),
            email: "ops@example.com".into(),
            password: "secret".into(),
            roles: vec!["operator".into()],
            email_verified: true,
        }]));
        let registry = SessionRegistry::new(
            provider.clone(),
            OperatorPolicy::default(),
            Duration::ZERO,
        );
        (provider, registry)
    }

    fn operator_credentials() -> Credentials {
        Credentials {
            email: "ops@example.com".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn lapsed_token_is_resolved_again() {
        let store = MemoryGameStore::new();
        let (_provider, registry) = revocable();
        let (gate, session) = registry
            .sign_in(&store, operator_credentials())
            .await
            .unwrap();
        assert!(registry.cached(&session.access_token).is_none());

        let found = registry
            .gate_for(&store, &session.access_token)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&gate, &found));
        assert!(found.current_identity().is_operator());
    }

    #[tokio::test]
    async fn token_revoked_elsewhere_is_evicted() {
        let store = MemoryGameStore::new();
        let (provider, registry) = revocable();
        let (gate, session) = registry
            .sign_in(&store, operator_credentials())
            .await
            .unwrap();

        provider
            .revoke(session.access_token.clone())
            .await
            .unwrap();

        assert!(matches!(
            registry.gate_for(&store, &session.access_token).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(registry.is_empty());
        assert_eq!(gate.current_identity(), Identity::Anonymous);
    }

    #[tokio::test]
    async fn provider_expiry_caps_the_revalidation_interval() {
        let registry = registry();
        let session = Session {
            user_id: Uuid::new_v4(),
            email: "fan@example.com".into(),
            access_token: "short-lived".into(),
            expires_at: Some(SystemTime::now() + Duration::from_secs(5)),
            roles: Default::default(),
            profile: None,
        };
        let deadline = registry.deadline(&session);
        assert!(deadline <= Instant::now() + Duration::from_secs(5));

        let expired = Session {
            expires_at: Some(SystemTime::now() - Duration::from_secs(1)),
            ..session
        };
        registry.register(registry.new_gate(), &expired);
        assert!(registry.cached("short-lived").is_none());
    }

    #[tokio::test]
    async fn sign_out_of_unknown_token_succeeds() {
        let registry = registry();
        registry.sign_out("never-issued").await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn static_accounts_cannot_sign_up() {
        let store = MemoryGameStore::new();
        let registry = registry();
        assert!(matches!(
            registry.sign_up(&store, credentials()).await,
            Err(AuthError::RegistrationDisabled)
        ));
        assert!(registry.is_empty());
    }
}
