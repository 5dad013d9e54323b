use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::{
    Credentials, IdentityProvider, ProviderError, ProviderResult, ProviderSession, ProviderUser,
    Registration,
};
use crate::config::StaticAccount;

/// Provider backed by accounts declared in the configuration file.
///
/// Tokens live in memory only; they do not survive a restart.
#[derive(Clone)]
pub struct StaticProvider {
    accounts: Arc<Vec<StaticAccount>>,
    tokens: Arc<DashMap<String, Uuid>>,
}

impl StaticProvider {
    /// Provider accepting exactly `accounts`.
    pub fn new(accounts: Vec<StaticAccount>) -> Self {
        Self {
            accounts: Arc::new(accounts),
            tokens: Arc::new(DashMap::new()),
        }
    }

    fn find_by_email(&self, email: &str) -> Option<&StaticAccount> {
        self.accounts
            .iter()
            .find(|account| account.email.eq_ignore_ascii_case(email.trim()))
    }

    fn find_by_id(&self, id: Uuid) -> Option<&StaticAccount> {
        self.accounts.iter().find(|account| account.id == id)
    }
}

fn to_user(account: &StaticAccount) -> ProviderUser {
    ProviderUser {
        id: account.id,
        email: account.email.clone(),
        email_verified: account.email_verified,
        roles: account.roles.clone(),
    }
}

impl IdentityProvider for StaticProvider {
    fn register(&self, _credentials: Credentials) -> BoxFuture<'static, ProviderResult<Registration>> {
        Box::pin(async { Err(ProviderError::RegistrationUnsupported) })
    }

    fn authenticate(
        &self,
        credentials: Credentials,
    ) -> BoxFuture<'static, ProviderResult<ProviderSession>> {
        let provider = self.clone();
        Box::pin(async move {
            let account = provider
                .find_by_email(&credentials.email)
                .filter(|account| account.password == credentials.password)
                .ok_or(ProviderError::InvalidCredentials)?;

            let access_token = Uuid::new_v4().simple().to_string();
            provider.tokens.insert(access_token.clone(), account.id);
            Ok(ProviderSession {
                access_token,
                expires_in: None,
                user: to_user(account),
            })
        })
    }

    fn resolve(&self, access_token: String) -> BoxFuture<'static, ProviderResult<ProviderUser>> {
        let provider = self.clone();
        Box::pin(async move {
            let user_id = provider
                .tokens
                .get(&access_token)
                .map(|entry| *entry.value())
                .ok_or(ProviderError::InvalidCredentials)?;
            provider
                .find_by_id(user_id)
                .map(to_user)
                .ok_or(ProviderError::InvalidCredentials)
        })
    }

    fn revoke(&self, access_token: String) -> BoxFuture<'static, ProviderResult<()>> {
        let tokens = self.tokens.clone();
        Box::pin(async move {
            tokens.remove(&access_token);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> (StaticProvider, Uuid) {
        let id = Uuid::new_v4();
        let provider = StaticProvider::new(vec![StaticAccount {
            id,
            email: "Fan@Example.com".into(),
            password: "hunter2".into(),
            roles: vec![],
            email_verified: true,
        }]);
        (provider, id)
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn issued_token_resolves_until_revoked() {
        let (provider, id) = provider();
        let session = provider
            .authenticate(credentials("fan@example.com", "hunter2"))
            .await
            .unwrap();
        assert_eq!(session.user.id, id);

        let user = provider.resolve(session.access_token.clone()).await.unwrap();
        assert_eq!(user.id, id);

        provider.revoke(session.access_token.clone()).await.unwrap();
        assert!(matches!(
            provider.resolve(session.access_token).await,
            Err(ProviderError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn accounts_cannot_be_registered() {
        let (provider, _) = provider();
        let result = provider
            .register(credentials("new@example.com", "hunter2"))
            .await;
        assert!(matches!(result, Err(ProviderError::RegistrationUnsupported)));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (provider, _) = provider();
        let result = provider
            .authenticate(credentials("fan@example.com", "nope"))
            .await;
        assert!(matches!(result, Err(ProviderError::InvalidCredentials)));
    }
}
