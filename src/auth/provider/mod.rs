//! Identity providers the [`AuthGate`](super::AuthGate) delegates credential checks to.

mod gotrue;
mod static_accounts;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::config::IdentityConfig;

pub use gotrue::GoTrueProvider;
pub use static_accounts::StaticProvider;

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Email and password submitted by a user.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account email, matched case-insensitively.
    pub email: String,
    /// Plain password, only ever forwarded to the provider.
    pub password: String,
}

/// User as described by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    /// Stable account id.
    pub id: Uuid,
    /// Account email.
    pub email: String,
    /// Whether the provider confirmed the email.
    pub email_verified: bool,
    /// Raw role claims; unknown names are ignored when roles are resolved.
    pub roles: Vec<String>,
}

/// Access token issued by the provider together with the user it belongs to.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    /// Bearer token for later calls.
    pub access_token: String,
    /// Remaining lifetime of the token when the provider reports one.
    pub expires_in: Option<Duration>,
    /// Account the token was issued for.
    pub user: ProviderUser,
}

/// Result of creating an account.
#[derive(Debug, Clone)]
pub enum Registration {
    /// The account is usable right away and a token was issued.
    SignedIn(ProviderSession),
    /// The provider sent a confirmation email; the user signs in after confirming.
    ConfirmationRequired {
        /// Id of the created, still unconfirmed account.
        user_id: Uuid,
    },
}

/// Failure reported by an identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Wrong email/password, or an unknown or expired access token.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The provider refused to create the account (email taken, weak password).
    #[error("registration rejected: {message}")]
    RegistrationRejected {
        /// Reason given by the provider.
        message: String,
    },
    /// The provider does not create accounts.
    #[error("registration is not supported by this identity provider")]
    RegistrationUnsupported,
    /// Network failure or unexpected answer.
    #[error("identity provider unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
    },
}

/// Remote (or local) authority that owns accounts and access tokens.
pub trait IdentityProvider: Send + Sync {
    /// Create an account for `credentials`.
    fn register(&self, credentials: Credentials) -> BoxFuture<'static, ProviderResult<Registration>>;
    /// Exchange credentials for an access token.
    fn authenticate(&self, credentials: Credentials)
    -> BoxFuture<'static, ProviderResult<ProviderSession>>;
    /// Resolve an access token to the user it was issued for.
    fn resolve(&self, access_token: String) -> BoxFuture<'static, ProviderResult<ProviderUser>>;
    /// Invalidate an access token.
    fn revoke(&self, access_token: String) -> BoxFuture<'static, ProviderResult<()>>;
}

/// Build the provider selected by the configuration.
pub fn from_config(
    config: &IdentityConfig,
    api_key: Option<String>,
) -> ProviderResult<Arc<dyn IdentityProvider>> {
    match config {
        IdentityConfig::Static { accounts } => Ok(Arc::new(StaticProvider::new(accounts.clone()))),
        IdentityConfig::GoTrue { base_url } => {
            let api_key = api_key.ok_or_else(|| ProviderError::Unavailable {
                message: "PICKS_IDENTITY_API_KEY is not set".into(),
            })?;
            Ok(Arc::new(GoTrueProvider::new(base_url, api_key)?))
        }
    }
}
