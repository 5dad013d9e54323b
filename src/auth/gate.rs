use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
    time::{Duration, SystemTime},
};

use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use super::{
    identity::{Identity, Role, Session},
    provider::{Credentials, IdentityProvider, ProviderError, ProviderUser, Registration},
    username::{UsernameRejection, validate_username},
};
use crate::dao::{
    game_store::GameStore,
    models::{ProfileEntity, ProfileInsert},
    storage::StorageError,
};

/// Failures of sign-up, sign-in and token adoption.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong credentials, or a token the provider no longer accepts.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The provider refused to create the account.
    #[error("registration rejected: {message}")]
    RegistrationRejected {
        /// Reason given by the provider.
        message: String,
    },
    /// Accounts cannot be created through this service.
    #[error("registration is disabled")]
    RegistrationDisabled,
    /// The provider could not be reached; retrying may succeed.
    #[error("identity provider unavailable: {message}")]
    ProviderUnavailable {
        /// What failed.
        message: String,
    },
    /// Loading the profile failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredentials => AuthError::InvalidCredentials,
            ProviderError::RegistrationRejected { message } => {
                AuthError::RegistrationRejected { message }
            }
            ProviderError::RegistrationUnsupported => AuthError::RegistrationDisabled,
            ProviderError::Unavailable { message } => AuthError::ProviderUnavailable { message },
        }
    }
}

/// Failures of [`AuthGate::complete_profile`].
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No session on this gate.
    #[error("sign in before completing a profile")]
    AuthRequired,
    /// The user already has a profile.
    #[error("profile already completed")]
    AlreadyCompleted,
    /// The username breaks one of the username rules.
    #[error("{reason}")]
    UsernameInvalid {
        /// First rule the username broke.
        reason: UsernameRejection,
    },
    /// Another user holds the same case-folded username.
    #[error("username is already taken")]
    UsernameTaken,
    /// Saving the profile failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of [`AuthGate::sign_up`].
#[derive(Debug, Clone)]
pub enum SignUp {
    /// The account is active and this gate now holds its session.
    SignedIn(Session),
    /// The user must confirm their email before signing in.
    ConfirmationRequired,
}

/// Grants the operator role from provider claims or from a list of verified emails.
#[derive(Debug, Clone, Default)]
pub struct OperatorPolicy {
    emails: HashSet<String>,
}

impl OperatorPolicy {
    /// Policy promoting the given emails, compared case-insensitively.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|email| email.as_ref().trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        }
    }

    /// Roles of `user`. An allow-listed email only counts once the provider verified it.
    pub fn roles_for(&self, user: &ProviderUser) -> BTreeSet<Role> {
        let mut roles = BTreeSet::from([Role::User]);
        roles.extend(user.roles.iter().filter_map(|raw| raw.parse::<Role>().ok()));
        if user.email_verified && self.emails.contains(&user.email.trim().to_lowercase()) {
            roles.insert(Role::Operator);
        }
        roles
    }
}

/// Owns one client session and publishes every identity change to its observers.
pub struct AuthGate {
    provider: Arc<dyn IdentityProvider>,
    policy: Arc<OperatorPolicy>,
    session: RwLock<Option<Session>>,
    identity: watch::Sender<Identity>,
}

impl AuthGate {
    /// Anonymous gate backed by `provider`.
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: Arc<OperatorPolicy>) -> Self {
        let (identity, _rx) = watch::channel(Identity::Anonymous);
        Self {
            provider,
            policy,
            session: RwLock::new(None),
            identity,
        }
    }

    /// Identity of the current session. Never waits on I/O or locks.
    pub fn current_identity(&self) -> Identity {
        *self.identity.borrow()
    }

    /// Observe identity changes (sign-in, profile completion, sign-out).
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.identity.subscribe()
    }

    /// Snapshot of the current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Create an account. When the provider activates it immediately, the new session is
    /// installed exactly as after [`AuthGate::sign_in`].
    pub async fn sign_up(
        &self,
        store: &dyn GameStore,
        credentials: Credentials,
    ) -> Result<SignUp, AuthError> {
        match self.provider.register(credentials).await? {
            Registration::SignedIn(issued) => {
                let session = self
                    .establish(store, issued.access_token, issued.expires_in, issued.user)
                    .await?;
                info!(user_id = %session.user_id, "signed up");
                Ok(SignUp::SignedIn(session))
            }
            Registration::ConfirmationRequired { user_id } => {
                info!(%user_id, "signed up; waiting for email confirmation");
                Ok(SignUp::ConfirmationRequired)
            }
        }
    }

    /// Authenticate with the provider and install the resulting session.
    pub async fn sign_in(
        &self,
        store: &dyn GameStore,
        credentials: Credentials,
    ) -> Result<Session, AuthError> {
        let issued = self.provider.authenticate(credentials).await?;
        let session = self
            .establish(store, issued.access_token, issued.expires_in, issued.user)
            .await?;
        info!(user_id = %session.user_id, roles = ?session.roles, "signed in");
        Ok(session)
    }

    /// Rebuild a session from an access token the provider issued earlier.
    pub async fn adopt(
        &self,
        store: &dyn GameStore,
        access_token: String,
    ) -> Result<Session, AuthError> {
        let user = self.provider.resolve(access_token.clone()).await?;
        self.establish(store, access_token, None, user).await
    }

    /// Drop the session locally without contacting the provider.
    pub async fn invalidate(&self) {
        self.session.write().await.take();
        self.identity.send_replace(Identity::Anonymous);
    }

    /// Clear the session. A failed remote revoke is logged and otherwise ignored.
    pub async fn sign_out(&self) {
        let previous = self.session.write().await.take();
        self.identity.send_replace(Identity::Anonymous);

        if let Some(session) = previous {
            if let Err(err) = self.provider.revoke(session.access_token).await {
                warn!(user_id = %session.user_id, error = %err, "failed to revoke access token");
            }
            info!(user_id = %session.user_id, "signed out");
        }
    }

    /// Validate `username` and create the profile of the signed-in user.
    pub async fn complete_profile(
        &self,
        store: &dyn GameStore,
        username: &str,
    ) -> Result<ProfileEntity, ProfileError> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(ProfileError::AuthRequired)?;
        if session.profile.is_some() {
            return Err(ProfileError::AlreadyCompleted);
        }

        let username =
            validate_username(username).map_err(|reason| ProfileError::UsernameInvalid { reason })?;
        let profile = ProfileEntity {
            user_id: session.user_id,
            username,
            created_at: SystemTime::now(),
        };

        match store.insert_profile(profile.clone()).await? {
            ProfileInsert::Created => {
                info!(user_id = %profile.user_id, username = %profile.username, "profile completed");
                session.profile = Some(profile.clone());
                self.identity.send_replace(session.identity());
                Ok(profile)
            }
            ProfileInsert::UsernameTaken => {
                debug!(username = %profile.username, "username already taken");
                Err(ProfileError::UsernameTaken)
            }
            ProfileInsert::AlreadyExists(existing) => {
                session.profile = Some(existing);
                self.identity.send_replace(session.identity());
                Err(ProfileError::AlreadyCompleted)
            }
        }
    }

    async fn establish(
        &self,
        store: &dyn GameStore,
        access_token: String,
        expires_in: Option<Duration>,
        user: ProviderUser,
    ) -> Result<Session, AuthError> {
        let profile = store.find_profile(user.id).await?;
        let session = Session {
            user_id: user.id,
            roles: self.policy.roles_for(&user),
            email: user.email,
            access_token,
            expires_at: expires_in.map(|lifetime| SystemTime::now() + lifetime),
            profile,
        };

        *self.session.write().await = Some(session.clone());
        self.identity.send_replace(session.identity());
        Ok(session)
    }
}
