use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Identity, Role, Session, SignUp};

/// Body of `POST /auth/sign-in`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignInRequest {
    /// Account email.
    #[validate(email)]
    pub email: String,
    /// Account password.
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

/// Body of `POST /auth/sign-up`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignUpRequest {
    /// Email of the new account.
    #[validate(email)]
    pub email: String,
    /// At least 6 characters, the provider's minimum.
    #[validate(length(min = 6, max = 256))]
    pub password: String,
}

/// Result of a sign-up.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignUpResponse {
    /// The account exists but the user must confirm their email before signing in.
    pub confirmation_required: bool,
    /// Present when the account is active immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SignInResponse>,
}

impl From<SignUp> for SignUpResponse {
    fn from(outcome: SignUp) -> Self {
        match outcome {
            SignUp::SignedIn(session) => Self {
                confirmation_required: false,
                session: Some(session.into()),
            },
            SignUp::ConfirmationRequired => Self {
                confirmation_required: true,
                session: None,
            },
        }
    }
}

/// Issued session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignInResponse {
    /// Send back as `Authorization: Bearer <token>`.
    pub access_token: String,
    /// Identity claims of the session.
    pub identity: Identity,
    /// Granted roles.
    pub roles: Vec<Role>,
    /// Chosen username, once the profile is complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<Session> for SignInResponse {
    fn from(session: Session) -> Self {
        Self {
            identity: session.identity(),
            roles: session.roles.iter().copied().collect(),
            username: session.username().map(str::to_owned),
            access_token: session.access_token,
        }
    }
}

/// Identity of the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    /// Identity claims; anonymous without a token.
    pub identity: Identity,
    /// Chosen username, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// True for a signed-in user who has not picked a username yet.
    pub needs_setup: bool,
}

/// Body of `POST /auth/profile`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProfileRequest {
    /// Desired username; the username rules are checked by the gate.
    #[validate(length(max = 64))]
    pub username: String,
}

/// Completed profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    /// Account id.
    pub user_id: Uuid,
    /// Normalized username.
    pub username: String,
    /// Identity after completion; `has_profile` is now true.
    pub identity: Identity,
}
