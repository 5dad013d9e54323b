use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{
    Credentials, IdentityProvider, ProviderError, ProviderResult, ProviderSession, ProviderUser,
    Registration,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider speaking the GoTrue password-grant protocol.
#[derive(Clone)]
pub struct GoTrueProvider {
    client: Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds.
    #[serde(default)]
    expires_in: Option<u64>,
    user: UserResponse,
}

impl From<TokenResponse> for ProviderSession {
    fn from(value: TokenResponse) -> Self {
        Self {
            access_token: value.access_token,
            expires_in: value.expires_in.map(Duration::from_secs),
            user: value.user.into(),
        }
    }
}

/// `signup` answers with a session when autoconfirm is on, with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

impl From<SignUpResponse> for Registration {
    fn from(value: SignUpResponse) -> Self {
        match value {
            SignUpResponse::Session(token) => Registration::SignedIn(token.into()),
            SignUpResponse::User(user) => Registration::ConfirmationRequired { user_id: user.id },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default, alias = "error_description", alias = "message")]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    roles: Vec<String>,
}

impl From<UserResponse> for ProviderUser {
    fn from(value: UserResponse) -> Self {
        Self {
            id: value.id,
            email: value.email.unwrap_or_default(),
            email_verified: value.email_confirmed_at.is_some(),
            roles: value.app_metadata.roles,
        }
    }
}

impl GoTrueProvider {
    /// Client for the GoTrue server at `base_url`, authenticating with the project `api_key`.
    pub fn new(base_url: &str, api_key: String) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| unavailable("failed to build HTTP client", &err))?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            api_key: Arc::from(api_key),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn register(&self, credentials: Credentials) -> ProviderResult<Registration> {
        let response = self
            .client
            .post(self.endpoint("signup"))
            .header("apikey", self.api_key.as_ref())
            .json(&json!({
                "email": credentials.email.trim(),
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|err| unavailable("signup request failed", &err))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            debug!(%status, "identity provider rejected signup");
            return Err(ProviderError::RegistrationRejected {
                message: body.msg.unwrap_or_else(|| "signup rejected".into()),
            });
        }

        let created: SignUpResponse = check_status(response)?
            .json()
            .await
            .map_err(|err| unavailable("malformed signup response", &err))?;
        Ok(created.into())
    }

    async fn authenticate(&self, credentials: Credentials) -> ProviderResult<ProviderSession> {
        let response = self
            .client
            .post(self.endpoint("token?grant_type=password"))
            .header("apikey", self.api_key.as_ref())
            .json(&json!({
                "email": credentials.email.trim(),
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|err| unavailable("token request failed", &err))?;

        let response = check_status(response)?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| unavailable("malformed token response", &err))?;

        Ok(token.into())
    }

    async fn resolve(&self, access_token: &str) -> ProviderResult<ProviderUser> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", self.api_key.as_ref())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| unavailable("user request failed", &err))?;

        let user: UserResponse = check_status(response)?
            .json()
            .await
            .map_err(|err| unavailable("malformed user response", &err))?;
        Ok(user.into())
    }

    async fn revoke(&self, access_token: &str) -> ProviderResult<()> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", self.api_key.as_ref())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| unavailable("logout request failed", &err))?;

        match response.status() {
            // Already expired or revoked elsewhere.
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            _ => check_status(response).map(|_| ()),
        }
    }
}

fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    debug!(%status, url = %response.url(), "identity provider refused request");
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(ProviderError::InvalidCredentials)
        }
        other => Err(ProviderError::Unavailable {
            message: format!("unexpected status {other}"),
        }),
    }
}

fn unavailable(context: &str, err: &reqwest::Error) -> ProviderError {
    ProviderError::Unavailable {
        message: format!("{context}: {err}"),
    }
}

impl IdentityProvider for GoTrueProvider {
    fn register(&self, credentials: Credentials) -> BoxFuture<'static, ProviderResult<Registration>> {
        let provider = self.clone();
        Box::pin(async move { provider.register(credentials).await })
    }

    fn authenticate(
        &self,
        credentials: Credentials,
    ) -> BoxFuture<'static, ProviderResult<ProviderSession>> {
        let provider = self.clone();
        Box::pin(async move { provider.authenticate(credentials).await })
    }

    fn resolve(&self, access_token: String) -> BoxFuture<'static, ProviderResult<ProviderUser>> {
        let provider = self.clone();
        Box::pin(async move { provider.resolve(&access_token).await })
    }

    fn revoke(&self, access_token: String) -> BoxFuture<'static, ProviderResult<()>> {
        let provider = self.clone();
        Box::pin(async move { provider.revoke(&access_token).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_payload_maps_claims() {
        let raw = json!({
            "id": "5f0c8a4e-3b0e-4a55-9d7e-2f1a3c4b5d6e",
            "email": "ops@example.com",
            "email_confirmed_at": "2026-01-04T12:00:00Z",
            "app_metadata": { "provider": "email", "roles": ["operator"] }
        });
        let user: ProviderUser = serde_json::from_value::<UserResponse>(raw).unwrap().into();
        assert!(user.email_verified);
        assert_eq!(user.roles, vec!["operator".to_owned()]);
    }

    #[test]
    fn unconfirmed_user_without_metadata_is_accepted() {
        let raw = json!({ "id": "5f0c8a4e-3b0e-4a55-9d7e-2f1a3c4b5d6e", "email": "fan@example.com" });
        let user: ProviderUser = serde_json::from_value::<UserResponse>(raw).unwrap().into();
        assert!(!user.email_verified);
        assert!(user.roles.is_empty());
    }

    #[test]
    fn autoconfirmed_signup_carries_a_session() {
        let raw = json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": "5f0c8a4e-3b0e-4a55-9d7e-2f1a3c4b5d6e", "email": "fan@example.com" }
        });
        let registration: Registration =
            serde_json::from_value::<SignUpResponse>(raw).unwrap().into();
        let Registration::SignedIn(session) = registration else {
            panic!("expected a session");
        };
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.expires_in, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn unconfirmed_signup_waits_for_email() {
        let raw = json!({
            "id": "5f0c8a4e-3b0e-4a55-9d7e-2f1a3c4b5d6e",
            "email": "fan@example.com",
            "confirmation_sent_at": "2026-01-04T12:00:00Z"
        });
        let registration: Registration =
            serde_json::from_value::<SignUpResponse>(raw).unwrap().into();
        assert!(matches!(
            registration,
            Registration::ConfirmationRequired { user_id }
                if user_id.to_string() == "5f0c8a4e-3b0e-4a55-9d7e-2f1a3c4b5d6e"
        ));
    }

    #[test]
    fn signup_error_message_is_read_from_any_field() {
        let body: ErrorResponse =
            serde_json::from_value(json!({"code": 422, "msg": "User already registered"})).unwrap();
        assert_eq!(body.msg.as_deref(), Some("User already registered"));
        let body: ErrorResponse =
            serde_json::from_value(json!({"error_description": "Password too short"})).unwrap();
        assert_eq!(body.msg.as_deref(), Some("Password too short"));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider = GoTrueProvider::new("https://auth.example.com/", "key".into()).unwrap();
        assert_eq!(
            provider.endpoint("user"),
            "https://auth.example.com/auth/v1/user"
        );
    }
}
