use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    auth::{SignUp, provider::Credentials},
    dto::auth::{
        MeResponse, ProfileRequest, ProfileResponse, SignInRequest, SignInResponse,
        SignUpRequest, SignUpResponse,
    },
    error::{AppError, ErrorBody},
    routes::caller::{Caller, bearer_token},
    state::SharedState,
};

/// Session endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/me", get(me))
        .route("/auth/profile", post(complete_profile))
}

/// Create an account. Signs the user in when the provider activates the account immediately.
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = SignUpResponse),
        (status = 202, description = "Account created; email confirmation pending", body = SignUpResponse),
        (status = 403, description = "Registration disabled", body = ErrorBody),
        (status = 422, description = "Registration rejected by the provider", body = ErrorBody),
        (status = 503, description = "Identity provider or storage unavailable", body = ErrorBody)
    )
)]
pub async fn sign_up(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SignUpRequest>>,
) -> Result<(StatusCode, Json<SignUpResponse>), AppError> {
    let store = state.require_game_store().await?;
    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };
    let outcome = state
        .sessions()
        .sign_up(store.as_ref(), credentials)
        .await?;
    let status = match &outcome {
        SignUp::SignedIn(_) => StatusCode::CREATED,
        SignUp::ConfirmationRequired => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome.into())))
}

/// Exchange email and password for an access token.
#[utoipa::path(
    post,
    path = "/auth/sign-in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 503, description = "Identity provider or storage unavailable", body = ErrorBody)
    )
)]
pub async fn sign_in(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SignInRequest>>,
) -> Result<Json<SignInResponse>, AppError> {
    let store = state.require_game_store().await?;
    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };
    let (_, session) = state
        .sessions()
        .sign_in(store.as_ref(), credentials)
        .await?;
    Ok(Json(session.into()))
}

/// Drop the caller's session. Works without storage, including in degraded mode.
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Malformed authorization header", body = ErrorBody)
    )
)]
pub async fn sign_out(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    if let Some(token) = bearer_token(&headers)? {
        state.sessions().sign_out(&token).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Identity of the caller; anonymous without a bearer token.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses((status = 200, description = "Current identity", body = MeResponse))
)]
pub async fn me(caller: Caller) -> Json<MeResponse> {
    let identity = caller.identity();
    let username = match caller.session() {
        Ok((gate, _)) => gate
            .session()
            .await
            .and_then(|session| session.username().map(str::to_owned)),
        Err(_) => None,
    };
    Json(MeResponse {
        identity,
        username,
        needs_setup: identity.user_id().is_some() && !identity.has_profile(),
    })
}

/// Pick the public username of the signed-in user.
#[utoipa::path(
    post,
    path = "/auth/profile",
    tag = "auth",
    security(("bearer" = [])),
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile created", body = ProfileResponse),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 409, description = "Username taken or profile already completed", body = ErrorBody),
        (status = 422, description = "Username rejected by the rules", body = ErrorBody)
    )
)]
pub async fn complete_profile(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<ProfileRequest>>,
) -> Result<Json<ProfileResponse>, AppError> {
    let (gate, _) = caller.session()?;
    let store = state.require_game_store().await?;
    let profile = gate
        .complete_profile(store.as_ref(), &payload.username)
        .await?;
    Ok(Json(ProfileResponse {
        user_id: profile.user_id,
        username: profile.username,
        identity: gate.current_identity(),
    }))
}
