use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::{
    auth::{AuthGate, Identity},
    error::AppError,
    state::SharedState,
};

/// Session behind the request's bearer token. Requests without a token act as anonymous.
#[derive(Clone)]
pub struct Caller {
    token: Option<String>,
    gate: Option<Arc<AuthGate>>,
}

impl Caller {
    /// Caller without a bearer token.
    pub fn anonymous() -> Self {
        Self {
            token: None,
            gate: None,
        }
    }

    /// Identity of the caller's gate; anonymous without one.
    pub fn identity(&self) -> Identity {
        self.gate
            .as_ref()
            .map_or(Identity::Anonymous, |gate| gate.current_identity())
    }

    /// Gate and token of an authenticated caller.
    pub fn session(&self) -> Result<(&Arc<AuthGate>, &str), AppError> {
        match (&self.gate, &self.token) {
            (Some(gate), Some(token)) => Ok((gate, token)),
            _ => Err(AppError::unauthorized(
                "auth_required",
                "missing bearer token",
            )),
        }
    }
}

/// Token of an `Authorization: Bearer` header. A present but malformed header is rejected.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::unauthorized("invalid_token", "expected `Authorization: Bearer <token>`")
        })?;
    Ok(Some(token.to_owned()))
}

impl FromRequestParts<SharedState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(caller.clone());
        }

        let Some(token) = bearer_token(&parts.headers)? else {
            return Ok(Caller::anonymous());
        };

        if let Some(gate) = state.sessions().cached(&token) {
            return Ok(Self {
                token: Some(token),
                gate: Some(gate),
            });
        }

        // Resolving a token loads the caller's profile.
        let store = state.require_game_store().await?;
        let gate = state.sessions().gate_for(store.as_ref(), &token).await?;
        Ok(Self {
            token: Some(token),
            gate: Some(gate),
        })
    }
}
