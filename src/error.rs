use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    auth::{AuthError, ProfileError},
    dao::storage::StorageError,
    services::{
        asset_attachment::AttachError,
        game_repository::{DeleteError, FindError, PublishError},
        schema_validator::IngestError,
        vote_ledger::{AuditError, VoteError},
    },
};

/// Errors raised while resolving shared service dependencies.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request.
    #[error("{message}")]
    BadRequest {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// No session, or the session is invalid.
    #[error("{message}")]
    Unauthorized {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Session present but lacking the required role or profile.
    #[error("{message}")]
    Forbidden {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Unknown resource.
    #[error("{message}")]
    NotFound {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// State conflict, such as a taken username.
    #[error("{message}")]
    Conflict {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Well-formed request breaking a domain rule.
    #[error("{message}")]
    Unprocessable {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Storage or identity provider unavailable; retrying the whole request is safe.
    #[error("{message}")]
    ServiceUnavailable {
        /// Stable machine-readable reason.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
}

impl AppError {
    /// 400 with `code`.
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
        }
    }

    /// 401 with `code`.
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    /// 403 with `code`.
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Forbidden {
            code,
            message: message.into(),
        }
    }

    /// 404 `not_found`.
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            code: "not_found",
            message: message.into(),
        }
    }

    /// 409 with `code`.
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// 422 with `code`.
    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unprocessable {
            code,
            message: message.into(),
        }
    }

    /// 503 `unavailable`.
    pub fn unavailable(message: impl Into<String>) -> Self {
        AppError::ServiceUnavailable {
            code: "unavailable",
            message: message.into(),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::Unauthorized { code, .. } => (StatusCode::UNAUTHORIZED, *code),
            AppError::Forbidden { code, .. } => (StatusCode::FORBIDDEN, *code),
            AppError::NotFound { code, .. } => (StatusCode::NOT_FOUND, *code),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::Unprocessable { code, .. } => (StatusCode::UNPROCESSABLE_ENTITY, *code),
            AppError::ServiceUnavailable { code, .. } => (StatusCode::SERVICE_UNAVAILABLE, *code),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable reason.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.parts();
        let payload = Json(ErrorBody {
            code: code.to_owned(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::bad_request("validation_failed", format!("validation failed: {err}"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => source.into(),
            ServiceError::Degraded => AppError::unavailable("storage unavailable (degraded mode)"),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::unavailable(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::unauthorized("invalid_credentials", err.to_string())
            }
            AuthError::RegistrationRejected { .. } => {
                AppError::unprocessable("registration_rejected", err.to_string())
            }
            AuthError::RegistrationDisabled => {
                AppError::forbidden("registration_disabled", err.to_string())
            }
            AuthError::ProviderUnavailable { .. } => AppError::unavailable(err.to_string()),
            AuthError::Storage(source) => source.into(),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::AuthRequired => AppError::unauthorized("auth_required", err.to_string()),
            ProfileError::AlreadyCompleted => {
                AppError::conflict("profile_completed", err.to_string())
            }
            ProfileError::UsernameInvalid { reason } => {
                AppError::unprocessable(reason.code(), reason.to_string())
            }
            ProfileError::UsernameTaken => AppError::conflict("username_taken", err.to_string()),
            ProfileError::Storage(source) => source.into(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MalformedPayload { .. } => {
                AppError::bad_request("malformed_payload", err.to_string())
            }
            IngestError::InvalidDate { .. } => AppError::unprocessable("invalid_date", err.to_string()),
            IngestError::InvalidField { .. } => {
                AppError::unprocessable("invalid_field", err.to_string())
            }
        }
    }
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Unauthorized => AppError::forbidden("operator_required", err.to_string()),
            PublishError::EmptyBatch => AppError::unprocessable("empty_batch", err.to_string()),
            PublishError::Storage(source) => source.into(),
        }
    }
}

impl From<DeleteError> for AppError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::Unauthorized => AppError::forbidden("operator_required", err.to_string()),
            DeleteError::NotFound { .. } => AppError::not_found(err.to_string()),
            DeleteError::Storage(source) => source.into(),
        }
    }
}

impl From<FindError> for AppError {
    fn from(err: FindError) -> Self {
        match err {
            FindError::NotFound { .. } => AppError::not_found(err.to_string()),
            FindError::Storage(source) => source.into(),
        }
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::AuthRequired => AppError::unauthorized("auth_required", err.to_string()),
            VoteError::ProfileRequired => AppError::forbidden("profile_required", err.to_string()),
            VoteError::GameNotFound { .. } => AppError::not_found(err.to_string()),
            VoteError::Storage(source) => source.into(),
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Unauthorized => AppError::forbidden("operator_required", err.to_string()),
            AuditError::GameNotFound { .. } => AppError::not_found(err.to_string()),
            AuditError::Storage(source) => source.into(),
        }
    }
}

impl From<AttachError> for AppError {
    fn from(err: AttachError) -> Self {
        match err {
            AttachError::Unauthorized => AppError::forbidden("operator_required", err.to_string()),
            AttachError::NotFound { .. } => AppError::not_found(err.to_string()),
            AttachError::InvalidAsset { .. } => {
                AppError::unprocessable("invalid_asset", err.to_string())
            }
            AttachError::Storage(source) => source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UsernameRejection;

    #[test]
    fn username_rejection_keeps_reason_code() {
        let err: AppError = ProfileError::UsernameInvalid {
            reason: UsernameRejection::TooShort,
        }
        .into();
        assert_eq!(err.parts(), (StatusCode::UNPROCESSABLE_ENTITY, "username_too_short"));
    }

    #[test]
    fn auth_failures_split_401_and_403() {
        let anonymous: AppError = VoteError::AuthRequired.into();
        let needs_setup: AppError = VoteError::ProfileRequired.into();
        assert_eq!(anonymous.parts().0, StatusCode::UNAUTHORIZED);
        assert_eq!(needs_setup.parts(), (StatusCode::FORBIDDEN, "profile_required"));
    }

    #[test]
    fn degraded_maps_to_503() {
        let err: AppError = ServiceError::Degraded.into();
        assert_eq!(err.parts().0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
