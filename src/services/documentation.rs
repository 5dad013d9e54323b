use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the picks ledger service.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::auth::sign_up,
        crate::routes::auth::sign_in,
        crate::routes::auth::sign_out,
        crate::routes::auth::me,
        crate::routes::auth::complete_profile,
        crate::routes::games::list_games,
        crate::routes::games::get_game,
        crate::routes::games::cast_vote,
        crate::routes::votes::my_votes,
        crate::routes::admin::preview_games,
        crate::routes::admin::publish_games,
        crate::routes::admin::delete_game,
        crate::routes::admin::delete_games_by_date,
        crate::routes::admin::attach_asset,
        crate::routes::admin::audit_game,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::auth::SignUpRequest,
            crate::dto::auth::SignUpResponse,
            crate::dto::auth::SignInRequest,
            crate::dto::auth::SignInResponse,
            crate::dto::auth::MeResponse,
            crate::dto::auth::ProfileRequest,
            crate::dto::auth::ProfileResponse,
            crate::dto::game::GameView,
            crate::dto::game::GameListResponse,
            crate::dto::vote::VoteRequest,
            crate::dto::vote::VotesResponse,
            crate::dto::admin::IngestPreviewResponse,
            crate::dto::admin::PublishResponse,
            crate::dto::admin::DeleteDateResponse,
            crate::dto::admin::AssetRequest,
            crate::services::vote_ledger::VoteOutcome,
            crate::services::vote_ledger::TallyAudit,
            crate::auth::Identity,
            crate::auth::Role,
            crate::auth::UsernameRejection,
            crate::error::ErrorBody,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Sign-up, sign-in, sign-out and profile completion"),
        (name = "games", description = "Published games and predictions"),
        (name = "votes", description = "Community voting ledger"),
        (name = "admin", description = "Operator ingestion and curation"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by authenticated routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
