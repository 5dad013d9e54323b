use axum::Router;

use crate::state::SharedState;

/// Operator ingestion and curation endpoints.
pub mod admin;
/// Sign-up, sign-in, sign-out and profile endpoints.
pub mod auth;
/// Bearer-token extractor.
pub mod caller;
/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Listings, single games and vote casting.
pub mod games;
/// Liveness endpoint.
pub mod health;
/// The caller's own votes.
pub mod votes;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(auth::router())
        .merge(games::router())
        .merge(votes::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router();

    api_router.merge(docs_router).with_state(state)
}
