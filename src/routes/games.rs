use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dao::models::GameDate,
    dto::{
        game::{GameListResponse, GameView, GamesQuery},
        vote::VoteRequest,
    },
    error::{AppError, ErrorBody},
    routes::caller::Caller,
    services::vote_ledger::VoteOutcome,
    state::SharedState,
};

/// Public game endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/vote", post(cast_vote))
}

/// Games of one date in creation order.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(GamesQuery),
    responses(
        (status = 200, description = "Games of the date", body = GameListResponse),
        (status = 422, description = "Malformed date", body = ErrorBody)
    )
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<GamesQuery>,
) -> Result<Json<GameListResponse>, AppError> {
    let date = match query.date.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => raw
            .parse::<GameDate>()
            .map_err(|err| AppError::unprocessable("invalid_date", err.to_string()))?,
        None => state.config().today(),
    };

    let games = state.games().await?.list_by_date(date).await?;
    Ok(Json(GameListResponse {
        game_date: date.to_string(),
        games: games
            .into_iter()
            .map(|game| GameView::from_entity(game, state.config()))
            .collect(),
    }))
}

/// Retrieve a game by its ID.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game", body = GameView),
        (status = 404, description = "Unknown game", body = ErrorBody)
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameView>, AppError> {
    let game = state.games().await?.find(id).await?;
    Ok(Json(GameView::from_entity(game, state.config())))
}

/// Cast the caller's vote. A repeated vote returns the team chosen first.
#[utoipa::path(
    post,
    path = "/games/{id}/vote",
    tag = "votes",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Identifier of the game")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded or already present", body = VoteOutcome),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 403, description = "Profile not completed", body = ErrorBody),
        (status = 404, description = "Unknown game", body = ErrorBody),
        (status = 503, description = "Storage unavailable; safe to retry", body = ErrorBody)
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteOutcome>, AppError> {
    let outcome = state
        .votes()
        .await?
        .cast(&caller.identity(), id, payload.team)
        .await?;
    Ok(Json(outcome))
}
