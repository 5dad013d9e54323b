use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::{GameDate, TeamSide},
    dto::{
        admin::{AssetRequest, DeleteDateResponse, IngestPreviewResponse, PublishResponse},
        game::GameView,
    },
    error::{AppError, ErrorBody},
    routes::caller::Caller,
    services::{schema_validator::validate_batch, vote_ledger::TallyAudit},
    state::SharedState,
};

/// Operator-only endpoints for ingesting and curating games.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/games/preview", post(preview_games))
        .route("/admin/games", post(publish_games))
        .route("/admin/games/{id}", delete(delete_game))
        .route("/admin/dates/{date}/games", delete(delete_games_by_date))
        .route("/admin/games/{id}/assets/{side}", put(attach_asset))
        .route("/admin/games/{id}/audit", get(audit_game))
        .route_layer(middleware::from_fn_with_state(state, require_operator))
}

/// Validate an upload and return the fully defaulted games without storing anything.
#[utoipa::path(
    post,
    path = "/admin/games/preview",
    tag = "admin",
    security(("bearer" = [])),
    request_body(content = Object, description = "Bulk upload: `{ game_date, games: [...] }`"),
    responses(
        (status = 200, description = "Validated preview", body = IngestPreviewResponse),
        (status = 400, description = "Malformed payload", body = ErrorBody),
        (status = 422, description = "Invalid date or field", body = ErrorBody)
    )
)]
pub async fn preview_games(Json(payload): Json<Value>) -> Result<Json<IngestPreviewResponse>, AppError> {
    let batch = validate_batch(&payload)?;
    Ok(Json(IngestPreviewResponse {
        game_date: batch.game_date.to_string(),
        count: batch.games.len(),
        games: batch.games,
    }))
}

/// Validate and publish an upload as one all-or-nothing write.
#[utoipa::path(
    post,
    path = "/admin/games",
    tag = "admin",
    security(("bearer" = [])),
    request_body(content = Object, description = "Bulk upload: `{ game_date, games: [...] }`"),
    responses(
        (status = 201, description = "Games published", body = PublishResponse),
        (status = 400, description = "Malformed payload", body = ErrorBody),
        (status = 422, description = "Invalid date, field, or empty batch", body = ErrorBody),
        (status = 503, description = "Storage unavailable; nothing was written", body = ErrorBody)
    )
)]
pub async fn publish_games(
    State(state): State<SharedState>,
    caller: Caller,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    let batch = validate_batch(&payload)?;
    let game_date = batch.game_date;
    let games = state
        .games()
        .await?
        .publish(&caller.identity(), batch)
        .await?;

    let response = PublishResponse {
        game_date: game_date.to_string(),
        games: games
            .into_iter()
            .map(|game| GameView::from_entity(game, state.config()))
            .collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Delete a game and every vote on it.
#[utoipa::path(
    delete,
    path = "/admin/games/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Identifier of the game to delete")),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 404, description = "Unknown game", body = ErrorBody)
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .games()
        .await?
        .delete_by_id(&caller.identity(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every game of a date with their votes.
#[utoipa::path(
    delete,
    path = "/admin/dates/{date}/games",
    tag = "admin",
    security(("bearer" = [])),
    params(("date" = String, Path, description = "Date as YYYY-MM-DD")),
    responses(
        (status = 200, description = "Number of games removed", body = DeleteDateResponse),
        (status = 422, description = "Malformed date", body = ErrorBody)
    )
)]
pub async fn delete_games_by_date(
    State(state): State<SharedState>,
    caller: Caller,
    Path(raw_date): Path<String>,
) -> Result<Json<DeleteDateResponse>, AppError> {
    let date: GameDate = raw_date
        .parse()
        .map_err(|err: crate::dao::models::GameDateParseError| {
            AppError::unprocessable("invalid_date", err.to_string())
        })?;
    let deleted = state
        .games()
        .await?
        .delete_by_date(&caller.identity(), date)
        .await?;
    Ok(Json(DeleteDateResponse {
        game_date: date.to_string(),
        deleted,
    }))
}

/// Record an uploaded image against the home or away side of a game.
#[utoipa::path(
    put,
    path = "/admin/games/{id}/assets/{side}",
    tag = "admin",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Identifier of the game"),
        ("side" = TeamSide, Path, description = "`home` or `away`")
    ),
    request_body = AssetRequest,
    responses(
        (status = 200, description = "Updated game", body = GameView),
        (status = 404, description = "Unknown game", body = ErrorBody),
        (status = 422, description = "Invalid asset reference", body = ErrorBody)
    )
)]
pub async fn attach_asset(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, side)): Path<(Uuid, TeamSide)>,
    Valid(Json(payload)): Valid<Json<AssetRequest>>,
) -> Result<Json<GameView>, AppError> {
    let game = state
        .assets()
        .await?
        .attach(&caller.identity(), id, side, &payload.asset_ref)
        .await?;
    Ok(Json(GameView::from_entity(game, state.config())))
}

/// Compare stored tallies with the vote ledger.
#[utoipa::path(
    get,
    path = "/admin/games/{id}/audit",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Tally audit", body = TallyAudit),
        (status = 404, description = "Unknown game", body = ErrorBody)
    )
)]
pub async fn audit_game(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<TallyAudit>, AppError> {
    let audit = state.votes().await?.audit(&caller.identity(), id).await?;
    Ok(Json(audit))
}

/// Resolve the caller once, reject non-operators, and hand the caller to the handler.
async fn require_operator(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let caller = Caller::from_request_parts(&mut parts, &state).await?;
    let identity = caller.identity();

    if identity.user_id().is_none() {
        return Err(AppError::unauthorized("auth_required", "missing bearer token"));
    }
    if !identity.is_operator() {
        debug!(user_id = ?identity.user_id(), path = %parts.uri.path(), "operator route refused");
        return Err(AppError::forbidden(
            "operator_required",
            "operator role required",
        ));
    }

    parts.extensions.insert(caller);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
