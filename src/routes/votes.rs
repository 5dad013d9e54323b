use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::{
        validation::parse_game_ids,
        vote::{VotesQuery, VotesResponse},
    },
    error::{AppError, ErrorBody},
    routes::caller::Caller,
    state::SharedState,
};

/// Vote lookup routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/votes", get(my_votes))
}

/// The caller's picks among the requested games. Anonymous callers get an empty map.
#[utoipa::path(
    get,
    path = "/votes",
    tag = "votes",
    params(VotesQuery),
    responses(
        (status = 200, description = "Votes by game", body = VotesResponse),
        (status = 400, description = "Malformed id list", body = ErrorBody)
    )
)]
pub async fn my_votes(
    State(state): State<SharedState>,
    caller: Caller,
    Query(query): Query<VotesQuery>,
) -> Result<Json<VotesResponse>, AppError> {
    let game_ids = parse_game_ids(&query.game_ids).map_err(|err| {
        AppError::bad_request(
            "invalid_game_ids",
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| err.code.into_owned()),
        )
    })?;

    let votes = state
        .votes()
        .await?
        .votes_for(&caller.identity(), &game_ids)
        .await?;
    Ok(Json(VotesResponse { votes }))
}
