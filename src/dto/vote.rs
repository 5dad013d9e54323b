use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::dao::models::TeamSide;

/// Body of the vote endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// Side the caller picks.
    pub team: TeamSide,
}

/// Query of `GET /votes`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct VotesQuery {
    /// Comma separated game ids.
    pub game_ids: String,
}

/// The caller's votes among the requested games.
#[derive(Debug, Serialize, ToSchema)]
pub struct VotesResponse {
    /// Team picked per game, in request order; games without a vote are omitted.
    #[schema(value_type = HashMap<String, TeamSide>)]
    pub votes: IndexMap<Uuid, TeamSide>,
}
