//! DTO definitions used by the operator REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::game::GameView, services::schema_validator::GameDraft};

/// Validated, fully defaulted upload as it would be published.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestPreviewResponse {
    /// Date the batch targets.
    pub game_date: String,
    /// Number of games in the batch.
    pub count: usize,
    /// Games with every default applied.
    pub games: Vec<GameDraft>,
}

/// Games created by a publish, in creation order.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Date the games were published under.
    pub game_date: String,
    /// Created games.
    pub games: Vec<GameView>,
}

/// Outcome of clearing a date.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteDateResponse {
    /// Cleared date.
    pub game_date: String,
    /// Games removed, along with their votes.
    pub deleted: u64,
}

/// Body of the asset attachment endpoint.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AssetRequest {
    /// URL or storage path of an already uploaded image.
    #[validate(length(min = 1, max = 2048))]
    pub asset_ref: String,
}
