//! Read models for games as served to clients.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::models::{GameEntity, GameStatus, PredictionEntity, TeamEntity},
    dto::format_system_time,
};

/// One side of a matchup. `asset_ref` always resolves to an image, attached or fallback.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamView {
    /// Display name.
    pub name: String,
    /// Short code.
    pub abbr: String,
    /// Season record.
    pub record: String,
    /// CSS color.
    pub color: String,
    /// Mascot name.
    pub mascot_name: String,
    /// Recent streak, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<String>,
    /// Image to render for the team.
    pub asset_ref: String,
    /// False when `asset_ref` is the fallback built from the abbreviation.
    pub asset_attached: bool,
}

impl TeamView {
    fn from_entity(team: TeamEntity, config: &AppConfig) -> Self {
        let (asset_ref, asset_attached) = match team.asset_ref {
            Some(asset_ref) => (asset_ref, true),
            None => (config.fallback_asset(&team.abbr), false),
        };
        Self {
            name: team.name,
            abbr: team.abbr,
            record: team.record,
            color: team.color,
            mascot_name: team.mascot_name,
            streak: team.streak,
            asset_ref,
            asset_attached,
        }
    }
}

/// Prediction as served.
#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionView {
    /// Home win probability in percent.
    pub home_win_pct: i32,
    /// Away win probability in percent.
    pub away_win_pct: i32,
    /// Data points behind the prediction.
    pub data_points: i64,
    /// Head-to-head summary.
    pub head_to_head: String,
    /// Explanation in English.
    pub reason: String,
    /// Explanation in Spanish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_es: Option<String>,
}

impl From<PredictionEntity> for PredictionView {
    fn from(value: PredictionEntity) -> Self {
        Self {
            home_win_pct: value.home_win_pct,
            away_win_pct: value.away_win_pct,
            data_points: value.data_points,
            head_to_head: value.head_to_head,
            reason: value.reason,
            reason_es: value.reason_es,
        }
    }
}

/// Published game with its community tallies.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    /// Game id.
    pub id: Uuid,
    /// Listing date.
    #[schema(example = "2026-02-22")]
    pub game_date: String,
    /// Tip-off time as published.
    pub game_time: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Value pick badge.
    pub is_value_pick: bool,
    /// Featured badge.
    pub is_featured: bool,
    /// Hosting team.
    pub home: TeamView,
    /// Visiting team.
    pub away: TeamView,
    /// Published prediction.
    pub prediction: PredictionView,
    /// Community votes for the home side.
    pub votes_home: i64,
    /// Community votes for the away side.
    pub votes_away: i64,
    /// RFC 3339 publish time.
    pub created_at: String,
    /// RFC 3339 time of the last change.
    pub updated_at: String,
}

impl GameView {
    /// Build the view, resolving fallback assets from `config`.
    pub fn from_entity(game: GameEntity, config: &AppConfig) -> Self {
        Self {
            id: game.id,
            game_date: game.game_date.to_string(),
            game_time: game.game_time,
            status: game.status,
            is_value_pick: game.is_value_pick,
            is_featured: game.is_featured,
            home: TeamView::from_entity(game.home, config),
            away: TeamView::from_entity(game.away, config),
            prediction: game.prediction.into(),
            votes_home: game.votes_home,
            votes_away: game.votes_away,
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
        }
    }
}

/// Query of `GET /games`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct GamesQuery {
    /// `YYYY-MM-DD`; defaults to today in the listing time zone.
    pub date: Option<String>,
}

/// Games of one date in creation order.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameListResponse {
    /// Listed date.
    pub game_date: String,
    /// Games, oldest first.
    pub games: Vec<GameView>,
}
