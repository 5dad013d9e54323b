//! Source of truth for game records: publish, read by date, delete.

use std::{sync::Arc, time::SystemTime};

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::Identity,
    dao::{
        game_store::GameStore,
        models::{GameDate, GameEntity, PredictionEntity, TeamEntity},
        storage::StorageError,
    },
    services::schema_validator::{GameDraft, PredictionDraft, TeamDraft, ValidatedBatch},
};

/// Why a batch was not published. No game of the batch exists afterwards.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Caller is not an operator.
    #[error("only operators may publish games")]
    Unauthorized,
    /// The batch has no games.
    #[error("batch contains no games")]
    EmptyBatch,
    /// The store failed or refused the insert.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of the delete operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// Caller is not an operator.
    #[error("only operators may delete games")]
    Unauthorized,
    /// No such game.
    #[error("game `{id}` not found")]
    NotFound {
        /// Requested game.
        id: Uuid,
    },
    /// The store failed; nothing was deleted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of [`GameRepository::find`].
#[derive(Debug, Error)]
pub enum FindError {
    /// No such game.
    #[error("game `{id}` not found")]
    NotFound {
        /// Requested game.
        id: Uuid,
    },
    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Game records over a [`GameStore`]. Every write is a single storage-level unit.
#[derive(Clone)]
pub struct GameRepository {
    store: Arc<dyn GameStore>,
}

impl GameRepository {
    /// Repository over `store`.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Games of `date` in creation order.
    pub async fn list_by_date(&self, date: GameDate) -> Result<Vec<GameEntity>, StorageError> {
        self.store.list_games_by_date(date).await
    }

    /// One game by id.
    pub async fn find(&self, id: Uuid) -> Result<GameEntity, FindError> {
        self.store
            .find_game(id)
            .await?
            .ok_or(FindError::NotFound { id })
    }

    /// Publish a validated batch. Either every game is created or none is.
    pub async fn publish(
        &self,
        identity: &Identity,
        batch: ValidatedBatch,
    ) -> Result<Vec<GameEntity>, PublishError> {
        if !identity.is_operator() {
            return Err(PublishError::Unauthorized);
        }
        if batch.games.is_empty() {
            return Err(PublishError::EmptyBatch);
        }

        let count = batch.games.len();
        let now = SystemTime::now();
        let drafts: Vec<GameEntity> = batch
            .games
            .into_iter()
            .map(|draft| new_game(draft, batch.game_date, now))
            .collect();

        let games = self.store.insert_games(drafts).await?;
        info!(date = %batch.game_date, count, "published games");
        Ok(games)
    }

    /// Delete one game and, in the same transaction, every vote on it.
    pub async fn delete_by_id(&self, identity: &Identity, id: Uuid) -> Result<(), DeleteError> {
        if !identity.is_operator() {
            return Err(DeleteError::Unauthorized);
        }
        if !self.store.delete_game(id).await? {
            return Err(DeleteError::NotFound { id });
        }
        info!(game_id = %id, "deleted game");
        Ok(())
    }

    /// Delete every game of `date` with their votes. Returns how many games were removed.
    pub async fn delete_by_date(
        &self,
        identity: &Identity,
        date: GameDate,
    ) -> Result<u64, DeleteError> {
        if !identity.is_operator() {
            return Err(DeleteError::Unauthorized);
        }
        let removed = self.store.delete_games_by_date(date).await?;
        if removed == 0 {
            debug!(%date, "no games to delete");
        } else {
            info!(%date, removed, "deleted games for date");
        }
        Ok(removed)
    }
}

/// `seq` stays zero until the store assigns it on insert.
fn new_game(draft: GameDraft, game_date: GameDate, now: SystemTime) -> GameEntity {
    GameEntity {
        id: Uuid::new_v4(),
        game_date,
        seq: 0,
        game_time: draft.game_time,
        status: draft.status,
        is_value_pick: draft.is_value_pick,
        is_featured: draft.is_featured,
        home: draft.home.into(),
        away: draft.away.into(),
        prediction: draft.prediction.into(),
        votes_home: 0,
        votes_away: 0,
        created_at: now,
        updated_at: now,
    }
}

impl From<TeamDraft> for TeamEntity {
    fn from(value: TeamDraft) -> Self {
        Self {
            name: value.name,
            abbr: value.abbr,
            record: value.record,
            color: value.color,
            mascot_name: value.mascot_name,
            streak: value.streak,
            asset_ref: None,
        }
    }
}

impl From<PredictionDraft> for PredictionEntity {
    fn from(value: PredictionDraft) -> Self {
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
