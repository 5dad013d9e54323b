//! Storage backends behind the [`GameStore`] trait.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    GameDate, GameEntity, ProfileEntity, ProfileInsert, TeamSide, VoteCounts, VoteEntity,
    VoteInsert,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for games, the vote ledger and user profiles.
///
/// Every method is a single durable unit: a backend either applies the whole write or none of
/// it. Aggregate counters are only ever changed by [`GameStore::record_vote`].
pub trait GameStore: Send + Sync {
    /// Insert a whole batch atomically and return it as stored.
    ///
    /// The store assigns each game's `seq` in batch order, in the same unit as the insert, so
    /// sequence order always matches commit order across concurrent publishes.
    fn insert_games(
        &self,
        games: Vec<GameEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Games of one date in creation order.
    fn list_games_by_date(&self, date: GameDate)
    -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Delete a game and its votes in one transaction; `false` when the game does not exist.
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every game of a date and their votes in one transaction.
    fn delete_games_by_date(&self, date: GameDate) -> BoxFuture<'static, StorageResult<u64>>;
    /// Store an asset reference on one side of a game, returning the updated game.
    fn set_team_asset(
        &self,
        id: Uuid,
        side: TeamSide,
        asset_ref: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Insert a vote row and, only if it was inserted, increment the matching counter.
    fn record_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>>;
    /// Votes cast by `user_id` among `game_ids`.
    fn find_votes(
        &self,
        user_id: Uuid,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    /// Count ledger rows for a game.
    fn count_votes(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<VoteCounts>>;
    /// Create a profile unless the user already has one or the username is taken.
    fn insert_profile(
        &self,
        profile: ProfileEntity,
    ) -> BoxFuture<'static, StorageResult<ProfileInsert>>;
    /// Profile of `user_id`, if completed.
    fn find_profile(&self, user_id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
