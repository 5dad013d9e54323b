//! In-process [`GameStore`] used for local development and tests.
//!
//! The whole state sits behind one async mutex, so each trait method runs as a single critical
//! section: that section is this engine's transaction, and it gives the same all-or-nothing and
//! atomic-increment guarantees the MongoDB backend gets from multi-document transactions.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::SystemTime,
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{
        GameDate, GameEntity, ProfileEntity, ProfileInsert, TeamSide, VoteCounts, VoteEntity,
        VoteInsert,
    },
    storage::{StorageError, StorageResult},
};

/// Memory-backed [`GameStore`] implementation. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    last_seq: i64,
    games: HashMap<Uuid, GameEntity>,
    /// Keyed by `(user_id, game_id)`: the key itself is the uniqueness constraint.
    votes: HashMap<(Uuid, Uuid), VoteEntity>,
    profiles: HashMap<Uuid, ProfileEntity>,
    usernames: HashMap<String, Uuid>,
}

impl MemoryState {
    fn remove_votes_for(&mut self, game_ids: &HashSet<Uuid>) {
        self.votes
            .retain(|(_, game_id), _| !game_ids.contains(game_id));
    }
}

impl MemoryGameStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryGameStore {
    fn insert_games(
        &self,
        games: Vec<GameEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            let mut batch_ids = HashSet::with_capacity(games.len());
            for game in &games {
                if state.games.contains_key(&game.id) || !batch_ids.insert(game.id) {
                    return Err(StorageError::rejected(format!(
                        "duplicate game id `{}`",
                        game.id
                    )));
                }
            }

            let first_seq = state.last_seq + 1;
            let games: Vec<GameEntity> = games
                .into_iter()
                .zip(first_seq..)
                .map(|(game, seq)| GameEntity { seq, ..game })
                .collect();
            state.last_seq += games.len() as i64;
            for game in &games {
                state.games.insert(game.id, game.clone());
            }
            Ok(games)
        })
    }

    fn list_games_by_date(
        &self,
        date: GameDate,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            let mut games: Vec<GameEntity> = state
                .games
                .values()
                .filter(|game| game.game_date == date)
                .cloned()
                .collect();
            games.sort_by_key(|game| game.seq);
            Ok(games)
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.games.get(&id).cloned()) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            if state.games.remove(&id).is_none() {
                return Ok(false);
            }
            state.remove_votes_for(&HashSet::from([id]));
            Ok(true)
        })
    }

    fn delete_games_by_date(&self, date: GameDate) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            let doomed: HashSet<Uuid> = state
                .games
                .values()
                .filter(|game| game.game_date == date)
                .map(|game| game.id)
                .collect();
            state.games.retain(|id, _| !doomed.contains(id));
            state.remove_votes_for(&doomed);
            Ok(doomed.len() as u64)
        })
    }

    fn set_team_asset(
        &self,
        id: Uuid,
        side: TeamSide,
        asset_ref: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            let Some(game) = state.games.get_mut(&id) else {
                return Ok(None);
            };
            game.side_mut(side).asset_ref = Some(asset_ref);
            game.updated_at = SystemTime::now();
            Ok(Some(game.clone()))
        })
    }

    fn record_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            let key = (vote.user_id, vote.game_id);
            if let Some(existing) = state.votes.get(&key) {
                return Ok(VoteInsert::Duplicate {
                    existing: existing.team,
                });
            }
            let Some(game) = state.games.get_mut(&vote.game_id) else {
                return Ok(VoteInsert::GameMissing);
            };
            match vote.team {
                TeamSide::Home => game.votes_home += 1,
                TeamSide::Away => game.votes_away += 1,
            }
            let outcome = VoteInsert::Recorded {
                votes_home: game.votes_home,
                votes_away: game.votes_away,
            };
            state.votes.insert(key, vote);
            Ok(outcome)
        })
    }

    fn find_votes(
        &self,
        user_id: Uuid,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            Ok(game_ids
                .iter()
                .filter_map(|game_id| state.votes.get(&(user_id, *game_id)).cloned())
                .collect())
        })
    }

    fn count_votes(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<VoteCounts>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let state = inner.lock().await;
            let counts = state
                .votes
                .values()
                .filter(|vote| vote.game_id == game_id)
                .fold(VoteCounts::default(), |mut counts, vote| {
                    match vote.team {
                        TeamSide::Home => counts.home += 1,
                        TeamSide::Away => counts.away += 1,
                    }
                    counts
                });
            Ok(counts)
        })
    }

    fn insert_profile(
        &self,
        profile: ProfileEntity,
    ) -> BoxFuture<'static, StorageResult<ProfileInsert>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut state = inner.lock().await;
            if let Some(existing) = state.profiles.get(&profile.user_id) {
                return Ok(ProfileInsert::AlreadyExists(existing.clone()));
            }
            let key = profile.username_key();
            if state.usernames.contains_key(&key) {
                return Ok(ProfileInsert::UsernameTaken);
            }
            state.usernames.insert(key, profile.user_id);
            state.profiles.insert(profile.user_id, profile);
            Ok(ProfileInsert::Created)
        })
    }

    fn find_profile(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.profiles.get(&user_id).cloned()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{GameStatus, PredictionEntity, TeamEntity};

    fn team(abbr: &str) -> TeamEntity {
        TeamEntity {
            name: abbr.into(),
            abbr: abbr.into(),
            record: String::new(),
            color: "#000000".into(),
            mascot_name: String::new(),
            streak: None,
            asset_ref: None,
        }
    }

    fn game(date: &str) -> GameEntity {
        let now = SystemTime::now();
        GameEntity {
            id: Uuid::new_v4(),
            game_date: date.parse().unwrap(),
            seq: 0,
            game_time: "TBD".into(),
            status: GameStatus::Upcoming,
            is_value_pick: false,
            is_featured: false,
            home: team("HOU"),
            away: team("BKN"),
            prediction: PredictionEntity {
                home_win_pct: 50,
                away_win_pct: 50,
                data_points: 0,
                head_to_head: String::new(),
                reason: String::new(),
                reason_es: None,
            },
            votes_home: 0,
            votes_away: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn vote(user_id: Uuid, game_id: Uuid, team: TeamSide) -> VoteEntity {
        VoteEntity {
            user_id,
            game_id,
            team,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn rejected_batch_leaves_no_rows() {
        let store = MemoryGameStore::new();
        let existing = game("2026-02-22");
        store.insert_games(vec![existing.clone()]).await.unwrap();

        let fresh = game("2026-02-22");
        let err = store
            .insert_games(vec![fresh.clone(), existing])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));

        let listed = store
            .list_games_by_date("2026-02-22".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|g| g.id != fresh.id));
    }

    #[tokio::test]
    async fn sequences_follow_insert_order_across_batches() {
        let store = MemoryGameStore::new();
        let first = store
            .insert_games(vec![game("2026-02-22"), game("2026-02-22")])
            .await
            .unwrap();
        let rejected = game("2026-02-22");
        store
            .insert_games(vec![rejected.clone(), rejected])
            .await
            .unwrap_err();
        let second = store
            .insert_games(vec![game("2026-02-22")])
            .await
            .unwrap();

        let seqs: Vec<i64> = first.iter().chain(&second).map(|g| g.seq).collect();
        assert_eq!(seqs, [1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_vote_keeps_first_team_and_counter() {
        let store = MemoryGameStore::new();
        let g = game("2026-02-22");
        store.insert_games(vec![g.clone()]).await.unwrap();
        let user = Uuid::new_v4();

        let first = store.record_vote(vote(user, g.id, TeamSide::Home)).await.unwrap();
        assert_eq!(
            first,
            VoteInsert::Recorded {
                votes_home: 1,
                votes_away: 0
            }
        );
        let second = store.record_vote(vote(user, g.id, TeamSide::Away)).await.unwrap();
        assert_eq!(
            second,
            VoteInsert::Duplicate {
                existing: TeamSide::Home
            }
        );

        let stored = store.find_game(g.id).await.unwrap().unwrap();
        assert_eq!((stored.votes_home, stored.votes_away), (1, 0));
    }

    #[tokio::test]
    async fn vote_for_missing_game_writes_nothing() {
        let store = MemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let outcome = store
            .record_vote(vote(Uuid::new_v4(), game_id, TeamSide::Away))
            .await
            .unwrap();
        assert_eq!(outcome, VoteInsert::GameMissing);
        assert_eq!(store.count_votes(game_id).await.unwrap(), VoteCounts::default());
    }

    #[tokio::test]
    async fn usernames_are_unique_case_insensitively() {
        let store = MemoryGameStore::new();
        let first = ProfileEntity {
            user_id: Uuid::new_v4(),
            username: "Jordan_23".into(),
            created_at: SystemTime::now(),
        };
        let second = ProfileEntity {
            user_id: Uuid::new_v4(),
            username: "jordan_23".into(),
            created_at: SystemTime::now(),
        };

        assert_eq!(
            store.insert_profile(first.clone()).await.unwrap(),
            ProfileInsert::Created
        );
        assert_eq!(
            store.insert_profile(second).await.unwrap(),
            ProfileInsert::UsernameTaken
        );
        assert_eq!(
            store.insert_profile(first.clone()).await.unwrap(),
            ProfileInsert::AlreadyExists(first)
        );
    }
}
