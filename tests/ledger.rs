use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use picks_ledger_back::{
    auth::Identity,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        models::{
            GameDate, GameEntity, ProfileEntity, ProfileInsert, TeamSide, VoteCounts, VoteEntity,
            VoteInsert,
        },
        storage::{StorageError, StorageResult},
    },
    services::{
        game_repository::{GameRepository, PublishError},
        schema_validator::validate_batch,
        vote_ledger::{VoteLedger, VoteOutcome},
    },
};
use serde_json::json;
use uuid::Uuid;

fn operator() -> Identity {
    Identity::Operator {
        id: Uuid::new_v4(),
        has_profile: true,
    }
}

fn voter() -> Identity {
    Identity::User {
        id: Uuid::new_v4(),
        has_profile: true,
    }
}

async fn publish(store: Arc<dyn GameStore>, date: &str, count: usize) -> Vec<GameEntity> {
    let games: Vec<_> = (0..count).map(|_| json!({})).collect();
    let batch = validate_batch(&json!({"game_date": date, "games": games})).unwrap();
    GameRepository::new(store)
        .publish(&operator(), batch)
        .await
        .unwrap()
}

#[tokio::test]
async fn opposite_votes_from_two_users_both_count() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let game = publish(store.clone(), "2026-02-22", 1).await.remove(0);
    let ledger = VoteLedger::new(store.clone());

    let (home_fan, away_fan) = (voter(), voter());

    let (a, b) = tokio::join!(
        ledger.cast(&home_fan, game.id, TeamSide::Home),
        ledger.cast(&away_fan, game.id, TeamSide::Away),
    );
    assert!(matches!(a.unwrap(), VoteOutcome::Recorded { .. }));
    assert!(matches!(b.unwrap(), VoteOutcome::Recorded { .. }));

    let stored = store.find_game(game.id).await.unwrap().unwrap();
    assert_eq!((stored.votes_home, stored.votes_away), (1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_double_submits_record_a_single_vote() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let game = publish(store.clone(), "2026-02-22", 1).await.remove(0);
    let ledger = VoteLedger::new(store.clone());
    let user = voter();
    let game_id = game.id;

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let ledger = ledger.clone();
            let team = if i % 2 == 0 {
                TeamSide::Home
            } else {
                TeamSide::Away
            };
            tokio::spawn(async move { ledger.cast(&user, game_id, team).await })
        })
        .collect();

    let outcomes: Vec<VoteOutcome> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let recorded: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            VoteOutcome::Recorded { team, .. } => Some(*team),
            VoteOutcome::AlreadyVoted { .. } => None,
        })
        .collect();
    assert_eq!(recorded.len(), 1);
    let winner = recorded[0];
    assert!(outcomes.iter().all(|outcome| match outcome {
        VoteOutcome::Recorded { team, .. } => *team == winner,
        VoteOutcome::AlreadyVoted { existing_team } => *existing_team == winner,
    }));

    let audit = ledger.audit(&operator(), game.id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.votes_home + audit.votes_away, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counters_match_ledger_under_load() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let game = publish(store.clone(), "2026-02-22", 1).await.remove(0);
    let ledger = VoteLedger::new(store.clone());
    let game_id = game.id;

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let ledger = ledger.clone();
            let team = if i % 3 == 0 {
                TeamSide::Away
            } else {
                TeamSide::Home
            };
            tokio::spawn(async move { ledger.cast(&voter(), game_id, team).await })
        })
        .collect();
    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let audit = ledger.audit(&operator(), game.id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.ledger_away, 14);
    assert_eq!(audit.ledger_home, 26);
}

#[tokio::test]
async fn deleting_a_date_cascades_to_votes() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let doomed = publish(store.clone(), "2026-02-22", 2).await;
    let kept = publish(store.clone(), "2026-02-23", 1).await.remove(0);
    let ledger = VoteLedger::new(store.clone());
    let user = voter();

    for game in doomed.iter().chain([&kept]) {
        ledger.cast(&user, game.id, TeamSide::Home).await.unwrap();
    }

    let removed = GameRepository::new(store.clone())
        .delete_by_date(&operator(), "2026-02-22".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(removed, 2);

    for game in &doomed {
        assert_eq!(
            store.count_votes(game.id).await.unwrap(),
            VoteCounts::default()
        );
    }
    let ids: Vec<Uuid> = doomed.iter().map(|game| game.id).chain([kept.id]).collect();
    let remaining = ledger.votes_for(&user, &ids).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining.get(&kept.id), Some(&TeamSide::Home));
}

#[tokio::test]
async fn deleting_a_game_cascades_to_its_votes() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let mut games = publish(store.clone(), "2026-02-22", 2).await;
    let kept = games.pop().unwrap();
    let doomed = games.pop().unwrap();
    let ledger = VoteLedger::new(store.clone());
    let (fan, rival) = (voter(), voter());

    ledger.cast(&fan, doomed.id, TeamSide::Home).await.unwrap();
    ledger.cast(&rival, doomed.id, TeamSide::Away).await.unwrap();
    ledger.cast(&fan, kept.id, TeamSide::Away).await.unwrap();

    GameRepository::new(store.clone())
        .delete_by_id(&operator(), doomed.id)
        .await
        .unwrap();

    assert!(store.find_game(doomed.id).await.unwrap().is_none());
    assert_eq!(
        store.count_votes(doomed.id).await.unwrap(),
        VoteCounts::default()
    );
    assert!(
        ledger
            .votes_for(&rival, &[doomed.id])
            .await
            .unwrap()
            .is_empty()
    );
    let fan_votes = ledger.votes_for(&fan, &[doomed.id, kept.id]).await.unwrap();
    assert_eq!(fan_votes.len(), 1);
    assert_eq!(fan_votes.get(&kept.id), Some(&TeamSide::Away));

    let audit = ledger.audit(&operator(), kept.id).await.unwrap();
    assert!(audit.consistent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishes_keep_batches_in_creation_order() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { publish(store, "2026-02-22", 3).await })
        })
        .collect();
    let batches: Vec<Vec<GameEntity>> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let listed = store
        .list_games_by_date("2026-02-22".parse().unwrap())
        .await
        .unwrap();
    let seqs: Vec<i64> = listed.iter().map(|game| game.seq).collect();
    assert_eq!(seqs, (1..=24).collect::<Vec<i64>>());

    for batch in &batches {
        let start = listed
            .iter()
            .position(|game| game.id == batch[0].id)
            .unwrap();
        let listed_ids: Vec<Uuid> = listed[start..start + batch.len()]
            .iter()
            .map(|game| game.id)
            .collect();
        let batch_ids: Vec<Uuid> = batch.iter().map(|game| game.id).collect();
        assert_eq!(listed_ids, batch_ids);
        assert!(batch.windows(2).all(|pair| pair[1].seq == pair[0].seq + 1));
    }
}

/// Delegates to a memory store but refuses every batch insert.
struct RejectingInserts(MemoryGameStore);

impl GameStore for RejectingInserts {
    fn insert_games(
        &self,
        _games: Vec<GameEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        Box::pin(async { Err(StorageError::rejected("write concern timed out")) })
    }
    fn list_games_by_date(
        &self,
        date: GameDate,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        self.0.list_games_by_date(date)
    }
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.0.find_game(id)
    }
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.0.delete_game(id)
    }
    fn delete_games_by_date(&self, date: GameDate) -> BoxFuture<'static, StorageResult<u64>> {
        self.0.delete_games_by_date(date)
    }
    fn set_team_asset(
        &self,
        id: Uuid,
        side: TeamSide,
        asset_ref: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.0.set_team_asset(id, side, asset_ref)
    }
    fn record_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>> {
        self.0.record_vote(vote)
    }
    fn find_votes(
        &self,
        user_id: Uuid,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        self.0.find_votes(user_id, game_ids)
    }
    fn count_votes(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<VoteCounts>> {
        self.0.count_votes(game_id)
    }
    fn insert_profile(
        &self,
        profile: ProfileEntity,
    ) -> BoxFuture<'static, StorageResult<ProfileInsert>> {
        self.0.insert_profile(profile)
    }
    fn find_profile(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        self.0.find_profile(user_id)
    }
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.0.health_check()
    }
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.0.try_reconnect()
    }
}

#[tokio::test]
async fn failed_publish_writes_nothing() {
    let memory = MemoryGameStore::new();
    let repository = GameRepository::new(Arc::new(RejectingInserts(memory.clone())));
    let batch = validate_batch(&json!({
        "game_date": "2026-02-22",
        "games": [{}, {}, {}]
    }))
    .unwrap();

    let err = repository.publish(&operator(), batch).await.unwrap_err();
    assert!(matches!(err, PublishError::Storage(_)));
    assert!(
        memory
            .list_games_by_date("2026-02-22".parse().unwrap())
            .await
            .unwrap()
            .is_empty()
    );
}
