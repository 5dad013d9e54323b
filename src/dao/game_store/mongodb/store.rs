use std::{error::Error as _, future::Future, sync::Arc};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database,
    bson::{DateTime, Document, doc},
    error::{Error as MongoError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoGameDocument, MongoProfileDocument, MongoVoteDocument, counter_field, doc_id,
        vote_key,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{
        GameDate, GameEntity, ProfileEntity, ProfileInsert, TeamSide, VoteCounts, VoteEntity,
        VoteInsert,
    },
    storage::StorageResult,
};

const GAME_COLLECTION_NAME: &str = "games";
const VOTE_COLLECTION_NAME: &str = "votes";
const PROFILE_COLLECTION_NAME: &str = "profiles";
const COUNTER_COLLECTION_NAME: &str = "counters";
const GAME_SEQUENCE_ID: &str = "games";
const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// MongoDB-backed [`GameStore`].
///
/// Multi-document writes (publish, cascading deletes, vote + counter) run inside transactions,
/// which requires a replica set or sharded deployment.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoDaoError {
    /// Transient transaction failures (write conflicts, elections) are safe to rerun whole.
    fn is_transient(&self) -> bool {
        self.source()
            .and_then(|source| source.downcast_ref::<MongoError>())
            .is_some_and(|err| err.contains_label(TRANSIENT_TRANSACTION_ERROR))
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        store.seed_sequence().await?;
        Ok(store)
    }

    /// Create the sequence counter up front; publishes only increment it inside transactions.
    async fn seed_sequence(&self) -> MongoResult<()> {
        self.database()
            .await
            .collection::<Document>(COUNTER_COLLECTION_NAME)
            .update_one(
                doc! {"_id": GAME_SEQUENCE_ID},
                doc! {"$setOnInsert": {"seq": 0_i64}},
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SeedSequence { source })?;
        Ok(())
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let games = database.collection::<Document>(GAME_COLLECTION_NAME);
        let by_date = mongodb::IndexModel::builder()
            .keys(doc! {"game_date": 1, "seq": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_date_seq_idx".to_owned()))
                    .build(),
            )
            .build();
        games
            .create_index(by_date)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "game_date,seq",
                source,
            })?;

        let votes = database.collection::<Document>(VOTE_COLLECTION_NAME);
        let unique_pair = mongodb::IndexModel::builder()
            .keys(doc! {"user_id": 1, "game_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("vote_user_game_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        votes
            .create_index(unique_pair)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: VOTE_COLLECTION_NAME,
                index: "user_id,game_id",
                source,
            })?;

        let by_game = mongodb::IndexModel::builder()
            .keys(doc! {"game_id": 1, "team": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("vote_game_idx".to_owned()))
                    .build(),
            )
            .build();
        votes
            .create_index(by_game)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: VOTE_COLLECTION_NAME,
                index: "game_id,team",
                source,
            })?;

        let profiles = database.collection::<Document>(PROFILE_COLLECTION_NAME);
        let unique_username = mongodb::IndexModel::builder()
            .keys(doc! {"username_key": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("profile_username_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        profiles
            .create_index(unique_username)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PROFILE_COLLECTION_NAME,
                index: "username_key",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn vote_collection(&self) -> Collection<MongoVoteDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoVoteDocument>(VOTE_COLLECTION_NAME)
    }

    async fn profile_collection(&self) -> Collection<MongoProfileDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoProfileDocument>(PROFILE_COLLECTION_NAME)
    }

    async fn start_transaction(&self, operation: &'static str) -> MongoResult<ClientSession> {
        let client = self.client().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction { operation, source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { operation, source })?;
        Ok(session)
    }

    /// Commit, retrying only when the server could not tell whether the commit applied.
    async fn commit(session: &mut ClientSession, operation: &'static str) -> MongoResult<()> {
        let mut attempt = 1;
        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(()),
                Err(err)
                    if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    warn!(operation, attempt, error = %err, "commit result unknown; retrying commit");
                    attempt += 1;
                }
                Err(source) => return Err(MongoDaoError::Transaction { operation, source }),
            }
        }
    }

    /// Rerun a whole transaction while it fails with a transient error. Every attempt starts
    /// from scratch, so uniqueness checks are re-evaluated instead of replaying a stale write.
    async fn retry_transient<T, F, Fut>(operation: &'static str, mut attempt_once: F) -> MongoResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MongoResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Err(err) if err.is_transient() && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    debug!(operation, attempt, error = %err, "transient transaction error; retrying");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Advance the creation counter by `count` inside `session` and return the first number.
    /// Concurrent publishes conflict on the counter document, so their transactions serialize.
    async fn reserve_sequence(
        &self,
        session: &mut ClientSession,
        count: usize,
    ) -> MongoResult<i64> {
        let counters = self
            .database()
            .await
            .collection::<Document>(COUNTER_COLLECTION_NAME);
        let span = count as i64;

        let updated = counters
            .find_one_and_update(doc! {"_id": GAME_SEQUENCE_ID}, doc! {"$inc": {"seq": span}})
            .upsert(true)
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::ReserveSequence { count, source })?;

        let last = updated
            .as_ref()
            .and_then(|document| document.get_i64("seq").ok())
            .ok_or_else(|| MongoDaoError::CorruptDocument {
                id: GAME_SEQUENCE_ID.to_owned(),
                reason: "sequence counter is missing or not an int64".into(),
            })?;

        Ok(last - span + 1)
    }

    async fn insert_games_once(&self, drafts: &[GameEntity]) -> MongoResult<Vec<GameEntity>> {
        let count = drafts.len();
        let mut session = self.start_transaction("insert_games").await?;

        let first_seq = self.reserve_sequence(&mut session, count).await?;
        let games: Vec<GameEntity> = drafts
            .iter()
            .cloned()
            .zip(first_seq..)
            .map(|(game, seq)| GameEntity { seq, ..game })
            .collect();
        let documents: Vec<MongoGameDocument> = games.iter().cloned().map(Into::into).collect();

        self.collection()
            .await
            .insert_many(&documents)
            .session(&mut session)
            .await
            .map_err(|source| MongoDaoError::InsertGames { count, source })?;

        Self::commit(&mut session, "insert_games").await?;
        Ok(games)
    }

    async fn list_games_by_date(&self, date: GameDate) -> MongoResult<Vec<GameEntity>> {
        let raw_date = date.to_string();
        let documents: Vec<MongoGameDocument> = self
            .collection()
            .await
            .find(doc! {"game_date": raw_date.as_str()})
            .sort(doc! {"seq": 1})
            .await
            .map_err(|source| MongoDaoError::ListGames {
                date: raw_date.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames {
                date: raw_date.clone(),
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;

        document.map(TryInto::try_into).transpose()
    }

    async fn delete_game_once(&self, id: Uuid) -> MongoResult<bool> {
        let error = |source| MongoDaoError::DeleteGame { id, source };
        let mut session = self.start_transaction("delete_game").await?;

        let deleted = self
            .collection()
            .await
            .delete_one(doc_id(id))
            .session(&mut session)
            .await
            .map_err(error)?;

        if deleted.deleted_count == 0 {
            let _ = session.abort_transaction().await;
            return Ok(false);
        }

        self.vote_collection()
            .await
            .delete_many(doc! {"game_id": id.to_string()})
            .session(&mut session)
            .await
            .map_err(error)?;

        Self::commit(&mut session, "delete_game").await?;
        Ok(true)
    }

    async fn delete_games_by_date_once(&self, date: GameDate) -> MongoResult<u64> {
        let raw_date = date.to_string();
        let error = |source| MongoDaoError::DeleteGamesByDate {
            date: raw_date.clone(),
            source,
        };
        let mut session = self.start_transaction("delete_games_by_date").await?;

        let games = self.collection().await;
        let mut cursor = games
            .clone_with_type::<Document>()
            .find(doc! {"game_date": raw_date.as_str()})
            .projection(doc! {"_id": 1})
            .session(&mut session)
            .await
            .map_err(error)?;

        let mut ids = Vec::new();
        while let Some(document) = cursor.next(&mut session).await {
            let document = document.map_err(error)?;
            if let Ok(id) = document.get_str("_id") {
                ids.push(id.to_owned());
            }
        }
        drop(cursor);

        if ids.is_empty() {
            let _ = session.abort_transaction().await;
            return Ok(0);
        }

        self.vote_collection()
            .await
            .delete_many(doc! {"game_id": {"$in": ids.clone()}})
            .session(&mut session)
            .await
            .map_err(error)?;

        let deleted = games
            .delete_many(doc! {"_id": {"$in": ids.clone()}})
            .session(&mut session)
            .await
            .map_err(error)?;

        Self::commit(&mut session, "delete_games_by_date").await?;
        Ok(deleted.deleted_count)
    }

    async fn set_team_asset(
        &self,
        id: Uuid,
        side: TeamSide,
        asset_ref: String,
    ) -> MongoResult<Option<GameEntity>> {
        let field = format!("{}.asset_ref", side.as_str());
        let updated = self
            .collection()
            .await
            .find_one_and_update(
                doc_id(id),
                doc! {"$set": {field: asset_ref, "updated_at": DateTime::now()}},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateAsset { id, source })?;

        updated.map(TryInto::try_into).transpose()
    }

    async fn record_vote_once(&self, vote: &VoteEntity) -> MongoResult<VoteInsert> {
        let game_id = vote.game_id;
        let error = |source| MongoDaoError::RecordVote { game_id, source };
        let document: MongoVoteDocument = vote.clone().into();
        let votes = self.vote_collection().await;
        let mut session = self.start_transaction("record_vote").await?;

        if let Err(err) = votes.insert_one(&document).session(&mut session).await {
            let _ = session.abort_transaction().await;
            if !is_duplicate_key(&err) {
                return Err(error(err));
            }
            let existing = votes
                .find_one(doc! {"_id": document.id.as_str()})
                .await
                .map_err(error)?;
            return match existing {
                Some(existing) => Ok(VoteInsert::Duplicate {
                    existing: existing.team,
                }),
                // The conflicting row disappeared with its game between the two calls.
                None => Ok(VoteInsert::GameMissing),
            };
        }

        // Evaluated by the server: concurrent voters never overwrite each other's increment.
        let updated = self
            .collection()
            .await
            .find_one_and_update(
                doc_id(game_id),
                doc! {"$inc": {counter_field(vote.team): 1_i64}},
            )
            .return_document(ReturnDocument::After)
            .session(&mut session)
            .await
            .map_err(error)?;

        let Some(updated) = updated else {
            let _ = session.abort_transaction().await;
            return Ok(VoteInsert::GameMissing);
        };

        Self::commit(&mut session, "record_vote").await?;
        Ok(VoteInsert::Recorded {
            votes_home: updated.votes_home,
            votes_away: updated.votes_away,
        })
    }

    async fn find_votes(&self, user_id: Uuid, game_ids: Vec<Uuid>) -> MongoResult<Vec<VoteEntity>> {
        let ids: Vec<String> = game_ids.iter().map(Uuid::to_string).collect();
        let documents: Vec<MongoVoteDocument> = self
            .vote_collection()
            .await
            .find(doc! {"user_id": user_id.to_string(), "game_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::LoadVotes { user_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadVotes { user_id, source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_votes(&self, game_id: Uuid) -> MongoResult<VoteCounts> {
        let votes = self.vote_collection().await;
        let count_side = |side: TeamSide| {
            votes.count_documents(doc! {"game_id": game_id.to_string(), "team": side.as_str()})
        };

        let home = count_side(TeamSide::Home)
            .await
            .map_err(|source| MongoDaoError::CountVotes { game_id, source })?;
        let away = count_side(TeamSide::Away)
            .await
            .map_err(|source| MongoDaoError::CountVotes { game_id, source })?;

        Ok(VoteCounts {
            home: home as i64,
            away: away as i64,
        })
    }

    async fn insert_profile(&self, profile: ProfileEntity) -> MongoResult<ProfileInsert> {
        let user_id = profile.user_id;
        let document: MongoProfileDocument = profile.into();

        match self.profile_collection().await.insert_one(&document).await {
            Ok(_) => Ok(ProfileInsert::Created),
            Err(err) if is_duplicate_key(&err) => match self.find_profile(user_id).await? {
                Some(existing) => Ok(ProfileInsert::AlreadyExists(existing)),
                None => Ok(ProfileInsert::UsernameTaken),
            },
            Err(source) => Err(MongoDaoError::SaveProfile { user_id, source }),
        }
    }

    async fn find_profile(&self, user_id: Uuid) -> MongoResult<Option<ProfileEntity>> {
        let document = self
            .profile_collection()
            .await
            .find_one(doc! {"_id": user_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::LoadProfile { user_id, source })?;

        document.map(TryInto::try_into).transpose()
    }
}

impl GameStore for MongoGameStore {
    fn insert_games(
        &self,
        games: Vec<GameEntity>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Self::retry_transient("insert_games", || store.insert_games_once(&games))
                .await
                .map_err(Into::into)
        })
    }

    fn list_games_by_date(
        &self,
        date: GameDate,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games_by_date(date).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Self::retry_transient("delete_game", || store.delete_game_once(id))
                .await
                .map_err(Into::into)
        })
    }

    fn delete_games_by_date(&self, date: GameDate) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            Self::retry_transient("delete_games_by_date", || {
                store.delete_games_by_date_once(date)
            })
            .await
            .map_err(Into::into)
        })
    }

    fn set_team_asset(
        &self,
        id: Uuid,
        side: TeamSide,
        asset_ref: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_team_asset(id, side, asset_ref)
                .await
                .map_err(Into::into)
        })
    }

    fn record_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<VoteInsert>> {
        let store = self.clone();
        Box::pin(async move {
            Self::retry_transient("record_vote", || store.record_vote_once(&vote))
                .await
                .map_err(Into::into)
        })
    }

    fn find_votes(
        &self,
        user_id: Uuid,
        game_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_votes(user_id, game_ids).await.map_err(Into::into) })
    }

    fn count_votes(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<VoteCounts>> {
        let store = self.clone();
        Box::pin(async move { store.count_votes(game_id).await.map_err(Into::into) })
    }

    fn insert_profile(
        &self,
        profile: ProfileEntity,
    ) -> BoxFuture<'static, StorageResult<ProfileInsert>> {
        let store = self.clone();
        Box::pin(async move { store.insert_profile(profile).await.map_err(Into::into) })
    }

    fn find_profile(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profile(user_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
