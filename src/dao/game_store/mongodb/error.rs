use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures of the MongoDB backend, each naming the operation that failed.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB connection configured with zero attempts")]
    NoConnectAttempts,
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("transaction `{operation}` failed")]
    Transaction {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to create the game sequence counter")]
    SeedSequence {
        #[source]
        source: MongoError,
    },
    #[error("failed to reserve {count} game sequence number(s)")]
    ReserveSequence {
        count: usize,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert a batch of {count} game(s)")]
    InsertGames {
        count: usize,
        #[source]
        source: MongoError,
    },
    #[error("failed to list games for `{date}`")]
    ListGames {
        date: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load game `{id}`")]
    LoadGame {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete game `{id}`")]
    DeleteGame {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete games for `{date}`")]
    DeleteGamesByDate {
        date: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update asset of game `{id}`")]
    UpdateAsset {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to record vote on game `{game_id}`")]
    RecordVote {
        game_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load votes of user `{user_id}`")]
    LoadVotes {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to count votes of game `{game_id}`")]
    CountVotes {
        game_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save profile of user `{user_id}`")]
    SaveProfile {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load profile of user `{user_id}`")]
    LoadProfile {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("stored document `{id}` is corrupt: {reason}")]
    CorruptDocument { id: String, reason: String },
}

/// Whether the server rejected a write because of a unique index.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
