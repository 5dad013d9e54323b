//! One vote per user and game, with aggregate counters that never drift from the ledger.

use std::{sync::Arc, time::SystemTime};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Identity,
    dao::{
        game_store::GameStore,
        models::{TeamSide, VoteEntity, VoteInsert},
        storage::StorageError,
    },
};

/// Why a vote was not recorded.
#[derive(Debug, Error)]
pub enum VoteError {
    /// Anonymous caller.
    #[error("sign in to vote")]
    AuthRequired,
    /// Signed in but still in the needs-setup state.
    #[error("complete your profile before voting")]
    ProfileRequired,
    /// No such game.
    #[error("game `{game_id}` not found")]
    GameNotFound {
        /// Requested game.
        game_id: Uuid,
    },
    /// The store failed; nothing was written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of [`VoteLedger::audit`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// Caller is not an operator.
    #[error("only operators may audit tallies")]
    Unauthorized,
    /// No such game.
    #[error("game `{game_id}` not found")]
    GameNotFound {
        /// Requested game.
        game_id: Uuid,
    },
    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a cast. A repeated cast is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// The vote was stored and counted.
    Recorded {
        /// Side voted for.
        team: TeamSide,
        /// Home counter including this vote.
        votes_home: i64,
        /// Away counter including this vote.
        votes_away: i64,
    },
    /// The caller had already voted on this game.
    AlreadyVoted {
        /// Side of the earlier vote.
        existing_team: TeamSide,
    },
}

/// Stored aggregates next to a fresh count of ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TallyAudit {
    /// Audited game.
    pub game_id: Uuid,
    /// Stored home counter.
    pub votes_home: i64,
    /// Stored away counter.
    pub votes_away: i64,
    /// Ledger rows voting home.
    pub ledger_home: i64,
    /// Ledger rows voting away.
    pub ledger_away: i64,
    /// Counters equal the ledger counts.
    pub consistent: bool,
}

/// Records votes and answers tally questions over a [`GameStore`].
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn GameStore>,
}

impl VoteLedger {
    /// Ledger over `store`.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Record `identity`'s vote for `team`. The ledger row and the counter increment are one
    /// storage-level unit; a second cast for the same game changes nothing.
    pub async fn cast(
        &self,
        identity: &Identity,
        game_id: Uuid,
        team: TeamSide,
    ) -> Result<VoteOutcome, VoteError> {
        let user_id = identity.user_id().ok_or(VoteError::AuthRequired)?;
        if !identity.has_profile() {
            return Err(VoteError::ProfileRequired);
        }

        let vote = VoteEntity {
            user_id,
            game_id,
            team,
            created_at: SystemTime::now(),
        };

        match self.store.record_vote(vote).await? {
            VoteInsert::Recorded {
                votes_home,
                votes_away,
            } => {
                info!(%user_id, %game_id, %team, votes_home, votes_away, "vote recorded");
                Ok(VoteOutcome::Recorded {
                    team,
                    votes_home,
                    votes_away,
                })
            }
            VoteInsert::Duplicate { existing } => {
                debug!(%user_id, %game_id, %existing, "user already voted on this game");
                Ok(VoteOutcome::AlreadyVoted {
                    existing_team: existing,
                })
            }
            VoteInsert::GameMissing => Err(VoteError::GameNotFound { game_id }),
        }
    }

    /// Votes of `identity` among `game_ids`, in request order with duplicates collapsed.
    pub async fn votes_for(
        &self,
        identity: &Identity,
        game_ids: &[Uuid],
    ) -> Result<IndexMap<Uuid, TeamSide>, StorageError> {
        let Some(user_id) = identity.user_id() else {
            return Ok(IndexMap::new());
        };
        let requested: IndexSet<Uuid> = game_ids.iter().copied().collect();
        if requested.is_empty() {
            return Ok(IndexMap::new());
        }

        let votes = self
            .store
            .find_votes(user_id, requested.iter().copied().collect())
            .await?;
        let mut by_game: IndexMap<Uuid, TeamSide> = IndexMap::with_capacity(votes.len());
        for game_id in &requested {
            if let Some(vote) = votes.iter().find(|vote| vote.game_id == *game_id) {
                by_game.insert(*game_id, vote.team);
            }
        }
        Ok(by_game)
    }

    /// Compare stored counters with the ledger rows of `game_id`.
    pub async fn audit(&self, identity: &Identity, game_id: Uuid) -> Result<TallyAudit, AuditError> {
        if !identity.is_operator() {
            return Err(AuditError::Unauthorized);
        }
        let game = self
            .store
            .find_game(game_id)
            .await?
            .ok_or(AuditError::GameNotFound { game_id })?;
        let counts = self.store.count_votes(game_id).await?;

        let consistent = game.votes_home == counts.home && game.votes_away == counts.away;
        if !consistent {
            warn!(
                %game_id,
                votes_home = game.votes_home,
                votes_away = game.votes_away,
                ledger_home = counts.home,
                ledger_away = counts.away,
                "vote aggregates drifted from ledger"
            );
        }

        Ok(TallyAudit {
            game_id,
            votes_home: game.votes_home,
            votes_away: game.votes_away,
            ledger_home: counts.home,
            ledger_away: counts.away,
            consistent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::game_store::memory::MemoryGameStore,
        services::{game_repository::GameRepository, schema_validator::validate_batch},
    };
    use serde_json::json;

    fn voter() -> Identity {
        Identity::User {
            id: Uuid::new_v4(),
            has_profile: true,
        }
    }

    async fn setup() -> (VoteLedger, Uuid) {
        let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
        let batch = validate_batch(&json!({"game_date": "2026-02-22", "games": [{}]})).unwrap();
        let operator = Identity::Operator {
            id: Uuid::new_v4(),
            has_profile: false,
        };
        let games = GameRepository::new(store.clone())
            .publish(&operator, batch)
            .await
            .unwrap();
        (VoteLedger::new(store), games[0].id)
    }

    #[tokio::test]
    async fn anonymous_and_setup_users_cannot_vote() {
        let (ledger, game_id) = setup().await;
        assert!(matches!(
            ledger.cast(&Identity::Anonymous, game_id, TeamSide::Home).await,
            Err(VoteError::AuthRequired)
        ));
        let needs_setup = Identity::User {
            id: Uuid::new_v4(),
            has_profile: false,
        };
        assert!(matches!(
            ledger.cast(&needs_setup, game_id, TeamSide::Home).await,
            Err(VoteError::ProfileRequired)
        ));
    }

    #[tokio::test]
    async fn first_vote_wins() {
        let (ledger, game_id) = setup().await;
        let user = voter();

        let first = ledger.cast(&user, game_id, TeamSide::Home).await.unwrap();
        assert_eq!(
            first,
            VoteOutcome::Recorded {
                team: TeamSide::Home,
                votes_home: 1,
                votes_away: 0
            }
        );
        let second = ledger.cast(&user, game_id, TeamSide::Away).await.unwrap();
        assert_eq!(
            second,
            VoteOutcome::AlreadyVoted {
                existing_team: TeamSide::Home
            }
        );

        let votes = ledger.votes_for(&user, &[game_id]).await.unwrap();
        assert_eq!(votes.get(&game_id), Some(&TeamSide::Home));
    }

    #[tokio::test]
    async fn unknown_game_is_reported() {
        let (ledger, _) = setup().await;
        assert!(matches!(
            ledger.cast(&voter(), Uuid::new_v4(), TeamSide::Away).await,
            Err(VoteError::GameNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn votes_for_collapses_duplicates_and_skips_unvoted() {
        let (ledger, game_id) = setup().await;
        let user = voter();
        ledger.cast(&user, game_id, TeamSide::Away).await.unwrap();

        let other = Uuid::new_v4();
        let votes = ledger
            .votes_for(&user, &[game_id, other, game_id])
            .await
            .unwrap();
        assert_eq!(votes.len(), 1);
        assert!(
            ledger
                .votes_for(&Identity::Anonymous, &[game_id])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn audit_matches_ledger() {
        let (ledger, game_id) = setup().await;
        ledger.cast(&voter(), game_id, TeamSide::Home).await.unwrap();
        ledger.cast(&voter(), game_id, TeamSide::Away).await.unwrap();

        let operator = Identity::Operator {
            id: Uuid::new_v4(),
            has_profile: false,
        };
        let audit = ledger.audit(&operator, game_id).await.unwrap();
        assert!(audit.consistent);
        assert_eq!((audit.ledger_home, audit.ledger_away), (1, 1));

        assert!(matches!(
            ledger.audit(&voter(), game_id).await,
            Err(AuditError::Unauthorized)
        ));
    }
}
