//! Operator curation of team images.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::Identity,
    dao::{
        game_store::GameStore,
        models::{GameEntity, TeamSide},
        storage::StorageError,
    },
};

/// Upper bound on a stored asset reference.
pub const MAX_ASSET_REF_LEN: usize = 2048;

/// Why an asset was not attached.
#[derive(Debug, Error)]
pub enum AttachError {
    /// Caller is not an operator.
    #[error("only operators may attach assets")]
    Unauthorized,
    /// No such game.
    #[error("game `{id}` not found")]
    NotFound {
        /// Requested game.
        id: Uuid,
    },
    /// The reference is blank or too long.
    #[error("invalid asset reference: {reason}")]
    InvalidAsset {
        /// Broken rule.
        reason: &'static str,
    },
    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Records externally uploaded team images against one side of a game.
#[derive(Clone)]
pub struct AssetAttachment {
    store: Arc<dyn GameStore>,
}

impl AssetAttachment {
    /// Attachment service over `store`.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Store `asset_ref` on one side of a game and return the updated game.
    pub async fn attach(
        &self,
        identity: &Identity,
        game_id: Uuid,
        side: TeamSide,
        asset_ref: &str,
    ) -> Result<GameEntity, AttachError> {
        if !identity.is_operator() {
            return Err(AttachError::Unauthorized);
        }
        let asset_ref = asset_ref.trim();
        if asset_ref.is_empty() {
            return Err(AttachError::InvalidAsset {
                reason: "reference is blank",
            });
        }
        if asset_ref.chars().count() > MAX_ASSET_REF_LEN {
            return Err(AttachError::InvalidAsset {
                reason: "reference exceeds 2048 characters",
            });
        }

        let game = self
            .store
            .set_team_asset(game_id, side, asset_ref.to_owned())
            .await?
            .ok_or(AttachError::NotFound { id: game_id })?;
        info!(%game_id, %side, "attached team asset");
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;
    use crate::services::{game_repository::GameRepository, schema_validator::validate_batch};
    use serde_json::json;

    fn operator() -> Identity {
        Identity::Operator {
            id: Uuid::new_v4(),
            has_profile: false,
        }
    }

    #[tokio::test]
    async fn attach_sets_one_side_and_keeps_aggregates() {
        let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
        let batch = validate_batch(&json!({"game_date": "2026-02-22", "games": [{}]})).unwrap();
        let game = GameRepository::new(store.clone())
            .publish(&operator(), batch)
            .await
            .unwrap()
            .remove(0);

        let assets = AssetAttachment::new(store);
        let updated = assets
            .attach(&operator(), game.id, TeamSide::Away, " /uploads/bkn.png ")
            .await
            .unwrap();
        assert_eq!(updated.away.asset_ref.as_deref(), Some("/uploads/bkn.png"));
        assert_eq!(updated.home.asset_ref, None);
        assert_eq!((updated.votes_home, updated.votes_away), (0, 0));
    }

    #[tokio::test]
    async fn rejects_bad_requests() {
        let assets = AssetAttachment::new(Arc::new(MemoryGameStore::new()));
        let user = Identity::User {
            id: Uuid::new_v4(),
            has_profile: true,
        };
        assert!(matches!(
            assets.attach(&user, Uuid::new_v4(), TeamSide::Home, "x").await,
            Err(AttachError::Unauthorized)
        ));
        assert!(matches!(
            assets.attach(&operator(), Uuid::new_v4(), TeamSide::Home, "  ").await,
            Err(AttachError::InvalidAsset { .. })
        ));
        let long = "a".repeat(MAX_ASSET_REF_LEN + 1);
        assert!(matches!(
            assets.attach(&operator(), Uuid::new_v4(), TeamSide::Home, &long).await,
            Err(AttachError::InvalidAsset { .. })
        ));
        assert!(matches!(
            assets.attach(&operator(), Uuid::new_v4(), TeamSide::Home, "x").await,
            Err(AttachError::NotFound { .. })
        ));
    }
}
