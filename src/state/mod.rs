use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    auth::{OperatorPolicy, SessionRegistry, provider::IdentityProvider},
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    services::{
        asset_attachment::AssetAttachment, game_repository::GameRepository,
        vote_ledger::VoteLedger,
    },
};

/// Handle passed to every axum handler.
pub type SharedState = Arc<AppState>;

/// Central application state: the storage handle, the session registry and configuration.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    sessions: SessionRegistry,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, provider: Arc<dyn IdentityProvider>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let policy = OperatorPolicy::new(config.operator_emails());
        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            sessions: SessionRegistry::new(provider, policy, config.session_revalidate()),
            config,
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Access-token to gate mapping.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Game ingestion and listing over the current store.
    pub async fn games(&self) -> Result<GameRepository, ServiceError> {
        Ok(GameRepository::new(self.require_game_store().await?))
    }

    /// Vote ledger over the current store.
    pub async fn votes(&self) -> Result<VoteLedger, ServiceError> {
        Ok(VoteLedger::new(self.require_game_store().await?))
    }

    /// Team asset attachment over the current store.
    pub async fn assets(&self) -> Result<AssetAttachment, ServiceError> {
        Ok(AssetAttachment::new(self.require_game_store().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::provider::StaticProvider, dao::game_store::memory::MemoryGameStore};

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(StaticProvider::new(vec![])))
    }

    #[tokio::test]
    async fn starts_degraded_until_store_installed() {
        let state = state();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_game_store().await,
            Err(ServiceError::Degraded)
        ));

        state.set_game_store(Arc::new(MemoryGameStore::new())).await;
        assert!(!state.is_degraded());
        assert!(state.require_game_store().await.is_ok());

        state.clear_game_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn watcher_sees_transitions() {
        let state = state();
        let mut watcher = state.degraded_watcher();
        state.set_game_store(Arc::new(MemoryGameStore::new())).await;
        watcher.changed().await.unwrap();
        assert!(!*watcher.borrow());
    }
}
