//! Optimistic stage moves and archives with reload-on-failure reconciliation.

use std::{future::Future, sync::Arc};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    board_api::{BoardApi, BoardApiError},
    project_store::ProjectStore,
};

/// What a transition ended up doing to the board.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// Same stage, or the project was not where the caller said; nothing sent.
    Noop,
    /// Optimistic state kept, the remote write succeeded.
    Applied,
    /// The remote write failed and the board was reloaded from the server.
    Reconciled { error: BoardApiError },
}

impl TransitionOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Clone)]
pub struct StageTransitionEngine {
    api: Arc<dyn BoardApi>,
    store: Arc<ProjectStore>,
}

impl StageTransitionEngine {
    pub fn new(api: Arc<dyn BoardApi>, store: Arc<ProjectStore>) -> Self {
        Self { api, store }
    }

    /// Move `project_id` from `from` to `to`.
    ///
    /// The board is updated before this returns; the returned future performs the
    /// remote write and, if it fails, replaces the board with a fresh load. No local
    /// rollback is attempted.
    pub fn move_project(
        &self,
        project_id: Uuid,
        from: &str,
        to: &str,
    ) -> impl Future<Output = TransitionOutcome> + Send + use<> {
        let applied = from != to && self.store.apply(|board| board.move_project(project_id, from, to));
        if applied {
            debug!(%project_id, from, to, "Optimistic stage move");
        }

        let api = self.api.clone();
        let store = self.store.clone();
        let to = to.to_string();
        async move {
            if !applied {
                return TransitionOutcome::Noop;
            }
            match api.update_project_stage(project_id, &to).await {
                Ok(()) => TransitionOutcome::Applied,
                Err(error) => {
                    warn!(%project_id, stage = %to, error = %error, "Stage update failed, reloading board");
                    store.reload().await;
                    TransitionOutcome::Reconciled { error }
                }
            }
        }
    }

    /// Remove `project_id` from `stage` and archive it remotely.
    pub fn archive(
        &self,
        project_id: Uuid,
        stage: &str,
    ) -> impl Future<Output = TransitionOutcome> + Send + use<> {
        let removed = self.store.apply(|board| board.remove_project(project_id, stage));

        let api = self.api.clone();
        let store = self.store.clone();
        async move {
            if !removed {
                return TransitionOutcome::Noop;
            }
            match api.archive_project(project_id).await {
                Ok(()) => {
                    info!(%project_id, "Project archived");
                    TransitionOutcome::Applied
                }
                Err(error) => {
                    warn!(%project_id, error = %error, "Archive failed, reloading board");
                    store.reload().await;
                    TransitionOutcome::Reconciled { error }
                }
            }
        }
    }
}
