//! One open board: stages, project state, the transition engine and drag state.

use std::{future::Future, sync::Arc};

use db::models::project::Project;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use super::{
    board_api::{BoardApi, BoardFilter},
    creation_workflow::{CreationWorkflow, ProjectDraft, WorkflowError},
    drag_controller::{DragController, DragPayload},
    project_store::{BoardState, ProjectStore},
    stage_registry::{StageLoad, load_stages},
    stage_transition::{StageTransitionEngine, TransitionOutcome},
};

pub struct BoardSession {
    api: Arc<dyn BoardApi>,
    store: Arc<ProjectStore>,
    engine: StageTransitionEngine,
    drag: DragController,
    stages: StageLoad,
}

impl BoardSession {
    /// Load stages (falling back if needed), then the projects for `filter`.
    pub async fn open(api: Arc<dyn BoardApi>, filter: BoardFilter) -> Self {
        let stages = load_stages(api.as_ref()).await;
        let store = Arc::new(ProjectStore::new(api.clone()));
        store.set_stages(stages.slugs()).await;
        let board = store.load(filter).await;
        info!(
            stages = stages.stages.len(),
            fallback = stages.is_fallback(),
            projects = board.project_count(),
            "Board opened"
        );

        Self {
            engine: StageTransitionEngine::new(api.clone(), store.clone()),
            api,
            store,
            drag: DragController::new(),
            stages,
        }
    }

    pub fn stages(&self) -> &StageLoad {
        &self.stages
    }

    pub fn board(&self) -> BoardState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.store.subscribe()
    }

    pub fn project_count(&self) -> usize {
        self.store.project_count()
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub async fn reload(&self) -> BoardState {
        self.store.reload().await
    }

    /// Switch the team filter and reload.
    pub async fn set_filter(&self, filter: BoardFilter) -> BoardState {
        self.store.load(filter).await
    }

    pub fn move_project(
        &self,
        project_id: Uuid,
        from: &str,
        to: &str,
    ) -> impl Future<Output = TransitionOutcome> + Send + use<> {
        self.engine.move_project(project_id, from, to)
    }

    pub fn archive(
        &self,
        project_id: Uuid,
        stage: &str,
    ) -> impl Future<Output = TransitionOutcome> + Send + use<> {
        self.engine.archive(project_id, stage)
    }

    pub fn drag_start(&mut self, project_id: Uuid) -> DragPayload {
        self.drag.drag_start(project_id)
    }

    pub fn drag_enter(&mut self, column: &str) {
        self.drag.drag_enter(column);
    }

    pub fn drag_leave(&mut self) {
        self.drag.drag_leave();
    }

    pub fn drag_end(&mut self) {
        self.drag.drag_end();
    }

    /// Resolve the drop and hand it to the engine. The optimistic move has been
    /// applied by the time this returns.
    pub fn drop(
        &mut self,
        column: &str,
        payload: Option<&DragPayload>,
    ) -> impl Future<Output = TransitionOutcome> + Send + use<> {
        let board = self.store.snapshot();
        let pending = self.drag.drop(column, payload, &board).map(|request| {
            self.engine
                .move_project(request.project_id, &request.from_stage, &request.to_stage)
        });
        async move {
            match pending {
                Some(transition) => transition.await,
                None => TransitionOutcome::Noop,
            }
        }
    }

    /// A fresh wizard, scoped to the board's current team and default stage.
    pub fn creation_workflow(&self, filter: &BoardFilter) -> CreationWorkflow {
        let mut preset = ProjectDraft::default();
        preset.project.team_id = filter.team_id;
        preset.project.stage = self.stages.default_stage().map(|s| s.slug.clone());
        CreationWorkflow::with_preset(preset)
    }

    /// Submit the wizard and, on success, reload so the new card shows up.
    pub async fn create_project(&self, wizard: &mut CreationWorkflow) -> Result<Project, WorkflowError> {
        let project = wizard.submit(self.api.as_ref()).await?;
        self.store.reload().await;
        Ok(project)
    }
}
