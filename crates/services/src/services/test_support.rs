//! In-memory `BoardApi` used by the engine tests.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use db::models::{
    project::{CreateProject, Project, ProjectListing, ProjectPriority, ProjectsResponse},
    stage::Stage,
};
use tokio::sync::Notify;
use uuid::Uuid;

use super::{
    board_api::{BoardApi, BoardApiError, BoardFilter},
    project_suggestions::{SuggestionError, SuggestionSource},
};

#[derive(Default)]
struct Failures {
    stage_fetch: bool,
    project_fetch: bool,
    stage_update: bool,
    archive: bool,
    create: bool,
}

pub struct FakeBoardApi {
    stages: Mutex<Vec<Stage>>,
    projects: Mutex<Vec<Project>>,
    failures: Mutex<Failures>,
    gate: Mutex<Option<Arc<Notify>>>,
    pub project_fetches: AtomicUsize,
    pub stage_updates: AtomicUsize,
    pub archives: AtomicUsize,
    pub created: Mutex<Vec<CreateProject>>,
}

impl FakeBoardApi {
    pub fn new(stages: Vec<Stage>, projects: Vec<Project>) -> Self {
        Self {
            stages: Mutex::new(stages),
            projects: Mutex::new(projects),
            failures: Mutex::new(Failures::default()),
            gate: Mutex::new(None),
            project_fetches: AtomicUsize::new(0),
            stage_updates: AtomicUsize::new(0),
            archives: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_stage_fetch(&self) {
        self.failures.lock().unwrap().stage_fetch = true;
    }

    pub fn fail_project_fetch(&self) {
        self.failures.lock().unwrap().project_fetch = true;
    }

    pub fn fail_stage_updates(&self) {
        self.failures.lock().unwrap().stage_update = true;
    }

    pub fn fail_archives(&self) {
        self.failures.lock().unwrap().archive = true;
    }

    pub fn fail_creates(&self) {
        self.failures.lock().unwrap().create = true;
    }

    /// Hold stage updates and archives until the returned handle is notified.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    /// Server-side stage of `id`, ignoring the archived flag.
    pub fn stage_of(&self, id: Uuid) -> Option<String> {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.stage.clone())
    }

    pub fn is_archived(&self, id: Uuid) -> bool {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.id == id && p.is_archived)
    }

    async fn wait_for_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn failing(&self, pick: impl FnOnce(&Failures) -> bool) -> bool {
        pick(&self.failures.lock().unwrap())
    }
}

#[async_trait]
impl BoardApi for FakeBoardApi {
    async fn fetch_stages(&self) -> Result<Vec<Stage>, BoardApiError> {
        if self.failing(|f| f.stage_fetch) {
            return Err(BoardApiError::Transport("connection refused".to_string()));
        }
        Ok(self.stages.lock().unwrap().clone())
    }

    async fn fetch_projects(&self, filter: &BoardFilter) -> Result<ProjectsResponse, BoardApiError> {
        self.project_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing(|f| f.project_fetch) {
            return Err(BoardApiError::Http {
                status: 500,
                message: "database unavailable".to_string(),
            });
        }

        let mut grouped: BTreeMap<String, Vec<Project>> = BTreeMap::new();
        for project in self.projects.lock().unwrap().iter() {
            if project.is_archived {
                continue;
            }
            if filter.team_id.is_some() && project.team_id != filter.team_id {
                continue;
            }
            grouped
                .entry(project.stage.clone())
                .or_default()
                .push(project.clone());
        }
        Ok(ProjectsResponse {
            grouped: true,
            projects: ProjectListing::Grouped(grouped),
        })
    }

    async fn create_project(&self, draft: &CreateProject) -> Result<Project, BoardApiError> {
        if self.failing(|f| f.create) {
            return Err(BoardApiError::Http {
                status: 400,
                message: "invalid project".to_string(),
            });
        }
        self.created.lock().unwrap().push(draft.clone());

        let mut created = project(
            draft.name.trim(),
            draft.stage.as_deref().unwrap_or("ideation"),
        );
        created.team_id = draft.owning_team();
        created.description = draft.description.clone();
        self.projects.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_project_stage(&self, project_id: Uuid, stage: &str) -> Result<(), BoardApiError> {
        self.stage_updates.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        if self.failing(|f| f.stage_update) {
            return Err(BoardApiError::Http {
                status: 500,
                message: "write failed".to_string(),
            });
        }
        let mut projects = self.projects.lock().unwrap();
        let project = projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or(BoardApiError::NotFound)?;
        project.stage = stage.to_string();
        Ok(())
    }

    async fn archive_project(&self, project_id: Uuid) -> Result<(), BoardApiError> {
        self.archives.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate().await;
        if self.failing(|f| f.archive) {
            return Err(BoardApiError::Timeout);
        }
        let mut projects = self.projects.lock().unwrap();
        let project = projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or(BoardApiError::NotFound)?;
        project.is_archived = true;
        Ok(())
    }
}

/// Canned completion, or an outage when `None`.
pub struct FakeSuggestions(pub Option<String>);

#[async_trait]
impl SuggestionSource for FakeSuggestions {
    async fn suggest(&self, _prompt: &str) -> Result<String, SuggestionError> {
        self.0
            .clone()
            .ok_or_else(|| SuggestionError::Unavailable("offline".to_string()))
    }
}

pub fn stage(slug: &str, sort_order: i32) -> Stage {
    Stage {
        id: Uuid::new_v4(),
        name: slug.to_string(),
        slug: slug.to_string(),
        color: "#64748b".to_string(),
        icon: None,
        description: None,
        sort_order,
        is_default: false,
        is_complete: false,
    }
}

pub fn project(name: &str, stage: &str) -> Project {
    let now = Utc::now();
    Project {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        team_id: None,
        name: name.to_string(),
        description: None,
        emoji: None,
        color: None,
        priority: ProjectPriority::Medium,
        stage: stage.to_string(),
        project_type: None,
        client_name: None,
        tags: vec![],
        budget: None,
        location: None,
        expected_participants: None,
        start_date: None,
        target_date: None,
        total_tasks: 0,
        completed_tasks: 0,
        is_archived: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn slugs(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
