//! Client-side board state: stage slug -> ordered projects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use db::models::project::{Project, ProjectListing, ProjectsResponse};
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use super::board_api::{BoardApi, BoardFilter};

/// Every known stage has a list, and every project sits in exactly one list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    order: Vec<String>,
    columns: HashMap<String, Vec<Project>>,
}

impl BoardState {
    /// All `slugs` present, no projects.
    pub fn empty(slugs: &[String]) -> Self {
        let mut state = Self::default();
        for slug in slugs {
            state.ensure_column(slug);
        }
        state
    }

    /// Build from a listing response. Known stages come first in the given order;
    /// buckets for unknown slugs are appended. Duplicate ids keep their first placement.
    pub fn from_response(slugs: &[String], response: ProjectsResponse) -> Self {
        let mut state = Self::empty(slugs);
        let mut seen = HashSet::new();

        let projects: Vec<Project> = match response.projects {
            ProjectListing::Grouped(grouped) => grouped.into_values().flatten().collect(),
            ProjectListing::Flat(projects) => projects,
        };

        for project in projects {
            if project.is_archived {
                continue;
            }
            if !seen.insert(project.id) {
                warn!(project_id = %project.id, "Project listed twice, keeping first placement");
                continue;
            }
            let slug = project.stage.clone();
            state.push(&slug, project);
        }
        state
    }

    /// Column keys in display order.
    pub fn stage_slugs(&self) -> &[String] {
        &self.order
    }

    pub fn column(&self, slug: &str) -> &[Project] {
        self.columns.get(slug).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Project])> {
        self.order
            .iter()
            .map(|slug| (slug.as_str(), self.column(slug)))
    }

    pub fn project_count(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn project_ids(&self) -> Vec<Uuid> {
        self.columns().flat_map(|(_, projects)| projects.iter().map(|p| p.id)).collect()
    }

    /// Linear scan for the column currently holding `project_id`.
    pub fn find_stage_of(&self, project_id: Uuid) -> Option<&str> {
        self.columns()
            .find(|(_, projects)| projects.iter().any(|p| p.id == project_id))
            .map(|(slug, _)| slug)
    }

    pub fn contains(&self, slug: &str, project_id: Uuid) -> bool {
        self.column(slug).iter().any(|p| p.id == project_id)
    }

    /// Move `project_id` from `from` to the end of `to`, rewriting its stage.
    /// Returns false (and changes nothing) when it is not in `from` or `from == to`.
    pub fn move_project(&mut self, project_id: Uuid, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let Some(mut project) = self.take(from, project_id) else {
            return false;
        };
        project.stage = to.to_string();
        self.push(to, project);
        true
    }

    /// Drop `project_id` from `stage`. Returns false when it is not there.
    pub fn remove_project(&mut self, project_id: Uuid, stage: &str) -> bool {
        self.take(stage, project_id).is_some()
    }

    fn take(&mut self, slug: &str, project_id: Uuid) -> Option<Project> {
        let column = self.columns.get_mut(slug)?;
        let idx = column.iter().position(|p| p.id == project_id)?;
        Some(column.remove(idx))
    }

    fn push(&mut self, slug: &str, project: Project) {
        self.ensure_column(slug);
        if let Some(column) = self.columns.get_mut(slug) {
            column.push(project);
        }
    }

    fn ensure_column(&mut self, slug: &str) {
        if !self.columns.contains_key(slug) {
            self.order.push(slug.to_string());
            self.columns.insert(slug.to_string(), Vec::new());
        }
    }
}

/// Owns the board state for one session and publishes every change to subscribers.
pub struct ProjectStore {
    api: Arc<dyn BoardApi>,
    state: watch::Sender<BoardState>,
    stage_slugs: RwLock<Vec<String>>,
    filter: RwLock<BoardFilter>,
}

impl ProjectStore {
    pub fn new(api: Arc<dyn BoardApi>) -> Self {
        Self {
            api,
            state: watch::Sender::new(BoardState::default()),
            stage_slugs: RwLock::new(Vec::new()),
            filter: RwLock::new(BoardFilter::default()),
        }
    }

    /// Columns the board must always render, even when empty.
    pub async fn set_stages(&self, slugs: Vec<String>) {
        *self.stage_slugs.write().await = slugs;
    }

    /// Fetch active projects for `filter` and replace the board. A failed fetch
    /// leaves every known stage present with an empty list.
    pub async fn load(&self, filter: BoardFilter) -> BoardState {
        *self.filter.write().await = filter.clone();
        let slugs = self.stage_slugs.read().await.clone();

        let next = match self.api.fetch_projects(&filter).await {
            Ok(response) => BoardState::from_response(&slugs, response),
            Err(e) => {
                warn!(error = %e, team_id = ?filter.team_id, "Project load failed, showing empty board");
                BoardState::empty(&slugs)
            }
        };

        debug!(projects = next.project_count(), "Board loaded");
        self.state.send_replace(next.clone());
        next
    }

    /// `load` again with the last filter.
    pub async fn reload(&self) -> BoardState {
        let filter = self.filter.read().await.clone();
        self.load(filter).await
    }

    pub fn snapshot(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    pub fn project_count(&self) -> usize {
        self.state.borrow().project_count()
    }

    /// Run a synchronous mutation; subscribers are notified only if it reports a change.
    pub(crate) fn apply(&self, mutate: impl FnOnce(&mut BoardState) -> bool) -> bool {
        self.state.send_if_modified(mutate)
    }
}
