//! Three-step project creation wizard: Type -> Details -> Advanced.

use db::models::project::{CreateProject, Project};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    board_api::{BoardApi, BoardApiError},
    project_suggestions::{ProjectSuggestion, SuggestionSource, project_setup_prompt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardStep {
    #[default]
    Type,
    Details,
    Advanced,
}

impl WizardStep {
    fn next(self) -> Self {
        match self {
            Self::Type => Self::Details,
            Self::Details | Self::Advanced => Self::Advanced,
        }
    }

    fn back(self) -> Self {
        match self {
            Self::Type | Self::Details => Self::Type,
            Self::Advanced => Self::Details,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("finish the first step before creating the project")]
    NotReady,
    #[error("project name is required")]
    EmptyName,
    #[error("could not create project: {0}")]
    Remote(#[from] BoardApiError),
}

/// Everything the wizard has collected so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDraft {
    /// Free-text description of the idea, used only for suggestions.
    pub idea: String,
    pub project: CreateProject,
    /// Suggested follow-up tasks. Shown to the user, never sent with the project.
    pub suggested_tasks: Vec<String>,
}

impl ProjectDraft {
    fn apply(&mut self, suggestion: ProjectSuggestion) {
        let project = &mut self.project;
        if let Some(name) = suggestion.name {
            project.name = name;
        }
        if suggestion.description.is_some() {
            project.description = suggestion.description;
        }
        if suggestion.project_type.is_some() {
            project.project_type = suggestion.project_type;
        }
        if suggestion.client_name.is_some() {
            project.client_name = suggestion.client_name;
        }
        if suggestion.budget.is_some() {
            project.budget = suggestion.budget;
        }
        if suggestion.deadline.is_some() {
            project.target_date = suggestion.deadline;
        }
        if !suggestion.milestones.is_empty() {
            project.milestones = suggestion.milestones;
        }
        self.suggested_tasks = suggestion.tasks;
    }

    /// Request body for submission.
    pub fn to_create(&self) -> CreateProject {
        let mut body = self.project.clone();
        body.name = body.name.trim().to_string();
        body
    }
}

#[derive(Debug, Default)]
pub struct CreationWorkflow {
    step: WizardStep,
    draft: ProjectDraft,
    error: Option<String>,
    /// Draft the wizard returns to after a submit or cancel.
    preset: ProjectDraft,
}

impl CreationWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A wizard whose draft starts from `preset`, and goes back to it on every reset.
    pub fn with_preset(preset: ProjectDraft) -> Self {
        Self {
            draft: preset.clone(),
            preset,
            ..Self::default()
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &ProjectDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ProjectDraft {
        &mut self.draft
    }

    /// Last submission error, for display.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn next(&mut self) {
        self.step = self.step.next();
    }

    pub fn back(&mut self) {
        self.step = self.step.back();
    }

    pub fn can_submit(&self) -> bool {
        self.step != WizardStep::Type && !self.draft.project.name.trim().is_empty()
    }

    /// Step one: ask `source` to pre-fill the draft, then move to Details.
    /// Service errors and unparseable replies advance with nothing filled in.
    /// Returns whether anything was applied.
    pub async fn request_suggestions(&mut self, source: &dyn SuggestionSource) -> bool {
        if self.step != WizardStep::Type {
            return false;
        }

        let idea = self.draft.idea.trim();
        let applied = if idea.is_empty() {
            false
        } else {
            let prompt = project_setup_prompt(idea, self.draft.project.project_type.as_deref());
            match source.suggest(&prompt).await {
                Ok(text) => self.apply_suggestion_text(&text),
                Err(e) => {
                    warn!(error = %e, "Project suggestions unavailable");
                    false
                }
            }
        };

        self.step = WizardStep::Details;
        applied
    }

    /// Pre-fill from a raw completion. Malformed text leaves the draft untouched.
    pub fn apply_suggestion_text(&mut self, text: &str) -> bool {
        match ProjectSuggestion::parse(text) {
            Some(suggestion) => {
                debug!(
                    milestones = suggestion.milestones.len(),
                    tasks = suggestion.tasks.len(),
                    "Applying project suggestion"
                );
                self.draft.apply(suggestion);
                true
            }
            None => false,
        }
    }

    /// Create the project. On failure the draft is kept and the error recorded;
    /// on success the wizard starts over.
    pub async fn submit(&mut self, api: &dyn BoardApi) -> Result<Project, WorkflowError> {
        if self.step == WizardStep::Type {
            return Err(WorkflowError::NotReady);
        }
        let body = self.draft.to_create();
        if body.name.is_empty() {
            let error = WorkflowError::EmptyName;
            self.error = Some(error.to_string());
            return Err(error);
        }

        match api.create_project(&body).await {
            Ok(project) => {
                info!(project_id = %project.id, stage = %project.stage, "Project created");
                self.cancel();
                Ok(project)
            }
            Err(e) => {
                let error = WorkflowError::from(e);
                warn!(error = %error, "Project creation failed");
                self.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Discard the draft and return to step one.
    pub fn cancel(&mut self) {
        self.step = WizardStep::default();
        self.draft = self.preset.clone();
        self.error = None;
    }
}
