use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type, types::Json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "project_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,         // Owner, every query is scoped by it
    pub team_id: Option<Uuid>, // Owning team
    pub name: String,
    pub description: Option<String>,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub priority: ProjectPriority,
    pub stage: String, // Slug of the stage column the project sits in
    pub project_type: Option<String>,
    pub client_name: Option<String>,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub budget: Option<f64>,
    pub location: Option<String>,
    pub expected_participants: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub total_tasks: i32,
    pub completed_tasks: i32,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectMilestone {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub sort_order: i32,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

/// A project with its child rows, returned by the single-project route.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    pub team_ids: Vec<Uuid>,
    pub milestones: Vec<ProjectMilestone>,
    pub member_ids: Vec<Uuid>,
}

impl std::ops::Deref for ProjectDetails {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub team_ids: Vec<Uuid>,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub priority: Option<ProjectPriority>,
    pub stage: Option<String>, // Defaults to the owner's default stage
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub project_type: Option<String>,
    pub client_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub budget: Option<f64>,
    pub location: Option<String>,
    pub expected_participants: Option<i32>,
    #[serde(default)]
    pub milestones: Vec<String>,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

impl CreateProject {
    /// Explicit `team_id`, else the first of `team_ids`.
    pub fn owning_team(&self) -> Option<Uuid> {
        self.team_id.or_else(|| self.team_ids.first().copied())
    }

    /// Every referenced team, deduplicated, owning team first.
    pub fn linked_teams(&self) -> Vec<Uuid> {
        let mut teams: Vec<Uuid> = Vec::with_capacity(self.team_ids.len() + 1);
        for id in self.team_id.iter().chain(self.team_ids.iter()) {
            if !teams.contains(id) {
                teams.push(*id);
            }
        }
        teams
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub team_id: Option<Uuid>,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub priority: Option<ProjectPriority>,
    pub project_type: Option<String>,
    pub client_name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub budget: Option<f64>,
    pub location: Option<String>,
    pub expected_participants: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub total_tasks: Option<i32>,
    pub completed_tasks: Option<i32>,
    pub is_archived: Option<bool>,
}

impl UpdateProject {
    pub fn archive() -> Self {
        Self {
            is_archived: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateProjectStage {
    pub stage: String,
}

/// Listing body: stage slug -> projects when grouped, a flat list otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum ProjectListing {
    Grouped(BTreeMap<String, Vec<Project>>),
    Flat(Vec<Project>),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectsResponse {
    pub grouped: bool,
    pub projects: ProjectListing,
}

/// Bucket projects by stage. Every known slug gets a (possibly empty) list; a project
/// whose stage is not known keeps its own bucket so it is never dropped.
pub fn group_by_stage(
    projects: Vec<Project>,
    known_slugs: &[String],
) -> BTreeMap<String, Vec<Project>> {
    let mut grouped: BTreeMap<String, Vec<Project>> = known_slugs
        .iter()
        .map(|slug| (slug.clone(), Vec::new()))
        .collect();
    for project in projects {
        grouped.entry(project.stage.clone()).or_default().push(project);
    }
    grouped
}

const PROJECT_COLUMNS: &str = "id, user_id, team_id, name, description, emoji, color, priority, stage, \
     project_type, client_name, tags, budget, location, expected_participants, start_date, \
     target_date, total_tasks, completed_tasks, is_archived, created_at, updated_at";

impl Project {
    pub fn progress_percent(&self) -> u8 {
        if self.total_tasks <= 0 {
            return 0;
        }
        let done = self.completed_tasks.clamp(0, self.total_tasks);
        ((done as f64 / self.total_tasks as f64) * 100.0).round() as u8
    }

    /// Non-archived projects of `user_id`, optionally restricted to one team
    /// (owning team or linked through `project_teams`).
    pub async fn find_active(
        pool: &SqlitePool,
        user_id: Uuid,
        team_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            r#"SELECT {PROJECT_COLUMNS}
               FROM projects
               WHERE user_id = $1
                 AND is_archived = 0
                 AND ($2 IS NULL
                      OR team_id = $2
                      OR EXISTS (SELECT 1 FROM project_teams pt
                                 WHERE pt.project_id = projects.id AND pt.team_id = $2))
               ORDER BY created_at ASC, rowid ASC"#
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(user_id)
            .bind(team_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_details(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ProjectDetails>, sqlx::Error> {
        let Some(project) = Self::find_by_id(pool, user_id, id).await? else {
            return Ok(None);
        };

        let team_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT team_id FROM project_teams WHERE project_id = $1 ORDER BY rowid ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let milestones = sqlx::query_as::<_, ProjectMilestone>(
            r#"SELECT id, project_id, name, sort_order, is_complete, created_at
               FROM project_milestones
               WHERE project_id = $1
               ORDER BY sort_order ASC"#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let member_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM project_members WHERE project_id = $1 ORDER BY rowid ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(ProjectDetails {
            project,
            team_ids,
            milestones,
            member_ids,
        }))
    }

    /// Insert the project with its team links, milestones and members in one transaction.
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &CreateProject,
        stage: &str,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"INSERT INTO projects (id, user_id, team_id, name, description, emoji, color, priority, stage,
                                    project_type, client_name, tags, budget, location, expected_participants,
                                    start_date, target_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
               RETURNING {PROJECT_COLUMNS}"#
        );
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(project_id)
            .bind(user_id)
            .bind(data.owning_team())
            .bind(data.name.trim())
            .bind(&data.description)
            .bind(&data.emoji)
            .bind(&data.color)
            .bind(data.priority.unwrap_or_default())
            .bind(stage)
            .bind(&data.project_type)
            .bind(&data.client_name)
            .bind(Json(&data.tags))
            .bind(data.budget)
            .bind(&data.location)
            .bind(data.expected_participants)
            .bind(data.start_date)
            .bind(data.target_date)
            .fetch_one(&mut *tx)
            .await?;

        for team_id in data.linked_teams() {
            sqlx::query("INSERT INTO project_teams (project_id, team_id) VALUES ($1, $2)")
                .bind(project_id)
                .bind(team_id)
                .execute(&mut *tx)
                .await?;
        }

        for (idx, name) in data
            .milestones
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .enumerate()
        {
            sqlx::query(
                "INSERT INTO project_milestones (id, project_id, name, sort_order) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(project_id)
            .bind(name)
            .bind(idx as i32)
            .execute(&mut *tx)
            .await?;
        }

        for member_id in &data.member_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES ($1, $2)",
            )
            .bind(project_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(project)
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"UPDATE projects
               SET name                  = COALESCE($3, name),
                   description           = COALESCE($4, description),
                   team_id               = COALESCE($5, team_id),
                   emoji                 = COALESCE($6, emoji),
                   color                 = COALESCE($7, color),
                   priority              = COALESCE($8, priority),
                   project_type          = COALESCE($9, project_type),
                   client_name           = COALESCE($10, client_name),
                   tags                  = COALESCE($11, tags),
                   budget                = COALESCE($12, budget),
                   location              = COALESCE($13, location),
                   expected_participants = COALESCE($14, expected_participants),
                   start_date            = COALESCE($15, start_date),
                   target_date           = COALESCE($16, target_date),
                   total_tasks           = COALESCE($17, total_tasks),
                   completed_tasks       = COALESCE($18, completed_tasks),
                   is_archived           = COALESCE($19, is_archived),
                   updated_at            = datetime('now', 'subsec')
               WHERE id = $1 AND user_id = $2
               RETURNING {PROJECT_COLUMNS}"#
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(data.name.as_deref().map(str::trim))
            .bind(&data.description)
            .bind(data.team_id)
            .bind(&data.emoji)
            .bind(&data.color)
            .bind(data.priority)
            .bind(&data.project_type)
            .bind(&data.client_name)
            .bind(data.tags.as_ref().map(Json))
            .bind(data.budget)
            .bind(&data.location)
            .bind(data.expected_participants)
            .bind(data.start_date)
            .bind(data.target_date)
            .bind(data.total_tasks)
            .bind(data.completed_tasks)
            .bind(data.is_archived)
            .fetch_optional(pool)
            .await
    }

    /// Move an active project. Archived projects are left alone and yield `None`.
    pub async fn update_stage(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        stage: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"UPDATE projects
               SET stage = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND user_id = $2 AND is_archived = 0
               RETURNING {PROJECT_COLUMNS}"#
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(stage)
            .fetch_optional(pool)
            .await
    }

    /// Number of active projects still sitting in `stage`.
    pub async fn count_in_stage(
        pool: &SqlitePool,
        user_id: Uuid,
        stage: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM projects WHERE user_id = $1 AND stage = $2 AND is_archived = 0",
        )
        .bind(user_id)
        .bind(stage)
        .fetch_one(pool)
        .await
    }
}
