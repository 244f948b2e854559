use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::project::Project;

/// A compiled-in board column. Users without stage rows see these, and creating a first
/// custom stage turns them into real rows.
#[derive(Debug, Clone, Copy)]
pub struct StageColumn {
    pub slug: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

pub const DEFAULT_COLUMNS: &[StageColumn] = &[
    StageColumn {
        slug: "ideation",
        name: "Ideation",
        color: "#8b5cf6",
        icon: "lightbulb",
    },
    StageColumn {
        slug: "planning",
        name: "Planning",
        color: "#3b82f6",
        icon: "clipboard-list",
    },
    StageColumn {
        slug: "in_progress",
        name: "In Progress",
        color: "#f59e0b",
        icon: "hammer",
    },
    StageColumn {
        slug: "review",
        name: "Review",
        color: "#06b6d4",
        icon: "eye",
    },
    StageColumn {
        slug: "complete",
        name: "Complete",
        color: "#10b981",
        icon: "check-circle",
    },
];

const COMPLETE_SLUG: &str = "complete";

/// A pipeline stage. `slug` is the board column key and the value stored on projects.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct Stage {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_default: bool,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StagesResponse {
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateStage {
    pub name: String,
    pub slug: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
    pub is_complete: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateStage {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_default: Option<bool>,
    pub is_complete: Option<bool>,
}

/// Result of a guarded stage delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageRemoval {
    Removed { slug: String },
    NotFound,
    LastStage,
    InUse { slug: String, projects: i64 },
}

/// The built-in stage list. The first column is the entry point, `complete` is terminal.
pub fn fallback_stages() -> Vec<Stage> {
    DEFAULT_COLUMNS
        .iter()
        .enumerate()
        .map(|(idx, column)| Stage {
            id: Uuid::from_u128(idx as u128 + 1),
            name: column.name.to_string(),
            slug: column.slug.to_string(),
            color: column.color.to_string(),
            icon: Some(column.icon.to_string()),
            description: None,
            sort_order: idx as i32,
            is_default: idx == 0,
            is_complete: column.slug == COMPLETE_SLUG,
        })
        .collect()
}

/// Derive a column key from a display name: lowercase ascii alphanumerics joined by `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

const STAGE_COLUMNS: &str =
    "id, name, slug, color, icon, description, sort_order, is_default, is_complete";

impl Stage {
    pub async fn find_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {STAGE_COLUMNS} FROM stages WHERE user_id = $1 ORDER BY sort_order ASC, name ASC"
        );
        sqlx::query_as::<_, Stage>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {STAGE_COLUMNS} FROM stages WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Stage>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stages WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Column keys the board should render for `user_id`, in display order.
    /// Falls back to the built-in columns when the user has none.
    pub async fn known_slugs(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        let slugs = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM stages WHERE user_id = $1 ORDER BY sort_order ASC, name ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        if slugs.is_empty() {
            return Ok(DEFAULT_COLUMNS.iter().map(|c| c.slug.to_string()).collect());
        }
        Ok(slugs)
    }

    pub async fn is_known_slug(
        pool: &SqlitePool,
        user_id: Uuid,
        slug: &str,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::known_slugs(pool, user_id)
            .await?
            .iter()
            .any(|known| known == slug))
    }

    /// Stage new projects enter: the flagged default, else the first by order.
    pub async fn default_slug(pool: &SqlitePool, user_id: Uuid) -> Result<String, sqlx::Error> {
        let slug = sqlx::query_scalar::<_, String>(
            r#"SELECT slug FROM stages
               WHERE user_id = $1
               ORDER BY is_default DESC, sort_order ASC, name ASC
               LIMIT 1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(slug.unwrap_or_else(|| DEFAULT_COLUMNS[0].slug.to_string()))
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &CreateStage,
        slug: &str,
    ) -> Result<Self, sqlx::Error> {
        let is_default = data.is_default.unwrap_or(false);
        let mut tx = pool.begin().await?;

        let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stages WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if owned == 0 {
            // Existing projects sit in the built-in columns; keep those slugs valid.
            Self::seed_builtin_columns(&mut *tx, user_id).await?;
        }

        if is_default {
            sqlx::query("UPDATE stages SET is_default = 0 WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let sql = format!(
            r#"INSERT INTO stages (id, user_id, name, slug, color, icon, description, sort_order, is_default, is_complete)
               VALUES ($1, $2, $3, $4, COALESCE($5, '#6b7280'), $6, $7,
                       (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM stages WHERE user_id = $2),
                       $8, $9)
               RETURNING {STAGE_COLUMNS}"#
        );
        let stage = sqlx::query_as::<_, Stage>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&data.name)
            .bind(slug)
            .bind(&data.color)
            .bind(&data.icon)
            .bind(&data.description)
            .bind(is_default)
            .bind(data.is_complete.unwrap_or(false))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(stage)
    }

    async fn seed_builtin_columns(conn: &mut SqliteConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
        for stage in fallback_stages() {
            sqlx::query(
                r#"INSERT INTO stages (id, user_id, name, slug, color, icon, sort_order, is_default, is_complete)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&stage.name)
            .bind(&stage.slug)
            .bind(&stage.color)
            .bind(&stage.icon)
            .bind(stage.sort_order)
            .bind(stage.is_default)
            .bind(stage.is_complete)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        data: &UpdateStage,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"UPDATE stages
               SET name        = COALESCE($3, name),
                   color       = COALESCE($4, color),
                   icon        = COALESCE($5, icon),
                   description = COALESCE($6, description),
                   sort_order  = COALESCE($7, sort_order),
                   is_default  = COALESCE($8, is_default),
                   is_complete = COALESCE($9, is_complete),
                   updated_at  = datetime('now', 'subsec')
               WHERE id = $1 AND user_id = $2
               RETURNING {STAGE_COLUMNS}"#
        );
        let Some(stage) = sqlx::query_as::<_, Stage>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&data.name)
            .bind(&data.color)
            .bind(&data.icon)
            .bind(&data.description)
            .bind(data.sort_order)
            .bind(data.is_default)
            .bind(data.is_complete)
            .fetch_optional(&mut *tx)
            .await?
        else {
            // Dropping the transaction rolls it back.
            return Ok(None);
        };

        if data.is_default == Some(true) {
            sqlx::query("UPDATE stages SET is_default = 0 WHERE user_id = $1 AND id != $2")
                .bind(user_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(stage))
    }

    /// Delete a stage unless it is the owner's last one or still holds active projects.
    /// The guard and the delete are one statement, so concurrent deletes cannot both pass it.
    pub async fn delete(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<StageRemoval, sqlx::Error> {
        let removed = sqlx::query_scalar::<_, String>(
            r#"DELETE FROM stages
               WHERE id = $1 AND user_id = $2
                 AND (SELECT COUNT(*) FROM stages WHERE user_id = $2) > 1
                 AND NOT EXISTS (
                     SELECT 1 FROM projects p
                     WHERE p.user_id = $2 AND p.stage = stages.slug AND p.is_archived = 0
                 )
               RETURNING slug"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        if let Some(slug) = removed {
            return Ok(StageRemoval::Removed { slug });
        }

        let Some(stage) = Self::find_by_id(pool, user_id, id).await? else {
            return Ok(StageRemoval::NotFound);
        };
        let projects = Project::count_in_stage(pool, user_id, &stage.slug).await?;
        if projects > 0 {
            return Ok(StageRemoval::InUse {
                slug: stage.slug,
                projects,
            });
        }
        Ok(StageRemoval::LastStage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::project::{CreateProject, UpdateProject},
    };

    #[test]
    fn fallback_marks_first_default_and_complete_terminal() {
        let stages = fallback_stages();
        assert_eq!(stages.len(), DEFAULT_COLUMNS.len());
        assert!(stages[0].is_default);
        assert_eq!(stages.iter().filter(|s| s.is_default).count(), 1);

        let complete: Vec<_> = stages.iter().filter(|s| s.is_complete).collect();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].slug, "complete");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("In Progress"), "in_progress");
        assert_eq!(slugify("  Client -- Review! "), "client_review");
        assert_eq!(slugify("Q3 2026"), "q3_2026");
        assert_eq!(slugify("!!!"), "");
    }

    fn stage_named(name: &str) -> CreateStage {
        CreateStage {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_custom_stage_keeps_builtin_columns() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();

        let slugs = Stage::known_slugs(&db.pool, user).await.unwrap();
        assert_eq!(slugs.first().map(String::as_str), Some("ideation"));
        assert_eq!(Stage::default_slug(&db.pool, user).await.unwrap(), "ideation");

        let backlog = Stage::create(&db.pool, user, &stage_named("Backlog"), "backlog")
            .await
            .unwrap();
        assert_eq!(backlog.sort_order, DEFAULT_COLUMNS.len() as i32);

        let slugs = Stage::known_slugs(&db.pool, user).await.unwrap();
        assert_eq!(slugs.len(), DEFAULT_COLUMNS.len() + 1);
        assert_eq!(slugs.last().map(String::as_str), Some("backlog"));
        assert!(Stage::is_known_slug(&db.pool, user, "planning").await.unwrap());
        assert_eq!(Stage::default_slug(&db.pool, user).await.unwrap(), "ideation");

        // Seeding happens once.
        Stage::create(&db.pool, user, &stage_named("Won"), "won").await.unwrap();
        assert_eq!(
            Stage::count_for_user(&db.pool, user).await.unwrap(),
            DEFAULT_COLUMNS.len() as i64 + 2
        );
    }

    #[tokio::test]
    async fn create_keeps_a_single_default() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();

        let lead = CreateStage {
            is_default: Some(true),
            ..stage_named("Lead")
        };
        let won = CreateStage {
            is_default: Some(true),
            is_complete: Some(true),
            ..stage_named("Won")
        };
        let a = Stage::create(&db.pool, user, &lead, "lead").await.unwrap();
        let b = Stage::create(&db.pool, user, &won, "won").await.unwrap();
        assert_eq!(b.sort_order, a.sort_order + 1);

        let stages = Stage::find_by_user(&db.pool, user).await.unwrap();
        let defaults: Vec<_> = stages.iter().filter(|s| s.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].slug, "won");
        assert_eq!(Stage::default_slug(&db.pool, user).await.unwrap(), "won");
    }

    #[tokio::test]
    async fn update_of_missing_stage_changes_nothing() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();
        let lead = CreateStage {
            is_default: Some(true),
            ..stage_named("Lead")
        };
        Stage::create(&db.pool, user, &lead, "lead").await.unwrap();

        let promote = UpdateStage {
            is_default: Some(true),
            ..Default::default()
        };
        let updated = Stage::update(&db.pool, user, Uuid::new_v4(), &promote)
            .await
            .unwrap();
        assert!(updated.is_none());
        assert_eq!(Stage::default_slug(&db.pool, user).await.unwrap(), "lead");
        let stages = Stage::find_by_user(&db.pool, user).await.unwrap();
        assert_eq!(stages.iter().filter(|s| s.is_default).count(), 1);
    }

    #[tokio::test]
    async fn delete_refuses_last_stage_and_occupied_stage() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();
        Stage::create(&db.pool, user, &stage_named("Lead"), "lead").await.unwrap();

        let project = CreateProject {
            name: "Acme".to_string(),
            stage: Some("planning".to_string()),
            ..Default::default()
        };
        Project::create(&db.pool, user, &project, "planning", Uuid::new_v4())
            .await
            .unwrap();

        let mut outcomes = Vec::new();
        for stage in Stage::find_by_user(&db.pool, user).await.unwrap() {
            outcomes.push(Stage::delete(&db.pool, user, stage.id).await.unwrap());
        }

        assert!(outcomes.contains(&StageRemoval::InUse {
            slug: "planning".to_string(),
            projects: 1,
        }));
        let remaining = Stage::find_by_user(&db.pool, user).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slug, "planning");

        // With the project archived, the only stage left is still protected.
        let archive = UpdateProject::archive();
        let projects = Project::find_active(&db.pool, user, None).await.unwrap();
        Project::update(&db.pool, user, projects[0].id, &archive).await.unwrap();
        assert_eq!(
            Stage::delete(&db.pool, user, remaining[0].id).await.unwrap(),
            StageRemoval::LastStage
        );
    }

    #[tokio::test]
    async fn concurrent_deletes_leave_one_stage() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("board.db").display());
        let db = DBService::new(&url).await.unwrap();

        for round in 0..10 {
            let user = Uuid::new_v4();
            Stage::create(&db.pool, user, &stage_named("Lead"), "lead").await.unwrap();
            let stages = Stage::find_by_user(&db.pool, user).await.unwrap();
            for extra in &stages[2..] {
                Stage::delete(&db.pool, user, extra.id).await.unwrap();
            }

            let (a, b) = tokio::join!(
                Stage::delete(&db.pool, user, stages[0].id),
                Stage::delete(&db.pool, user, stages[1].id),
            );
            let removed = [a.unwrap(), b.unwrap()]
                .iter()
                .filter(|r| matches!(r, StageRemoval::Removed { .. }))
                .count();
            assert_eq!(removed, 1, "round {round}");
            assert_eq!(Stage::count_for_user(&db.pool, user).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn stages_are_scoped_to_their_owner() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let stage = Stage::create(&db.pool, owner, &stage_named("Discovery"), "discovery")
            .await
            .unwrap();

        assert!(Stage::find_by_id(&db.pool, other, stage.id).await.unwrap().is_none());
        assert_eq!(
            Stage::delete(&db.pool, other, stage.id).await.unwrap(),
            StageRemoval::NotFound
        );
        assert!(Stage::find_by_id(&db.pool, owner, stage.id).await.unwrap().is_some());
    }
}
