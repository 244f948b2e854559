use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    #[default]
    Member,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: Uuid,
    pub user_id: Uuid, // Owner
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddTeamMember {
    pub user_id: Uuid,
    pub role: Option<TeamRole>,
}

impl Team {
    /// Teams the user owns or belongs to.
    pub async fn find_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"SELECT t.id, t.user_id, t.name, t.description, t.color, t.created_at, t.updated_at
               FROM teams t
               WHERE t.user_id = $1
                  OR EXISTS (SELECT 1 FROM team_members m WHERE m.team_id = t.id AND m.user_id = $1)
               ORDER BY t.name ASC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn is_accessible(
        pool: &SqlitePool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let visible = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM teams t
               WHERE t.id = $1
                 AND (t.user_id = $2
                      OR EXISTS (SELECT 1 FROM team_members m WHERE m.team_id = t.id AND m.user_id = $2))"#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(visible > 0)
    }

    /// Create a team and register its creator as owner.
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &CreateTeam,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let team = sqlx::query_as::<_, Team>(
            r#"INSERT INTO teams (id, user_id, name, description, color)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, user_id, name, description, color, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.color)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(team.id)
            .bind(user_id)
            .bind(TeamRole::Owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(team)
    }

    /// Add or re-role a member. Only the owner may do this; returns `None` otherwise.
    pub async fn add_member(
        pool: &SqlitePool,
        owner_id: Uuid,
        team_id: Uuid,
        data: &AddTeamMember,
    ) -> Result<Option<TeamMember>, sqlx::Error> {
        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM teams WHERE id = $1 AND user_id = $2",
        )
        .bind(team_id)
        .bind(owner_id)
        .fetch_one(pool)
        .await?;
        if owned == 0 {
            return Ok(None);
        }

        sqlx::query_as::<_, TeamMember>(
            r#"INSERT INTO team_members (team_id, user_id, role)
               VALUES ($1, $2, $3)
               ON CONFLICT(team_id, user_id) DO UPDATE SET role = excluded.role
               RETURNING team_id, user_id, role, created_at"#,
        )
        .bind(team_id)
        .bind(data.user_id)
        .bind(data.role.clone().unwrap_or_default())
        .fetch_one(pool)
        .await
        .map(Some)
    }

    pub async fn members(pool: &SqlitePool, team_id: Uuid) -> Result<Vec<TeamMember>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"SELECT team_id, user_id, role, created_at
               FROM team_members
               WHERE team_id = $1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }
}
