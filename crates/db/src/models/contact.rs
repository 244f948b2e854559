use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateContact {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

const CONTACT_COLUMNS: &str =
    "id, user_id, first_name, last_name, email, phone, company, notes, created_at, updated_at";

impl Contact {
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    /// Contacts of `user_id`, optionally filtered by a case-insensitive substring
    /// of name, email or company.
    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let sql = format!(
            r#"SELECT {CONTACT_COLUMNS}
               FROM contacts
               WHERE user_id = $1
                 AND ($2 IS NULL
                      OR lower(first_name) LIKE $2
                      OR lower(COALESCE(last_name, '')) LIKE $2
                      OR lower(COALESCE(email, '')) LIKE $2
                      OR lower(COALESCE(company, '')) LIKE $2)
               ORDER BY first_name ASC, last_name ASC"#
        );
        sqlx::query_as::<_, Contact>(&sql)
            .bind(user_id)
            .bind(pattern)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        data: &CreateContact,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"INSERT INTO contacts (id, user_id, first_name, last_name, email, phone, company, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {CONTACT_COLUMNS}"#
        );
        sqlx::query_as::<_, Contact>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(data.first_name.trim())
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.company)
            .bind(&data.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: Uuid,
        id: Uuid,
        data: &UpdateContact,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"UPDATE contacts
               SET first_name = COALESCE($3, first_name),
                   last_name  = COALESCE($4, last_name),
                   email      = COALESCE($5, email),
                   phone      = COALESCE($6, phone),
                   company    = COALESCE($7, company),
                   notes      = COALESCE($8, notes),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND user_id = $2
               RETURNING {CONTACT_COLUMNS}"#
        );
        sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(data.first_name.as_deref().map(str::trim))
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.company)
            .bind(&data.notes)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
