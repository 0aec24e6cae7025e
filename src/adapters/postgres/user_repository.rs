//! Postgres implementation of the UserRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Role, User, UserScope};
use crate::domain::ports::{TaskPage, UserRepository};

const USER_COLUMNS: &str = "id, email, name, password_hash, role, department_id, oidc_subject, \
     secondary_subject, avatar_url, job_title, is_active, preferences, \
     notification_settings, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO users (
                   id, email, name, password_hash, role, department_id,
                   oidc_subject, secondary_subject, avatar_url, job_title,
                   is_active, preferences, notification_settings,
                   created_at, updated_at
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.department_id)
        .bind(&user.oidc_subject)
        .bind(&user.secondary_subject)
        .bind(&user.avatar_url)
        .bind(&user.job_title)
        .bind(user.is_active)
        .bind(&user.preferences)
        .bind(&user.notification_settings)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_oidc_subject(&self, subject: &str) -> DomainResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE oidc_subject = $1"
        ))
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, user: &User) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE users SET
                   email = $1, name = $2, password_hash = $3, role = $4,
                   department_id = $5, oidc_subject = $6, secondary_subject = $7,
                   avatar_url = $8, job_title = $9, is_active = $10,
                   preferences = $11, notification_settings = $12, updated_at = $13
               WHERE id = $14"#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.department_id)
        .bind(&user.oidc_subject)
        .bind(&user.secondary_subject)
        .bind(&user.avatar_url)
        .bind(&user.job_title)
        .bind(user.is_active)
        .bind(&user.preferences)
        .bind(&user.notification_settings)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(user.id));
        }
        Ok(())
    }

    async fn deactivate(&self, id: Uuid) -> DomainResult<()> {
        let result =
            sqlx::query("UPDATE users SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(id));
        }
        Ok(())
    }

    async fn list(&self, scope: &UserScope, page: &TaskPage) -> DomainResult<(Vec<User>, u64)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE ");
        push_scope(&mut count_qb, scope);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE "));
        push_scope(&mut qb, scope);
        qb.push(" ORDER BY created_at DESC");
        qb.push(" LIMIT ").push_bind(i64::from(page.per_page));
        qb.push(" OFFSET ").push_bind(page.offset());

        let rows: Vec<UserRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let users = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<DomainResult<Vec<User>>>()?;
        Ok((users, total as u64))
    }

    async fn count_by_department(&self, department_id: Uuid) -> DomainResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE department_id = $1")
                .bind(department_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn any_exists(&self) -> DomainResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &UserScope) {
    match scope {
        UserScope::All => {
            qb.push("TRUE");
        }
        UserScope::Department(dept) => {
            qb.push("department_id = ").push_bind(*dept);
        }
        UserScope::SelfAndDepartment {
            user_id,
            department_id,
        } => {
            qb.push("(id = ").push_bind(*user_id);
            if let Some(dept) = department_id {
                qb.push(" OR department_id = ").push_bind(*dept);
            }
            qb.push(")");
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: Option<String>,
    role: String,
    department_id: Option<Uuid>,
    oidc_subject: Option<String>,
    secondary_subject: Option<String>,
    avatar_url: Option<String>,
    job_title: Option<String>,
    is_active: bool,
    preferences: serde_json::Value,
    notification_settings: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: Role::from_str(&row.role).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown role '{}'", row.role))
            })?,
            department_id: row.department_id,
            oidc_subject: row.oidc_subject,
            secondary_subject: row.secondary_subject,
            avatar_url: row.avatar_url,
            job_title: row.job_title,
            is_active: row.is_active,
            preferences: row.preferences,
            notification_settings: row.notification_settings,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
