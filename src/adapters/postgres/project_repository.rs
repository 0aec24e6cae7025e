//! Postgres implementation of the ProjectRepository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Project, ProjectScope, ProjectStatus};
use crate::domain::ports::{ProjectFilter, ProjectRepository, TaskPage};

#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn create(&self, project: &Project) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO projects (
                   id, name, description, status, department_id, owner_id,
                   start_date, end_date, created_at, updated_at
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.department_id)
        .bind(project.owner_id)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, project: &Project) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE projects SET name = $1, description = $2, status = $3,
                   department_id = $4, owner_id = $5, start_date = $6,
                   end_date = $7, updated_at = $8
               WHERE id = $9"#,
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.department_id)
        .bind(project.owner_id)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.updated_at)
        .bind(project.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProjectNotFound(project.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::ProjectNotFound(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        scope: &ProjectScope,
        page: &TaskPage,
    ) -> DomainResult<(Vec<Project>, u64)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects WHERE ");
        push_predicates(&mut count_qb, filter, scope);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM projects WHERE ");
        push_predicates(&mut qb, filter, scope);
        qb.push(" ORDER BY created_at DESC");
        qb.push(" LIMIT ").push_bind(i64::from(page.per_page));
        qb.push(" OFFSET ").push_bind(page.offset());

        let rows: Vec<ProjectRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let projects = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<DomainResult<Vec<Project>>>()?;
        Ok((projects, total as u64))
    }
}

fn push_predicates(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &ProjectFilter,
    scope: &ProjectScope,
) {
    match scope {
        ProjectScope::All => {
            qb.push("TRUE");
        }
        ProjectScope::Department(dept) => {
            qb.push("department_id = ").push_bind(*dept);
        }
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(dept) = filter.department_id {
        qb.push(" AND department_id = ").push_bind(dept);
    }
    if let Some(owner) = filter.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner);
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    department_id: Option<Uuid>,
    owner_id: Option<Uuid>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DomainError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            status: ProjectStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!(
                    "unknown project status '{}'",
                    row.status
                ))
            })?,
            department_id: row.department_id,
            owner_id: row.owner_id,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
