//! Postgres implementation of the DepartmentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Department;
use crate::domain::ports::DepartmentRepository;

#[derive(Clone)]
pub struct PgDepartmentRepository {
    pool: PgPool,
}

impl PgDepartmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentRepository for PgDepartmentRepository {
    async fn create(&self, department: &Department) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO departments (id, name, description, head_id, parent_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.head_id)
        .bind(department.parent_id)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Department>> {
        let row: Option<DepartmentRow> =
            sqlx::query_as("SELECT * FROM departments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Department>> {
        let row: Option<DepartmentRow> =
            sqlx::query_as("SELECT * FROM departments WHERE lower(name) = lower($1)")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn update(&self, department: &Department) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE departments SET name = $1, description = $2, head_id = $3,
                   parent_id = $4, updated_at = $5
               WHERE id = $6"#,
        )
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.head_id)
        .bind(department.parent_id)
        .bind(department.updated_at)
        .bind(department.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DepartmentNotFound(department.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::DepartmentNotFound(id));
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Department>> {
        let rows: Vec<DepartmentRow> =
            sqlx::query_as("SELECT * FROM departments ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct DepartmentRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    head_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: row.id,
            name: row.name,
            description: row.description,
            head_id: row.head_id,
            parent_id: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
