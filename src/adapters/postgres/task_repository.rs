//! Postgres implementation of the TaskRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Task, TaskAssignee, TaskPriority, TaskScope, TaskSource, TaskStatus,
};
use crate::domain::ports::{TaskFilter, TaskPage, TaskRepository};

/// Every task column except the generated search vector, which has no
/// Rust-side representation.
pub(crate) const TASK_COLUMNS: &str = "id, external_id, title, description, status, priority, source, \
     creator_id, department_id, project_id, due_date, completion_date, tags, \
     confidence_score, metadata, is_recurring, recurrence_pattern, next_occurrence, \
     skip_dates, recurrence_end_date, recurrence_count, generated_count, \
     recurrence_parent_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load assignees for a batch of tasks with a single query.
    async fn load_assignees(&self, tasks: &mut [Task]) -> DomainResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        let rows = sqlx::query(
            r#"SELECT ta.task_id, ta.user_id, u.name, u.email, ta.assigned_at
               FROM task_assignees ta
               JOIN users u ON u.id = ta.user_id
               WHERE ta.task_id = ANY($1)
               ORDER BY ta.assigned_at"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_task: HashMap<Uuid, Vec<TaskAssignee>> = HashMap::new();
        for row in rows {
            let task_id: Uuid = row.try_get("task_id")?;
            by_task.entry(task_id).or_default().push(TaskAssignee {
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                assigned_at: row.try_get("assigned_at")?,
            });
        }
        for task in tasks.iter_mut() {
            task.assignees = by_task.remove(&task.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, task: &Task, assignee_ids: &[Uuid]) -> DomainResult<Task> {
        let mut tx = self.pool.begin().await?;
        insert_task(&mut tx, task).await?;
        insert_assignees(&mut tx, task.id, assignee_ids).await?;
        tx.commit().await?;

        self.get(task.id)
            .await?
            .ok_or_else(|| DomainError::DatabaseError("task vanished after insert".into()))
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut tasks = vec![row.try_into()?];
                self.load_assignees(&mut tasks).await?;
                Ok(tasks.pop())
            }
            None => Ok(None),
        }
    }

    async fn get_by_external_id(&self, external_id: &str) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut tasks = vec![row.try_into()?];
                self.load_assignees(&mut tasks).await?;
                Ok(tasks.pop())
            }
            None => Ok(None),
        }
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let pattern_json = task
            .recurrence_pattern
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            r#"UPDATE tasks SET
                   title = $1, description = $2, status = $3, priority = $4,
                   source = $5, department_id = $6, project_id = $7,
                   due_date = $8, completion_date = $9, tags = $10,
                   confidence_score = $11, metadata = $12, is_recurring = $13,
                   recurrence_pattern = $14, next_occurrence = $15,
                   skip_dates = $16, recurrence_end_date = $17,
                   recurrence_count = $18, updated_at = $19
               WHERE id = $20"#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.source.as_str())
        .bind(task.department_id)
        .bind(task.project_id)
        .bind(task.due_date)
        .bind(task.completion_date)
        .bind(&task.tags)
        .bind(task.confidence_score)
        .bind(&task.metadata)
        .bind(task.is_recurring)
        .bind(pattern_json)
        .bind(task.next_occurrence)
        .bind(&task.skip_dates)
        .bind(task.recurrence_end_date)
        .bind(task.recurrence_count)
        .bind(task.updated_at)
        .bind(task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }
        Ok(())
    }

    async fn replace_assignees(&self, task_id: Uuid, assignee_ids: &[Uuid]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM task_assignees WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        insert_assignees(&mut tx, task_id, assignee_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        scope: &TaskScope,
        page: &TaskPage,
    ) -> DomainResult<(Vec<Task>, u64)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks t WHERE ");
        push_predicates(&mut count_qb, filter, scope);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE "
        ));
        push_predicates(&mut qb, filter, scope);
        qb.push(format!(
            " ORDER BY t.{} {} NULLS LAST",
            page.sort.column(),
            page.order.sql()
        ));
        qb.push(" LIMIT ").push_bind(i64::from(page.per_page));
        qb.push(" OFFSET ").push_bind(page.offset());

        let rows: Vec<TaskRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let mut tasks = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<DomainResult<Vec<Task>>>()?;
        self.load_assignees(&mut tasks).await?;

        Ok((tasks, total as u64))
    }

    async fn count_by_project(&self, project_id: Uuid) -> DomainResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_by_department(&self, department_id: Uuid) -> DomainResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE department_id = $1")
                .bind(department_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

/// Insert the task row, drawing the external id from the sequence.
/// Callers own the transaction.
pub(crate) async fn insert_task(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    task: &Task,
) -> DomainResult<()> {
    let pattern_json = task
        .recurrence_pattern
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    sqlx::query(
        r#"INSERT INTO tasks (
               id, external_id, title, description, status, priority, source,
               creator_id, department_id, project_id, due_date, completion_date,
               tags, confidence_score, metadata, is_recurring, recurrence_pattern,
               next_occurrence, skip_dates, recurrence_end_date, recurrence_count,
               generated_count, recurrence_parent_id, created_at, updated_at
           ) VALUES (
               $1, 'task-' || lpad(nextval('task_external_id_seq')::text, 6, '0'),
               $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
               $17, $18, $19, $20, $21, $22, $23, $24
           )"#,
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(task.source.as_str())
    .bind(task.creator_id)
    .bind(task.department_id)
    .bind(task.project_id)
    .bind(task.due_date)
    .bind(task.completion_date)
    .bind(&task.tags)
    .bind(task.confidence_score)
    .bind(&task.metadata)
    .bind(task.is_recurring)
    .bind(pattern_json)
    .bind(task.next_occurrence)
    .bind(&task.skip_dates)
    .bind(task.recurrence_end_date)
    .bind(task.recurrence_count)
    .bind(task.generated_count)
    .bind(task.recurrence_parent_id)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Insert junction rows for the given assignees.
pub(crate) async fn insert_assignees(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    task_id: Uuid,
    assignee_ids: &[Uuid],
) -> DomainResult<()> {
    for user_id in assignee_ids {
        sqlx::query(
            "INSERT INTO task_assignees (task_id, user_id, assigned_at)
             VALUES ($1, $2, now()) ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Shared WHERE-clause builder for the count and page queries, so the
/// two can never disagree.
fn push_predicates(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &TaskFilter,
    scope: &TaskScope,
) {
    match scope {
        TaskScope::All => {
            qb.push("TRUE");
        }
        TaskScope::Department(dept) => {
            qb.push("t.department_id = ").push_bind(*dept);
        }
        TaskScope::OwnDepartmentOrAssigned {
            user_id,
            department_id,
        } => {
            qb.push("(t.creator_id = ").push_bind(*user_id);
            if let Some(dept) = department_id {
                qb.push(" OR t.department_id = ").push_bind(*dept);
            }
            qb.push(" OR EXISTS (SELECT 1 FROM task_assignees s WHERE s.task_id = t.id AND s.user_id = ")
                .push_bind(*user_id)
                .push("))");
        }
    }

    if !filter.statuses.is_empty() {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().into()).collect();
        qb.push(" AND t.status = ANY(").push_bind(statuses).push(")");
    }
    if !filter.priorities.is_empty() {
        let priorities: Vec<String> =
            filter.priorities.iter().map(|p| p.as_str().into()).collect();
        qb.push(" AND t.priority = ANY(").push_bind(priorities).push(")");
    }
    if let Some(assignee) = filter.assignee_id {
        qb.push(" AND EXISTS (SELECT 1 FROM task_assignees f WHERE f.task_id = t.id AND f.user_id = ")
            .push_bind(assignee)
            .push(")");
    }
    if let Some(creator) = filter.creator_id {
        qb.push(" AND t.creator_id = ").push_bind(creator);
    }
    if let Some(dept) = filter.department_id {
        qb.push(" AND t.department_id = ").push_bind(dept);
    }
    if let Some(project) = filter.project_id {
        qb.push(" AND t.project_id = ").push_bind(project);
    }
    if let Some(is_recurring) = filter.is_recurring {
        qb.push(" AND t.is_recurring = ").push_bind(is_recurring);
    }
    if let Some(after) = filter.due_after {
        qb.push(" AND t.due_date >= ").push_bind(after);
    }
    if let Some(before) = filter.due_before {
        qb.push(" AND t.due_date <= ").push_bind(before);
    }
    if let Some(ref search) = filter.search {
        if !search.trim().is_empty() {
            qb.push(" AND t.search_vector @@ websearch_to_tsquery('english', ")
                .push_bind(search.trim().to_string())
                .push(")");
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TaskRow {
    id: Uuid,
    external_id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    source: String,
    creator_id: Uuid,
    department_id: Option<Uuid>,
    project_id: Option<Uuid>,
    due_date: Option<DateTime<Utc>>,
    completion_date: Option<DateTime<Utc>>,
    tags: Vec<String>,
    confidence_score: Option<f64>,
    metadata: serde_json::Value,
    is_recurring: bool,
    recurrence_pattern: Option<serde_json::Value>,
    next_occurrence: Option<DateTime<Utc>>,
    skip_dates: Vec<NaiveDate>,
    recurrence_end_date: Option<DateTime<Utc>>,
    recurrence_count: Option<i32>,
    generated_count: i32,
    recurrence_parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let recurrence_pattern = row
            .recurrence_pattern
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Task {
            id: row.id,
            external_id: row.external_id,
            title: row.title,
            description: row.description,
            status: TaskStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown task status '{}'", row.status))
            })?,
            priority: TaskPriority::from_str(&row.priority).ok_or_else(|| {
                DomainError::SerializationError(format!(
                    "unknown task priority '{}'",
                    row.priority
                ))
            })?,
            source: TaskSource::from_str(&row.source).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown task source '{}'", row.source))
            })?,
            creator_id: row.creator_id,
            department_id: row.department_id,
            project_id: row.project_id,
            due_date: row.due_date,
            completion_date: row.completion_date,
            tags: row.tags,
            confidence_score: row.confidence_score,
            metadata: row.metadata,
            is_recurring: row.is_recurring,
            recurrence_pattern,
            next_occurrence: row.next_occurrence,
            skip_dates: row.skip_dates,
            recurrence_end_date: row.recurrence_end_date,
            recurrence_count: row.recurrence_count,
            generated_count: row.generated_count,
            recurrence_parent_id: row.recurrence_parent_id,
            assignees: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
