//! In-memory port implementations and fixtures for service-level tests.
//!
//! These mirror the SQL semantics closely enough that the scope and
//! pagination properties can be checked without a live database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use taskdesk::domain::errors::{DomainError, DomainResult};
use taskdesk::domain::models::{
    Actor, Department, MailIntegration, MailProcessingLog, MailProvider, Project, ProjectScope,
    Role, Session, SortOrder, Task, TaskAssignee, TaskScope, TaskSortKey, User, UserScope,
};
use taskdesk::domain::ports::{
    DepartmentRepository, MailIngestOutcome, MailIntegrationRepository, ProjectFilter,
    ProjectRepository, SessionRepository, TaskFilter, TaskPage, TaskRepository, UserRepository,
};
use taskdesk::services::authorization::role_permissions;

pub fn actor_for(user: &User) -> Actor {
    Actor {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
        department_id: user.department_id,
        permissions: role_permissions(user.role)
            .iter()
            .map(|p| p.to_string())
            .collect(),
    }
}

pub fn make_user(name: &str, role: Role, department_id: Option<Uuid>) -> User {
    let mut user = User::new(format!("{name}@example.com"), name, role);
    user.department_id = department_id;
    user
}

// ---------------------------------------------------------------------------
// Tasks

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<Uuid, Task>>,
    assignees: Mutex<HashMap<Uuid, Vec<TaskAssignee>>>,
    users: Mutex<HashMap<Uuid, (String, String)>>,
    next_external: AtomicU32,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self {
            next_external: AtomicU32::new(1),
            ..Default::default()
        }
    }

    /// Register display fields used when materializing assignee rows.
    pub fn know_user(&self, user: &User) {
        self.users
            .lock()
            .unwrap()
            .insert(user.id, (user.name.clone(), user.email.clone()));
    }

    fn with_assignees(&self, mut task: Task) -> Task {
        task.assignees = self
            .assignees
            .lock()
            .unwrap()
            .get(&task.id)
            .cloned()
            .unwrap_or_default();
        task
    }

    fn assignee_row(&self, user_id: Uuid) -> TaskAssignee {
        let users = self.users.lock().unwrap();
        let (name, email) = users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| ("unknown".into(), "unknown@example.com".into()));
        TaskAssignee {
            user_id,
            name,
            email,
            assigned_at: Utc::now(),
        }
    }

    fn matches(task: &Task, filter: &TaskFilter) -> bool {
        if !filter.statuses.is_empty() && !filter.statuses.contains(&task.status) {
            return false;
        }
        if !filter.priorities.is_empty() && !filter.priorities.contains(&task.priority) {
            return false;
        }
        if let Some(assignee) = filter.assignee_id {
            if !task.is_assigned_to(assignee) {
                return false;
            }
        }
        if let Some(creator) = filter.creator_id {
            if task.creator_id != creator {
                return false;
            }
        }
        if let Some(dept) = filter.department_id {
            if task.department_id != Some(dept) {
                return false;
            }
        }
        if let Some(project) = filter.project_id {
            if task.project_id != Some(project) {
                return false;
            }
        }
        if let Some(is_recurring) = filter.is_recurring {
            if task.is_recurring != is_recurring {
                return false;
            }
        }
        if let Some(after) = filter.due_after {
            match task.due_date {
                Some(due) if due >= after => {}
                _ => return false,
            }
        }
        if let Some(before) = filter.due_before {
            match task.due_date {
                Some(due) if due <= before => {}
                _ => return false,
            }
        }
        if let Some(ref search) = filter.search {
            let needle = search.to_lowercase();
            if !needle.trim().is_empty()
                && !task.title.to_lowercase().contains(&needle)
                && !task.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task, assignee_ids: &[Uuid]) -> DomainResult<Task> {
        let mut stored = task.clone();
        let seq = self.next_external.fetch_add(1, Ordering::SeqCst);
        stored.external_id = format!("task-{seq:06}");
        self.tasks.lock().unwrap().insert(stored.id, stored.clone());
        let rows: Vec<TaskAssignee> = assignee_ids
            .iter()
            .map(|id| self.assignee_row(*id))
            .collect();
        self.assignees.lock().unwrap().insert(stored.id, rows);
        Ok(self.with_assignees(stored))
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let task = self.tasks.lock().unwrap().get(&id).cloned();
        Ok(task.map(|t| self.with_assignees(t)))
    }

    async fn get_by_external_id(&self, external_id: &str) -> DomainResult<Option<Task>> {
        let task = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .find(|t| t.external_id == external_id)
            .cloned();
        Ok(task.map(|t| self.with_assignees(t)))
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let entry = tasks
            .get_mut(&task.id)
            .ok_or(DomainError::TaskNotFound(task.id))?;
        let mut updated = task.clone();
        updated.assignees = Vec::new();
        *entry = updated;
        Ok(())
    }

    async fn replace_assignees(&self, task_id: Uuid, assignee_ids: &[Uuid]) -> DomainResult<()> {
        let rows: Vec<TaskAssignee> = assignee_ids
            .iter()
            .map(|id| self.assignee_row(*id))
            .collect();
        self.assignees.lock().unwrap().insert(task_id, rows);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.tasks
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(DomainError::TaskNotFound(id))?;
        self.assignees.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        scope: &TaskScope,
        page: &TaskPage,
    ) -> DomainResult<(Vec<Task>, u64)> {
        let all: Vec<Task> = {
            let tasks = self.tasks.lock().unwrap();
            tasks.values().cloned().collect()
        };
        let mut visible: Vec<Task> = all
            .into_iter()
            .map(|t| self.with_assignees(t))
            .filter(|t| scope.allows(t))
            .filter(|t| Self::matches(t, filter))
            .collect();

        visible.sort_by(|a, b| {
            let ordering = match page.sort {
                TaskSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                TaskSortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                TaskSortKey::DueDate => a.due_date.cmp(&b.due_date),
                TaskSortKey::Priority => a.priority.cmp(&b.priority),
                TaskSortKey::Status => a.status.as_str().cmp(b.status.as_str()),
                TaskSortKey::Title => a.title.cmp(&b.title),
            };
            let tie = ordering.then(a.id.cmp(&b.id));
            match page.order {
                SortOrder::Asc => tie,
                SortOrder::Desc => tie.reverse(),
            }
        });

        let total = visible.len() as u64;
        let start = (page.offset() as usize).min(visible.len());
        let end = (start + page.per_page as usize).min(visible.len());
        Ok((visible[start..end].to_vec(), total))
    }

    async fn count_by_project(&self, project_id: Uuid) -> DomainResult<u64> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.project_id == Some(project_id))
            .count() as u64)
    }

    async fn count_by_department(&self, department_id: Uuid) -> DomainResult<u64> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.department_id == Some(department_id))
            .count() as u64)
    }
}

// ---------------------------------------------------------------------------
// Users

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user: &User) {
        self.users.lock().unwrap().insert(user.id, user.clone());
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> DomainResult<()> {
        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DomainError::Conflict("duplicate email".into()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_oidc_subject(&self, subject: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.oidc_subject.as_deref() == Some(subject))
            .cloned())
    }

    async fn update(&self, user: &User) -> DomainResult<()> {
        let mut users = self.users.lock().unwrap();
        let entry = users
            .get_mut(&user.id)
            .ok_or(DomainError::UserNotFound(user.id))?;
        *entry = user.clone();
        Ok(())
    }

    async fn deactivate(&self, id: Uuid) -> DomainResult<()> {
        let mut users = self.users.lock().unwrap();
        let entry = users.get_mut(&id).ok_or(DomainError::UserNotFound(id))?;
        entry.is_active = false;
        Ok(())
    }

    async fn list(&self, scope: &UserScope, page: &TaskPage) -> DomainResult<(Vec<User>, u64)> {
        let mut visible: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| scope.allows(u))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = visible.len() as u64;
        let start = (page.offset() as usize).min(visible.len());
        let end = (start + page.per_page as usize).min(visible.len());
        Ok((visible[start..end].to_vec(), total))
    }

    async fn count_by_department(&self, department_id: Uuid) -> DomainResult<u64> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.department_id == Some(department_id))
            .count() as u64)
    }

    async fn any_exists(&self) -> DomainResult<bool> {
        Ok(!self.users.lock().unwrap().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Departments

#[derive(Default)]
pub struct InMemoryDepartmentRepository {
    departments: Mutex<HashMap<Uuid, Department>>,
}

impl InMemoryDepartmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, department: &Department) {
        self.departments
            .lock()
            .unwrap()
            .insert(department.id, department.clone());
    }
}

#[async_trait]
impl DepartmentRepository for InMemoryDepartmentRepository {
    async fn create(&self, department: &Department) -> DomainResult<()> {
        self.departments
            .lock()
            .unwrap()
            .insert(department.id, department.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Department>> {
        Ok(self.departments.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Department>> {
        Ok(self
            .departments
            .lock()
            .unwrap()
            .values()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn update(&self, department: &Department) -> DomainResult<()> {
        let mut departments = self.departments.lock().unwrap();
        let entry = departments
            .get_mut(&department.id)
            .ok_or(DomainError::DepartmentNotFound(department.id))?;
        *entry = department.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.departments
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(DomainError::DepartmentNotFound(id))?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Department>> {
        let mut all: Vec<Department> =
            self.departments.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// Projects

#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: Mutex<HashMap<Uuid, Project>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, project: &Project) {
        self.projects
            .lock()
            .unwrap()
            .insert(project.id, project.clone());
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn create(&self, project: &Project) -> DomainResult<()> {
        self.projects
            .lock()
            .unwrap()
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>> {
        Ok(self.projects.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, project: &Project) -> DomainResult<()> {
        let mut projects = self.projects.lock().unwrap();
        let entry = projects
            .get_mut(&project.id)
            .ok_or(DomainError::ProjectNotFound(project.id))?;
        *entry = project.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.projects
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(DomainError::ProjectNotFound(id))?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        scope: &ProjectScope,
        page: &TaskPage,
    ) -> DomainResult<(Vec<Project>, u64)> {
        let mut visible: Vec<Project> = self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| scope.allows(p))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                filter
                    .department_id
                    .map_or(true, |d| p.department_id == Some(d))
            })
            .filter(|p| filter.owner_id.map_or(true, |o| p.owner_id == Some(o)))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = visible.len() as u64;
        let start = (page.offset() as usize).min(visible.len());
        let end = (start + page.per_page as usize).min(visible.len());
        Ok((visible[start..end].to_vec(), total))
    }
}

// ---------------------------------------------------------------------------
// Sessions

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| !s.revoked)
            .count()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> DomainResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_by_token_hash(&self, hash: &str) -> DomainResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.refresh_token_hash == hash)
            .cloned())
    }

    async fn revoke(&self, id: Uuid) -> DomainResult<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&id) {
            session.revoked = true;
        }
        Ok(())
    }

    async fn revoke_for_user(&self, user_id: Uuid) -> DomainResult<u64> {
        let mut count = 0;
        for session in self.sessions.lock().unwrap().values_mut() {
            if session.user_id == user_id && !session.revoked {
                session.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired(&self) -> DomainResult<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Mail integrations

#[derive(Default)]
pub struct InMemoryMailRepository {
    pub integrations: Mutex<HashMap<Uuid, MailIntegration>>,
    pub logs: Mutex<Vec<MailProcessingLog>>,
    pub tasks: Mutex<Vec<Task>>,
    /// When set, log/task writes fail like a dropped connection.
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl InMemoryMailRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, integration: &MailIntegration) {
        self.integrations
            .lock()
            .unwrap()
            .insert(integration.id, integration.clone());
    }

    pub fn created_task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn log_count(&self) -> usize {
        self.logs.lock().unwrap().len()
    }
}

#[async_trait]
impl MailIntegrationRepository for InMemoryMailRepository {
    async fn upsert(&self, integration: &MailIntegration) -> DomainResult<()> {
        let mut integrations = self.integrations.lock().unwrap();
        integrations.retain(|_, existing| {
            !(existing.user_id == integration.user_id
                && existing.provider == integration.provider
                && existing.id != integration.id)
        });
        integrations.insert(integration.id, integration.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<MailIntegration>> {
        Ok(self.integrations.lock().unwrap().get(&id).cloned())
    }

    async fn get_for_user(
        &self,
        user_id: Uuid,
        provider: MailProvider,
    ) -> DomainResult<Option<MailIntegration>> {
        Ok(self
            .integrations
            .lock()
            .unwrap()
            .values()
            .find(|i| i.user_id == user_id && i.provider == provider)
            .cloned())
    }

    async fn update(&self, integration: &MailIntegration) -> DomainResult<()> {
        let mut integrations = self.integrations.lock().unwrap();
        let entry = integrations
            .get_mut(&integration.id)
            .ok_or_else(|| DomainError::IntegrationNotFound(integration.id.to_string()))?;
        *entry = integration.clone();
        Ok(())
    }

    async fn list_syncable(&self) -> DomainResult<Vec<MailIntegration>> {
        use taskdesk::domain::models::IntegrationStatus;
        let mut rows: Vec<MailIntegration> = self
            .integrations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.sync_enabled && i.status == IntegrationStatus::Connected)
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.last_sync_at);
        Ok(rows)
    }

    async fn is_processed(&self, integration_id: Uuid, message_id: &str) -> DomainResult<bool> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.integration_id == integration_id && l.message_id == message_id))
    }

    async fn record_log(&self, log: &MailProcessingLog) -> DomainResult<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("connection reset".into()));
        }
        // Single lock held across check+insert mirrors the unique
        // constraint's atomicity.
        let mut logs = self.logs.lock().unwrap();
        if logs
            .iter()
            .any(|l| l.integration_id == log.integration_id && l.message_id == log.message_id)
        {
            return Ok(false);
        }
        logs.push(log.clone());
        Ok(true)
    }

    async fn create_task_with_log(
        &self,
        task: &Task,
        _assignee_ids: &[Uuid],
        log: &MailProcessingLog,
    ) -> DomainResult<MailIngestOutcome> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("connection reset".into()));
        }
        let mut logs = self.logs.lock().unwrap();
        if logs
            .iter()
            .any(|l| l.integration_id == log.integration_id && l.message_id == log.message_id)
        {
            return Ok(MailIngestOutcome::Duplicate);
        }
        logs.push(log.clone());
        let mut stored = task.clone();
        stored.external_id = format!("task-{:06}", logs.len());
        self.tasks.lock().unwrap().push(stored.clone());
        Ok(MailIngestOutcome::Created(stored))
    }

    async fn list_logs(
        &self,
        integration_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<MailProcessingLog>> {
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|l| l.integration_id == integration_id)
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
