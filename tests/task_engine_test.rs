//! Task engine behavior against in-memory ports: creation contracts,
//! scope invariance, the completion-date law, and pagination.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use common::{
    actor_for, make_user, InMemoryDepartmentRepository, InMemoryProjectRepository,
    InMemoryTaskRepository, InMemoryUserRepository,
};
use taskdesk::domain::models::{
    Department, Frequency, Project, RecurrencePattern, Role, TaskSortKey, TaskStatus, User,
};
use taskdesk::domain::ports::{TaskFilter, TaskPage};
use taskdesk::services::authorization::task_scope;
use taskdesk::services::task_service::{CreateTaskInput, ListTasksInput, UpdateTaskInput};
use taskdesk::services::TaskService;

struct Fixture {
    service: TaskService,
    tasks: Arc<InMemoryTaskRepository>,
    users: Arc<InMemoryUserRepository>,
    departments: Arc<InMemoryDepartmentRepository>,
    projects: Arc<InMemoryProjectRepository>,
}

fn fixture() -> Fixture {
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let departments = Arc::new(InMemoryDepartmentRepository::new());
    let projects = Arc::new(InMemoryProjectRepository::new());
    let service = TaskService::new(
        tasks.clone(),
        users.clone(),
        projects.clone(),
        departments.clone(),
    );
    Fixture {
        service,
        tasks,
        users,
        departments,
        projects,
    }
}

impl Fixture {
    fn seed_user(&self, user: &User) {
        self.users.seed(user);
        self.tasks.know_user(user);
    }

    fn seed_department(&self) -> Department {
        let department = Department::new(format!("dept-{}", Uuid::new_v4()));
        self.departments.seed(&department);
        department
    }
}

fn list_all() -> ListTasksInput {
    ListTasksInput {
        filter: TaskFilter::default(),
        page: TaskPage {
            per_page: 100,
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn create_applies_spec_defaults() {
    let fx = fixture();
    let department = fx.seed_department();
    let mut member = make_user("alice", Role::Member, Some(department.id));
    member.department_id = Some(department.id);
    fx.seed_user(&member);
    let actor = actor_for(&member);

    let task = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "Write launch notes".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.priority.as_str(), "medium");
    assert_eq!(task.source.as_str(), "gui");
    assert_eq!(task.creator_id, member.id);
    // Department inherited from the actor.
    assert_eq!(task.department_id, Some(department.id));
    assert!(task.completion_date.is_none());
    // External ids come from the sequence as task-NNNNNN.
    assert!(task.external_id.starts_with("task-"));
    assert_eq!(task.external_id.len(), 11);
}

#[tokio::test]
async fn viewer_cannot_create() {
    let fx = fixture();
    let viewer = make_user("vera", Role::Viewer, None);
    fx.seed_user(&viewer);

    let err = fx
        .service
        .create(
            &actor_for(&viewer),
            CreateTaskInput {
                title: "nope".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");
}

#[tokio::test]
async fn out_of_enum_values_are_validation_errors() {
    let fx = fixture();
    let member = make_user("bob", Role::Member, None);
    fx.seed_user(&member);
    let actor = actor_for(&member);

    let err = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "t".into(),
                status: Some("someday".into()),
                priority: Some("asap".into()),
                source: Some("carrier-pigeon".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    let details = err.details().unwrap();
    let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
    assert!(fields.contains(&"status"));
    assert!(fields.contains(&"priority"));
    assert!(fields.contains(&"source"));

    let err = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_assignee_is_not_found() {
    let fx = fixture();
    let member = make_user("carol", Role::Member, None);
    fx.seed_user(&member);

    let err = fx
        .service
        .create(
            &actor_for(&member),
            CreateTaskInput {
                title: "t".into(),
                assignee_ids: vec![Uuid::new_v4()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn completion_date_tracks_done_through_updates() {
    let fx = fixture();
    let member = make_user("dave", Role::Member, None);
    fx.seed_user(&member);
    let actor = actor_for(&member);

    let task = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "finishable".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let done = fx
        .service
        .update_status(&actor, task.id, "done")
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert!(done.completion_date.is_some());

    let reopened = fx
        .service
        .update(
            &actor,
            task.id,
            UpdateTaskInput {
                status: Some("in_progress".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reopened.status, TaskStatus::InProgress);
    assert!(reopened.completion_date.is_none());
}

#[tokio::test]
async fn assignee_replacement_swaps_the_full_set() {
    let fx = fixture();
    let member = make_user("erin", Role::Member, None);
    let first = make_user("frank", Role::Member, None);
    let second = make_user("grace", Role::Member, None);
    for user in [&member, &first, &second] {
        fx.seed_user(user);
    }
    let actor = actor_for(&member);

    let task = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "shared".into(),
                assignee_ids: vec![first.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(task.is_assigned_to(first.id));

    let updated = fx
        .service
        .update(
            &actor,
            task.id,
            UpdateTaskInput {
                assignee_ids: Some(vec![second.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_assigned_to(first.id));
    assert!(updated.is_assigned_to(second.id));
}

/// Property: for any actor, the scoped listing equals the admin
/// baseline filtered by that actor's scope predicate.
#[tokio::test]
async fn scope_invariance_against_admin_baseline() {
    let fx = fixture();
    let dept_a = fx.seed_department();
    let dept_b = fx.seed_department();

    let admin = make_user("root", Role::Admin, None);
    let manager_a = make_user("mona", Role::Manager, Some(dept_a.id));
    let member_a = make_user("mia", Role::Member, Some(dept_a.id));
    let member_b = make_user("ben", Role::Member, Some(dept_b.id));
    let viewer_b = make_user("vic", Role::Viewer, Some(dept_b.id));
    for user in [&admin, &manager_a, &member_a, &member_b, &viewer_b] {
        fx.seed_user(user);
    }

    // A spread of tasks: both departments, cross-department creators,
    // one assignment reaching across departments.
    for (title, creator, dept, assignees) in [
        ("a1", &member_a, Some(dept_a.id), vec![]),
        ("a2", &manager_a, Some(dept_a.id), vec![member_a.id]),
        ("b1", &member_b, Some(dept_b.id), vec![]),
        ("b2", &member_b, Some(dept_b.id), vec![member_a.id]),
        ("loose", &admin, None, vec![]),
    ] {
        fx.service
            .create(
                &actor_for(creator),
                CreateTaskInput {
                    title: title.into(),
                    department_id: dept,
                    assignee_ids: assignees,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let (baseline, _) = fx
        .service
        .list(&actor_for(&admin), list_all())
        .await
        .unwrap();
    assert_eq!(baseline.len(), 5);

    for user in [&manager_a, &member_a, &member_b, &viewer_b] {
        let actor = actor_for(user);
        let (scoped, total) = fx.service.list(&actor, list_all()).await.unwrap();
        let scope = task_scope(&actor);
        let mut expected: Vec<Uuid> = baseline
            .iter()
            .filter(|t| scope.allows(t))
            .map(|t| t.id)
            .collect();
        let mut actual: Vec<Uuid> = scoped.iter().map(|t| t.id).collect();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected, "scope mismatch for {}", user.name);
        assert_eq!(total as usize, actual.len());
    }
}

/// S5: a manager's unfiltered listing contains only their department.
#[tokio::test]
async fn manager_listing_stays_inside_department() {
    let fx = fixture();
    let dept_a = fx.seed_department();
    let dept_b = fx.seed_department();
    let manager = make_user("mira", Role::Manager, Some(dept_a.id));
    let other = make_user("omar", Role::Member, Some(dept_b.id));
    fx.seed_user(&manager);
    fx.seed_user(&other);

    fx.service
        .create(
            &actor_for(&manager),
            CreateTaskInput {
                title: "ours".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fx.service
        .create(
            &actor_for(&other),
            CreateTaskInput {
                title: "theirs".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (tasks, total) = fx
        .service
        .list(&actor_for(&manager), list_all())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert!(tasks.iter().all(|t| t.department_id == Some(dept_a.id)));
}

/// Property: the union over pages equals the single full page, for a
/// non-default sort.
#[tokio::test]
async fn pagination_union_equals_full_listing() {
    let fx = fixture();
    let admin = make_user("root", Role::Admin, None);
    fx.seed_user(&admin);
    let actor = actor_for(&admin);

    for i in 0..25 {
        fx.service
            .create(
                &actor,
                CreateTaskInput {
                    title: format!("task {i:02}"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let full_input = ListTasksInput {
        filter: TaskFilter::default(),
        page: TaskPage {
            per_page: 100,
            sort: TaskSortKey::Title,
            ..Default::default()
        },
    };
    let (full, total) = fx.service.list(&actor, full_input).await.unwrap();
    assert_eq!(total, 25);

    let mut collected = Vec::new();
    for page in 1..=3 {
        let input = ListTasksInput {
            filter: TaskFilter::default(),
            page: TaskPage {
                page,
                per_page: 10,
                sort: TaskSortKey::Title,
                ..Default::default()
            },
        };
        let (chunk, chunk_total) = fx.service.list(&actor, input).await.unwrap();
        assert_eq!(chunk_total, 25);
        collected.extend(chunk);
    }

    let full_ids: Vec<Uuid> = full.iter().map(|t| t.id).collect();
    let collected_ids: Vec<Uuid> = collected.iter().map(|t| t.id).collect();
    assert_eq!(full_ids, collected_ids);
}

#[tokio::test]
async fn per_page_is_clamped_to_100() {
    let fx = fixture();
    let admin = make_user("root", Role::Admin, None);
    fx.seed_user(&admin);
    let actor = actor_for(&admin);

    let input = ListTasksInput {
        filter: TaskFilter::default(),
        page: TaskPage {
            per_page: 10_000,
            ..Default::default()
        },
    };
    // Clamping happens in the service; the repository sees <= 100.
    let (tasks, _) = fx.service.list(&actor, input).await.unwrap();
    assert!(tasks.len() <= 100);
}

/// Property: a task created with every field populated reads back
/// field-for-field.
#[tokio::test]
async fn full_round_trip_preserves_fields() {
    let fx = fixture();
    let department = fx.seed_department();
    let admin = make_user("root", Role::Admin, Some(department.id));
    let assignee = make_user("zoe", Role::Member, Some(department.id));
    fx.seed_user(&admin);
    fx.seed_user(&assignee);
    let project = Project::new("Q4");
    fx.projects.seed(&project);
    let actor = actor_for(&admin);

    let due = Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap();
    let created = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "Everything set".into(),
                description: Some("long form".into()),
                status: Some("in_review".into()),
                priority: Some("urgent".into()),
                source: Some("api".into()),
                department_id: Some(department.id),
                project_id: Some(project.id),
                due_date: Some(due),
                tags: vec!["ops".into(), "q4".into()],
                assignee_ids: vec![assignee.id],
                confidence_score: None,
                metadata: Some(serde_json::json!({"origin": "test"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fetched = fx.service.get(&actor, created.id).await.unwrap();
    assert_eq!(fetched.title, "Everything set");
    assert_eq!(fetched.description, "long form");
    assert_eq!(fetched.status, TaskStatus::InReview);
    assert_eq!(fetched.priority.as_str(), "urgent");
    assert_eq!(fetched.source.as_str(), "api");
    assert_eq!(fetched.department_id, Some(department.id));
    assert_eq!(fetched.project_id, Some(project.id));
    assert_eq!(fetched.due_date, Some(due));
    assert_eq!(fetched.tags, vec!["ops".to_string(), "q4".to_string()]);
    assert_eq!(fetched.metadata["origin"], "test");
    assert!(fetched.is_assigned_to(assignee.id));
    assert_eq!(fetched.external_id, created.external_id);
}

#[tokio::test]
async fn recurring_template_requires_and_seeds_pattern() {
    let fx = fixture();
    let member = make_user("rita", Role::Member, None);
    fx.seed_user(&member);
    let actor = actor_for(&member);

    let err = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "broken template".into(),
                is_recurring: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let due = Utc.with_ymd_and_hms(2025, 10, 15, 10, 0, 0).unwrap();
    let template = fx
        .service
        .create(
            &actor,
            CreateTaskInput {
                title: "daily standup".into(),
                due_date: Some(due),
                is_recurring: true,
                recurrence_pattern: Some(RecurrencePattern {
                    frequency: Frequency::Daily,
                    interval: 1,
                    days_of_week: None,
                    day_of_month: None,
                    month_of_year: None,
                    count: Some(10),
                    until: None,
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(template.is_recurring);
    assert_eq!(template.next_occurrence, Some(due));
    assert_eq!(template.recurrence_count, Some(10));
    assert_eq!(template.generated_count, 0);
}

#[tokio::test]
async fn delete_is_gated_to_admin_or_creator() {
    let fx = fixture();
    let manager = make_user("max", Role::Manager, None);
    let admin = make_user("root", Role::Admin, None);
    let member = make_user("sam", Role::Member, None);
    for user in [&manager, &admin, &member] {
        fx.seed_user(user);
    }

    let task = fx
        .service
        .create(
            &actor_for(&manager),
            CreateTaskInput {
                title: "manager's".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A member never holds tasks.delete.
    let err = fx
        .service
        .delete(&actor_for(&member), task.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");

    // The creator (manager) may delete their own task.
    fx.service
        .delete(&actor_for(&manager), task.id)
        .await
        .unwrap();

    // And admin may delete anything.
    let other = fx
        .service
        .create(
            &actor_for(&manager),
            CreateTaskInput {
                title: "another".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fx.service
        .delete(&actor_for(&admin), other.id)
        .await
        .unwrap();
}
