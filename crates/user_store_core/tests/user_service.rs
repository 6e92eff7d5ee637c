use rusqlite::types::Value;
use rusqlite::Connection;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use user_store_core::db::open_db_in_memory;
use user_store_core::{
    BoundQuery, CreateUserRequest, PersistenceGateway, ServiceError, SqliteGateway,
    SqliteUserRepository, StorageError, StorageResult, UpdateUserRequest, User, UserId,
    UserQuery, UserRepository, UserService,
};

type SqliteService<'conn> = UserService<SqliteGateway<'conn>, SqliteUserRepository<'conn>>;

fn sqlite_service(conn: &Connection) -> SqliteService<'_> {
    UserService::new(
        SqliteGateway::try_new(conn).unwrap(),
        SqliteUserRepository::try_new(conn).unwrap(),
    )
}

fn create_user(service: &SqliteService<'_>, name: &str, department: &str) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    service
        .create(&CreateUserRequest::new(name, email, department, "Developer"))
        .unwrap()
}

fn transient(name: &str, department: &str, active: bool) -> User {
    let mut user = User::transient(
        &CreateUserRequest::new(
            name,
            format!("{}@bulk.example.com", name.to_lowercase()),
            department,
            "Developer",
        ),
        1_700_000_000_000,
    );
    user.active = active;
    user
}

fn ids(users: &[User]) -> HashSet<UserId> {
    users.iter().filter_map(|user| user.id).collect()
}

/// Delegates to SQLite while recording calls the service is expected to skip.
#[derive(Clone, Default)]
struct CallLog {
    merges: Rc<Cell<usize>>,
    removes: Rc<Cell<usize>>,
    raw_queries: Rc<Cell<usize>>,
}

struct ObservedGateway<'conn> {
    inner: SqliteGateway<'conn>,
    alive: bool,
    fail_removes: bool,
    calls: CallLog,
}

impl PersistenceGateway for ObservedGateway<'_> {
    fn is_alive(&self) -> bool {
        self.alive && self.inner.is_alive()
    }

    fn get(&self, id: UserId) -> StorageResult<Option<User>> {
        self.inner.get(id)
    }

    fn insert(&self, user: &mut User) -> StorageResult<()> {
        self.inner.insert(user)
    }

    fn merge(&self, user: &User) -> StorageResult<User> {
        self.calls.merges.set(self.calls.merges.get() + 1);
        self.inner.merge(user)
    }

    fn remove(&self, user: &User) -> StorageResult<()> {
        self.calls.removes.set(self.calls.removes.get() + 1);
        if self.fail_removes {
            return Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        self.inner.remove(user)
    }

    fn fetch_users(&self, query: &BoundQuery) -> StorageResult<Vec<User>> {
        self.inner.fetch_users(query)
    }

    fn fetch_scalar(&self, query: &BoundQuery) -> StorageResult<i64> {
        self.inner.fetch_scalar(query)
    }

    fn raw_query(&self, sql: &str) -> StorageResult<Vec<Value>> {
        self.calls.raw_queries.set(self.calls.raw_queries.get() + 1);
        self.inner.raw_query(sql)
    }

    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.inner.in_transaction(|_| work(self))
    }
}

fn observed_service(
    conn: &Connection,
    alive: bool,
) -> (
    UserService<ObservedGateway<'_>, SqliteUserRepository<'_>>,
    CallLog,
) {
    observed_service_with(conn, alive, false)
}

fn observed_service_with(
    conn: &Connection,
    alive: bool,
    fail_removes: bool,
) -> (
    UserService<ObservedGateway<'_>, SqliteUserRepository<'_>>,
    CallLog,
) {
    let calls = CallLog::default();
    let gateway = ObservedGateway {
        inner: SqliteGateway::try_new(conn).unwrap(),
        alive,
        fail_removes,
        calls: calls.clone(),
    };
    let service = UserService::new(gateway, SqliteUserRepository::try_new(conn).unwrap());
    (service, calls)
}

#[test]
fn liveness_check_reports_version_read_from_store() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let version: String = conn
        .query_row("SELECT sqlite_version();", [], |row| row.get(0))
        .unwrap();
    let source_id: String = conn
        .query_row("SELECT sqlite_source_id();", [], |row| row.get(0))
        .unwrap();

    let status = service.probe().unwrap();
    assert!(!version.is_empty());
    assert_eq!(
        status,
        format!("persistence context alive: SQLite {version} ({})", source_id.trim())
    );
    assert_eq!(version, rusqlite::version());
}

#[test]
fn liveness_check_fails_without_querying_when_not_alive() {
    let conn = open_db_in_memory().unwrap();
    let (service, calls) = observed_service(&conn, false);

    let err = service.probe().unwrap_err();
    assert!(matches!(err, ServiceError::ConnectionUnavailable));
    assert_eq!(calls.raw_queries.get(), 0);
}

#[test]
fn create_assigns_id_and_defaults() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);

    let request = CreateUserRequest::new("Ada", "ada@example.com", "HR", "Manager");
    let created = service.create(&request).unwrap();

    assert!(created.id.is_some());
    assert_eq!(created.name, request.name);
    assert_eq!(created.email, request.email);
    assert_eq!(created.department, request.department);
    assert_eq!(created.role, request.role);
    assert!(created.active);
    assert!(created.created_at > 0);
    assert_eq!(created.created_at, created.updated_at);
}

#[test]
fn find_by_id_returns_created_user_in_all_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);

    let created = create_user(&service, "Ada", "IT");
    let found = service.find_by_id(created.id.unwrap()).unwrap();

    assert_eq!(found, Some(created));
}

#[test]
fn find_by_id_missing_is_none_not_error() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);

    assert_eq!(service.find_by_id(999).unwrap(), None);
}

#[test]
fn create_duplicate_email_surfaces_storage_failure() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    create_user(&service, "Ada", "IT");

    let err = service
        .create(&CreateUserRequest::new("Ada", "ada@example.com", "HR", "Manager"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(StorageError::Sqlite(_))));
    assert_eq!(service.find_all().unwrap().len(), 1);
}

#[test]
fn update_overwrites_only_supplied_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let created = create_user(&service, "Integration", "IT");
    let id = created.id.unwrap();

    let updated = service
        .update(
            id,
            &UpdateUserRequest {
                name: Some("Updated Name".to_string()),
                department: Some("HR".to_string()),
                ..UpdateUserRequest::default()
            },
        )
        .unwrap();

    assert_eq!(updated.id, Some(id));
    assert_eq!(updated.name, "Updated Name");
    assert_eq!(updated.department, "HR");
    assert_eq!(updated.email, created.email);
    assert_eq!(updated.role, created.role);
    assert!(updated.active);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    assert_eq!(service.find_by_id(id).unwrap(), Some(updated));
}

#[test]
fn update_missing_id_fails_with_entity_not_found_and_skips_merge() {
    let conn = open_db_in_memory().unwrap();
    let (service, calls) = observed_service(&conn, true);

    let err = service
        .update(
            999,
            &UpdateUserRequest {
                name: Some("New Name".to_string()),
                ..UpdateUserRequest::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, ServiceError::EntityNotFound(999)));
    assert_eq!(calls.merges.get(), 0);
    assert!(service.find_all().unwrap().is_empty());
}

#[test]
fn delete_existing_returns_true_and_user_becomes_absent() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let id = create_user(&service, "Temp", "Temp").id.unwrap();

    assert!(service.delete(id).unwrap());
    assert_eq!(service.find_by_id(id).unwrap(), None);
}

#[test]
fn delete_missing_returns_false_without_remove_call() {
    let conn = open_db_in_memory().unwrap();
    let (service, calls) = observed_service(&conn, true);

    assert!(!service.delete(999).unwrap());
    assert_eq!(calls.removes.get(), 0);
}

#[test]
fn delete_storage_failure_propagates_and_keeps_user() {
    let conn = open_db_in_memory().unwrap();
    let (service, calls) = observed_service_with(&conn, true, true);
    let id = service
        .create(&CreateUserRequest::new("Kept", "kept@example.com", "IT", "Developer"))
        .unwrap()
        .id
        .unwrap();

    let err = service.delete(id).unwrap_err();

    assert!(matches!(err, ServiceError::Storage(StorageError::Sqlite(_))));
    assert_eq!(calls.removes.get(), 1);
    assert!(service.find_by_id(id).unwrap().is_some());
}

#[test]
fn find_all_returns_every_user() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    create_user(&service, "User1", "IT");
    create_user(&service, "User2", "HR");
    create_user(&service, "User3", "IT");

    assert_eq!(service.find_all().unwrap().len(), 3);
}

#[test]
fn find_by_department_matches_exactly() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let a = create_user(&service, "Alice", "IT");
    create_user(&service, "Bob", "HR");

    assert_eq!(service.find_by_department("IT").unwrap(), vec![a]);
    assert!(service.find_by_department("it").unwrap().is_empty());
    assert!(service.find_by_department("Nonexistent").unwrap().is_empty());
    assert!(service.find_by_department("").unwrap().is_empty());
}

#[test]
fn whitespace_department_matches_exactly_across_lookups() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let blank = create_user(&service, "Blank", " ");
    create_user(&service, "Empty", "IT");

    let by_department = service.find_by_department(" ").unwrap();
    let searched = service
        .search(&UserQuery {
            department: Some(" ".to_string()),
            active: None,
        })
        .unwrap();
    let counted = service.count(" ").unwrap();

    assert_eq!(by_department, vec![blank]);
    assert_eq!(by_department, searched);
    assert_eq!(counted, 1);
    assert!(service.find_by_department("  ").unwrap().is_empty());
}

#[test]
fn search_with_empty_filter_matches_find_all() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    create_user(&service, "Alice", "IT");
    create_user(&service, "Bob", "HR");
    service
        .transfer(vec![transient("Carol", "IT", false)])
        .unwrap();

    let searched = service.search(&UserQuery::default()).unwrap();
    let all = service.find_all().unwrap();
    assert_eq!(searched.len(), 3);
    assert_eq!(ids(&searched), ids(&all));
}

#[test]
fn search_by_department_and_active_returns_exact_subset() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    service
        .transfer(vec![
            transient("Inactive", "IT", false),
            transient("Hr", "HR", true),
        ])
        .unwrap();
    let first = create_user(&service, "Search1", "IT");
    let second = create_user(&service, "Search2", "IT");

    let results = service
        .search(&UserQuery {
            department: Some("IT".to_string()),
            active: Some(true),
        })
        .unwrap();

    assert_eq!(ids(&results), ids(&[first, second]));
    assert!(results
        .iter()
        .all(|user| user.department == "IT" && user.active));
}

#[test]
fn search_by_active_only_ignores_department() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    service
        .transfer(vec![
            transient("Off1", "IT", false),
            transient("Off2", "HR", false),
            transient("On", "HR", true),
        ])
        .unwrap();

    let inactive = service
        .search(&UserQuery {
            department: None,
            active: Some(false),
        })
        .unwrap();

    let names: HashSet<&str> = inactive.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, HashSet::from(["Off1", "Off2"]));
}

#[test]
fn count_includes_only_active_users_of_department() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    create_user(&service, "C1", "Sales");
    create_user(&service, "C2", "Sales");
    create_user(&service, "C3", "Sales");
    create_user(&service, "Other", "Marketing");
    service
        .transfer(vec![transient("Retired", "Sales", false)])
        .unwrap();

    assert_eq!(service.count("Sales").unwrap(), 3);
    assert_eq!(service.count("Nonexistent").unwrap(), 0);
}

#[test]
fn transfer_persists_batch_and_raises_count() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let before = service.count("Bulk").unwrap();

    let result = service
        .transfer(vec![
            transient("Bulk1", "Bulk", true),
            transient("Bulk2", "Bulk", true),
        ])
        .unwrap();

    assert!(result);
    assert_eq!(service.count("Bulk").unwrap(), before + 2);
}

#[test]
fn transfer_empty_batch_succeeds_without_changes() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    create_user(&service, "Existing", "IT");

    assert!(service.transfer(Vec::new()).unwrap());
    assert_eq!(service.find_all().unwrap().len(), 1);
}

#[test]
fn transfer_rolls_back_whole_batch_on_failure() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);

    let first = transient("Bulk1", "Bulk", true);
    let mut duplicate = transient("Bulk2", "Bulk", true);
    duplicate.email = first.email.clone();

    let err = service
        .transfer(vec![first, transient("Bulk3", "Bulk", true), duplicate])
        .unwrap_err();

    assert!(matches!(err, ServiceError::Storage(StorageError::Sqlite(_))));
    assert_eq!(service.count("Bulk").unwrap(), 0);
    assert!(service.find_all().unwrap().is_empty());
}

#[test]
fn transfer_rejects_already_persisted_user() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let existing = create_user(&service, "Existing", "IT");
    let id = existing.id.unwrap();

    let err = service
        .transfer(vec![transient("Fresh", "IT", true), existing])
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Storage(StorageError::AlreadyPersisted(existing_id)) if existing_id == id
    ));
    assert_eq!(service.find_all().unwrap().len(), 1);
}

#[test]
fn full_lifecycle_create_update_delete() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let repo = SqliteUserRepository::try_new(&conn).unwrap();

    let created = create_user(&service, "Lifecycle", "IT");
    let id = created.id.unwrap();

    let updated = service
        .update(
            id,
            &UpdateUserRequest {
                role: Some("Lead".to_string()),
                ..UpdateUserRequest::default()
            },
        )
        .unwrap();
    assert_eq!(updated.role, "Lead");

    assert!(service.delete(id).unwrap());
    assert!(!service.delete(id).unwrap());
    assert!(matches!(
        service.update(id, &UpdateUserRequest::default()),
        Err(ServiceError::EntityNotFound(missing)) if missing == id
    ));
    assert!(repo.find_all().unwrap().is_empty());
}
