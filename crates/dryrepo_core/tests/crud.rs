mod common;

use common::{names, seed_users, setup, Team, User};
use dryrepo_core::{
    Crud, FieldValues, ListResult, Predicate, QueryOpt, RepoError, SqliteRepository,
};
use std::fmt::{Display, Formatter};

#[derive(Debug)]
struct UserRequired;

impl Display for UserRequired {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "user is required")
    }
}

impl std::error::Error for UserRequired {}

#[test]
fn create_back_fills_generated_columns() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);

    let mut users = vec![User::new("ada", 36)];
    repo.create(&mut users).unwrap();

    let created = &users[0];
    assert!(created.id > 0);
    assert!(created.created_at > 0);
    assert_eq!(created.updated_at, created.created_at);

    let loaded = repo
        .get(&Predicate::new([("id", created.id)]), &[])
        .unwrap()
        .unwrap();
    assert_eq!(&loaded, created);
}

#[test]
fn create_many_assigns_distinct_keys_in_order() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);

    let users = seed_users(&repo, 3);
    assert!(users[0].id < users[1].id && users[1].id < users[2].id);
    assert_eq!(repo.count(&Predicate::all()).unwrap(), 3);
}

#[test]
fn create_with_no_records_is_a_noop() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);

    repo.create(&mut []).unwrap();
    assert_eq!(repo.count(&Predicate::all()).unwrap(), 0);
}

#[test]
fn get_returns_first_match_by_key_unless_ordered() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 3);

    let first = repo.get(&Predicate::all(), &[]).unwrap().unwrap();
    assert_eq!(first.name, "user1");

    let oldest = repo
        .get(&Predicate::all(), &[QueryOpt::order_by(["age DESC"])])
        .unwrap()
        .unwrap();
    assert_eq!(oldest.name, "user3");
}

#[test]
fn get_missing_record_is_not_found() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);

    let err = repo.get(&Predicate::new([("id", 404_i64)]), &[]).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "users not found");
}

#[test]
fn suppressed_not_found_is_swallowed_or_mapped() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    let missing = Predicate::new([("id", 404_i64)]);

    let swallowed = repo
        .get(&missing, &[QueryOpt::suppress_not_found(|_| None)])
        .unwrap();
    assert!(swallowed.is_none());

    let err = repo
        .get(
            &missing,
            &[QueryOpt::suppress_not_found(|_| {
                Some(RepoError::domain(UserRequired))
            })],
        )
        .unwrap_err();
    match err {
        RepoError::Domain(inner) => assert!(inner.downcast_ref::<UserRequired>().is_some()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn list_paginates_and_reports_page_metadata() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 5);

    let page = repo
        .list(&Predicate::all(), &[QueryOpt::pagination(2, 2)])
        .unwrap();
    assert_eq!(names(&page.items), ["user3", "user4"]);
    assert_eq!(page.total, 5);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 2);
    assert_eq!(page.page_count, 3);

    let last = repo
        .list(&Predicate::all(), &[QueryOpt::pagination(3, 2)])
        .unwrap();
    assert_eq!(names(&last.items), ["user5"]);

    let beyond = repo
        .list(&Predicate::all(), &[QueryOpt::pagination(9, 2)])
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 5);
}

#[test]
fn list_without_pagination_is_a_single_page() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);

    let empty = repo.list(&Predicate::all(), &[]).unwrap();
    assert_eq!(
        empty,
        ListResult {
            items: Vec::new(),
            total: 0,
            page_size: 0,
            page_count: 0,
            page: 1,
        }
    );

    seed_users(&repo, 3);
    let all = repo
        .list(&Predicate::all(), &[QueryOpt::order_by(["age desc"])])
        .unwrap();
    assert_eq!(names(&all.items), ["user3", "user2", "user1"]);
    assert_eq!(all.total, 3);
    assert_eq!(all.page_size, 3);
    assert_eq!(all.page_count, 1);
}

#[test]
fn exclusions_keep_rows_with_null_fields() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    let mut users = vec![
        User::new("admin", 30).with_role("admin"),
        User::new("guest", 31).with_role("guest"),
        User::new("nobody", 32),
    ];
    repo.create(&mut users).unwrap();

    let not_guest = repo
        .list(&Predicate::all().not_equals("role", "guest".to_string()), &[])
        .unwrap();
    assert_eq!(names(&not_guest.items), ["admin", "nobody"]);

    let filtered = repo
        .list(
            &Predicate::all()
                .include_in("age", [30_i64, 31, 32])
                .exclude_in("role", ["admin".to_string(), "guest".to_string()]),
            &[],
        )
        .unwrap();
    assert_eq!(names(&filtered.items), ["nobody"]);

    let no_role = repo
        .list(&Predicate::new([("role", rusqlite::types::Value::Null)]), &[])
        .unwrap();
    assert_eq!(names(&no_role.items), ["nobody"]);
}

#[test]
fn include_and_exclude_on_the_same_field_both_apply() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 3);

    let predicate = Predicate::all()
        .include_in("name", ["user1".to_string(), "user2".to_string()])
        .not_equals("name", "user2".to_string());
    let result = repo.list(&predicate, &[]).unwrap();
    assert_eq!(names(&result.items), ["user1"]);
}

#[test]
fn update_sets_fields_on_matching_rows_only() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    let users = seed_users(&repo, 3);

    repo.update(
        &Predicate::all().include_in("id", [users[0].id, users[1].id]),
        &FieldValues::new().set("role", "member".to_string()),
    )
    .unwrap();

    let members = repo
        .list(&Predicate::new([("role", "member".to_string())]), &[])
        .unwrap();
    assert_eq!(names(&members.items), ["user1", "user2"]);

    let untouched = repo
        .get(&Predicate::new([("id", users[2].id)]), &[])
        .unwrap()
        .unwrap();
    assert_eq!(untouched.role, None);
    assert!(untouched.updated_at >= users[2].updated_at);
}

#[test]
fn update_with_no_fields_changes_nothing() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    let users = seed_users(&repo, 1);

    repo.update(&Predicate::new([("id", users[0].id)]), &FieldValues::new())
        .unwrap();
    let loaded = repo.get(&Predicate::all(), &[]).unwrap().unwrap();
    assert_eq!(loaded, users[0]);
}

#[test]
fn unscoped_writes_are_rejected() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 2);

    let err = repo
        .update(&Predicate::all(), &FieldValues::new().set("age", 1_i64))
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));

    let err = repo.delete(&Predicate::all(), &[]).unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
    assert_eq!(repo.count(&Predicate::all()).unwrap(), 2);
}

#[test]
fn delete_removes_matches_and_reports_misses() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    let users = seed_users(&repo, 3);
    let first = Predicate::new([("id", users[0].id)]);

    repo.delete(&first, &[]).unwrap();
    assert_eq!(repo.count(&Predicate::all()).unwrap(), 2);

    let err = repo.delete(&first, &[]).unwrap_err();
    assert!(err.is_not_found());

    repo.delete(&first, &[QueryOpt::suppress_not_found(|_| None)])
        .unwrap();
}

#[test]
fn invalid_identifiers_and_order_clauses_fail_before_querying() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);

    let err = repo
        .list(&Predicate::all(), &[QueryOpt::order_by(["age; DROP TABLE users"])])
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));

    let err = repo
        .list(&Predicate::new([("name OR 1=1", 1_i64)]), &[])
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
}

#[test]
fn unknown_columns_are_configuration_errors() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 2);

    let err = repo
        .list(&Predicate::new([("nickname", "ada".to_string())]), &[])
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));

    let err = repo
        .get(&Predicate::all(), &[QueryOpt::order_by(["nickame DESC"])])
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
}

#[test]
fn misspelled_exclude_field_on_delete_removes_nothing() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 3);

    let err = repo
        .delete(&Predicate::all().not_equals("nickname", "x".to_string()), &[])
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
    assert_eq!(repo.count(&Predicate::all()).unwrap(), 3);
}

#[test]
fn misspelled_include_field_on_update_changes_nothing() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    let users = seed_users(&repo, 3);

    let err = repo
        .update(
            &Predicate::new([("nickname", "nickname".to_string())]),
            &FieldValues::new().set("age", 0_i64),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));

    let err = repo
        .update(
            &Predicate::new([("id", users[0].id)]),
            &FieldValues::new().set("agee", 0_i64),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));

    let all = repo.list(&Predicate::all(), &[]).unwrap();
    assert_eq!(all.items, users);
}

#[test]
fn raw_connection_rejects_quoted_unknown_columns() {
    let conn = setup();
    let err = conn
        .prepare("DELETE FROM users WHERE \"nickname\" IS NOT 'x';")
        .unwrap_err();
    assert!(err.to_string().contains("nickname"));
}

#[test]
fn preload_loads_team_members() {
    let conn = setup();
    let teams = SqliteRepository::<Team>::sqlite(&conn);
    let users = SqliteRepository::<User>::sqlite(&conn);

    let mut created = vec![Team::new("core"), Team::new("infra")];
    teams.create(&mut created).unwrap();
    let (core, infra) = (created[0].id, created[1].id);

    let mut people = vec![
        User::new("ada", 36).in_team(core),
        User::new("linus", 54).in_team(infra),
        User::new("grace", 85).in_team(core),
    ];
    users.create(&mut people).unwrap();

    let listed = teams
        .list(&Predicate::all(), &[QueryOpt::preload(["members"])])
        .unwrap();
    assert_eq!(names(&listed.items[0].members), ["ada", "grace"]);
    assert_eq!(names(&listed.items[1].members), ["linus"]);

    let without = teams.get(&Predicate::new([("id", core)]), &[]).unwrap().unwrap();
    assert!(without.members.is_empty());

    let err = teams
        .get(&Predicate::all(), &[QueryOpt::preload(["owners"])])
        .unwrap_err();
    assert!(matches!(err, RepoError::Configuration(_)));
}

#[test]
fn list_result_serializes_with_metadata() {
    let conn = setup();
    let repo = SqliteRepository::<User>::sqlite(&conn);
    seed_users(&repo, 3);

    let page = repo
        .list(&Predicate::all(), &[QueryOpt::pagination(1, 2)])
        .unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["total"], 3);
    assert_eq!(json["page_count"], 2);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["items"][0]["name"], "user1");
}
