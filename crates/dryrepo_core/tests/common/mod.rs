#![allow(dead_code)]

use dryrepo_core::db::open_db_in_memory;
use dryrepo_core::{
    pluck_fn, select_all, Crud, Entity, Predicate, QueryOpts, RepoError, RepoResult,
    SqliteRepository, Store,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::Serialize;

pub const SCHEMA: &str = "
CREATE TABLE teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER REFERENCES teams(id),
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    role TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);
CREATE TABLE memberships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER NOT NULL REFERENCES teams(id),
    user_id INTEGER NOT NULL,
    UNIQUE (team_id, user_id)
);
";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub team_id: Option<i64>,
    pub name: String,
    pub age: i64,
    pub role: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            id: 0,
            team_id: None,
            name: name.to_string(),
            age,
            role: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn in_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "team_id",
        "name",
        "age",
        "role",
        "created_at",
        "updated_at",
    ];
    const UPDATED_AT: Option<&'static str> = Some("updated_at");

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            team_id: row.get(1)?,
            name: row.get(2)?,
            age: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("team_id", self.team_id.into()),
            ("name", self.name.clone().into()),
            ("age", self.age.into()),
            ("role", self.role.clone().into()),
        ]
    }

    fn key(&self) -> Value {
        Value::Integer(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub members: Vec<User>,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            members: Vec::new(),
        }
    }
}

impl Entity for Team {
    const TABLE: &'static str = "teams";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["id", "name"];

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            members: Vec::new(),
        })
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("name", self.name.clone().into())]
    }

    fn key(&self) -> Value {
        Value::Integer(self.id)
    }

    fn preload<S: Store>(store: &S, records: &mut [Self], relation: &str) -> RepoResult<()> {
        if relation != "members" {
            return Err(RepoError::configuration(format!(
                "unknown relation `{relation}` for `teams`"
            )));
        }

        let team_ids = pluck_fn(records, select_all(|team: &Team| team.id));
        let members: Vec<User> = store.query(
            &Predicate::all().include_in("team_id", team_ids),
            &QueryOpts::default(),
            None,
        )?;
        for team in records.iter_mut() {
            team.members = members
                .iter()
                .filter(|user| user.team_id == Some(team.id))
                .cloned()
                .collect();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub id: i64,
    pub team_id: i64,
    pub user_id: i64,
}

impl Membership {
    pub fn new(team_id: i64, user_id: i64) -> Self {
        Self {
            id: 0,
            team_id,
            user_id,
        }
    }
}

impl Entity for Membership {
    const TABLE: &'static str = "memberships";
    const KEY: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["id", "team_id", "user_id"];

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            team_id: row.get(1)?,
            user_id: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("team_id", self.team_id.into()),
            ("user_id", self.user_id.into()),
        ]
    }

    fn key(&self) -> Value {
        Value::Integer(self.id)
    }
}

pub fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
}

/// Creates users `user1..=userN` with ages 21, 22, ... in id order.
pub fn seed_users(repo: &SqliteRepository<'_, User>, count: i64) -> Vec<User> {
    let mut users: Vec<User> = (1..=count)
        .map(|n| User::new(&format!("user{n}"), 20 + n))
        .collect();
    repo.create(&mut users).unwrap();
    users
}

pub fn names(users: &[User]) -> Vec<&str> {
    users.iter().map(|user| user.name.as_str()).collect()
}
