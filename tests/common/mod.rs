#![allow(dead_code)]

use rusqlite::params;
use rusqlite::types::Type;
use uuid::Uuid;
use wherewith::construct::{Entity, Expr, Predicate, Query};
use wherewith::persist::Session;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["id", "first_name", "last_name", "full_name"];
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        Ok(User {
            id: Uuid::parse_str(&id)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            full_name: row.get(3)?,
        })
    }
}

pub const USERS: [(&str, &str); 19] = [
    ("Alice", "Smith"),
    ("Bob", "Johnson"),
    ("Charlie", "Williams"),
    ("Diana", "Brown"),
    ("Ethan", "Davis"),
    ("Fiona", "Clark"),
    ("George", "Miller"),
    ("Henry", "Wilson"),
    ("John", "Taylor"),
    ("Kevin", "Thomas"),
    ("Lisa", "Moore"),
    ("Nancy", "Jones"),
    ("Oliver", "Wilson"),
    ("Peter", "Thompson"),
    ("Quinn", "White"),
    ("Ryan", "Harris"),
    ("Sarah", "Martin"),
    ("Timothy", "Thompson"),
    ("Uma", "Thompson"),
];

/// An in-memory session with an empty `users` table.
pub fn empty() -> Session {
    let session = Session::in_memory().expect("session");
    session
        .execute_batch(
            "create table users (
                id text not null primary key,
                first_name text not null,
                last_name text not null,
                full_name text generated always as (first_name || ' ' || last_name) stored
            );",
        )
        .expect("schema");
    session
}

/// An in-memory session seeded with the nineteen demo users.
pub fn setup() -> Session {
    let session = empty();
    for (first_name, last_name) in USERS {
        insert_user(&session, first_name, last_name);
    }
    session
}

pub fn insert_user(session: &Session, first_name: &str, last_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    session
        .connection()
        .execute(
            "insert into users (id, first_name, last_name) values (?1, ?2, ?3)",
            params![id.hyphenated().to_string(), first_name, last_name],
        )
        .expect("insert");
    id
}

/// Full names of the matching users, sorted.
pub fn names(session: &Session, query: &Query<User>) -> Vec<String> {
    let mut names: Vec<String> = session
        .load(query)
        .expect("query ok")
        .into_iter()
        .map(|user| user.full_name)
        .collect();
    names.sort();
    names
}

pub fn first_name_is(name: &str) -> Predicate<User> {
    Predicate::named("u", |u| u.column("first_name").equals_lower_case(Expr::variable("first_name", name)))
}

pub fn last_name_is(name: &str) -> Predicate<User> {
    Predicate::named("u", |u| u.column("last_name").equals_lower_case(Expr::variable("last_name", name)))
}
