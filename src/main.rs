use rusqlite::params;
use rusqlite::types::Type;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use wherewith::construct::{Entity, Expr, Predicate, Query};
use wherewith::persist::Session;
use wherewith::settings::Settings;
use wherewith::translate::QueryCompiler;
use wherewith::Result;

// ------------- User -------------
#[derive(Debug)]
struct User {
    #[allow(dead_code)]
    id: Uuid,
    #[allow(dead_code)]
    first_name: String,
    #[allow(dead_code)]
    last_name: String,
    full_name: String,
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

const USERS: [(&str, &str); 19] = [
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

#[derive(Debug)]
struct Filter {
    first_name: Option<String>,
    last_name: Option<String>,
}

fn recreate_database(session: &Session) -> Result<()> {
    session.execute_batch(
        "
        drop table if exists users;
        create table users (
            id text not null primary key,
            first_name text not null,
            last_name text not null,
            full_name text generated always as (first_name || ' ' || last_name) stored
        );
        ",
    )?;
    let mut insert = session
        .connection()
        .prepare("insert into users (id, first_name, last_name) values (?1, ?2, ?3)")?;
    for (first_name, last_name) in USERS {
        insert.execute(params![Uuid::new_v4().hyphenated().to_string(), first_name, last_name])?;
    }
    info!(users = USERS.len(), "users created");
    Ok(())
}

struct Demo<'s> {
    session: &'s Session,
    echo: Option<QueryCompiler>,
}

impl Demo<'_> {
    fn show(&self, title: &str, query: &Query<User>) -> Result<()> {
        println!("{}", title);
        if let Some(echo) = &self.echo {
            println!("  {}", echo.compile(query)?.sql);
        }
        for user in self.session.load(query)? {
            println!("{}", user.full_name);
        }
        println!();
        Ok(())
    }
}

fn first_name_is(name: &str) -> Predicate<User> {
    Predicate::named("user", |u| u.column("first_name").equals_lower_case(Expr::variable("first_name", name)))
}

fn last_name_is(name: &str) -> Predicate<User> {
    Predicate::named("user", |u| u.column("last_name").equals_lower_case(Expr::variable("last_name", name)))
}

fn main() -> Result<()> {
    let settings = Settings::load()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let session = Session::builder(settings.persistence_mode()).use_pattern_translators().open()?;
    recreate_database(&session)?;

    let echo = if settings.echo_sql {
        match QueryCompiler::new(settings.echo_dialect).use_pattern_translators() {
            Ok(compiler) => Some(compiler),
            Err(error) => {
                warn!(%error, "SQL echo disabled");
                None
            }
        }
    } else {
        None
    };
    let demo = Demo { session: &session, echo };
    let users = session.query::<User>();

    demo.show(
        "Users with first name 'alice':",
        &users.filter(Predicate::new(|u| u.column("first_name").equals_lower_case("alice"))),
    )?;
    demo.show(
        "Users with full name matching '%john%':",
        &users.filter(Predicate::new(|u| u.column("full_name").ilike("%john%"))),
    )?;
    demo.show(
        "Users with last name starting with 'thomp':",
        &users.filter(Predicate::new(|u| u.column("last_name").ilike_starts_with("thomp"))),
    )?;
    demo.show(
        "Users with last name ending with 'son':",
        &users.filter(Predicate::new(|u| u.column("last_name").ilike_ends_with("son"))),
    )?;
    demo.show(
        "Users with last name containing 'il':",
        &users.filter(Predicate::new(|u| u.column("last_name").ilike_contains("il"))),
    )?;

    let search = Filter { first_name: Some("George".into()), last_name: None };
    demo.show(
        &format!("{:?}", search),
        &users
            .where_if_present(&search.first_name, first_name_is)
            .where_if_present(&search.last_name, last_name_is),
    )?;

    let search = Filter { first_name: Some("Quinn".into()), last_name: Some("White".into()) };
    let include_alice = true;
    demo.show(
        &format!("{:?} [include_alice = {}]", search, include_alice),
        // (first AND last) OR first = 'Alice'
        &users
            .begin_group()
            .where_if_present(&search.first_name, first_name_is)
            .where_if_present(&search.last_name, last_name_is)
            .end_group()?
            .or_where_if(include_alice, first_name_is("Alice"))?,
    )?;

    demo.show(
        "Users with first name 'Alice' or 'Bob' and last name 'Smith' or 'Taylor':",
        // (Alice OR Bob) AND (Smith OR Taylor)
        &users
            .or_where(first_name_is("Alice"))?
            .or_where(first_name_is("Bob"))?
            .and()
            .or_where(last_name_is("Smith"))?
            .or_where(last_name_is("Taylor"))?,
    )?;
    Ok(())
}
