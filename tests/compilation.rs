mod common;

use common::{User, first_name_is, insert_user, last_name_is, names, setup};
use wherewith::construct::{Expr, Lambda, Parameter, Predicate, Query, QueryNode};
use wherewith::datatype::Value;
use wherewith::persist::{PersistenceMode, Session};
use wherewith::settings::Settings;
use wherewith::sql::Dialect;
use wherewith::translate::QueryCompiler;
use wherewith::WherewithError;

fn postgres() -> QueryCompiler {
    QueryCompiler::new(Dialect::Postgres).use_pattern_translators().expect("translators")
}

#[test]
fn postgres_placeholders_are_numbered_in_order() {
    let query = Query::<User>::from_entity()
        .filter(first_name_is("alice"))
        .or_where(last_name_is("taylor"))
        .expect("or_where");
    let statement = postgres().compile(&query).expect("compile");
    assert_eq!(
        statement.sql,
        "SELECT t.\"id\", t.\"first_name\", t.\"last_name\", t.\"full_name\" FROM \"users\" AS t \
         WHERE (lower(t.\"first_name\") = lower($1) OR lower(t.\"last_name\") = lower($2))"
    );
    assert_eq!(statement.parameters, vec![Value::from("alice"), Value::from("taylor")]);
}

#[test]
fn last_ordering_wins_and_take_limits() {
    let session = setup();
    let query = session
        .query::<User>()
        .filter(last_name_is("thompson"))
        .order_by(|u| u.column("first_name"))
        .order_by_descending(|u| u.column("first_name"))
        .take(2);
    let statement = session.compile(&query).expect("compile");
    assert!(statement.sql.ends_with("ORDER BY t.\"first_name\" DESC LIMIT 2"), "unexpected SQL: {}", statement.sql);
    let loaded: Vec<String> = session
        .load(&query)
        .expect("query ok")
        .into_iter()
        .map(|u| u.first_name)
        .collect();
    assert_eq!(loaded, vec!["Uma", "Timothy"]);
    assert_eq!(session.count(&query).expect("count"), 2);
}

#[test]
fn nested_takes_keep_the_smallest() {
    let session = setup();
    let query = session.query::<User>().take(5).take(3).take(4);
    assert_eq!(session.count(&query).expect("count"), 3);
}

#[test]
fn filtering_on_top_of_take_is_unsupported() {
    let session = setup();
    let filtered = session.query::<User>().take(3).filter(first_name_is("alice"));
    assert!(matches!(session.compile(&filtered), Err(WherewithError::Unsupported(_))));
    let ordered = session.query::<User>().take(3).order_by(|u| u.column("last_name"));
    assert!(matches!(session.compile(&ordered), Err(WherewithError::Unsupported(_))));
}

#[test]
fn null_comparisons_render_as_is_null() {
    let query = Query::<User>::from_entity()
        .filter(Predicate::new(|u| u.column("last_name").ne(Value::Null)))
        .filter(Predicate::new(|u| !u.column("first_name").eq(Value::Null)))
        .filter(Predicate::new(|u| u.column("full_name").is_null().or(Expr::constant(true))));
    let sql = postgres().compile(&query).expect("compile").sql;
    assert!(
        sql.ends_with(
            "WHERE t.\"last_name\" IS NOT NULL AND NOT (t.\"first_name\" IS NULL) \
             AND (t.\"full_name\" IS NULL OR TRUE)"
        ),
        "unexpected SQL: {}",
        sql
    );
    let session = setup();
    assert_eq!(session.count(&query).expect("count"), 19);
}

#[test]
fn text_constants_are_quoted() {
    let session = setup();
    insert_user(&session, "D'Arcy", "O'Neil");
    let query = session
        .query::<User>()
        .filter(Predicate::new(|u| u.column("last_name").equals_lower_case("o'neil")));
    assert!(session.compile(&query).expect("compile").sql.contains("lower('o''neil')"));
    assert_eq!(names(&session, &query), vec!["D'Arcy O'Neil"]);
}

#[test]
fn malformed_identifiers_are_rejected() {
    let query = Query::<User>::from_entity()
        .filter(Predicate::new(|u| u.column("first_name\"; drop table users; --").eq("x")));
    assert!(matches!(postgres().compile(&query), Err(WherewithError::Translation(_))));
}

#[test]
fn foreign_parameters_are_unsupported() {
    let stranger = Parameter::new("other", "accounts");
    let query = Query::<User>::from_entity().filter(Predicate::new(|u| {
        u.column("first_name").eq(Expr::parameter(&stranger).column("first_name"))
    }));
    match postgres().compile(&query) {
        Err(WherewithError::Unsupported(message)) => assert!(message.contains("over accounts"), "{}", message),
        other => panic!("expected Unsupported, got {other:?}"),
    }

    let zero = Predicate::<User>::from_lambda(Lambda::new(vec![], Expr::constant(true).eq(false)));
    let query = Query::<User>::from_entity().filter(zero);
    assert!(matches!(postgres().compile(&query), Err(WherewithError::Unsupported(_))));
}

#[test]
fn ansi_cannot_lower_primitives() {
    let query = Query::<User>::from_entity().filter(first_name_is("alice"));
    // no translators can be registered, so the primitive stays untranslated
    let compiler = QueryCompiler::new(Dialect::Ansi);
    assert!(matches!(compiler.compile(&query), Err(WherewithError::Unsupported(_))));
    assert!(matches!(
        QueryCompiler::new(Dialect::Ansi).use_pattern_translators(),
        Err(WherewithError::Config(_))
    ));
}

#[test]
fn group_markers_do_not_reach_the_statement() {
    let query = Query::<User>::from_entity().begin_group().filter(first_name_is("alice"));
    let select = postgres().select(&query).expect("select");
    assert_eq!(select.predicates.len(), 1);
    assert!(matches!(query.node().as_ref(), QueryNode::Filter { .. }));
}

#[test]
fn file_sessions_persist_between_opens() {
    let path = std::env::temp_dir().join(format!("wherewith-{}.db", uuid::Uuid::new_v4()));
    let mode = PersistenceMode::File(path.to_string_lossy().into_owned());
    {
        let session = Session::builder(mode.clone()).use_pattern_translators().open().expect("session");
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
        insert_user(&session, "Alice", "Smith");
    }
    let session = Session::builder(mode).use_pattern_translators().open().expect("session");
    let query = session.query::<User>().filter(Predicate::new(|u| u.column("full_name").ilike("alice%")));
    assert_eq!(names(&session, &query), vec!["Alice Smith"]);
    drop(session);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn settings_default_to_an_in_memory_database() {
    let settings = Settings::load_from("no-such-wherewith-settings").expect("settings");
    assert_eq!(settings.persistence_mode(), PersistenceMode::InMemory);
    assert_eq!(PersistenceMode::from_database("users.db"), PersistenceMode::File("users.db".into()));
    assert_eq!(PersistenceMode::from_database(" :memory: "), PersistenceMode::InMemory);
}
