mod common;

use common::{User, first_name_is, last_name_is, names, setup};
use wherewith::construct::{Expr, Predicate, Query};

const STEPS: usize = 10_000;

fn or_chain(length: usize) -> Query<User> {
    let mut query = Query::<User>::from_entity();
    for i in 0..length {
        query = query.or_where(first_name_is(&format!("name{}", i))).expect("or_where");
    }
    query
}

#[test]
fn ten_thousand_or_where_calls_compile_and_drop() {
    let session = setup();
    let query = or_chain(STEPS);
    let statement = session.compile(&query).expect("compile");
    assert_eq!(statement.parameters.len(), STEPS);
    assert_eq!(statement.sql.matches(" OR ").count(), STEPS - 1);
    assert!(statement.sql.ends_with(&format!("lower(?{}))", STEPS)), "unexpected SQL tail");
    drop(statement);
    drop(query);
}

#[test]
fn twenty_thousand_filter_steps_compile_and_drop() {
    let session = setup();
    let mut query = session.query::<User>();
    for i in 0..2 * STEPS {
        let other = format!("x{}", i);
        query = query.filter(Predicate::new(|u| u.column("last_name").ne(Expr::variable("last_name", other))));
    }
    let statement = session.compile(&query).expect("compile");
    assert_eq!(statement.parameters.len(), 2 * STEPS);
    assert_eq!(statement.sql.matches(" AND ").count(), 2 * STEPS - 1);
    drop(query);
}

#[test]
fn long_or_runs_survive_end_group() {
    let session = setup();
    let mut query = session.query::<User>().filter(last_name_is("thompson")).begin_group();
    for i in 0..STEPS {
        query = query.or_where(first_name_is(&format!("name{}", i))).expect("or_where");
    }
    let query = query
        .or_where(first_name_is("uma"))
        .and_then(|q| q.end_group())
        .and_then(|q| q.or_where(first_name_is("alice")))
        .expect("combinators");
    let statement = session.compile(&query).expect("compile");
    assert_eq!(statement.parameters.len(), STEPS + 3);
    // the whole run renders as one flat list next to the thompson step
    assert_eq!(statement.sql.matches(" OR ").count(), STEPS + 1);
    assert_eq!(statement.sql.matches(" AND ").count(), 1);
}

#[test]
fn hundreds_of_alternatives_load() {
    let session = setup();
    let mut query = or_chain(500);
    for name in ["peter", "quinn"] {
        query = query.or_where(first_name_is(name)).expect("or_where");
    }
    assert_eq!(names(&session, &query), vec!["Peter Thompson", "Quinn White"]);
}
