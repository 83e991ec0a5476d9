mod common;

use std::collections::BTreeSet;

use common::{USERS, User, empty, first_name_is, insert_user, setup};
use proptest::prelude::*;
use wherewith::construct::{Predicate, Query};
use wherewith::WherewithError;

#[derive(Clone, Debug)]
enum Step {
    Filter(usize),
    OrWhere(usize),
    And,
    OrderBy,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..USERS.len()).prop_map(Step::Filter),
        (0..USERS.len()).prop_map(Step::OrWhere),
        Just(Step::And),
        Just(Step::OrderBy),
    ]
}

fn apply(query: Query<User>, step: &Step) -> Query<User> {
    match step {
        Step::Filter(i) => query.filter(first_name_is(USERS[*i].0)),
        Step::OrWhere(i) => query.or_where(first_name_is(USERS[*i].0)).expect("or_where"),
        Step::And => query.and(),
        Step::OrderBy => query.order_by(|u| u.column("last_name")),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn or_where_matches_any_alternative(picks in prop::collection::vec(0..USERS.len(), 1..6)) {
        let session = setup();
        let mut query = session.query::<User>();
        for i in &picks {
            query = query.or_where(first_name_is(USERS[*i].0)).expect("or_where");
        }
        let loaded: BTreeSet<String> = session
            .load(&query)
            .expect("query ok")
            .into_iter()
            .map(|u| u.first_name)
            .collect();
        let expected: BTreeSet<String> = picks.iter().map(|i| USERS[*i].0.to_string()).collect();
        prop_assert_eq!(loaded, expected);
    }

    #[test]
    fn and_separated_groups_intersect(
        left in prop::collection::vec(0..USERS.len(), 1..4),
        right in prop::collection::vec(0..USERS.len(), 1..4),
    ) {
        let session = setup();
        let mut query = session.query::<User>();
        for i in &left {
            query = query.or_where(first_name_is(USERS[*i].0)).expect("or_where");
        }
        query = query.and();
        for i in &right {
            query = query.or_where(first_name_is(USERS[*i].0)).expect("or_where");
        }
        let expected = left.iter().any(|i| right.contains(i));
        prop_assert_eq!(session.count(&query).expect("count") > 0, expected);
    }

    #[test]
    fn end_group_without_begin_group_always_fails(steps in prop::collection::vec(step(), 0..8)) {
        let query = steps.iter().fold(Query::<User>::from_entity(), apply);
        let result = query.end_group();
        prop_assert!(
            matches!(result, Err(WherewithError::Usage { combinator: "end_group", .. })),
            "expected a usage error"
        );
    }

    #[test]
    fn false_conditions_keep_the_chain(steps in prop::collection::vec(step(), 0..6), i in 0..USERS.len()) {
        let query = steps.iter().fold(Query::<User>::from_entity(), apply);
        prop_assert!(query.where_if(false, first_name_is(USERS[i].0)).same_chain(&query));
        prop_assert!(query.or_where_if(false, first_name_is(USERS[i].0)).expect("or_where_if").same_chain(&query));
    }

    #[test]
    fn contains_matches_literally(
        needle in "[abAB%_\\\\ ]{0,4}",
        haystacks in prop::collection::vec("[abAB%_\\\\ ]{0,6}", 1..6),
    ) {
        let session = empty();
        for (i, haystack) in haystacks.iter().enumerate() {
            insert_user(&session, &format!("row{}", i), haystack);
        }
        let query = session
            .query::<User>()
            .filter(Predicate::new(|u| u.column("last_name").ilike_contains(needle.as_str())));
        let matched: BTreeSet<String> = session
            .load(&query)
            .expect("query ok")
            .into_iter()
            .map(|u| u.first_name)
            .collect();
        let expected: BTreeSet<String> = haystacks
            .iter()
            .enumerate()
            .filter(|(_, h)| h.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
            .map(|(i, _)| format!("row{}", i))
            .collect();
        prop_assert_eq!(matched, expected);
    }
}
