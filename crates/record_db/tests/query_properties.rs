//! Property tests for statement synthesis
//!
//! For arbitrary valid records, placeholders must be numbered without gaps
//! and the bound values must line up with them.

use proptest::prelude::*;
use record_db::query::{equality_conjunction, insert_clause, update_clause, ID_FIELD};
use record_db::Statement;
use record_kernel::{TableName, Value};
use record_test_utils::{
    assert_placeholders_sequential, partial_record_strategy, placeholder_indices,
    update_record_strategy,
};

fn table() -> TableName {
    TableName::new("user_account").unwrap()
}

proptest! {
    #[test]
    fn conjunction_placeholders_follow_record_order(record in partial_record_strategy(1, 12)) {
        let conjunction = equality_conjunction(&record);

        assert_placeholders_sequential(&conjunction.clause, record.len());
        prop_assert_eq!(conjunction.values.len(), record.len());
        prop_assert_eq!(conjunction.clause.matches(" AND ").count(), record.len() - 1);
    }

    #[test]
    fn insert_lists_have_equal_arity(record in partial_record_strategy(1, 12)) {
        let insert = insert_clause(&record);

        prop_assert_eq!(insert.columns.split(", ").count(), record.len());
        prop_assert_eq!(insert.placeholders.split(", ").count(), record.len());
        assert_placeholders_sequential(&insert.placeholders, record.len());
        prop_assert_eq!(insert.values, record.values().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn update_binds_id_first_and_numbers_the_rest((id, record) in update_record_strategy(10)) {
        let clause = update_clause(&record).unwrap();

        prop_assert_eq!(&clause.condition, "id = $1");
        prop_assert_eq!(&clause.values[0], &Value::Int(id));
        prop_assert_eq!(clause.values.len(), record.len());

        let assigned = placeholder_indices(&clause.assignments);
        let expected = (2..=record.len()).collect::<Vec<_>>();
        prop_assert_eq!(assigned, expected);
        prop_assert!(!clause.assignments.split(", ").any(|a| a.starts_with("id =")));
    }

    #[test]
    fn update_statement_uses_every_placeholder_once((_, record) in update_record_strategy(10)) {
        let statement = Statement::update(&table(), &record).unwrap();

        let mut indices = placeholder_indices(&statement.sql);
        indices.sort_unstable();
        prop_assert_eq!(indices, (1..=statement.params.len()).collect::<Vec<_>>());
    }

    #[test]
    fn update_without_id_is_rejected(record in partial_record_strategy(0, 8)) {
        prop_assume!(!record.contains(ID_FIELD));

        let error = update_clause(&record).unwrap_err();
        prop_assert!(error.is_bad_request());
    }
}
