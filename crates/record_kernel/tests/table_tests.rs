//! Tests for table identity and the `<Entity>Repository` naming convention

use proptest::prelude::*;
use record_kernel::table::resolve_table_name;
use record_kernel::{CoreError, TableName};

#[test]
fn test_user_account_repository_resolves_to_user_account() {
    let table = TableName::from_repository_name("UserAccountRepository").unwrap();
    assert_eq!(table.as_str(), "user_account");
    assert!(!table.is_empty());
}

#[test]
fn test_bare_repository_resolves_to_empty_table() {
    let table = TableName::from_repository_name("repository").unwrap();
    assert_eq!(table.as_str(), "");
    assert!(table.is_empty());
}

#[test]
fn test_three_word_entity() {
    assert_eq!(
        resolve_table_name("PolicyCoverageLimitRepository"),
        "policy_coverage_limit"
    );
}

#[test]
fn test_derived_name_with_sql_is_rejected() {
    let result = TableName::from_repository_name("users; DELETE FROM accounts_Repository");
    assert!(matches!(result, Err(CoreError::InvalidIdentifier(_))));
}

#[test]
fn test_display_matches_as_str() {
    let table = TableName::new("user_account").unwrap();
    assert_eq!(table.to_string(), "user_account");
}

proptest! {
    #[test]
    fn prop_pascal_words_round_trip(words in prop::collection::vec("[A-Z][a-z]{1,8}", 1..5)) {
        let repository = format!("{}Repository", words.concat());
        let expected = words
            .iter()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("_");

        prop_assert_eq!(resolve_table_name(&repository), expected);
    }
}
