//! Repository Tests
//!
//! Exercises every repository operation against the recording mock pool:
//! the SQL and parameters each operation produces, how rows map onto the
//! entity, and that every leased connection goes back to the pool exactly
//! once however the operation ends.
//!
//! # Test Organization
//!
//! - `table_naming` - convention-derived and explicit tables
//! - `reads` - find_all, find_by_id, find_by
//! - `writes` - save, update, delete
//! - `connection_release` - lease accounting on success, failure and cancellation

use std::time::Duration;

use record_db::{DatabaseError, Entity, Repository, StatementKind};
use record_kernel::{PartialRecord, TableName, Value};
use record_test_utils::{
    assert_all_released, assert_err, assert_err_variant, assert_ok, assert_pool_stats,
    assert_untouched, init_test_tracing, MockPool, MockResponse, UserAccount,
    UserAccountRepository, UserFixtures,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn repo(pool: &MockPool) -> UserAccountRepository<MockPool> {
    init_test_tracing();
    UserAccountRepository::<MockPool>::new(pool.clone()).unwrap()
}

// ============================================================================
// TABLE NAMING
// ============================================================================

mod table_naming {
    use super::*;

    #[test]
    fn test_repository_name_drives_table() {
        assert_eq!(UserAccount::REPOSITORY_NAME, "UserAccountRepository");
        assert_eq!(UserAccount::table_name().unwrap().as_str(), "user_account");
        assert_eq!(repo(&MockPool::new()).table().as_str(), "user_account");
    }

    #[tokio::test]
    async fn test_explicit_table_is_used_verbatim() {
        let pool = MockPool::new();
        let table = TableName::new("archive.accounts").unwrap();
        let repo: Repository<UserAccount, MockPool> = Repository::with_table(pool.clone(), table);

        assert_ok!(repo.find_all().await);

        assert_eq!(pool.last_statement().unwrap().sql, "SELECT * FROM archive.accounts");
    }

    #[derive(Debug, serde::Deserialize)]
    struct Ledger {}

    impl Entity for Ledger {
        const REPOSITORY_NAME: &'static str = "ledger; DROP TABLE user_account; --Repository";
    }

    #[test]
    fn test_unsafe_repository_name_is_rejected() {
        let pool = MockPool::new();

        let result = Repository::<Ledger, MockPool>::new(pool.clone());

        assert_err_variant!(result, DatabaseError::Core(_));
        assert_untouched(&pool);
    }

    #[test]
    fn test_clone_shares_pool_and_table() {
        let pool = MockPool::new();
        let original = repo(&pool);
        let cloned = original.clone();
        assert_eq!(original.table(), cloned.table());
    }
}

// ============================================================================
// READS
// ============================================================================

mod reads {
    use super::*;

    #[tokio::test]
    async fn test_find_all_on_empty_table() {
        let pool = MockPool::new().with_rows(Vec::new());

        let accounts = assert_ok!(repo(&pool).find_all().await);

        assert!(accounts.is_empty());
        let statement = pool.last_statement().unwrap();
        assert_eq!(statement.sql, "SELECT * FROM user_account");
        assert!(statement.params.is_empty());
        assert_eq!(statement.kind, StatementKind::Fetch);
    }

    #[tokio::test]
    async fn test_find_all_maps_every_row() {
        let pool = MockPool::new().with_rows(vec![
            UserFixtures::row(1, "Alice", Some(30)),
            UserFixtures::row(2, "Bob", None),
        ]);

        let accounts = assert_ok!(repo(&pool).find_all().await);

        assert_eq!(
            accounts,
            vec![
                UserFixtures::account(1, "Alice", Some(30)),
                UserFixtures::account(2, "Bob", None),
            ]
        );
    }

    #[tokio::test]
    async fn test_find_by_id_hit() {
        let pool = MockPool::new().with_rows(vec![UserFixtures::row(7, "Carol", Some(41))]);

        let account = assert_ok!(repo(&pool).find_by_id(7).await);

        assert_eq!(account, Some(UserFixtures::account(7, "Carol", Some(41))));
        let statement = pool.last_statement().unwrap();
        assert_eq!(statement.sql, "SELECT * FROM user_account WHERE id = $1");
        assert_eq!(statement.params, vec![Value::Int(7)]);
    }

    #[tokio::test]
    async fn test_find_by_id_miss_is_none() {
        let pool = MockPool::new();

        let account = assert_ok!(repo(&pool).find_by_id(999).await);

        assert_eq!(account, None);
    }

    #[tokio::test]
    async fn test_find_by_builds_conjunction_in_record_order() {
        let pool = MockPool::new().with_rows(vec![UserFixtures::row(3, "Dana", Some(25))]);
        let criteria = UserFixtures::record(&[("name", "Dana".into()), ("age", 25.into())]);

        let account = assert_ok!(repo(&pool).find_by(&criteria).await);

        assert_eq!(account.map(|a| a.id), Some(3));
        let statement = pool.last_statement().unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM user_account WHERE name = $1 AND age = $2"
        );
        assert_eq!(statement.params, vec![Value::from("Dana"), Value::Int(25)]);
    }

    #[tokio::test]
    async fn test_find_by_returns_first_of_many() {
        let pool = MockPool::new().with_rows(vec![
            UserFixtures::row(4, "Eve", Some(50)),
            UserFixtures::row(5, "Eve", Some(50)),
        ]);
        let criteria = UserFixtures::record(&[("name", "Eve".into())]);

        let account = assert_ok!(repo(&pool).find_by(&criteria).await);

        assert_eq!(account.map(|a| a.id), Some(4));
    }

    #[tokio::test]
    async fn test_find_by_null_value_binds_null() {
        let pool = MockPool::new();
        let criteria = UserFixtures::record(&[("age", Value::Null)]);

        assert_ok!(repo(&pool).find_by(&criteria).await);

        assert_eq!(pool.last_statement().unwrap().params, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_unmappable_row_is_serialization_error() {
        let row = record_kernel::Row::new().column("id", 1i64);
        let pool = MockPool::new().with_rows(vec![row]);

        let result = repo(&pool).find_by_id(1).await;

        assert_err_variant!(result, DatabaseError::Serialization(_));
        assert_all_released(&pool);
    }
}

// ============================================================================
// WRITES
// ============================================================================

mod writes {
    use super::*;

    #[tokio::test]
    async fn test_save_inserts_and_returns_created_row() {
        let pool = MockPool::new().with_rows(vec![UserFixtures::row(1, "Frank", Some(33))]);
        let record = UserFixtures::new_account_record("Frank", 33);

        let saved = assert_ok!(repo(&pool).save(&record).await);

        assert_eq!(saved, UserFixtures::account(1, "Frank", Some(33)));
        let statement = pool.last_statement().unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO user_account (name, email, age) VALUES ($1, $2, $3) RETURNING *"
        );
        assert_eq!(
            statement.params,
            vec![
                Value::from("Frank"),
                Value::from("frank@example.com"),
                Value::Int(33)
            ]
        );
    }

    #[tokio::test]
    async fn test_save_without_returned_row_errors() {
        let pool = MockPool::new();
        let record = UserFixtures::random_account_record();

        let result = repo(&pool).save(&record).await;

        assert_err_variant!(result, DatabaseError::MissingReturnedRow { .. });
    }

    #[tokio::test]
    async fn test_save_propagates_driver_error() {
        let pool = MockPool::new().with_failure("duplicate key value violates unique constraint");
        let record = UserFixtures::new_account_record("Grace", 28);

        let error = assert_err!(repo(&pool).save(&record).await);

        assert!(matches!(error, DatabaseError::Sql(_)));
        assert!(error.to_string().contains("duplicate key"));
        assert_all_released(&pool);
    }

    #[tokio::test]
    async fn test_update_numbers_id_first() {
        let pool = MockPool::new().with_rows(vec![UserFixtures::row(5, "a", Some(3))]);
        let record = UserFixtures::record(&[
            ("id", 5.into()),
            ("name", "a".into()),
            ("age", 3.into()),
        ]);

        let updated = assert_ok!(repo(&pool).update(&record).await);

        assert_eq!(updated.map(|a| a.id), Some(5));
        let statement = pool.last_statement().unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE user_account SET name = $2, age = $3 WHERE id = $1 RETURNING *"
        );
        assert_eq!(
            statement.params,
            vec![Value::Int(5), Value::from("a"), Value::Int(3)]
        );
    }

    #[tokio::test]
    async fn test_update_with_id_in_the_middle() {
        let pool = MockPool::new();
        let record = UserFixtures::record(&[
            ("name", "b".into()),
            ("id", 9.into()),
            ("age", 4.into()),
        ]);

        assert_ok!(repo(&pool).update(&record).await);

        let statement = pool.last_statement().unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE user_account SET name = $2, age = $3 WHERE id = $1 RETURNING *"
        );
        assert_eq!(statement.params[0], Value::Int(9));
    }

    #[tokio::test]
    async fn test_update_keeps_fields_whose_value_equals_id() {
        let pool = MockPool::new();
        let record = UserFixtures::record(&[("id", 5.into()), ("age", 5.into())]);

        assert_ok!(repo(&pool).update(&record).await);

        let statement = pool.last_statement().unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE user_account SET age = $2 WHERE id = $1 RETURNING *"
        );
        assert_eq!(statement.params, vec![Value::Int(5), Value::Int(5)]);
    }

    #[tokio::test]
    async fn test_update_without_id_is_bad_request_before_any_io() {
        let pool = MockPool::new();
        let record = UserFixtures::record(&[("name", "nobody".into())]);

        let error = assert_err!(repo(&pool).update(&record).await);

        assert!(error.is_bad_request());
        assert_untouched(&pool);
    }

    #[tokio::test]
    async fn test_update_with_only_id_is_bad_request() {
        let pool = MockPool::new();
        let record = UserFixtures::record(&[("id", 1.into())]);

        let result = repo(&pool).update(&record).await;

        assert_err_variant!(result, DatabaseError::BadRequest(_));
        assert_untouched(&pool);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_none() {
        let pool = MockPool::new().with_rows(Vec::new());
        let record = UserFixtures::record(&[("id", 404.into()), ("name", "ghost".into())]);

        let updated = assert_ok!(repo(&pool).update(&record).await);

        assert_eq!(updated, None);
    }

    #[tokio::test]
    async fn test_delete_reports_row_count() {
        let pool = MockPool::new().with_affected(2);
        let criteria = UserFixtures::record(&[("name", "Heidi".into()), ("age", 60.into())]);

        let output = assert_ok!(repo(&pool).delete(&criteria).await);

        assert_eq!(output.row_count, 2);
        let statement = pool.last_statement().unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM user_account WHERE name = $1 AND age = $2"
        );
        assert_eq!(statement.kind, StatementKind::Execute);
    }

    #[tokio::test]
    async fn test_delete_matching_nothing_is_not_an_error() {
        let pool = MockPool::new().with_affected(0);
        let criteria = UserFixtures::record(&[("id", 12345.into())]);

        let output = assert_ok!(repo(&pool).delete(&criteria).await);

        assert_eq!(output.row_count, 0);
    }

    #[tokio::test]
    async fn test_delete_with_empty_record_sends_empty_clause() {
        let pool = MockPool::new().with_failure("syntax error at end of input");

        let result = repo(&pool).delete(&PartialRecord::new()).await;

        assert!(result.is_err());
        let statement = pool.last_statement().unwrap();
        assert_eq!(statement.sql, "DELETE FROM user_account WHERE ");
        assert!(statement.params.is_empty());
    }
}

// ============================================================================
// CONNECTION RELEASE
// ============================================================================

mod connection_release {
    use super::*;

    #[tokio::test]
    async fn test_each_operation_leases_one_connection() {
        let pool = MockPool::new();
        let repo = repo(&pool);
        let record = UserFixtures::record(&[("id", 1.into()), ("name", "x".into())]);

        let _ = repo.find_all().await;
        let _ = repo.find_by_id(1).await;
        let _ = repo.find_by(&record).await;
        let _ = repo.save(&record).await;
        let _ = repo.update(&record).await;
        let _ = repo.delete(&record).await;

        assert_pool_stats(&pool, 6, 6);
        assert_eq!(pool.statements().len(), 6);
    }

    #[tokio::test]
    async fn test_release_after_failure() {
        let pool = MockPool::new().with_failure("connection reset by peer");

        let result = repo(&pool).find_all().await;

        assert!(result.is_err());
        assert_pool_stats(&pool, 1, 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_fails_without_release() {
        let pool = MockPool::new().exhausted();

        let result = repo(&pool).find_by_id(1).await;

        assert_err_variant!(result, DatabaseError::PoolExhausted);
        assert_eq!(pool.stats().failed_acquires, 1);
        assert_pool_stats(&pool, 0, 0);
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn test_release_on_cancellation() {
        let pool = MockPool::new().respond(MockResponse::Hang);
        let repo = repo(&pool);

        let outcome = tokio::time::timeout(Duration::from_millis(50), repo.find_all()).await;

        assert!(outcome.is_err(), "a hanging query must time out");
        assert_pool_stats(&pool, 1, 1);
    }

    #[tokio::test]
    async fn test_concurrent_operations_release_everything() {
        let pool = MockPool::new();
        let repo = repo(&pool);

        let tasks = (0..16)
            .map(|id| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.find_by_id(id).await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let found = assert_ok!(task.await.unwrap());
            assert_eq!(found, None);
        }

        assert_pool_stats(&pool, 16, 16);
        assert_all_released(&pool);
    }
}
