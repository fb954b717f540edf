//! PostgreSQL Integration Tests
//!
//! Runs the repository against a real server in a testcontainer. These
//! tests need a Docker daemon:
//!
//! ```bash
//! cargo test -p record_db --test postgres_tests -- --ignored
//! ```

use record_db::{DatabaseError, Repository};
use record_kernel::{PartialRecord, TableName, Value};
use record_test_utils::{
    assert_err_variant, assert_ok, db_test, init_test_tracing, UserAccount, UserAccountRepository,
    UserFixtures,
};

db_test!(test_crud_round_trip, |db| {
    init_test_tracing();
    let repo: UserAccountRepository = db.context().repository().unwrap();

    assert!(assert_ok!(repo.find_all().await).is_empty());

    let saved = assert_ok!(repo.save(&UserFixtures::new_account_record("Alice", 30)).await);
    assert_eq!(saved.name, "Alice");
    assert_eq!(saved.age, Some(30));

    let found = assert_ok!(repo.find_by_id(saved.id).await);
    assert_eq!(found.as_ref(), Some(&saved));

    let update = UserFixtures::record(&[
        ("age", 31.into()),
        ("id", saved.id.into()),
    ]);
    let updated = assert_ok!(repo.update(&update).await).unwrap();
    assert_eq!(updated.age, Some(31));
    assert_eq!(updated.email, saved.email);

    let criteria = UserFixtures::record(&[("name", "Alice".into()), ("age", 31.into())]);
    let matched = assert_ok!(repo.find_by(&criteria).await);
    assert_eq!(matched.map(|a| a.id), Some(saved.id));

    let deleted = assert_ok!(repo.delete(&criteria).await);
    assert_eq!(deleted.row_count, 1);
    assert_eq!(assert_ok!(repo.find_by_id(saved.id).await), None);
});

db_test!(test_missing_rows_are_not_errors, |db| {
    let repo: UserAccountRepository = db.context().repository().unwrap();

    assert_eq!(assert_ok!(repo.find_by_id(424242).await), None);

    let update = UserFixtures::record(&[("id", 424242i64.into()), ("name", "ghost".into())]);
    assert_eq!(assert_ok!(repo.update(&update).await), None);

    let criteria = UserFixtures::record(&[("id", 424242i64.into())]);
    assert_eq!(assert_ok!(repo.delete(&criteria).await).row_count, 0);
});

db_test!(test_unique_violation_is_constraint_error, |db| {
    let repo: UserAccountRepository = db.context().repository().unwrap();
    let record = UserFixtures::new_account_record("Bob", 40);

    assert_ok!(repo.save(&record).await);
    let error = repo.save(&record).await.unwrap_err();

    assert!(error.is_constraint_violation(), "got {:?}", error);
    assert_eq!(error.sql_state().as_deref(), Some("23505"));
});

db_test!(test_null_criteria_binds_as_null, |db| {
    let repo: UserAccountRepository = db.context().repository().unwrap();
    let record = UserFixtures::record(&[
        ("name", "Carol".into()),
        ("email", "carol@example.com".into()),
        ("age", Value::Null),
    ]);

    let saved = assert_ok!(repo.save(&record).await);

    assert_eq!(saved.age, None);
});

db_test!(test_empty_delete_is_rejected_by_the_server, |db| {
    let repo: UserAccountRepository = db.context().repository().unwrap();
    assert_ok!(repo.save(&UserFixtures::random_account_record()).await);

    let result = repo.delete(&PartialRecord::new()).await;

    assert_err_variant!(result, DatabaseError::Sql(_));
    assert_eq!(assert_ok!(repo.find_all().await).len(), 1);
});

db_test!(test_explicit_table_and_ping, |db| {
    let context = db.context();
    assert_ok!(context.ping().await);

    let table = TableName::new("public.user_account").unwrap();
    let repo: Repository<UserAccount> = Repository::with_table(db.pool().clone(), table);
    let saved = assert_ok!(repo.save(&UserFixtures::random_account_record()).await);

    assert_ok!(db.clear_data().await);
    assert_eq!(assert_ok!(repo.find_by_id(saved.id).await), None);
});

db_test!(test_pool_survives_many_operations, |db| {
    let repo: UserAccountRepository = db.context().repository().unwrap();

    let tasks = (0..20)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.save(&UserFixtures::random_account_record()).await })
        })
        .collect::<Vec<_>>();

    let mut saved = 0;
    for task in tasks {
        // Random emails may collide on the unique constraint
        match task.await.unwrap() {
            Ok(_) => saved += 1,
            Err(error) => assert!(error.is_constraint_violation(), "got {:?}", error),
        }
    }

    assert_eq!(assert_ok!(repo.find_all().await).len(), saved);
});
