//! Pre-built Test Fixtures
//!
//! Provides a sample entity wired to a repository through the naming
//! convention, together with matching rows and partial records.

use chrono::{DateTime, TimeZone, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use record_db::repository;
use record_kernel::{PartialRecord, Row, Value};
use serde::Deserialize;
use uuid::Uuid;

/// Sample entity stored in the `user_account` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub created_at: DateTime<Utc>,
}

repository!(
    /// Repository for [`UserAccount`], resolving to the `user_account` table
    pub UserAccountRepository => UserAccount
);

/// Sample entity stored in `inventory_item`, whose `status` is an enum
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub status: String,
    pub sku: Option<Uuid>,
    pub quantity: Option<i32>,
    pub restocked_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

repository!(
    /// Repository for [`InventoryItem`], resolving to the `inventory_item` table
    pub InventoryItemRepository => InventoryItem
);

/// Fixture for user account rows and records
pub struct UserFixtures;

impl UserFixtures {
    /// Fixed creation timestamp (Jan 1, 2024)
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// A `user_account` row as the database would return it
    pub fn row(id: i64, name: &str, age: Option<i32>) -> Row {
        Row::new()
            .column("id", id)
            .column("name", name)
            .column("email", format!("{}@example.com", name.to_lowercase()))
            .column("age", age)
            .column("created_at", Self::created_at())
    }

    /// The entity [`UserFixtures::row`] maps to
    pub fn account(id: i64, name: &str, age: Option<i32>) -> UserAccount {
        UserAccount {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            age,
            created_at: Self::created_at(),
        }
    }

    /// `{ name, email, age }` for inserting a new account
    pub fn new_account_record(name: &str, age: i32) -> PartialRecord {
        PartialRecord::new()
            .with("name", name)
            .and_then(|r| r.with("email", format!("{}@example.com", name.to_lowercase())))
            .and_then(|r| r.with("age", age))
            .unwrap()
    }

    /// A new-account record with generated name and email
    pub fn random_account_record() -> PartialRecord {
        let name: String = Name().fake();
        let email: String = SafeEmail().fake();
        PartialRecord::new()
            .with("name", name)
            .and_then(|r| r.with("email", email))
            .and_then(|r| r.with("age", (18..90).fake::<i32>()))
            .unwrap()
    }

    /// A record built from (field, value) pairs in the given order
    pub fn record(fields: &[(&str, Value)]) -> PartialRecord {
        fields
            .iter()
            .try_fold(PartialRecord::new(), |record, (name, value)| {
                record.with(name, value.clone())
            })
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_maps_to_account() {
        let account: UserAccount = UserFixtures::row(1, "Alice", Some(30)).into_entity().unwrap();
        assert_eq!(account, UserFixtures::account(1, "Alice", Some(30)));
    }

    #[test]
    fn test_inventory_repository_table() {
        use record_db::Entity;
        assert_eq!(InventoryItem::table_name().unwrap().as_str(), "inventory_item");
    }

    #[test]
    fn test_random_record_has_insert_fields() {
        let record = UserFixtures::random_account_record();
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["name", "email", "age"]);
    }
}
