//! Property-Based Test Generators
//!
//! Provides proptest strategies for partial records. Every generated
//! record is valid by construction: field names are plain identifiers and
//! unique within the record.

use chrono::NaiveDate;
use proptest::prelude::*;
use record_kernel::{FieldName, PartialRecord, Value};
use uuid::Uuid;

/// Strategy for generating valid field names other than `id`
pub fn field_name_strategy() -> impl Strategy<Value = FieldName> {
    "[a-z_][a-z0-9_]{0,15}"
        .prop_filter("id is reserved for the key", |name| name != "id")
        .prop_map(|name| FieldName::new(name).expect("pattern only yields identifiers"))
}

/// Strategy for generating bindable values
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
        "[ -~]{0,24}".prop_map(Value::Text),
        any::<u128>().prop_map(|n| Value::Uuid(Uuid::from_u128(n))),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        (0i64..60_000).prop_map(|days| {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
            Value::Date(epoch + chrono::Duration::days(days))
        }),
    ]
}

/// Strategy for generating partial records without an `id` field
///
/// Duplicate names collapse, so the record may be shorter than the number
/// of generated pairs, but never empty when `min >= 1`.
pub fn partial_record_strategy(min: usize, max: usize) -> impl Strategy<Value = PartialRecord> {
    prop::collection::vec((field_name_strategy(), value_strategy()), min..=max)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Strategy for generating update records: an `id` at any position plus
/// at least one other field
pub fn update_record_strategy(max_fields: usize) -> impl Strategy<Value = (i64, PartialRecord)> {
    (
        any::<i64>(),
        prop::collection::vec((field_name_strategy(), value_strategy()), 1..=max_fields),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(id, mut pairs, position)| {
            let id_field = FieldName::new("id").expect("id is an identifier");
            let at = position.index(pairs.len() + 1);
            pairs.insert(at, (id_field, Value::Int(id)));
            (id, pairs.into_iter().collect())
        })
}
