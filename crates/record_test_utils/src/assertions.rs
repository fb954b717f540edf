//! Custom Test Assertions
//!
//! Provides assertion helpers for synthesized SQL and pool accounting that
//! give more meaningful failure messages than bare `assert_eq!`.

use crate::mock_pool::{MockPool, PoolStats};

/// Extracts the placeholder numbers (`$1` → 1) in order of appearance
pub fn placeholder_indices(sql: &str) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut chars = sql.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            continue;
        }
        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        if let Ok(index) = digits.parse::<usize>() {
            indices.push(index);
        }
    }
    indices
}

/// Asserts that `sql` references `$1..$count` each exactly once, in order
///
/// # Panics
///
/// Panics with the offending placeholder sequence otherwise
pub fn assert_placeholders_sequential(sql: &str, count: usize) {
    let indices = placeholder_indices(sql);
    let expected = (1..=count).collect::<Vec<_>>();
    assert_eq!(
        indices, expected,
        "Placeholders in {:?} are {:?}, expected {:?}",
        sql, indices, expected
    );
}

/// Asserts that every acquired connection went back to the pool
pub fn assert_all_released(pool: &MockPool) {
    let stats = pool.stats();
    assert_eq!(
        stats.outstanding(),
        0,
        "Connections still leased: acquired={}, released={}",
        stats.acquired,
        stats.released
    );
}

/// Asserts exact acquire/release counts
pub fn assert_pool_stats(pool: &MockPool, acquired: usize, released: usize) {
    let stats = pool.stats();
    assert_eq!(
        (stats.acquired, stats.released),
        (acquired, released),
        "Unexpected pool accounting: {:?}",
        stats
    );
}

/// Asserts that the pool was never touched
pub fn assert_untouched(pool: &MockPool) {
    assert_eq!(pool.stats(), PoolStats::default(), "Expected no pool interaction");
    assert!(pool.statements().is_empty(), "Expected no statements");
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
