//! Parameterized SQL synthesis
//!
//! Builds statement text with positional placeholders (`$1`, `$2`, ...) and
//! the parallel, ordered list of values to bind. Field names come from
//! `PartialRecord`, whose `FieldName`s are validated identifiers, so they
//! are the only caller input spliced into the text. Table names come from
//! `TableName`.
//!
//! # Placeholder numbering
//!
//! - Equality conjunction and insert: `$1..$n` in record order.
//! - Update: `$1` is the `id` condition wherever `id` sits in the record;
//!   the remaining fields are numbered sequentially from `$2` in record
//!   order. `id` is excluded by field name, never by value.
//!
//! # Degenerate input
//!
//! An empty record produces an empty conjunction (and empty insert lists).
//! The text is not rewritten: `DELETE FROM t WHERE ` is a syntax error for
//! the database, which is what keeps an empty delete from matching every row.

use record_kernel::{PartialRecord, TableName, Value};

use crate::error::DatabaseError;

/// The field every table is keyed by
pub const ID_FIELD: &str = "id";

/// `f1 = $1 AND f2 = $2 ...` with its values
#[derive(Debug, Clone, PartialEq)]
pub struct Conjunction {
    pub clause: String,
    pub values: Vec<Value>,
}

/// Column list, placeholder list and values for an INSERT
#[derive(Debug, Clone, PartialEq)]
pub struct InsertClause {
    pub columns: String,
    pub placeholders: String,
    pub values: Vec<Value>,
}

/// SET assignments, WHERE condition and values for an UPDATE
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateClause {
    pub assignments: String,
    pub condition: String,
    pub values: Vec<Value>,
}

/// Builds an equality conjunction over every field of the record
pub fn equality_conjunction(record: &PartialRecord) -> Conjunction {
    let clause = record
        .field_names()
        .enumerate()
        .map(|(i, field)| format!("{} = ${}", field, i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");

    Conjunction {
        clause,
        values: record.values().cloned().collect(),
    }
}

/// Builds the column and placeholder lists of an INSERT
pub fn insert_clause(record: &PartialRecord) -> InsertClause {
    let columns = record.field_names().collect::<Vec<_>>().join(", ");
    let placeholders = (1..=record.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    InsertClause {
        columns,
        placeholders,
        values: record.values().cloned().collect(),
    }
}

/// Builds the SET assignments and `id = $1` condition of an UPDATE
///
/// # Errors
///
/// Returns `DatabaseError::BadRequest` if the record has no `id` field, or
/// has nothing besides `id` to assign
pub fn update_clause(record: &PartialRecord) -> Result<UpdateClause, DatabaseError> {
    let id = record
        .get(ID_FIELD)
        .cloned()
        .ok_or_else(|| DatabaseError::bad_request("update requires an 'id' field"))?;

    let mut assignments = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    values.push(id);

    for (field, value) in record.iter().filter(|(field, _)| field.as_str() != ID_FIELD) {
        values.push(value.clone());
        assignments.push(format!("{} = ${}", field, values.len()));
    }

    if assignments.is_empty() {
        return Err(DatabaseError::bad_request("update has no fields to set besides 'id'"));
    }

    Ok(UpdateClause {
        assignments: assignments.join(", "),
        condition: format!("{} = $1", ID_FIELD),
        values,
    })
}

/// Whether a statement returns rows or only a row count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Fetch,
    Execute,
}

/// A complete statement ready to run on a leased connection
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub kind: StatementKind,
}

impl Statement {
    /// `SELECT * FROM t`
    pub fn select_all(table: &TableName) -> Self {
        Self {
            sql: format!("SELECT * FROM {}", table),
            params: Vec::new(),
            kind: StatementKind::Fetch,
        }
    }

    /// `SELECT * FROM t WHERE id = $1`
    pub fn select_by_id(table: &TableName, id: i64) -> Self {
        Self {
            sql: format!("SELECT * FROM {} WHERE {} = $1", table, ID_FIELD),
            params: vec![Value::Int(id)],
            kind: StatementKind::Fetch,
        }
    }

    /// `SELECT * FROM t WHERE f1 = $1 AND ...`
    pub fn select_where(table: &TableName, record: &PartialRecord) -> Self {
        let Conjunction { clause, values } = equality_conjunction(record);
        Self {
            sql: format!("SELECT * FROM {} WHERE {}", table, clause),
            params: values,
            kind: StatementKind::Fetch,
        }
    }

    /// `INSERT INTO t (f1, ...) VALUES ($1, ...) RETURNING *`
    pub fn insert(table: &TableName, record: &PartialRecord) -> Self {
        let InsertClause {
            columns,
            placeholders,
            values,
        } = insert_clause(record);
        Self {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                table, columns, placeholders
            ),
            params: values,
            kind: StatementKind::Fetch,
        }
    }

    /// `UPDATE t SET f2 = $2, ... WHERE id = $1 RETURNING *`
    ///
    /// # Errors
    ///
    /// Propagates the `BadRequest` from [`update_clause`]
    pub fn update(table: &TableName, record: &PartialRecord) -> Result<Self, DatabaseError> {
        let UpdateClause {
            assignments,
            condition,
            values,
        } = update_clause(record)?;
        Ok(Self {
            sql: format!(
                "UPDATE {} SET {} WHERE {} RETURNING *",
                table, assignments, condition
            ),
            params: values,
            kind: StatementKind::Fetch,
        })
    }

    /// `DELETE FROM t WHERE f1 = $1 AND ...`
    pub fn delete(table: &TableName, record: &PartialRecord) -> Self {
        let Conjunction { clause, values } = equality_conjunction(record);
        Self {
            sql: format!("DELETE FROM {} WHERE {}", table, clause),
            params: values,
            kind: StatementKind::Execute,
        }
    }
}
