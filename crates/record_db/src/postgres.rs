//! PostgreSQL adapter for the pool capability
//!
//! Binds `Value`s onto SQLx queries and decodes `PgRow`s back into `Row`s
//! column by column.
//!
//! Text parameters are matched to the type the server infers for their
//! placeholder, so a string can target a UUID, DATE, NUMERIC or enum
//! column. Result columns never fail to decode: types without a typed
//! mapping come back as text when their wire bytes are printable UTF-8 and
//! as raw bytes otherwise.

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use record_kernel::{Row, Value};
use rust_decimal::Decimal;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnection, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::query::Query;
use sqlx::{Column, Decode, Either, Executor, PgPool, Postgres, Row as _, Type, TypeInfo};
use tracing::debug;
use uuid::Uuid;

use crate::connection::{ConnectionPool, PooledConnection, QueryOutput};
use crate::error::DatabaseError;

/// A connection checked out of a `PgPool`
///
/// Releasing drops the inner SQLx connection, which hands it back to the
/// pool. Statements after release fail with `ConnectionReleased`.
pub struct PgPooledConnection {
    inner: Option<PoolConnection<Postgres>>,
}

impl PgPooledConnection {
    pub fn new(connection: PoolConnection<Postgres>) -> Self {
        Self {
            inner: Some(connection),
        }
    }

    /// Returns true until the connection has been released
    pub fn is_held(&self) -> bool {
        self.inner.is_some()
    }

    fn connection(&mut self) -> Result<&mut PoolConnection<Postgres>, DatabaseError> {
        self.inner.as_mut().ok_or(DatabaseError::ConnectionReleased)
    }
}

impl std::fmt::Debug for PgPooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPooledConnection")
            .field("held", &self.is_held())
            .finish()
    }
}

#[async_trait]
impl PooledConnection for PgPooledConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError> {
        let connection = self.connection()?;
        let params = resolve_params(&mut **connection, sql, params).await?;
        let rows = bind_all(sql, params).fetch_all(&mut **connection).await?;

        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        Ok(QueryOutput::from_rows(rows))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutput, DatabaseError> {
        let connection = self.connection()?;
        let params = resolve_params(&mut **connection, sql, params).await?;
        let result = bind_all(sql, params).execute(&mut **connection).await?;

        Ok(QueryOutput::affected(result.rows_affected()))
    }

    fn release(&mut self) {
        // Dropping a PoolConnection returns it to the pool
        self.inner.take();
    }
}

#[async_trait]
impl ConnectionPool for PgPool {
    type Connection = PgPooledConnection;

    async fn acquire(&self) -> Result<Self::Connection, DatabaseError> {
        let connection = PgPool::acquire(self).await?;
        Ok(PgPooledConnection::new(connection))
    }
}

/// A parameter ready to bind
#[derive(Debug, Clone, PartialEq)]
enum Param {
    Value(Value),
    Time(NaiveTime),
    /// Sent with OID 0 so the server applies its own input conversion
    Untyped(String),
}

/// Converts text parameters into the types their placeholders expect
///
/// Only statements that carry a `Value::Text` pay for the extra describe
/// round trip.
async fn resolve_params(
    connection: &mut PgConnection,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Param>, DatabaseError> {
    if !params.iter().any(|value| matches!(value, Value::Text(_))) {
        return Ok(params.iter().cloned().map(Param::Value).collect());
    }

    let described = connection.describe(sql).await?;
    let inferred: &[PgTypeInfo] = match described.parameters() {
        Some(Either::Left(types)) => types,
        _ => &[],
    };

    params
        .iter()
        .enumerate()
        .map(|(index, value)| match (value, inferred.get(index)) {
            (Value::Text(text), Some(type_info)) => text_param(text, type_info),
            (value, _) => Ok(Param::Value(value.clone())),
        })
        .collect()
}

fn text_param(text: &str, type_info: &PgTypeInfo) -> Result<Param, DatabaseError> {
    match type_info.kind() {
        PgTypeKind::Enum(_) => Ok(Param::Untyped(text.to_string())),
        PgTypeKind::Domain(base) => text_param(text, base),
        _ => coerce_text(text, type_info.name()),
    }
}

/// Parses `text` into the value a parameter of `type_name` expects
///
/// Text-like types keep the string. Types without a parser here are sent
/// untyped, which suits types whose binary input is their text form.
fn coerce_text(text: &str, type_name: &str) -> Result<Param, DatabaseError> {
    let invalid = || DatabaseError::bad_request(format!("'{text}' is not a valid {type_name} value"));

    let value = match type_name {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => Value::Text(text.to_string()),
        "UUID" => Value::Uuid(Uuid::parse_str(text.trim()).map_err(|_| invalid())?),
        "DATE" => Value::Date(text.trim().parse::<NaiveDate>().map_err(|_| invalid())?),
        "TIMESTAMPTZ" => Value::Timestamp(
            text.trim()
                .parse::<DateTime<Utc>>()
                .map_err(|_| invalid())?,
        ),
        "TIMESTAMP" => Value::Timestamp(parse_naive_timestamp(text).ok_or_else(invalid)?.and_utc()),
        "TIME" => {
            return text
                .trim()
                .parse::<NaiveTime>()
                .map(Param::Time)
                .map_err(|_| invalid())
        }
        "NUMERIC" => Value::Decimal(text.trim().parse::<Decimal>().map_err(|_| invalid())?),
        "INT2" | "INT4" | "INT8" => Value::Int(text.trim().parse::<i64>().map_err(|_| invalid())?),
        "FLOAT4" | "FLOAT8" => Value::Float(text.trim().parse::<f64>().map_err(|_| invalid())?),
        "BOOL" => Value::Bool(parse_bool(text).ok_or_else(invalid)?),
        "JSON" | "JSONB" => Value::Json(serde_json::from_str(text).map_err(|_| invalid())?),
        "BYTEA" => Value::Bytes(text.as_bytes().to_vec()),
        _ => return Ok(Param::Untyped(text.to_string())),
    };

    Ok(Param::Value(value))
}

fn parse_naive_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Builds an unprepared-statement query with every parameter bound
///
/// The same SQL can carry different parameter types from one call to the
/// next (a NULL here, an integer there), so statements are not cached.
fn bind_all(sql: &str, params: Vec<Param>) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(sql).persistent(false);
    for param in params {
        query = match param {
            Param::Value(value) => bind_value(query, value),
            Param::Time(time) => query.bind(time),
            Param::Untyped(text) => query.bind(UntypedText(text)),
        };
    }
    query
}

/// A NULL parameter whose type the server infers from its position
///
/// OID 0 leaves the parameter unspecified in the Parse message, so a NULL
/// compared with or assigned to an INT4 or TIMESTAMPTZ column takes that
/// column's type.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// A string parameter of unspecified type, sent as its UTF-8 bytes
///
/// Enums and text-based extension types accept these bytes as their
/// binary input.
struct UntypedText(String);

impl Type<Postgres> for UntypedText {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedText {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }
}

/// Binds one value with the PostgreSQL type its variant maps to
fn bind_value(
    query: Query<'_, Postgres, PgArguments>,
    value: Value,
) -> Query<'_, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(v) => query.bind(v),
        Value::Int(v) => query.bind(v),
        Value::Float(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Uuid(v) => query.bind(v),
        Value::Timestamp(v) => query.bind(v),
        Value::Date(v) => query.bind(v),
        Value::Decimal(v) => query.bind(v),
        Value::Json(v) => query.bind(v),
        Value::Bytes(v) => query.bind(v),
    }
}

/// Typed decoding available for a column's scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Money,
    Text,
    Uuid,
    TimestampTz,
    Timestamp,
    Date,
    Time,
    Interval,
    Json,
    Bytes,
    Inet,
}

impl ColumnKind {
    fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "BOOL" => Self::Bool,
            "INT2" => Self::Int2,
            "INT4" => Self::Int4,
            "INT8" => Self::Int8,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "NUMERIC" => Self::Numeric,
            "MONEY" => Self::Money,
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Self::Text,
            "UUID" => Self::Uuid,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "TIMESTAMP" => Self::Timestamp,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "INTERVAL" => Self::Interval,
            "JSON" | "JSONB" => Self::Json,
            "BYTEA" => Self::Bytes,
            "INET" | "CIDR" => Self::Inet,
            _ => return None,
        };
        Some(kind)
    }

    fn decodes_arrays(self) -> bool {
        !matches!(self, Self::Money | Self::Interval | Self::Bytes | Self::Inet)
    }
}

/// How a result column is turned into a `Value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Scalar(ColumnKind),
    /// One-dimensional array, rendered as a JSON array
    Array(ColumnKind),
    /// Wire bytes as text or bytes
    Raw,
}

impl Decoder {
    fn for_type(type_info: &PgTypeInfo) -> Self {
        match type_info.kind() {
            PgTypeKind::Array(element) => match scalar_kind(element) {
                Some(kind) if kind.decodes_arrays() => Self::Array(kind),
                _ => Self::Raw,
            },
            _ => scalar_kind(type_info).map_or(Self::Raw, Self::Scalar),
        }
    }
}

fn scalar_kind(type_info: &PgTypeInfo) -> Option<ColumnKind> {
    match type_info.kind() {
        // Enum labels travel as text
        PgTypeKind::Enum(_) => Some(ColumnKind::Text),
        PgTypeKind::Domain(base) => scalar_kind(base),
        PgTypeKind::Simple => ColumnKind::from_type_name(type_info.name()),
        _ => None,
    }
}

/// Decodes every column of a result row
pub(crate) fn decode_row(row: &PgRow) -> Result<Row, DatabaseError> {
    let mut decoded = Row::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.type_info())?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_column(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value, DatabaseError> {
    let typed = match Decoder::for_type(type_info) {
        Decoder::Scalar(kind) => decode_scalar(row, index, kind),
        Decoder::Array(kind) => decode_array(row, index, kind),
        Decoder::Raw => return decode_raw(row, index),
    };

    typed.or_else(|error| {
        debug!(column = index, type_name = type_info.name(), %error, "Falling back to raw column bytes");
        decode_raw(row, index)
    })
}

fn get<'r, T: Decode<'r, Postgres>>(row: &'r PgRow, index: usize) -> Result<Option<T>, DatabaseError> {
    Ok(row.try_get_unchecked::<Option<T>, _>(index)?)
}

fn decode_scalar(row: &PgRow, index: usize, kind: ColumnKind) -> Result<Value, DatabaseError> {
    let value = match kind {
        ColumnKind::Bool => get::<bool>(row, index)?.map(Value::Bool),
        ColumnKind::Int2 => get::<i16>(row, index)?.map(Value::from),
        ColumnKind::Int4 => get::<i32>(row, index)?.map(Value::from),
        ColumnKind::Int8 => get::<i64>(row, index)?.map(Value::Int),
        ColumnKind::Float4 => get::<f32>(row, index)?.map(Value::from),
        ColumnKind::Float8 => get::<f64>(row, index)?.map(Value::Float),
        ColumnKind::Numeric => get::<Decimal>(row, index)?.map(Value::Decimal),
        ColumnKind::Money => get::<PgMoney>(row, index)?.map(|v| Value::Decimal(v.to_decimal(2))),
        ColumnKind::Text => get::<String>(row, index)?.map(Value::Text),
        ColumnKind::Uuid => get::<Uuid>(row, index)?.map(Value::Uuid),
        ColumnKind::TimestampTz => get::<DateTime<Utc>>(row, index)?.map(Value::Timestamp),
        ColumnKind::Timestamp => get::<NaiveDateTime>(row, index)?.map(|v| Value::Timestamp(v.and_utc())),
        ColumnKind::Date => get::<NaiveDate>(row, index)?.map(Value::Date),
        ColumnKind::Time => get::<NaiveTime>(row, index)?.map(|v| Value::Text(v.to_string())),
        ColumnKind::Interval => get::<PgInterval>(row, index)?.map(|v| interval_to_json(&v)),
        ColumnKind::Json => get::<serde_json::Value>(row, index)?.map(Value::Json),
        ColumnKind::Bytes => get::<Vec<u8>>(row, index)?.map(Value::Bytes),
        ColumnKind::Inet => get::<Vec<u8>>(row, index)?
            .map(|raw| format_inet(&raw).map_or(Value::Bytes(raw), Value::Text)),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn decode_array(row: &PgRow, index: usize, kind: ColumnKind) -> Result<Value, DatabaseError> {
    fn elements<T>(row: &PgRow, index: usize, convert: impl Fn(T) -> Value) -> Result<Value, DatabaseError>
    where
        T: for<'a> Decode<'a, Postgres> + Type<Postgres>,
    {
        let items = row.try_get_unchecked::<Option<Vec<Option<T>>>, _>(index)?;
        Ok(items.map_or(Value::Null, |items| {
            Value::Json(
                items
                    .into_iter()
                    .map(|item| item.map_or(Value::Null, &convert).to_json())
                    .collect(),
            )
        }))
    }

    match kind {
        ColumnKind::Bool => elements::<bool>(row, index, Value::Bool),
        ColumnKind::Int2 => elements::<i16>(row, index, Value::from),
        ColumnKind::Int4 => elements::<i32>(row, index, Value::from),
        ColumnKind::Int8 => elements::<i64>(row, index, Value::Int),
        ColumnKind::Float4 => elements::<f32>(row, index, Value::from),
        ColumnKind::Float8 => elements::<f64>(row, index, Value::Float),
        ColumnKind::Numeric => elements::<Decimal>(row, index, Value::Decimal),
        ColumnKind::Text => elements::<String>(row, index, Value::Text),
        ColumnKind::Uuid => elements::<Uuid>(row, index, Value::Uuid),
        ColumnKind::TimestampTz => elements::<DateTime<Utc>>(row, index, Value::Timestamp),
        ColumnKind::Timestamp => elements::<NaiveDateTime>(row, index, |v| Value::Timestamp(v.and_utc())),
        ColumnKind::Date => elements::<NaiveDate>(row, index, Value::Date),
        ColumnKind::Time => elements::<NaiveTime>(row, index, |v| Value::Text(v.to_string())),
        ColumnKind::Json => elements::<serde_json::Value>(row, index, Value::Json),
        ColumnKind::Money | ColumnKind::Interval | ColumnKind::Bytes | ColumnKind::Inet => {
            decode_raw(row, index)
        }
    }
}

fn decode_raw(row: &PgRow, index: usize) -> Result<Value, DatabaseError> {
    Ok(get::<Vec<u8>>(row, index)?.map_or(Value::Null, text_or_bytes))
}

/// Printable UTF-8 becomes text, anything else stays bytes
fn text_or_bytes(raw: Vec<u8>) -> Value {
    match String::from_utf8(raw) {
        Ok(text) if !text.chars().any(|c| c.is_control() && !c.is_whitespace()) => Value::Text(text),
        Ok(text) => Value::Bytes(text.into_bytes()),
        Err(error) => Value::Bytes(error.into_bytes()),
    }
}

fn interval_to_json(interval: &PgInterval) -> Value {
    Value::Json(serde_json::json!({
        "months": interval.months,
        "days": interval.days,
        "microseconds": interval.microseconds,
    }))
}

/// Renders the binary INET/CIDR form: family, bits, is_cidr, length, address
///
/// A host address (INET at full prefix length) prints without its suffix.
fn format_inet(raw: &[u8]) -> Option<String> {
    let [family, bits, is_cidr, length, address @ ..] = raw else {
        return None;
    };
    if address.len() != usize::from(*length) {
        return None;
    }

    let (ip, max_bits) = match family {
        2 => (IpAddr::from(<[u8; 4]>::try_from(address).ok()?), 32),
        3 => (IpAddr::from(<[u8; 16]>::try_from(address).ok()?), 128),
        _ => return None,
    };

    if *is_cidr == 0 && *bits == max_bits {
        Some(ip.to_string())
    } else {
        Some(format!("{ip}/{bits}"))
    }
}
