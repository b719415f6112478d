//! MySQL 드라이버
//!
//! 배열은 JSON 문서로 주고받습니다.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Decode, MySql, Row, Type, TypeInfo};
use tbl_core::{Error, Result};
use tbl_sql::{Dialect, DialectKind, SqlType, SqlValue, Statement};

use super::{Database, Transaction};
use crate::error::db_error;

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// MySQL 커넥션 풀
#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> crate::error::Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    fn dialect(&self) -> &'static dyn Dialect {
        DialectKind::MySql.dialect()
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(MySqlTransaction { tx }))
    }
}

struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "execute");
        let result = bind_values(sqlx::query(&statement.sql), &statement.params)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn fetch(
        &mut self,
        statement: &Statement,
        scan: &[SqlType],
    ) -> Result<Vec<Vec<SqlValue>>> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "fetch");
        let rows = bind_values(sqlx::query(&statement.sql), &statement.params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
        rows.iter().map(|row| decode_row(row, scan)).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(db_error)
    }
}

fn bind_values<'q>(mut query: MySqlQuery<'q>, values: &[SqlValue]) -> MySqlQuery<'q> {
    for value in values {
        query = match value.clone() {
            SqlValue::Null(ty) => bind_null(query, ty),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int16(v) => query.bind(v),
            SqlValue::Int32(v) => query.bind(v),
            SqlValue::Int64(v) => query.bind(v),
            SqlValue::Float32(v) => query.bind(v),
            SqlValue::Float64(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::TextArray(v) => query.bind(sqlx::types::Json(json!(v))),
            SqlValue::Int32Array(v) => query.bind(sqlx::types::Json(json!(v))),
            SqlValue::Int64Array(v) => query.bind(sqlx::types::Json(json!(v))),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

fn bind_null(query: MySqlQuery<'_>, ty: SqlType) -> MySqlQuery<'_> {
    match ty {
        SqlType::Bool => query.bind(None::<bool>),
        SqlType::Int16 => query.bind(None::<i16>),
        SqlType::Int32 => query.bind(None::<i32>),
        SqlType::Int64 => query.bind(None::<i64>),
        SqlType::Float32 => query.bind(None::<f32>),
        SqlType::Float64 => query.bind(None::<f64>),
        SqlType::Text => query.bind(None::<String>),
        SqlType::Date => query.bind(None::<NaiveDate>),
        SqlType::Timestamp => query.bind(None::<NaiveDateTime>),
        SqlType::TextArray | SqlType::Int32Array | SqlType::Int64Array | SqlType::Json => {
            query.bind(None::<sqlx::types::Json<serde_json::Value>>)
        }
    }
}

fn decode_row(row: &MySqlRow, scan: &[SqlType]) -> Result<Vec<SqlValue>> {
    if row.len() != scan.len() {
        return Err(Error::database(format!(
            "row has {} columns, expected {}",
            row.len(),
            scan.len()
        )));
    }
    scan.iter()
        .enumerate()
        .map(|(i, ty)| decode_column(row, i, *ty))
        .collect()
}

fn get<'r, T>(row: &'r MySqlRow, index: usize) -> Result<Option<T>>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).map_err(db_error)
}

fn widen<T: TryInto<i64> + ToString + Copy>(value: T) -> Result<i64> {
    value
        .try_into()
        .map_err(|_| Error::database(format!("unsigned value out of range: {}", value.to_string())))
}

fn decode_column(row: &MySqlRow, index: usize, ty: SqlType) -> Result<SqlValue> {
    let type_name = row.column(index).type_info().name().to_ascii_uppercase();
    let value = match ty {
        SqlType::Int16 | SqlType::Int32 | SqlType::Int64 => match type_name.as_str() {
            "TINYINT" => get::<i8>(row, index)?.map(|v| SqlValue::Int16(v.into())),
            "SMALLINT" => get::<i16>(row, index)?.map(SqlValue::Int16),
            "MEDIUMINT" | "INT" => get::<i32>(row, index)?.map(SqlValue::Int32),
            "TINYINT UNSIGNED" => get::<u8>(row, index)?.map(|v| SqlValue::Int16(v.into())),
            "SMALLINT UNSIGNED" => get::<u16>(row, index)?.map(|v| SqlValue::Int32(v.into())),
            "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => {
                get::<u32>(row, index)?.map(|v| SqlValue::Int64(v.into()))
            }
            "BIGINT UNSIGNED" => match get::<u64>(row, index)? {
                Some(v) => Some(SqlValue::Int64(widen(v)?)),
                None => None,
            },
            "BOOLEAN" => get::<bool>(row, index)?.map(|v| SqlValue::Int16(v.into())),
            _ => get::<i64>(row, index)?.map(SqlValue::Int64),
        },
        SqlType::Float32 | SqlType::Float64 => match type_name.as_str() {
            "FLOAT" => get::<f32>(row, index)?.map(SqlValue::Float32),
            _ => get::<f64>(row, index)?.map(SqlValue::Float64),
        },
        SqlType::Bool => match type_name.as_str() {
            "TINYINT" => get::<i8>(row, index)?.map(|v| SqlValue::Bool(v != 0)),
            _ => get::<bool>(row, index)?.map(SqlValue::Bool),
        },
        SqlType::Text => match type_name.as_str() {
            "JSON" => get::<serde_json::Value>(row, index)?.map(|v| SqlValue::Text(v.to_string())),
            _ => get::<String>(row, index)?.map(SqlValue::Text),
        },
        SqlType::Date => get::<NaiveDate>(row, index)?.map(SqlValue::Date),
        SqlType::Timestamp => match type_name.as_str() {
            "DATE" => get::<NaiveDate>(row, index)?.map(SqlValue::Date),
            _ => get::<NaiveDateTime>(row, index)?.map(SqlValue::Timestamp),
        },
        // 배열은 JSON 컬럼 또는 JSON 텍스트
        SqlType::TextArray | SqlType::Int32Array | SqlType::Int64Array | SqlType::Json => {
            match type_name.as_str() {
                "JSON" => get::<serde_json::Value>(row, index)?.map(SqlValue::Json),
                _ => get::<String>(row, index)?.map(SqlValue::Text),
            }
        }
    };
    Ok(value.unwrap_or(SqlValue::Null(ty)))
}
