//! PostgreSQL 드라이버

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo};
use tbl_core::{Error, Result};
use tbl_sql::{Dialect, DialectKind, SqlType, SqlValue, Statement};

use super::{Database, Transaction};
use crate::error::db_error;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL 커넥션 풀
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> crate::error::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn dialect(&self) -> &'static dyn Dialect {
        DialectKind::Postgres.dialect()
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
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

fn bind_values<'q>(mut query: PgQuery<'q>, values: &[SqlValue]) -> PgQuery<'q> {
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
            SqlValue::TextArray(v) => query.bind(v),
            SqlValue::Int32Array(v) => query.bind(v),
            SqlValue::Int64Array(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

fn bind_null(query: PgQuery<'_>, ty: SqlType) -> PgQuery<'_> {
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
        SqlType::TextArray => query.bind(None::<Vec<String>>),
        SqlType::Int32Array => query.bind(None::<Vec<i32>>),
        SqlType::Int64Array => query.bind(None::<Vec<i64>>),
        SqlType::Json => query.bind(None::<sqlx::types::Json<serde_json::Value>>),
    }
}

fn decode_row(row: &PgRow, scan: &[SqlType]) -> Result<Vec<SqlValue>> {
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

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).map_err(db_error)
}

/// 선언 타입 계열 안에서는 실제 컬럼 타입 이름으로 디코딩
fn decode_column(row: &PgRow, index: usize, ty: SqlType) -> Result<SqlValue> {
    let type_name = row.column(index).type_info().name().to_ascii_uppercase();
    let value = match ty {
        SqlType::Int16 | SqlType::Int32 | SqlType::Int64 => match type_name.as_str() {
            "INT2" => get::<i16>(row, index)?.map(SqlValue::Int16),
            "INT4" => get::<i32>(row, index)?.map(SqlValue::Int32),
            _ => get::<i64>(row, index)?.map(SqlValue::Int64),
        },
        SqlType::Float32 | SqlType::Float64 => match type_name.as_str() {
            "FLOAT4" => get::<f32>(row, index)?.map(SqlValue::Float32),
            _ => get::<f64>(row, index)?.map(SqlValue::Float64),
        },
        SqlType::Bool => get::<bool>(row, index)?.map(SqlValue::Bool),
        SqlType::Text => match type_name.as_str() {
            "UUID" => get::<uuid::Uuid>(row, index)?.map(|v| SqlValue::Text(v.to_string())),
            "JSON" | "JSONB" => get::<serde_json::Value>(row, index)?
                .map(|v| SqlValue::Text(v.to_string())),
            _ => get::<String>(row, index)?.map(SqlValue::Text),
        },
        SqlType::Date => get::<NaiveDate>(row, index)?.map(SqlValue::Date),
        SqlType::Timestamp => match type_name.as_str() {
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index)?
                .map(|v| SqlValue::Timestamp(v.naive_utc())),
            "DATE" => get::<NaiveDate>(row, index)?.map(SqlValue::Date),
            _ => get::<NaiveDateTime>(row, index)?.map(SqlValue::Timestamp),
        },
        SqlType::TextArray | SqlType::Int32Array | SqlType::Int64Array => {
            match type_name.as_str() {
                "INT4[]" => get::<Vec<i32>>(row, index)?.map(SqlValue::Int32Array),
                "INT8[]" => get::<Vec<i64>>(row, index)?.map(SqlValue::Int64Array),
                "JSON" | "JSONB" => get::<serde_json::Value>(row, index)?.map(SqlValue::Json),
                _ => get::<Vec<String>>(row, index)?.map(SqlValue::TextArray),
            }
        }
        SqlType::Json => match type_name.as_str() {
            "JSON" | "JSONB" => get::<serde_json::Value>(row, index)?.map(SqlValue::Json),
            _ => get::<String>(row, index)?.map(SqlValue::Text),
        },
    };
    Ok(value.unwrap_or(SqlValue::Null(ty)))
}
