//! 행 변환기
//!
//! 스캔된 행을 `{ alias: value }` JSON 객체로 변환합니다.
//! `"<embed>____<key>"` 별칭은 `{ embed: { key: value } }`로 묶습니다.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Number, Value as Json};
use tbl_core::schema::{DataType, FieldDef};
use tbl_core::{Error, Result};

use crate::coerce::bind_type;
use crate::columns::{split_embedded, SelectedColumn};
use crate::dialect::Dialect;
use crate::value::{SqlType, SqlValue};

#[derive(Debug, Clone)]
struct OutputColumn {
    alias: String,
    embed: Option<(String, String)>,
    data_type: DataType,
}

/// 결과 행 변환기
///
/// 선택 컬럼마다 스캔 타입을 미리 정해 두고(`scan_types`), 실행기는 그 타입대로 읽습니다.
#[derive(Debug, Clone)]
pub struct Materializer {
    columns: Vec<OutputColumn>,
    scan_types: Vec<SqlType>,
}

impl Materializer {
    /// 변환 계획 생성
    ///
    /// `types`는 `table.field` -> 필드 정의. 선택 컬럼이 없으면 `FieldNotFound`.
    pub fn new(
        columns: &[SelectedColumn],
        types: &HashMap<String, FieldDef>,
        dialect: &dyn Dialect,
    ) -> Result<Self> {
        let mut out = Vec::with_capacity(columns.len());
        let mut scan_types = Vec::with_capacity(columns.len());
        let mut plain = HashSet::new();
        let mut embeds = HashSet::new();
        let mut seen = HashSet::new();

        for column in columns {
            let qualified = column.qualified();
            let def = types
                .get(&qualified)
                .ok_or(Error::FieldNotFound { field: qualified })?;

            if !seen.insert(column.alias.clone()) {
                return Err(Error::bad_request(format!(
                    "duplicate column alias: {}",
                    column.alias
                )));
            }

            let embed = split_embedded(&column.alias)
                .map(|(embed, key)| (embed.to_string(), key.to_string()));
            match &embed {
                Some((name, _)) => embeds.insert(name.clone()),
                None => plain.insert(column.alias.clone()),
            };

            scan_types.push(bind_type(def, dialect));
            out.push(OutputColumn {
                alias: column.alias.clone(),
                embed,
                data_type: def.data_type,
            });
        }

        if let Some(name) = plain.intersection(&embeds).next() {
            return Err(Error::bad_request(format!(
                "column alias collides with embed name: {}",
                name
            )));
        }

        Ok(Self {
            columns: out,
            scan_types,
        })
    }

    /// 컬럼별 스캔 타입 (SELECT 목록 순서)
    pub fn scan_types(&self) -> &[SqlType] {
        &self.scan_types
    }

    /// 출력 별칭 (SELECT 목록 순서)
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.alias.as_str())
    }

    /// 행 하나 변환
    pub fn materialize(&self, row: Vec<SqlValue>) -> Result<Json> {
        if row.len() != self.columns.len() {
            return Err(Error::database(format!(
                "row has {} columns, expected {}",
                row.len(),
                self.columns.len()
            )));
        }

        let mut object = Map::new();
        for (column, value) in self.columns.iter().zip(row) {
            let value = to_json(value, column.data_type);
            match &column.embed {
                Some((embed, key)) => {
                    let nested = object
                        .entry(embed.clone())
                        .or_insert_with(|| Json::Object(Map::new()));
                    if let Json::Object(map) = nested {
                        map.insert(key.clone(), value);
                    }
                }
                None => {
                    object.insert(column.alias.clone(), value);
                }
            }
        }
        Ok(Json::Object(object))
    }

    pub fn materialize_all(&self, rows: Vec<Vec<SqlValue>>) -> Result<Vec<Json>> {
        rows.into_iter().map(|row| self.materialize(row)).collect()
    }
}

/// 스캔 값 -> JSON
///
/// - 날짜: `YYYY-MM-DD`, 시각: `YYYY-MM-DD HH:MM:SS[.f]`
/// - NaN/무한대: `null`
/// - 배열 컬럼이 텍스트로 읽힌 경우 JSON 배열로 해석
pub fn to_json(value: SqlValue, data_type: DataType) -> Json {
    match value {
        SqlValue::Null(_) => Json::Null,
        SqlValue::Bool(b) => Json::Bool(b),
        SqlValue::Int16(i) => Json::from(i),
        SqlValue::Int32(i) => Json::from(i),
        SqlValue::Int64(i) => Json::from(i),
        // f32 -> f64 직접 변환은 0.1 같은 값에 오차가 붙음
        SqlValue::Float32(f) => f
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Json::Null, Json::Number),
        SqlValue::Float64(f) => Number::from_f64(f).map_or(Json::Null, Json::Number),
        SqlValue::Text(s) => match data_type {
            DataType::Array | DataType::TextArray => match serde_json::from_str::<Json>(&s) {
                Ok(parsed) if parsed.is_array() => parsed,
                _ => Json::String(s),
            },
            _ => Json::String(s),
        },
        SqlValue::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Timestamp(ts) => Json::String(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        SqlValue::TextArray(v) => Json::from(v),
        SqlValue::Int32Array(v) => Json::from(v),
        SqlValue::Int64Array(v) => Json::from(v),
        SqlValue::Json(v) => v,
    }
}
