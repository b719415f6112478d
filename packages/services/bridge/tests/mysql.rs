//! 실제 MySQL 대상 통합 테스트
//!
//! `TBL_TEST_MYSQL_URL`이 없으면 아무것도 하지 않습니다.
//! 부호 없는 정수, FLOAT, TINYINT(1), JSON 배열 컬럼을 거쳐 드라이버의 바인딩과 디코딩을 확인합니다.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::mysql::MySqlPool;
use tbl_bridge::db::{DatabaseRegistry, MySqlDatabase};
use tbl_bridge::Engine;
use tbl_core::catalog::CatalogStore;
use tbl_core::identity::TrustedHeaderProvider;
use tokio_util::sync::CancellationToken;

/// drop 시 테스트 테이블 삭제 (multi_thread 런타임 전용)
struct TableGuard {
    pool: MySqlPool,
    name: String,
}

impl Drop for TableGuard {
    fn drop(&mut self) {
        let sql = format!("DROP TABLE IF EXISTS `{}`", self.name);
        let pool = self.pool.clone();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                if let Err(e) = sqlx::query(&sql).execute(&pool).await {
                    eprintln!("failed to drop test table: {}", e);
                }
            })
        });
    }
}

struct Fixture {
    engine: Engine,
    table: TableGuard,
}

async fn fixture() -> Option<Fixture> {
    let url = std::env::var("TBL_TEST_MYSQL_URL").ok()?;
    let pool = MySqlPool::connect(&url).await.unwrap();
    let name = format!("tbl_it_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!(
        "CREATE TABLE `{}` (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
         email VARCHAR(64) NOT NULL UNIQUE, visits INT UNSIGNED, score FLOAT, \
         active TINYINT(1), joined DATE, tags JSON, `order` INT, \
         created_by VARCHAR(64), updated_by VARCHAR(64))",
        name
    ))
    .execute(&pool)
    .await
    .unwrap();

    let table = TableGuard {
        pool: pool.clone(),
        name,
    };

    let mut databases = DatabaseRegistry::new();
    databases.insert("main", Arc::new(MySqlDatabase::from_pool(pool)));
    let engine = Engine::new(
        databases,
        Arc::new(CatalogStore::new()),
        Arc::new(TrustedHeaderProvider::default()),
    );
    Some(Fixture { engine, table })
}

impl Fixture {
    async fn call(&self, body: Value) -> tbl_core::response::Response {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.engine
            .handle("it", Some("tester"), &bytes, CancellationToken::new())
            .await
    }

    fn table(&self) -> &str {
        &self.table.name
    }

    fn column(&self, field: &str) -> String {
        format!("{}.{}", self.table(), field)
    }
}

fn field_defs() -> Value {
    json!([
        { "field_name": "id", "data_type": "_auto_inc" },
        { "field_name": "email", "data_type": "string", "required": true },
        { "field_name": "visits", "data_type": "int64" },
        { "field_name": "score", "data_type": "float32" },
        { "field_name": "active", "data_type": "boolean" },
        { "field_name": "joined", "data_type": "date" },
        { "field_name": "tags", "data_type": "text_array" },
        { "field_name": "order", "data_type": "int32" },
        { "field_name": "created_by", "data_type": "_creator" },
        { "field_name": "updated_by", "data_type": "_updater" }
    ])
}

#[tokio::test(flavor = "multi_thread")]
async fn test_driver_types_round_trip() {
    let Some(fx) = fixture().await else {
        return;
    };

    let inserted = fx
        .call(json!({
            "request_type": "insert",
            "table_name": fx.table(),
            "field_defs": field_defs(),
            "records": [
                {
                    "email": "ann@x", "visits": 4000000000u64, "score": 1.5, "active": true,
                    "joined": "2024-02-29", "tags": ["a", "b"], "order": 1
                },
                // 빠진 필드는 타입이 지정된 NULL로 바인딩
                { "email": "bob@x" }
            ]
        }))
        .await;
    assert!(inserted.status, "{}", inserted.error_msg);
    assert_eq!(inserted.num_records, 2);

    let resp = fx
        .call(json!({
            "request_type": "query",
            "table_name": fx.table(),
            "field_defs": field_defs(),
            "field_names": [
                fx.column("id"),
                fx.column("email"),
                fx.column("visits"),
                fx.column("score"),
                fx.column("active"),
                fx.column("joined"),
                fx.column("tags"),
                fx.column("order"),
                fx.column("created_by")
            ],
            "orderby_def": [{ "field_name": "email" }],
            "page_size": 10
        }))
        .await;
    assert!(resp.status, "{}", resp.error_msg);
    assert_eq!(resp.num_records, 2);

    let ann = &resp.results[0];
    assert!(ann["id"].is_i64(), "{}", ann);
    assert_eq!(ann["email"], json!("ann@x"));
    assert_eq!(ann["visits"], json!(4000000000i64));
    assert_eq!(ann["score"], json!(1.5));
    assert_eq!(ann["active"], json!(true));
    assert_eq!(ann["joined"], json!("2024-02-29"));
    assert_eq!(ann["tags"], json!(["a", "b"]));
    assert_eq!(ann["order"], json!(1));
    assert_eq!(ann["created_by"], json!("tester"));

    let bob = &resp.results[1];
    assert_eq!(bob["visits"], Value::Null);
    assert_eq!(bob["tags"], Value::Null);
    assert_eq!(bob["active"], Value::Null);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upsert_updates_existing_row() {
    let Some(fx) = fixture().await else {
        return;
    };

    let insert = |visits: i64| {
        json!({
            "request_type": "insert",
            "table_name": fx.table(),
            "field_defs": field_defs(),
            "records": [{ "email": "ann@x", "visits": visits }],
            "on_conflict_cols": ["email"],
            "on_conflict_update_cols": ["visits"]
        })
    };
    let first = fx.call(insert(1)).await;
    assert!(first.status, "{}", first.error_msg);
    let second = fx.call(insert(2)).await;
    assert!(second.status, "{}", second.error_msg);

    let resp = fx
        .call(json!({
            "request_type": "query",
            "table_name": fx.table(),
            "field_defs": field_defs(),
            "field_names": [fx.column("visits")],
            "page_size": 10
        }))
        .await;
    assert!(resp.status, "{}", resp.error_msg);
    assert_eq!(resp.results, vec![json!({ "visits": 2 })]);
}
