//! PostgreSQL 스토리지 구현.
//!
//! 모든 컬렉션은 `sync_records` 테이블 하나에 JSONB로 저장되며
//! `collection`과 `user_scope` 컬럼으로 구분됩니다.
//! 진행률과 플래그는 `report_state` key-value 테이블에 저장됩니다.

use async_trait::async_trait;
use report_core::{
    Credential, DatabaseConfig, KeyLists, LocalStore, Progress, Record, RecordQuery, SortOrder,
    StoreError, StoreResult,
};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument};

const PROGRESS_KEY: &str = "progress";

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn flag_key(name: &str) -> String {
    format!("flag:{}", name)
}

fn into_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(obj) => Some(obj),
        _ => None,
    }
}

/// PostgreSQL 기반 `LocalStore`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// 새로운 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await
            .map_err(db_err)?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 기존 연결 풀에서 생성합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 저장소 테이블을 생성합니다 (마이그레이션 실행).
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }

    async fn put_state(&self, key: &str, value: Value) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO report_state (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_state(&self, key: &str) -> StoreResult<Option<Value>> {
        sqlx::query_scalar::<_, Value>("SELECT value FROM report_state WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl LocalStore for PgStore {
    async fn list_active_credentials(&self) -> StoreResult<Vec<Value>> {
        sqlx::query_scalar::<_, Value>(
            "SELECT auth FROM report_users WHERE is_active = TRUE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    #[instrument(skip(self, auth), fields(api_key = %auth.masked_key()))]
    async fn get_latest_record(
        &self,
        collection: &str,
        auth: &Credential,
        sort: &SortOrder,
    ) -> StoreResult<Option<Record>> {
        // 정렬 방향은 ASC/DESC 상수만 삽입
        let sql = format!(
            r#"
            SELECT data FROM sync_records
            WHERE collection = $1 AND user_scope = $2
            ORDER BY (data ->> $3)::NUMERIC {} NULLS LAST, id DESC
            LIMIT 1
            "#,
            sort.direction.as_sql()
        );

        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(collection)
            .bind(&auth.api_key)
            .bind(&sort.field)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.and_then(into_record))
    }

    async fn insert_records(
        &self,
        collection: &str,
        auth: &Credential,
        records: Vec<Record>,
    ) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        let batch = Value::Array(records.into_iter().map(Value::Object).collect());

        sqlx::query(
            r#"
            INSERT INTO sync_records (collection, user_scope, data)
            SELECT $1, $2, elem FROM jsonb_array_elements($3::JSONB) AS elem
            "#,
        )
        .bind(collection)
        .bind(&auth.api_key)
        .bind(batch)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        debug!(collection, count, "Inserted records");
        Ok(())
    }

    async fn upsert_if_absent(
        &self,
        collection: &str,
        key_fields: &[String],
        records: Vec<Record>,
    ) -> StoreResult<u64> {
        if key_fields.is_empty() {
            return Err(StoreError::InvalidInput("key_fields is empty".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut inserted = 0;

        for record in records {
            let key: Record = key_fields
                .iter()
                .map(|k| (k.clone(), record.get(k).cloned().unwrap_or(Value::Null)))
                .collect();

            let result = sqlx::query(
                r#"
                INSERT INTO sync_records (collection, user_scope, data)
                SELECT $1::TEXT, NULL, $2::JSONB
                WHERE NOT EXISTS (
                    SELECT 1 FROM sync_records
                    WHERE collection = $1::TEXT AND data @> $3::JSONB
                )
                "#,
            )
            .bind(collection)
            .bind(Value::Object(record))
            .bind(Value::Object(key))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn delete_where_key_not_in(
        &self,
        collection: &str,
        lists: &KeyLists,
    ) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut deleted = 0;

        for (field, allowed) in lists {
            // 필드가 없으면 data -> $2 가 NULL 이므로 [null] 비교로 삭제 대상
            let result = sqlx::query(
                r#"
                DELETE FROM sync_records
                WHERE collection = $1
                  AND NOT ($3::JSONB @> jsonb_build_array(data -> $2))
                "#,
            )
            .bind(collection)
            .bind(field)
            .bind(Value::Array(allowed.clone()))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            deleted += result.rows_affected();
        }

        tx.commit().await.map_err(db_err)?;
        Ok(deleted)
    }

    async fn set_progress(&self, progress: &Progress) -> StoreResult<()> {
        self.put_state(PROGRESS_KEY, serde_json::to_value(progress)?)
            .await
    }

    async fn get_progress(&self) -> StoreResult<Option<Progress>> {
        match self.get_state(PROGRESS_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set_flag(&self, name: &str, value: bool) -> StoreResult<()> {
        self.put_state(&flag_key(name), Value::Bool(value)).await
    }

    async fn get_flag(&self, name: &str) -> StoreResult<Option<bool>> {
        Ok(self
            .get_state(&flag_key(name))
            .await?
            .and_then(|v| v.as_bool()))
    }

    async fn query_records(
        &self,
        collection: &str,
        auth: Option<&Credential>,
        query: &RecordQuery,
    ) -> StoreResult<Vec<Record>> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT data FROM sync_records
            WHERE collection = $1
              AND user_scope IS NOT DISTINCT FROM $2
              AND ($4::BIGINT IS NULL OR (data ->> $3)::NUMERIC >= $4)
              AND ($5::BIGINT IS NULL OR (data ->> $3)::NUMERIC <= $5)
            ORDER BY (data ->> $3)::NUMERIC DESC NULLS LAST, id DESC
            LIMIT $6
            "#,
        )
        .bind(collection)
        .bind(auth.map(|a| a.api_key.as_str()))
        .bind(&query.date_field)
        .bind(query.start)
        .bind(query.end)
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().filter_map(into_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_key() {
        assert_eq!(flag_key("syncMode"), "flag:syncMode");
    }

    #[test]
    fn test_into_record_rejects_non_objects() {
        assert!(into_record(json!({"a": 1})).is_some());
        assert!(into_record(json!([1, 2])).is_none());
        assert!(into_record(Value::Null).is_none());
    }
}
