// PostgreSQLマイグレーションバックエンド
//
// マイグレーション履歴テーブルの自己プロビジョニング、履歴の読み書き、
// トランザクション・セーブポイント制御を担当します。

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::adapters::database::{connection_error, execution_error};
use crate::adapters::database_introspector::PostgresIntrospector;
use crate::core::error::OrmError;
use crate::core::migration::{MigrationRecord, NewMigration};
use crate::core::naming;
use crate::core::snapshot::SchemaSnapshot;
use crate::services::migration_backend::{MigrationBackend, MigrationTransaction};

/// 履歴テーブル作成SQLを生成
pub fn generate_create_history_table_sql() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{}" (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    applied_at TIMESTAMP NULL,
    rolled_back_at TIMESTAMP NULL,
    snapshot_json TEXT NOT NULL,
    up_sql TEXT NOT NULL,
    down_sql TEXT NOT NULL
)"#,
        naming::HISTORY_TABLE
    )
}

/// 旧形式の履歴テーブルに rolled_back_at を追加するSQLを生成
pub fn generate_add_rolled_back_column_sql() -> String {
    format!(
        r#"ALTER TABLE "{}" ADD COLUMN rolled_back_at TIMESTAMP NULL"#,
        naming::HISTORY_TABLE
    )
}

fn select_history_sql() -> String {
    format!(
        r#"SELECT id, name, snapshot_json, up_sql, down_sql, applied_at, rolled_back_at FROM "{}" ORDER BY id"#,
        naming::HISTORY_TABLE
    )
}

fn record_from_row(row: &PgRow) -> Result<MigrationRecord, sqlx::Error> {
    Ok(MigrationRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        snapshot_json: row.try_get("snapshot_json")?,
        up_sql: row.try_get("up_sql")?,
        down_sql: row.try_get("down_sql")?,
        applied_at: row.try_get("applied_at")?,
        rolled_back_at: row.try_get("rolled_back_at")?,
    })
}

/// PostgreSQLマイグレーションバックエンド
#[derive(Debug, Clone)]
pub struct PostgresMigrationBackend {
    pool: PgPool,
    introspector: PostgresIntrospector,
}

impl PostgresMigrationBackend {
    /// 接続プールと対象スキーマを指定して作成
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            introspector: PostgresIntrospector::new(schema),
        }
    }

    async fn has_rolled_back_column(&self) -> Result<bool, OrmError> {
        let sql = r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_name = $1 AND column_name = 'rolled_back_at'
            )
        "#;

        sqlx::query_scalar::<_, bool>(sql)
            .bind(naming::HISTORY_TABLE)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| execution_error(e, sql))
    }
}

#[async_trait]
impl MigrationBackend for PostgresMigrationBackend {
    async fn ensure_history_table(&self) -> Result<(), OrmError> {
        let sql = generate_create_history_table_sql();
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| execution_error(e, &sql))?;

        if !self.has_rolled_back_column().await? {
            let sql = generate_add_rolled_back_column_sql();
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| execution_error(e, &sql))?;
            tracing::info!(
                table = naming::HISTORY_TABLE,
                "Added rolled_back_at column to migration history"
            );
        }

        Ok(())
    }

    async fn introspect_schema(&self) -> Result<SchemaSnapshot, OrmError> {
        self.introspector.introspect(&self.pool).await
    }

    async fn history(&self) -> Result<Vec<MigrationRecord>, OrmError> {
        let sql = select_history_sql();
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| execution_error(e, &sql))?;

        rows.iter()
            .map(record_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| execution_error(e, &sql))
    }

    async fn begin(&self) -> Result<Box<dyn MigrationTransaction>, OrmError> {
        let tx = self.pool.begin().await.map_err(connection_error)?;
        Ok(Box::new(PgMigrationTransaction { tx }))
    }
}

/// PostgreSQLトランザクション
///
/// 破棄時にコミットされていなければsqlxがロールバックします。
pub struct PgMigrationTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MigrationTransaction for PgMigrationTransaction {
    async fn execute(&mut self, sql: &str) -> Result<(), OrmError> {
        sqlx::query(sql)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| execution_error(e, sql))?;
        tracing::debug!(sql, "Executed migration statement");
        Ok(())
    }

    async fn execute_isolated(&mut self, sql: &str) -> Result<(), OrmError> {
        let mut savepoint = sqlx::Connection::begin(&mut *self.tx)
            .await
            .map_err(|e| execution_error(e, "SAVEPOINT"))?;

        match sqlx::query(sql).execute(&mut *savepoint).await {
            Ok(_) => {
                savepoint
                    .commit()
                    .await
                    .map_err(|e| execution_error(e, "RELEASE SAVEPOINT"))?;
                tracing::debug!(sql, "Executed migration statement");
                Ok(())
            }
            Err(e) => {
                savepoint
                    .rollback()
                    .await
                    .map_err(|e| execution_error(e, "ROLLBACK TO SAVEPOINT"))?;
                Err(execution_error(e, sql))
            }
        }
    }

    async fn insert_record(&mut self, migration: &NewMigration) -> Result<i32, OrmError> {
        let sql = format!(
            r#"INSERT INTO "{}" (name, snapshot_json, up_sql, down_sql, applied_at) VALUES ($1, $2, $3, $4, now()) RETURNING id"#,
            naming::HISTORY_TABLE
        );

        sqlx::query_scalar::<_, i32>(&sql)
            .bind(&migration.name)
            .bind(&migration.snapshot_json)
            .bind(&migration.up_sql)
            .bind(&migration.down_sql)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| execution_error(e, &sql))
    }

    async fn mark_rolled_back(&mut self, id: i32) -> Result<(), OrmError> {
        let sql = format!(
            r#"UPDATE "{}" SET rolled_back_at = now() WHERE id = $1"#,
            naming::HISTORY_TABLE
        );
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| execution_error(e, &sql))?;
        Ok(())
    }

    async fn clear_rolled_back(&mut self, id: i32) -> Result<(), OrmError> {
        let sql = format!(
            r#"UPDATE "{}" SET rolled_back_at = NULL WHERE id = $1"#,
            naming::HISTORY_TABLE
        );
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| execution_error(e, &sql))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), OrmError> {
        self.tx
            .commit()
            .await
            .map_err(|e| execution_error(e, "COMMIT"))
    }

    async fn rollback(self: Box<Self>) -> Result<(), OrmError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| execution_error(e, "ROLLBACK"))
    }
}
