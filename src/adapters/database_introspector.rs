// データベースイントロスペクター
//
// PostgreSQLのカタログから実状態のスキーマスナップショットを取得します。
// 型・NULL許容・デフォルト値はデータベースの値をそのまま保持します。

use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::adapters::database::execution_error;
use crate::core::error::OrmError;
use crate::core::naming;
use crate::core::snapshot::{ColumnSnapshot, SchemaSnapshot, TableSnapshot};

const TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
        AND table_type = 'BASE TABLE'
        AND table_name <> $2
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        column_name::text,
        data_type::text,
        is_nullable::text,
        column_default::text,
        is_identity::text
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

/// 生のカラム情報
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub is_identity: bool,
}

impl RawColumnInfo {
    /// 識別子（IDENTITYまたはシーケンス既定値）カラムかどうか
    pub fn is_generated_key(&self) -> bool {
        self.is_identity
            || self
                .default_value
                .as_deref()
                .is_some_and(|d| d.starts_with("nextval("))
    }
}

/// カラム情報からテーブルスナップショットを構築
///
/// 最初の生成キーを識別子とし、それ以外は通常カラムとして保持します。
pub fn build_table_snapshot(columns: Vec<RawColumnInfo>) -> TableSnapshot {
    let mut table = TableSnapshot::new(None);

    for column in columns {
        if table.identity.is_none() && column.is_generated_key() {
            table.identity = Some(column.name);
            continue;
        }

        table.add_column(
            column.name,
            ColumnSnapshot {
                sql_type: column.data_type,
                nullable: column.is_nullable,
                unique: false,
                default_sql: column.default_value,
            },
        );
    }

    table
}

/// PostgreSQL用イントロスペクター
#[derive(Debug, Clone)]
pub struct PostgresIntrospector {
    schema: String,
}

impl PostgresIntrospector {
    /// 対象スキーマを指定してイントロスペクターを作成
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// テーブル名一覧を取得（履歴テーブルを除く）
    pub async fn get_table_names(&self, pool: &PgPool) -> Result<Vec<String>, OrmError> {
        let rows = sqlx::query(TABLES_SQL)
            .bind(&self.schema)
            .bind(naming::HISTORY_TABLE)
            .fetch_all(pool)
            .await
            .map_err(|e| execution_error(e, TABLES_SQL))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<_, _>>()
            .map_err(|e| execution_error(e, TABLES_SQL))
    }

    /// カラム情報を取得
    pub async fn get_columns(
        &self,
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Vec<RawColumnInfo>, OrmError> {
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(&self.schema)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| execution_error(e, COLUMNS_SQL))?;

        rows.iter()
            .map(|row| {
                Ok(RawColumnInfo {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    is_nullable: row.try_get::<String, _>(2)? == "YES",
                    default_value: row.try_get(3)?,
                    is_identity: row.try_get::<Option<String>, _>(4)?.as_deref() == Some("YES"),
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(|e| execution_error(e, COLUMNS_SQL))
    }

    /// 実状態のスナップショットを取得
    pub async fn introspect(&self, pool: &PgPool) -> Result<SchemaSnapshot, OrmError> {
        let mut snapshot = SchemaSnapshot::new();

        for table_name in self.get_table_names(pool).await? {
            let columns = self.get_columns(pool, &table_name).await?;
            snapshot.add_table(table_name, build_table_snapshot(columns));
        }

        tracing::debug!(
            schema = %self.schema,
            tables = snapshot.tables.len(),
            "Introspected database schema"
        );

        Ok(snapshot)
    }
}
