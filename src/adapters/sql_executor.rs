// PostgreSQL SQL実行アダプター
//
// `@name` 形式の名前付きパラメータを持つ SqlStatement を
// PostgreSQLの `$n` プレースホルダに書き換えてバインド・実行します。

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::Postgres;

use crate::adapters::database::execution_error;
use crate::core::error::OrmError;
use crate::core::value::{SqlStatement, SqlValue};
use crate::services::change_tracker::SqlExecutor;

/// 書き換え済みのSQLとバインド順の値
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSql {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// 名前付きパラメータを位置パラメータに書き換え
///
/// 同じ名前は同じ位置を再利用し、`Null` 値はバインドせず `NULL` キーワードに置き換えます。
/// 文字列リテラル内の `@` は対象外です。
///
/// # Returns
///
/// 書き換え結果、または未定義のパラメータを参照している場合は実行エラー
pub fn prepare_statement(statement: &SqlStatement) -> Result<PreparedSql, OrmError> {
    let mut sql = String::with_capacity(statement.sql.len());
    let mut values = Vec::new();
    let mut positions: Vec<(String, usize)> = Vec::new();
    let mut in_literal = false;

    let chars: Vec<char> = statement.sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            in_literal = !in_literal;
        }

        let starts_name = c == '@'
            && !in_literal
            && chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_');
        if !starts_name {
            sql.push(c);
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
            i += 1;
        }
        let name: String = chars[start..i].iter().collect();

        let value = statement.parameter(&name).ok_or_else(|| {
            OrmError::execution(
                format!("parameter '{}' is not defined", name),
                Some(&statement.sql),
            )
        })?;

        if value.is_null() {
            sql.push_str("NULL");
            continue;
        }

        let position = match positions.iter().find(|(n, _)| *n == name) {
            Some((_, position)) => *position,
            None => {
                values.push(value.clone());
                positions.push((name, values.len()));
                values.len()
            }
        };
        sql.push_str(&format!("${}", position));
    }

    Ok(PreparedSql { sql, values })
}

/// SqlValueをクエリにバインド
pub(crate) fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::BigInt(v) => query.bind(v),
        SqlValue::Double(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
    }
}

/// PostgreSQL SQL実行アダプター
#[derive(Debug, Clone)]
pub struct PgSqlExecutor {
    pool: PgPool,
}

impl PgSqlExecutor {
    /// 接続プールを指定して作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for PgSqlExecutor {
    async fn execute(&self, statement: &SqlStatement) -> Result<u64, OrmError> {
        let prepared = prepare_statement(statement)?;

        let mut query = sqlx::query(&prepared.sql);
        for value in prepared.values.iter().cloned() {
            query = bind_value(query, value);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| execution_error(e, &prepared.sql))?;

        tracing::debug!(sql = %prepared.sql, rows = result.rows_affected(), "Executed statement");
        Ok(result.rows_affected())
    }
}
