// エンティティリポジトリ
//
// 述語で絞り込んだ行をエンティティに復元し、
// 追跡中のインスタンスの変更をデータベースへ保存します。

use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::sync::{Arc, RwLock};

use crate::adapters::database::execution_error;
use crate::adapters::sql_executor::{bind_value, prepare_statement, PgSqlExecutor};
use crate::core::error::OrmError;
use crate::core::metadata::{EntityMetadata, ScalarKind};
use crate::core::naming;
use crate::core::predicate::Expr;
use crate::core::value::{SqlStatement, SqlValue};
use crate::services::change_tracker::{ChangeTracker, SaveOutcome, Shared};
use crate::services::entity_registry::{Entity, MetadataRegistry};
use crate::services::predicate_translator::{PredicateTranslator, SqlFragment};

/// SELECT句の1項目を生成
///
/// numeric は f64 として読み出すため double precision にキャストします。
fn select_item(column: &str, scalar: ScalarKind) -> String {
    let identifier = naming::sql_identifier(column);
    match scalar {
        ScalarKind::Decimal => format!("{}::double precision AS {}", identifier, identifier),
        _ => identifier,
    }
}

/// 絞り込みSELECT文を生成
pub fn build_select_sql(metadata: &EntityMetadata, fragment: &SqlFragment) -> String {
    let mut items = Vec::with_capacity(metadata.columns.len() + 1);
    if let Some(identity) = &metadata.identity {
        items.push(naming::sql_identifier(&identity.column));
    }
    items.extend(
        metadata
            .columns
            .iter()
            .map(|column| select_item(&column.name, column.scalar)),
    );

    format!(
        "SELECT {} FROM {} WHERE {}",
        items.join(", "),
        naming::sql_identifier(&metadata.table),
        fragment.sql
    )
}

fn decode_column(row: &PgRow, column: &str, scalar: ScalarKind) -> Result<SqlValue, sqlx::Error> {
    let value: SqlValue = match scalar {
        ScalarKind::Integer => row.try_get::<Option<i32>, _>(column)?.into(),
        ScalarKind::BigInt => row.try_get::<Option<i64>, _>(column)?.into(),
        ScalarKind::Text | ScalarKind::Other => row.try_get::<Option<String>, _>(column)?.into(),
        ScalarKind::Timestamp => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(column)?
            .into(),
        ScalarKind::Boolean => row.try_get::<Option<bool>, _>(column)?.into(),
        ScalarKind::Decimal | ScalarKind::Double => row.try_get::<Option<f64>, _>(column)?.into(),
        ScalarKind::Float => row.try_get::<Option<f32>, _>(column)?.into(),
    };
    Ok(value)
}

/// 識別子は integer / bigint のどちらでも読み出す
fn decode_identity(row: &PgRow, column: &str) -> Result<SqlValue, sqlx::Error> {
    match row.try_get::<Option<i32>, _>(column) {
        Ok(value) => Ok(value.into()),
        Err(sqlx::Error::ColumnDecode { .. }) => Ok(row.try_get::<Option<i64>, _>(column)?.into()),
        Err(e) => Err(e),
    }
}

/// エンティティリポジトリ
pub struct Repository {
    pool: PgPool,
    registry: Arc<MetadataRegistry>,
    translator: PredicateTranslator,
}

impl Repository {
    /// 新しいRepositoryを作成
    pub fn new(pool: PgPool, registry: Arc<MetadataRegistry>) -> Self {
        Self {
            pool,
            registry,
            translator: PredicateTranslator::new(),
        }
    }

    /// メタデータレジストリを取得
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// 述語に一致するエンティティを取得
    ///
    /// # Arguments
    ///
    /// * `predicate` - エンティティのプロパティに対する述語
    ///
    /// # Returns
    ///
    /// 復元したエンティティ、または変換・実行・型変換のエラー
    pub async fn find_where<T: Entity>(&self, predicate: &Expr) -> Result<Vec<T>, OrmError> {
        let mapping = self.registry.mapping::<T>()?;
        let metadata = mapping.metadata();

        let fragment = self.translator.translate(metadata, predicate)?;
        let statement = SqlStatement::new(build_select_sql(metadata, &fragment), fragment.parameters);
        let prepared = prepare_statement(&statement)?;

        let mut query = sqlx::query(&prepared.sql);
        for value in prepared.values.iter().cloned() {
            query = bind_value(query, value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| execution_error(e, &prepared.sql))?;

        tracing::debug!(
            entity = %metadata.entity,
            rows = rows.len(),
            "Loaded entities"
        );

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut entity = T::default();

            if let Some(identity) = mapping.identity() {
                let value = decode_identity(row, &identity.column)
                    .map_err(|e| execution_error(e, &prepared.sql))?;
                identity.set(&mut entity, value)?;
            }

            for (field, column) in mapping.fields().iter().zip(&metadata.columns) {
                let value = decode_column(row, &field.column, column.scalar)
                    .map_err(|e| execution_error(e, &prepared.sql))?;
                field.set(&mut entity, value)?;
            }

            entities.push(entity);
        }

        Ok(entities)
    }

    /// 述語に一致するエンティティを取得し、変更追跡を開始
    pub async fn find_where_tracked<T: Entity>(
        &self,
        predicate: &Expr,
        tracker: &mut ChangeTracker,
    ) -> Result<Vec<Shared<T>>, OrmError> {
        let entities = self.find_where::<T>(predicate).await?;

        let mut shared = Vec::with_capacity(entities.len());
        for entity in entities {
            let instance = Arc::new(RwLock::new(entity));
            tracker.track(&instance)?;
            shared.push(instance);
        }

        Ok(shared)
    }

    /// 追跡中の変更を保存
    pub async fn save_changes(&self, tracker: &mut ChangeTracker) -> SaveOutcome {
        let executor = PgSqlExecutor::new(self.pool.clone());
        tracker.save_changes(&executor).await
    }
}
