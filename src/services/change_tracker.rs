// 変更追跡サービス
//
// 追跡開始時点のスカラー値を記録し、保存時に変更されたカラムのみを更新する
// UPDATE文を生成・実行します。

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::core::error::OrmError;
use crate::core::naming;
use crate::core::value::{SqlParameter, SqlStatement, SqlValue};
use crate::services::entity_registry::{Entity, EntityMapping, MetadataRegistry};

/// 呼び出し元と共有される追跡対象インスタンス
pub type Shared<T> = Arc<RwLock<T>>;

/// パラメータ付きSQLの実行インターフェース
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// 文を実行して影響行数を返す
    async fn execute(&self, statement: &SqlStatement) -> Result<u64, OrmError>;
}

/// 保存待ちの更新
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub entity: String,
    pub identity: SqlValue,
    pub statement: SqlStatement,
}

/// 保存に失敗したインスタンス
#[derive(Debug)]
pub struct SaveFailure {
    pub entity: String,
    pub identity: SqlValue,
    pub error: OrmError,
}

/// save_changes の結果
#[derive(Debug, Default)]
pub struct SaveOutcome {
    /// 更新に成功したインスタンス数
    pub updated: usize,
    pub failures: Vec<SaveFailure>,
}

trait TrackedEntry: Send + Sync {
    fn pending_update(&self) -> Option<PendingUpdate>;
}

struct Tracked<T: Entity> {
    instance: Shared<T>,
    mapping: Arc<EntityMapping<T>>,
    /// プロパティ名 -> 追跡開始時の値
    original: IndexMap<String, SqlValue>,
}

impl<T: Entity> TrackedEntry for Tracked<T> {
    fn pending_update(&self) -> Option<PendingUpdate> {
        let instance = self
            .instance
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let identity_accessor = self.mapping.identity()?;
        let identity = identity_accessor.get(&instance);
        if identity.is_null() {
            return None;
        }

        let mut assignments = Vec::new();
        let mut parameters = Vec::new();

        for field in self.mapping.fields() {
            let current = field.get(&instance);
            if self.original.get(&field.property) == Some(&current) {
                continue;
            }

            let column = naming::sql_identifier(&field.column);
            if current.is_null() {
                assignments.push(format!("{} = NULL", column));
            } else {
                let name = format!("@p{}", parameters.len());
                assignments.push(format!("{} = {}", column, name));
                parameters.push(SqlParameter::new(name, current));
            }
        }

        if assignments.is_empty() {
            return None;
        }

        let metadata = self.mapping.metadata();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = @id;",
            naming::sql_identifier(&metadata.table),
            assignments.join(", "),
            naming::sql_identifier(&identity_accessor.column)
        );
        parameters.push(SqlParameter::new("@id", identity.clone()));

        Some(PendingUpdate {
            entity: metadata.entity.clone(),
            identity,
            statement: SqlStatement::new(sql, parameters),
        })
    }
}

/// 変更追跡サービス
///
/// インスタンス自体は呼び出し元が所有し、追跡器は開始時の値のみを保持します。
pub struct ChangeTracker {
    registry: Arc<MetadataRegistry>,
    entries: Vec<Box<dyn TrackedEntry>>,
    keys: HashSet<usize>,
}

impl ChangeTracker {
    /// 新しいChangeTrackerを作成
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self {
            registry,
            entries: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// インスタンスの追跡を開始
    ///
    /// 全スカラープロパティの現在値を記録します（ナビゲーションは対象外）。
    ///
    /// # Returns
    ///
    /// 新たに追跡した場合はtrue、既に追跡済みの場合はfalse
    pub fn track<T: Entity>(&mut self, instance: &Shared<T>) -> Result<bool, OrmError> {
        let key = Arc::as_ptr(instance) as *const () as usize;
        if self.keys.contains(&key) {
            return Ok(false);
        }

        let mapping = self.registry.mapping::<T>()?;
        let original = {
            let guard = instance
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            mapping
                .fields()
                .iter()
                .map(|field| (field.property.clone(), field.get(&guard)))
                .collect()
        };

        self.entries.push(Box::new(Tracked {
            instance: Arc::clone(instance),
            mapping,
            original,
        }));
        self.keys.insert(key);

        Ok(true)
    }

    /// 追跡中のインスタンス数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 変更のあるインスタンスのUPDATE文を計算（実行しない）
    pub fn pending_updates(&self) -> Vec<PendingUpdate> {
        self.entries
            .iter()
            .filter_map(|entry| entry.pending_update())
            .collect()
    }

    /// 変更を保存
    ///
    /// インスタンスごとの失敗は記録して処理を継続し、
    /// 結果に関わらず追跡状態は最後にクリアされます。
    ///
    /// # Arguments
    ///
    /// * `executor` - UPDATE文の実行先
    pub async fn save_changes(&mut self, executor: &dyn SqlExecutor) -> SaveOutcome {
        let mut outcome = SaveOutcome::default();

        for update in self.pending_updates() {
            match executor.execute(&update.statement).await {
                Ok(rows) => {
                    tracing::debug!(
                        entity = %update.entity,
                        identity = %update.identity,
                        rows,
                        "Saved tracked changes"
                    );
                    outcome.updated += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        entity = %update.entity,
                        identity = %update.identity,
                        error = %error,
                        "Failed to save tracked changes"
                    );
                    outcome.failures.push(SaveFailure {
                        entity: update.entity,
                        identity: update.identity,
                        error,
                    });
                }
            }
        }

        self.clear();
        outcome
    }

    /// SQLを発行せずに全追跡状態を破棄
    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{ColumnDefinition, ScalarKind};
    use crate::services::entity_registry::EntityDeclaration;

    #[derive(Debug, Default)]
    struct Doctor {
        id: i32,
        last_name: String,
        room: Option<i32>,
    }

    impl Entity for Doctor {
        fn declare() -> EntityDeclaration<Self> {
            EntityDeclaration::new("Doctor")
                .table("doctors")
                .identity("Id", true, |d: &Doctor| d.id, |d: &mut Doctor, v| d.id = v)
                .column(
                    ColumnDefinition::new("LastName", ScalarKind::Text),
                    |d: &Doctor| d.last_name.clone(),
                    |d: &mut Doctor, v| d.last_name = v,
                )
                .column(
                    ColumnDefinition::new("Room", ScalarKind::Integer),
                    |d: &Doctor| d.room,
                    |d: &mut Doctor, v| d.room = v,
                )
        }
    }

    fn doctor(id: i32) -> Shared<Doctor> {
        Arc::new(RwLock::new(Doctor {
            id,
            last_name: "Horvat".to_string(),
            room: Some(12),
        }))
    }

    #[test]
    fn test_track_same_instance_once() {
        let mut tracker = ChangeTracker::new(Arc::new(MetadataRegistry::new()));
        let instance = doctor(1);

        assert!(tracker.track(&instance).unwrap());
        assert!(!tracker.track(&instance).unwrap());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_null_assignment_is_not_bound() {
        let mut tracker = ChangeTracker::new(Arc::new(MetadataRegistry::new()));
        let instance = doctor(4);
        tracker.track(&instance).unwrap();

        instance.write().unwrap().room = None;

        let updates = tracker.pending_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].statement.sql,
            "UPDATE doctors SET room = NULL WHERE id = @id;"
        );
        assert_eq!(updates[0].statement.parameters.len(), 1);
    }

    #[test]
    fn test_instance_with_null_identity_is_skipped() {
        #[derive(Debug, Default)]
        struct Draft {
            id: Option<i32>,
            title: String,
        }

        impl Entity for Draft {
            fn declare() -> EntityDeclaration<Self> {
                EntityDeclaration::new("Draft")
                    .table("drafts")
                    .identity("Id", true, |d: &Draft| d.id, |d: &mut Draft, v| d.id = v)
                    .column(
                        ColumnDefinition::new("Title", ScalarKind::Text),
                        |d: &Draft| d.title.clone(),
                        |d: &mut Draft, v| d.title = v,
                    )
            }
        }

        let mut tracker = ChangeTracker::new(Arc::new(MetadataRegistry::new()));
        let instance = Arc::new(RwLock::new(Draft::default()));
        tracker.track(&instance).unwrap();
        instance.write().unwrap().title = "changed".to_string();

        assert!(tracker.pending_updates().is_empty());
    }

    #[test]
    fn test_clear_discards_state() {
        let mut tracker = ChangeTracker::new(Arc::new(MetadataRegistry::new()));
        let instance = doctor(2);
        tracker.track(&instance).unwrap();
        instance.write().unwrap().last_name = "Kovač".to_string();

        tracker.clear();

        assert!(tracker.is_empty());
        assert!(tracker.pending_updates().is_empty());
        assert!(tracker.track(&instance).unwrap());
    }
}
