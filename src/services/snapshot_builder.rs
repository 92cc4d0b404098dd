// スナップショットビルダーサービス
//
// 解決済みエンティティメタデータから期待状態のスキーマスナップショットを構築します。
// 実状態のスナップショットはカタログのイントロスペクション（MigrationBackend）が生成します。

use crate::core::metadata::EntityMetadata;
use crate::core::snapshot::{ColumnSnapshot, SchemaSnapshot, TableSnapshot};

/// スナップショットビルダーサービス
#[derive(Debug, Clone)]
pub struct SnapshotBuilderService {}

impl SnapshotBuilderService {
    /// 新しいSnapshotBuilderServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// エンティティメタデータから期待状態のスナップショットを構築
    ///
    /// 識別子カラムは通常カラムから除外し、宣言された全カラムを
    /// NULL許容・デフォルトなしとして扱います（生成されるマイグレーションは制約を強めません）。
    ///
    /// # Arguments
    ///
    /// * `entities` - 解決済みエンティティメタデータ
    ///
    /// # Returns
    ///
    /// 宣言順を保持したスナップショット
    pub fn from_entities(&self, entities: &[EntityMetadata]) -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new();

        for entity in entities {
            let identity = entity.identity.as_ref().map(|i| i.column.clone());
            let mut table = TableSnapshot::new(identity);

            for column in &entity.columns {
                table.add_column(
                    column.name.clone(),
                    ColumnSnapshot::nullable(column.scalar.sql_type()),
                );
            }

            snapshot.add_table(entity.table.clone(), table);
        }

        snapshot
    }
}

impl Default for SnapshotBuilderService {
    fn default() -> Self {
        Self::new()
    }
}
