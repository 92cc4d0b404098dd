// スキーマ差分検出サービス
//
// 実状態と期待状態の2つのスナップショットを比較し、
// 追加のみからなる可逆なマイグレーション計画を生成します。

use crate::adapters::sql_generator::{PostgresSqlGenerator, SqlGenerator};
use crate::core::migration::MigrationPlan;
use crate::core::snapshot::SchemaSnapshot;

/// スキーマ差分検出サービス
#[derive(Debug, Clone)]
pub struct SchemaDiffDetector {
    generator: PostgresSqlGenerator,
}

impl SchemaDiffDetector {
    /// 新しいSchemaDiffDetectorを作成
    pub fn new() -> Self {
        Self {
            generator: PostgresSqlGenerator::new(),
        }
    }

    /// スキーマ差分からマイグレーション計画を生成
    ///
    /// 期待状態にのみ存在するテーブルはCREATE TABLE、共有テーブルで期待状態にのみ
    /// 存在するカラムはADD COLUMNとして、対応するDROP文と対にして追加します。
    /// 実状態にのみ存在するテーブル・カラムは削除しません（MigrationValidatorが警告します）。
    ///
    /// # Arguments
    ///
    /// * `actual` - データベースの実状態
    /// * `desired` - エンティティ由来の期待状態
    ///
    /// # Returns
    ///
    /// マイグレーション計画（同一スナップショット同士なら空）
    pub fn detect_diff(&self, actual: &SchemaSnapshot, desired: &SchemaSnapshot) -> MigrationPlan {
        let mut plan = MigrationPlan::new();

        for (table_name, desired_table) in &desired.tables {
            match actual.get_table(table_name) {
                None => {
                    plan.push(
                        self.generator.generate_create_table(table_name, desired_table),
                        self.generator.generate_drop_table(table_name),
                    );
                }
                Some(actual_table) => {
                    for (column_name, column) in &desired_table.columns {
                        if actual_table.has_column(column_name) {
                            continue;
                        }
                        plan.push(
                            self.generator
                                .generate_add_column(table_name, column_name, column),
                            self.generator.generate_drop_column(table_name, column_name),
                        );
                    }
                }
            }
        }

        plan
    }
}

impl Default for SchemaDiffDetector {
    fn default() -> Self {
        Self::new()
    }
}
