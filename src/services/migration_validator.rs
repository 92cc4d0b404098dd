// マイグレーションバリデーターサービス
//
// マイグレーション計画の破壊的な影響を調べ、
// 実行を阻止するエラーと助言のみの警告に分類します。

use crate::core::error::{MigrationValidation, ValidationWarning};
use crate::core::migration::MigrationPlan;
use crate::core::snapshot::SchemaSnapshot;

/// マイグレーションバリデーターサービス
#[derive(Debug, Clone)]
pub struct MigrationValidatorService {}

impl MigrationValidatorService {
    /// 新しいMigrationValidatorServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// マイグレーション計画を検証
    ///
    /// 実状態にのみ存在するテーブルと、共有テーブルで実状態にのみ存在するカラムを
    /// 警告として報告します。構造差分のみから導出できるエラーは現在ありません。
    ///
    /// # Arguments
    ///
    /// * `plan` - 検証対象の計画
    /// * `actual` - データベースの実状態
    /// * `desired` - エンティティ由来の期待状態
    ///
    /// # Returns
    ///
    /// 検証結果（エラーがなければ実行可能）
    pub fn validate(
        &self,
        plan: &MigrationPlan,
        actual: &SchemaSnapshot,
        desired: &SchemaSnapshot,
    ) -> MigrationValidation {
        let mut result = MigrationValidation::new();

        for (table_name, actual_table) in &actual.tables {
            let Some(desired_table) = desired.get_table(table_name) else {
                result.add_warning(ValidationWarning::table_removed(table_name));
                continue;
            };

            for column_name in actual_table.columns.keys() {
                if !desired_table.has_column(column_name) {
                    result.add_warning(ValidationWarning::column_removed(table_name, column_name));
                }
            }
        }

        tracing::debug!(
            up_statements = plan.up.len(),
            warnings = result.warning_count(),
            "Validated migration plan"
        );

        result
    }
}

impl Default for MigrationValidatorService {
    fn default() -> Self {
        Self::new()
    }
}
