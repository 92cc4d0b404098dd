// SQL生成アダプター
//
// スキーマスナップショットからマイグレーション用のDDL文を生成するアダプター層。

pub mod postgres;

pub use postgres::PostgresSqlGenerator;

use crate::core::metadata::ForeignKeyMetadata;
use crate::core::snapshot::{ColumnSnapshot, TableSnapshot};

/// SQLジェネレータートレイト
///
/// 生成される各文は `;` で終端し、複数行の文は最終行のみ `;` で終わります。
pub trait SqlGenerator {
    /// CREATE TABLE文を生成
    ///
    /// # Arguments
    ///
    /// * `table_name` - テーブル名
    /// * `table` - テーブル定義（識別子は主キーとして先頭に合成）
    fn generate_create_table(&self, table_name: &str, table: &TableSnapshot) -> String;

    /// DROP TABLE文を生成
    fn generate_drop_table(&self, table_name: &str) -> String;

    /// ADD COLUMN文を生成
    fn generate_add_column(
        &self,
        table_name: &str,
        column_name: &str,
        column: &ColumnSnapshot,
    ) -> String;

    /// DROP COLUMN文を生成
    fn generate_drop_column(&self, table_name: &str, column_name: &str) -> String;

    /// 外部キー制約を冪等に再作成する文を生成
    ///
    /// # Returns
    ///
    /// DROP CONSTRAINT IF EXISTS と ADD CONSTRAINT の2文
    fn generate_foreign_key(&self, table_name: &str, foreign_key: &ForeignKeyMetadata)
        -> Vec<String>;
}
