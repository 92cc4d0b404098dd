// スキーマスナップショット
//
// エンティティメタデータ由来の「期待状態」とカタログ由来の「実状態」を
// 同じ形で表現し、構造的に比較できるようにします。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::OrmError;

/// スキーマスナップショット（テーブル名 -> TableSnapshot）
///
/// テーブル名・カラム名は大文字小文字を区別し、
/// マイグレーション履歴テーブルは含みません。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: IndexMap<String, TableSnapshot>,
}

impl SchemaSnapshot {
    /// 空のスナップショットを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// テーブルを追加
    pub fn add_table(&mut self, name: impl Into<String>, table: TableSnapshot) {
        self.tables.insert(name.into(), table);
    }

    /// 指定されたテーブルを取得
    pub fn get_table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    /// 指定されたテーブルが存在するか確認
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// 履歴に保存するJSON形式へシリアライズ
    pub fn to_json(&self) -> Result<String, OrmError> {
        Ok(serde_json::to_string(self)?)
    }

    /// 履歴のJSONから復元
    pub fn from_json(json: &str) -> Result<Self, OrmError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// テーブルスナップショット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// 識別子カラム名（通常カラムとは別に保持）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// カラム名 -> ColumnSnapshot（宣言順）
    pub columns: IndexMap<String, ColumnSnapshot>,
}

impl TableSnapshot {
    /// 新しいテーブルスナップショットを作成
    pub fn new(identity: Option<String>) -> Self {
        Self {
            identity,
            columns: IndexMap::new(),
        }
    }

    /// カラムを追加
    pub fn add_column(&mut self, name: impl Into<String>, column: ColumnSnapshot) {
        self.columns.insert(name.into(), column);
    }

    /// 指定されたカラムが存在するか確認
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }
}

/// カラムスナップショット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    /// SQL型名
    pub sql_type: String,
    pub nullable: bool,
    pub unique: bool,
    /// デフォルト値のSQL式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sql: Option<String>,
}

impl ColumnSnapshot {
    /// NULL許容・デフォルトなしのカラムを作成
    pub fn nullable(sql_type: impl Into<String>) -> Self {
        Self {
            sql_type: sql_type.into(),
            nullable: true,
            unique: false,
            default_sql: None,
        }
    }
}
