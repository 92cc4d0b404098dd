// マイグレーションモデル
//
// 差分から計算されるマイグレーション計画（MigrationPlan）と、
// 履歴テーブルに永続化されるレコード（MigrationRecord）を定義します。

use chrono::NaiveDateTime;
use std::fmt;

/// マイグレーション計画
///
/// up文を順に適用した後、down文を順に適用するとスキーマ形状が元に戻ります。
/// down文は対応するup文の追加時に先頭へ挿入されます（LIFO）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl MigrationPlan {
    /// 空の計画を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// up文と対応するdown文を追加
    pub fn push(&mut self, up: String, down: String) {
        self.up.push(up);
        self.down.insert(0, down);
    }

    /// 計画が空かどうか
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }

    /// 改行区切りで連結したup SQL
    pub fn up_sql(&self) -> String {
        self.up.join("\n")
    }

    /// 改行区切りで連結したdown SQL
    pub fn down_sql(&self) -> String {
        self.down.join("\n")
    }
}

/// マイグレーションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// 計算済みで未適用
    Pending,
    /// 適用済み
    Applied,
    /// ロールバック済み
    RolledBack,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStatus::Pending => write!(f, "PENDING"),
            MigrationStatus::Applied => write!(f, "APPLIED"),
            MigrationStatus::RolledBack => write!(f, "ROLLED BACK"),
        }
    }
}

/// 履歴に挿入する新しいマイグレーション
#[derive(Debug, Clone, PartialEq)]
pub struct NewMigration {
    pub name: String,
    pub snapshot_json: String,
    pub up_sql: String,
    pub down_sql: String,
}

/// 履歴テーブルの1行
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub id: i32,
    /// 一意なマイグレーション名（タイムスタンプ + 修飾子）
    pub name: String,
    /// 作成時点の期待スキーマ（JSON）
    pub snapshot_json: String,
    pub up_sql: String,
    pub down_sql: String,
    pub applied_at: Option<NaiveDateTime>,
    pub rolled_back_at: Option<NaiveDateTime>,
}

impl MigrationRecord {
    /// レコードの状態を導出
    pub fn status(&self) -> MigrationStatus {
        match (self.applied_at, self.rolled_back_at) {
            (_, Some(_)) => MigrationStatus::RolledBack,
            (Some(_), None) => MigrationStatus::Applied,
            (None, None) => MigrationStatus::Pending,
        }
    }
}

/// ロールバック対象（最新の適用済みかつ未ロールバックのレコード）を選択
pub fn latest_applied(records: &[MigrationRecord]) -> Option<&MigrationRecord> {
    records
        .iter()
        .filter(|r| r.status() == MigrationStatus::Applied)
        .max_by_key(|r| r.id)
}

/// 前方再適用の対象（最新のロールバック済みレコード）を選択
pub fn latest_rolled_back(records: &[MigrationRecord]) -> Option<&MigrationRecord> {
    records
        .iter()
        .filter(|r| r.status() == MigrationStatus::RolledBack)
        .max_by_key(|r| r.id)
}

/// 自動生成マイグレーションの名前（yyyyMMddHHmmss_auto）
pub fn auto_migration_name(now: NaiveDateTime) -> String {
    format!("{}_auto", now.format("%Y%m%d%H%M%S"))
}

/// 連結されたSQLを個々の文に分割
///
/// 行末が `;` の行で文が終わり、複数行の文は終端まで蓄積されます。
/// 終端のない残りは `;` を補って1文として扱います。
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line.trim_end());

        if trimmed.ends_with(';') {
            statements.push(std::mem::take(&mut current));
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(format!("{};", rest));
    }

    statements
}
