// エラー型定義
//
// ライブラリ全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、OrmError と検証結果（MigrationValidation）を定義します。

use thiserror::Error;

/// ライブラリエラー
///
/// 各操作が呼び出し元へ返すエラーの種類を表現します。
#[derive(Debug, Error)]
pub enum OrmError {
    /// Missing or contradictory declarative metadata
    #[error("Configuration error for '{entity}': {message}")]
    Configuration {
        /// 対象エンティティ名
        entity: String,
        /// エラーメッセージ
        message: String,
    },

    /// Plan rejected by the migration validator
    #[error("Migration validation failed: {}", format_validation_errors(.errors))]
    Validation {
        /// 検証エラーのリスト
        errors: Vec<ValidationError>,
    },

    /// Predicate construct that has no SQL translation
    #[error("Unsupported expression: {message}")]
    UnsupportedExpression {
        /// エラーメッセージ
        message: String,
    },

    /// SQL statement failed during execution
    #[error("Execution failure: {message}")]
    Execution {
        /// エラーメッセージ
        message: String,
        /// 失敗したSQL
        sql: Option<String>,
    },

    /// Driver could not establish a session
    #[error("Database connection error: {message} (cause: {cause})")]
    Connection {
        /// エラーメッセージ
        message: String,
        /// エラー原因
        cause: String,
    },

    /// Value does not fit the target field type
    #[error("Cannot convert {found} value into {expected}")]
    Conversion {
        /// 期待した型
        expected: &'static str,
        /// 実際の値の種類
        found: &'static str,
    },

    /// Snapshot serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrmError {
    /// 設定エラーを作成
    pub fn configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        OrmError::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// 未サポート式エラーを作成
    pub fn unsupported(message: impl Into<String>) -> Self {
        OrmError::UnsupportedExpression {
            message: message.into(),
        }
    }

    /// 実行エラーを作成
    pub fn execution(message: impl Into<String>, sql: Option<&str>) -> Self {
        OrmError::Execution {
            message: message.into(),
            sql: sql.map(str::to_string),
        }
    }

    /// 設定エラーかどうか
    pub fn is_configuration(&self) -> bool {
        matches!(self, OrmError::Configuration { .. })
    }

    /// 検証エラーかどうか
    pub fn is_validation(&self) -> bool {
        matches!(self, OrmError::Validation { .. })
    }

    /// 未サポート式エラーかどうか
    pub fn is_unsupported_expression(&self) -> bool {
        matches!(self, OrmError::UnsupportedExpression { .. })
    }

    /// 実行エラーかどうか
    pub fn is_execution(&self) -> bool {
        matches!(self, OrmError::Execution { .. })
    }

    /// 接続エラーかどうか
    pub fn is_connection(&self) -> bool {
        matches!(self, OrmError::Connection { .. })
    }

    /// 変換エラーかどうか
    pub fn is_conversion(&self) -> bool {
        matches!(self, OrmError::Conversion { .. })
    }

    /// 失敗したSQL文を取得
    pub fn sql(&self) -> Option<&str> {
        match self {
            OrmError::Execution { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// バリデーションエラー
///
/// マイグレーション計画の実行を阻止するエラーを表現します。
/// 構造差分のみからは現在自動的に発生しない拡張ポイントです。
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}{}", format_location_opt(.location))]
pub struct ValidationError {
    /// エラーメッセージ
    pub message: String,
    /// エラー発生位置
    pub location: Option<ErrorLocation>,
}

impl ValidationError {
    /// 新しいバリデーションエラーを作成
    pub fn new(message: impl Into<String>, location: Option<ErrorLocation>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// バリデーション警告
///
/// 実行を妨げないが、呼び出し元に提示すべき事項を表します。
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// 警告メッセージ
    pub message: String,
    /// 警告発生位置
    pub location: Option<ErrorLocation>,
    /// 警告の種類
    pub kind: WarningKind,
}

/// 警告の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// データベースにのみ存在するテーブル
    TableRemoved,
    /// 共有テーブルでデータベースにのみ存在するカラム
    ColumnRemoved,
}

impl ValidationWarning {
    /// 新しい警告を作成
    pub fn new(message: String, location: Option<ErrorLocation>, kind: WarningKind) -> Self {
        Self {
            message,
            location,
            kind,
        }
    }

    /// テーブル削除の警告を作成
    pub fn table_removed(table: &str) -> Self {
        Self::new(
            format!(
                "Table '{}' will be deleted with all data. This is a critical operation that cannot be auto-reversed.",
                table
            ),
            Some(ErrorLocation::with_table(table.to_string())),
            WarningKind::TableRemoved,
        )
    }

    /// カラム削除の警告を作成
    pub fn column_removed(table: &str, column: &str) -> Self {
        Self::new(
            format!(
                "Column '{}.{}' will be deleted with all data. If the table contains data, that data will be permanently lost.",
                table, column
            ),
            Some(ErrorLocation::with_column(table.to_string(), column.to_string())),
            WarningKind::ColumnRemoved,
        )
    }

    /// 位置情報をフォーマット
    pub fn format(&self) -> String {
        format!("Warning: {}", self.message)
    }
}

/// エラー発生位置
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorLocation {
    /// テーブル名
    pub table: Option<String>,
    /// カラム名
    pub column: Option<String>,
}

impl ErrorLocation {
    /// テーブル名を指定してエラー位置を作成
    pub fn with_table(table: String) -> Self {
        Self {
            table: Some(table),
            column: None,
        }
    }

    /// テーブル名とカラム名を指定してエラー位置を作成
    pub fn with_column(table: String, column: String) -> Self {
        Self {
            table: Some(table),
            column: Some(column),
        }
    }

    /// 位置情報をフォーマット
    pub fn format(&self) -> String {
        let mut parts = Vec::new();

        if let Some(table) = &self.table {
            parts.push(format!("table: {}", table));
        }
        if let Some(column) = &self.column {
            parts.push(format!("column: {}", column));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }
}

fn format_location_opt(location: &Option<ErrorLocation>) -> String {
    location.as_ref().map_or(String::new(), |loc| loc.format())
}

/// マイグレーション検証結果
///
/// エラーが1件でもあれば計画は実行不可、警告は助言のみです。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationValidation {
    /// エラーのリスト
    pub errors: Vec<ValidationError>,
    /// 警告のリスト
    pub warnings: Vec<ValidationWarning>,
}

impl MigrationValidation {
    /// 新しい検証結果を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// エラーを追加
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// 警告を追加
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// 検証が成功したかどうか（エラーがない場合は成功）
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 警告の数を取得
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// エラーを OrmError::Validation に変換
    pub fn into_error(self) -> OrmError {
        OrmError::Validation {
            errors: self.errors,
        }
    }
}
