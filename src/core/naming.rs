// 命名ポリシー
//
// アプリケーション名、予約テーブル名、カラム名の既定変換規則の単一ソースを提供します。

/// 現行アプリケーション名
pub const APP_NAME: &str = "orma";

/// 既定の設定ファイル名
pub const CONFIG_FILE: &str = ".orma.yaml";

/// 既定のエンティティ定義ファイル名
pub const MODELS_FILE: &str = "models.yaml";

/// マイグレーション履歴テーブル名（ユーザーテーブルと衝突しないよう接頭辞付き）
pub const HISTORY_TABLE: &str = "__orm_migrations";

/// 識別子カラムの既定名
pub const DEFAULT_IDENTITY_COLUMN: &str = "id";

/// 外部キーの既定参照先カラム
pub const DEFAULT_REFERENCED_COLUMN: &str = "id";

/// プロパティ名をsnake_caseのカラム名に変換
///
/// 先頭以外の大文字の前に `_` を挿入し、全体を小文字化します。
/// 連続する大文字もそれぞれ区切られます（`OIB` → `o_i_b`）。
pub fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);

    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            result.push('_');
        }
        result.extend(c.to_lowercase());
    }

    result
}

/// PostgreSQLの予約キーワード（型名・関数名としてのみ使えるものを含む）
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end", "except",
    "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant", "group", "having",
    "ilike", "in", "initially", "inner", "intersect", "into", "is", "isnull", "join", "lateral",
    "leading", "left", "like", "limit", "localtime", "localtimestamp", "natural", "not",
    "notnull", "null", "offset", "on", "only", "or", "order", "outer", "overlaps", "placing",
    "primary", "references", "returning", "right", "select", "session_user", "similar", "some",
    "symmetric", "system_user", "table", "tablesample", "then", "to", "trailing", "true",
    "union", "unique", "user", "using", "variadic", "verbose", "when", "where", "window",
    "with",
];

/// 識別子をダブルクォートで囲む
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// DMLで使用する識別子表現
///
/// 小文字・数字・`_` のみからなる非予約語はそのまま、それ以外は引用符で囲みます。
pub fn sql_identifier(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_WORDS.contains(&name);

    if plain {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// 外部キー制約名を生成
pub fn foreign_key_constraint_name(table: &str, column: &str, referenced_table: &str) -> String {
    format!("fk_{}_{}_{}", table, column, referenced_table)
}
