// コマンドハンドラー層
// 各CLIコマンドの実装

pub mod forward;
pub mod migrate;
pub mod rollback;
pub mod status;

use colored::Colorize;
use regex::Regex;
use std::sync::LazyLock;

/// 破壊的なDDL（DROP TABLE / DROP COLUMN / DROP CONSTRAINT）を検出する
pub(crate) static DESTRUCTIVE_SQL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bDROP\s+(TABLE|COLUMN|CONSTRAINT)\b").ok());

/// 破壊的な行を赤で強調したSQLを返す
pub(crate) fn highlight_destructive_sql(sql: &str) -> String {
    let Some(regex) = DESTRUCTIVE_SQL_REGEX.as_ref() else {
        return sql.to_string();
    };

    sql.lines()
        .map(|line| {
            if regex.is_match(line) {
                line.red().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_regex() {
        let regex = DESTRUCTIVE_SQL_REGEX.as_ref().unwrap();

        assert!(regex.is_match("DROP TABLE IF EXISTS \"rooms\" CASCADE;"));
        assert!(regex.is_match("ALTER TABLE \"doctors\" DROP COLUMN IF EXISTS \"room\" CASCADE;"));
        assert!(regex.is_match("ALTER TABLE \"a\" DROP CONSTRAINT IF EXISTS \"fk_a_b_c\";"));
        assert!(!regex.is_match("ALTER TABLE \"doctors\" ADD COLUMN \"room\" integer NULL;"));
    }

    #[test]
    fn test_highlight_destructive_sql_marks_drop() {
        use colored::control;

        let sql = "CREATE TABLE \"rooms\" ();\nDROP TABLE IF EXISTS \"rooms\" CASCADE;";

        control::set_override(true);
        let rendered = highlight_destructive_sql(sql);
        control::set_override(false);

        assert!(rendered.contains("\u{1b}[31m"));
        assert!(rendered.contains("DROP TABLE IF EXISTS \"rooms\" CASCADE;"));
        assert!(rendered.starts_with("CREATE TABLE"));
    }
}
