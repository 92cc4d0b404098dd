// PostgreSQL用SQLジェネレーター
//
// スナップショットからPostgreSQL用のDDL文を生成します。

use crate::adapters::sql_generator::SqlGenerator;
use crate::core::metadata::ForeignKeyMetadata;
use crate::core::naming;
use crate::core::snapshot::{ColumnSnapshot, TableSnapshot};

/// PostgreSQL用SQLジェネレーター
#[derive(Debug, Clone)]
pub struct PostgresSqlGenerator {}

impl PostgresSqlGenerator {
    /// 新しいPostgresSqlGeneratorを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 識別子をダブルクォートで囲む
    pub fn quote_identifier(name: &str) -> String {
        naming::quote_identifier(name)
    }

    /// カラム定義のSQL文字列を生成
    fn generate_column_definition(&self, column_name: &str, column: &ColumnSnapshot) -> String {
        let mut parts = vec![Self::quote_identifier(column_name), column.sql_type.clone()];

        // NULL制約
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());

        if column.unique {
            parts.push("UNIQUE".to_string());
        }

        // デフォルト値
        if let Some(ref default_sql) = column.default_sql {
            parts.push(format!("DEFAULT {}", default_sql));
        }

        parts.join(" ")
    }
}

impl SqlGenerator for PostgresSqlGenerator {
    fn generate_create_table(&self, table_name: &str, table: &TableSnapshot) -> String {
        let mut elements = Vec::new();

        if let Some(identity) = &table.identity {
            elements.push(format!(
                "  {} integer PRIMARY KEY GENERATED ALWAYS AS IDENTITY",
                Self::quote_identifier(identity)
            ));
        }

        for (column_name, column) in &table.columns {
            elements.push(format!(
                "  {}",
                self.generate_column_definition(column_name, column)
            ));
        }

        format!(
            "CREATE TABLE {} (\n{}\n);",
            Self::quote_identifier(table_name),
            elements.join(",\n")
        )
    }

    fn generate_drop_table(&self, table_name: &str) -> String {
        format!(
            "DROP TABLE IF EXISTS {} CASCADE;",
            Self::quote_identifier(table_name)
        )
    }

    fn generate_add_column(
        &self,
        table_name: &str,
        column_name: &str,
        column: &ColumnSnapshot,
    ) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {};",
            Self::quote_identifier(table_name),
            self.generate_column_definition(column_name, column)
        )
    }

    fn generate_drop_column(&self, table_name: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN IF EXISTS {} CASCADE;",
            Self::quote_identifier(table_name),
            Self::quote_identifier(column_name)
        )
    }

    fn generate_foreign_key(
        &self,
        table_name: &str,
        foreign_key: &ForeignKeyMetadata,
    ) -> Vec<String> {
        let constraint_name = Self::quote_identifier(&naming::foreign_key_constraint_name(
            table_name,
            &foreign_key.column,
            &foreign_key.referenced_table,
        ));
        let table = Self::quote_identifier(table_name);

        vec![
            format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                table, constraint_name
            ),
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({});",
                table,
                constraint_name,
                Self::quote_identifier(&foreign_key.column),
                Self::quote_identifier(&foreign_key.referenced_table),
                Self::quote_identifier(&foreign_key.referenced_column)
            ),
        ]
    }
}

impl Default for PostgresSqlGenerator {
    fn default() -> Self {
        Self::new()
    }
}
