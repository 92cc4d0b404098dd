// エンティティメタデータ
//
// 宣言的なエンティティ定義（EntityDefinition）と、そこから解決される
// 正規化済みのテーブル/カラム情報（EntityMetadata）を提供します。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use crate::core::error::OrmError;
use crate::core::naming;

/// 宣言されたスカラー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    #[serde(alias = "int", alias = "int32")]
    Integer,
    #[serde(alias = "long", alias = "int64")]
    BigInt,
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "datetime")]
    Timestamp,
    #[serde(alias = "bool")]
    Boolean,
    Decimal,
    Double,
    Float,
    Other,
}

impl ScalarKind {
    /// 対応するPostgreSQLの型名
    pub fn sql_type(&self) -> &'static str {
        match self {
            ScalarKind::Integer => "integer",
            ScalarKind::BigInt => "bigint",
            ScalarKind::Text => "varchar(255)",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Decimal => "numeric(18,2)",
            ScalarKind::Double => "double precision",
            ScalarKind::Float => "real",
            ScalarKind::Other => "text",
        }
    }
}

/// カラムメタデータ
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    /// プロパティ名
    pub property: String,
    /// カラム名
    pub name: String,
    /// 宣言されたスカラー型
    pub scalar: ScalarKind,
    /// NOT NULL制約の有無
    pub not_null: bool,
    /// UNIQUE制約の有無（宣言からは導出されず常にfalse）
    pub unique: bool,
    /// デフォルト値のSQL式
    pub default_sql: Option<String>,
}

/// 識別子カラムのメタデータ
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMetadata {
    pub property: String,
    pub column: String,
    pub auto_increment: bool,
}

/// 外部キーのメタデータ
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyMetadata {
    /// 外部キーを持つカラム
    pub column: String,
    /// 参照先テーブル
    pub referenced_table: String,
    /// 参照先カラム
    pub referenced_column: String,
}

/// ナビゲーションプロパティの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// 1対多のコレクション
    Collection,
    /// 単一エンティティへの参照
    Reference,
}

/// ナビゲーションプロパティ
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationMetadata {
    pub property: String,
    pub kind: NavigationKind,
}

/// 解決済みのエンティティメタデータ
///
/// 一度構築された後は変更されません。
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadata {
    /// エンティティ名
    pub entity: String,
    /// テーブル名
    pub table: String,
    /// 識別子を除いたカラム（宣言順）
    pub columns: Vec<ColumnMetadata>,
    /// 識別子カラム
    pub identity: Option<IdentityMetadata>,
    /// 外部キー
    pub foreign_keys: Vec<ForeignKeyMetadata>,
    /// ナビゲーションプロパティ
    pub navigations: Vec<NavigationMetadata>,
}

impl EntityMetadata {
    /// プロパティ名からカラムを取得
    pub fn column_for_property(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// プロパティ名からナビゲーションを取得
    pub fn navigation(&self, property: &str) -> Option<&NavigationMetadata> {
        self.navigations.iter().find(|n| n.property == property)
    }

    /// プロパティ名からカラム名を解決（識別子を含む）
    pub fn column_name(&self, property: &str) -> Option<&str> {
        if let Some(identity) = self.identity.as_ref().filter(|i| i.property == property) {
            return Some(&identity.column);
        }
        self.column_for_property(property).map(|c| c.name.as_str())
    }
}

/// 識別子の宣言
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityDefinition {
    pub property: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default = "default_true")]
    pub auto_increment: bool,
}

fn default_true() -> bool {
    true
}

/// 外部キー参照の宣言
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub table: String,
    #[serde(default = "default_referenced_column")]
    pub column: String,
}

fn default_referenced_column() -> String {
    naming::DEFAULT_REFERENCED_COLUMN.to_string()
}

/// カラムの宣言
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// プロパティ名
    pub property: String,
    /// 明示的なカラム名（省略時はsnake_case変換）
    #[serde(default)]
    pub name: Option<String>,
    /// スカラー型
    #[serde(rename = "type")]
    pub scalar: ScalarKind,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub default_sql: Option<String>,
    /// 外部キー参照
    #[serde(default)]
    pub references: Option<ReferenceDefinition>,
}

impl ColumnDefinition {
    /// 新しいカラム宣言を作成
    pub fn new(property: impl Into<String>, scalar: ScalarKind) -> Self {
        Self {
            property: property.into(),
            name: None,
            scalar,
            not_null: false,
            default_sql: None,
            references: None,
        }
    }

    /// カラム名を明示
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// NOT NULLとして宣言
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// デフォルト値のSQL式を宣言
    pub fn default_sql(mut self, sql: impl Into<String>) -> Self {
        self.default_sql = Some(sql.into());
        self
    }

    fn column_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| naming::to_snake_case(&self.property))
    }
}

/// カラムとは別に宣言された外部キー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// 外部キーを持つプロパティ
    pub property: String,
    pub table: String,
    #[serde(default = "default_referenced_column")]
    pub column: String,
}

/// エンティティの宣言的メタデータ
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// エンティティ名
    pub name: String,
    /// テーブル名
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub identity: Option<IdentityDefinition>,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    /// 1対多コレクションのプロパティ名
    #[serde(default)]
    pub collections: Vec<String>,
    /// 単一参照のプロパティ名
    #[serde(default)]
    pub references: Vec<String>,
}

impl EntityDefinition {
    /// 新しいエンティティ宣言を作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 宣言を解決してEntityMetadataを構築
    ///
    /// # Returns
    ///
    /// 解決済みメタデータ、または宣言の欠落・矛盾を表す設定エラー
    pub fn resolve(&self) -> Result<EntityMetadata, OrmError> {
        let table = match self.table.as_deref().map(str::trim) {
            Some(table) if !table.is_empty() => table.to_string(),
            _ => {
                return Err(OrmError::configuration(
                    &self.name,
                    "missing table declaration",
                ))
            }
        };

        if table == naming::HISTORY_TABLE {
            return Err(OrmError::configuration(
                &self.name,
                format!("table name '{}' is reserved for migration history", table),
            ));
        }

        let identity = self.identity.as_ref().map(|identity| IdentityMetadata {
            property: identity.property.clone(),
            column: identity
                .column
                .clone()
                .unwrap_or_else(|| naming::DEFAULT_IDENTITY_COLUMN.to_string()),
            auto_increment: identity.auto_increment,
        });

        let mut seen = HashSet::new();
        if let Some(identity) = &identity {
            seen.insert(identity.column.clone());
        }

        let mut columns = Vec::with_capacity(self.columns.len());
        let mut foreign_keys = Vec::new();

        for column in &self.columns {
            if identity
                .as_ref()
                .is_some_and(|i| i.property == column.property)
            {
                continue;
            }

            let name = column.column_name();
            if !seen.insert(name.clone()) {
                return Err(OrmError::configuration(
                    &self.name,
                    format!("duplicate column '{}' in table '{}'", name, table),
                ));
            }

            if let Some(reference) = &column.references {
                foreign_keys.push(ForeignKeyMetadata {
                    column: name.clone(),
                    referenced_table: reference.table.clone(),
                    referenced_column: reference.column.clone(),
                });
            }

            columns.push(ColumnMetadata {
                property: column.property.clone(),
                name,
                scalar: column.scalar,
                not_null: column.not_null,
                unique: false,
                default_sql: column.default_sql.clone(),
            });
        }

        for fk in &self.foreign_keys {
            let column = columns
                .iter()
                .find(|c| c.property == fk.property)
                .ok_or_else(|| {
                    OrmError::configuration(
                        &self.name,
                        format!("foreign key on unknown property '{}'", fk.property),
                    )
                })?;

            foreign_keys.push(ForeignKeyMetadata {
                column: column.name.clone(),
                referenced_table: fk.table.clone(),
                referenced_column: fk.column.clone(),
            });
        }

        let navigations = self
            .collections
            .iter()
            .map(|p| (p, NavigationKind::Collection))
            .chain(self.references.iter().map(|p| (p, NavigationKind::Reference)))
            .map(|(property, kind)| NavigationMetadata {
                property: property.clone(),
                kind,
            })
            .collect();

        Ok(EntityMetadata {
            entity: self.name.clone(),
            table,
            columns,
            identity,
            foreign_keys,
            navigations,
        })
    }
}

/// エンティティ定義ファイル（models.yaml）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
}

impl ModelFile {
    /// ファイルから読み込み
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {:?}", path))?;

        content.parse()
    }

    /// 全エンティティを解決
    ///
    /// 同一テーブルを複数のエンティティが宣言している場合は設定エラーになります。
    pub fn resolve_all(&self) -> Result<Vec<EntityMetadata>, OrmError> {
        let mut tables = HashSet::new();
        let mut resolved = Vec::with_capacity(self.entities.len());

        for definition in &self.entities {
            let metadata = definition.resolve()?;
            if !tables.insert(metadata.table.clone()) {
                return Err(OrmError::configuration(
                    &definition.name,
                    format!("table '{}' is declared by more than one entity", metadata.table),
                ));
            }
            resolved.push(metadata);
        }

        Ok(resolved)
    }
}

impl FromStr for ModelFile {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse model file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> EntityDefinition {
        EntityDefinition {
            name: "Patient".to_string(),
            table: Some("patients".to_string()),
            identity: Some(IdentityDefinition {
                property: "Id".to_string(),
                column: None,
                auto_increment: true,
            }),
            columns: vec![
                ColumnDefinition::new("Id", ScalarKind::Integer),
                ColumnDefinition::new("FirstName", ScalarKind::Text).not_null(),
                ColumnDefinition::new("OIB", ScalarKind::Text).named("oib"),
                ColumnDefinition::new("BirthDate", ScalarKind::Timestamp),
            ],
            collections: vec!["Examinations".to_string()],
            ..EntityDefinition::default()
        }
    }

    #[test]
    fn test_scalar_sql_types() {
        assert_eq!(ScalarKind::Integer.sql_type(), "integer");
        assert_eq!(ScalarKind::BigInt.sql_type(), "bigint");
        assert_eq!(ScalarKind::Text.sql_type(), "varchar(255)");
        assert_eq!(ScalarKind::Decimal.sql_type(), "numeric(18,2)");
        assert_eq!(ScalarKind::Double.sql_type(), "double precision");
        assert_eq!(ScalarKind::Float.sql_type(), "real");
        assert_eq!(ScalarKind::Other.sql_type(), "text");
    }

    #[test]
    fn test_resolve_excludes_identity_and_applies_naming() {
        let metadata = patient().resolve().unwrap();

        assert_eq!(metadata.table, "patients");
        let names: Vec<_> = metadata.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first_name", "oib", "birth_date"]);

        let identity = metadata.identity.as_ref().unwrap();
        assert_eq!(identity.column, "id");
        assert!(identity.auto_increment);
        assert_eq!(metadata.column_name("Id"), Some("id"));
        assert!(metadata.columns.iter().all(|c| !c.unique));
    }

    #[test]
    fn test_resolve_missing_table_is_configuration_error() {
        let mut definition = patient();
        definition.table = None;

        let err = definition.resolve().unwrap_err();
        assert!(err.is_configuration());

        definition.table = Some("  ".to_string());
        assert!(definition.resolve().unwrap_err().is_configuration());
    }

    #[test]
    fn test_resolve_rejects_history_table() {
        let mut definition = patient();
        definition.table = Some(naming::HISTORY_TABLE.to_string());

        assert!(definition.resolve().unwrap_err().is_configuration());
    }

    #[test]
    fn test_resolve_rejects_duplicate_columns() {
        let mut definition = patient();
        definition
            .columns
            .push(ColumnDefinition::new("Name", ScalarKind::Text).named("first_name"));

        let err = definition.resolve().unwrap_err();
        assert!(err.to_string().contains("duplicate column 'first_name'"));
    }

    #[test]
    fn test_foreign_keys_from_both_declaration_styles() {
        let mut definition = EntityDefinition::new("Examination");
        definition.table = Some("examinations".to_string());
        let mut patient_id = ColumnDefinition::new("PatientId", ScalarKind::Integer);
        patient_id.references = Some(ReferenceDefinition {
            table: "patients".to_string(),
            column: "id".to_string(),
        });
        definition.columns.push(patient_id);
        definition
            .columns
            .push(ColumnDefinition::new("DoctorId", ScalarKind::Integer));
        definition.foreign_keys.push(ForeignKeyDefinition {
            property: "DoctorId".to_string(),
            table: "doctors".to_string(),
            column: "id".to_string(),
        });

        let metadata = definition.resolve().unwrap();
        assert_eq!(metadata.foreign_keys.len(), 2);
        assert_eq!(metadata.foreign_keys[0].column, "patient_id");
        assert_eq!(metadata.foreign_keys[1].referenced_table, "doctors");
    }

    #[test]
    fn test_foreign_key_on_unknown_property() {
        let mut definition = patient();
        definition.foreign_keys.push(ForeignKeyDefinition {
            property: "DoctorId".to_string(),
            table: "doctors".to_string(),
            column: "id".to_string(),
        });

        let err = definition.resolve().unwrap_err();
        assert!(err.to_string().contains("DoctorId"));
    }

    #[test]
    fn test_model_file_parse_and_resolve() {
        let yaml = r#"
entities:
  - name: Patient
    table: patients
    identity:
      property: Id
    columns:
      - property: FirstName
        type: string
        not_null: true
      - property: Age
        type: int
    collections: [Examinations]
  - name: Examination
    table: examinations
    identity:
      property: Id
    columns:
      - property: PatientId
        type: integer
        references:
          table: patients
"#;
        let models: ModelFile = yaml.parse().unwrap();
        let resolved = models.resolve_all().unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].columns[0].scalar, ScalarKind::Text);
        assert!(resolved[0].columns[0].not_null);
        assert_eq!(
            resolved[0].navigation("Examinations").map(|n| n.kind),
            Some(NavigationKind::Collection)
        );
        assert_eq!(resolved[1].foreign_keys[0].referenced_column, "id");
    }

    #[test]
    fn test_resolve_all_rejects_shared_table() {
        let models = ModelFile {
            entities: vec![patient(), patient()],
        };

        assert!(models.resolve_all().unwrap_err().is_configuration());
    }
}
