// エンティティレジストリ
//
// Rustの型とエンティティメタデータを結び付けます。
// 各エンティティ型は宣言ビルダー（EntityDeclaration）でメタデータとフィールドアクセサーを宣言し、
// MetadataRegistry が型ごとに一度だけ解決してキャッシュします。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::core::error::OrmError;
use crate::core::metadata::{
    ColumnDefinition, EntityDefinition, EntityMetadata, ForeignKeyDefinition, IdentityDefinition,
};
use crate::core::naming;
use crate::core::value::{FromSqlValue, SqlValue};

type Getter<T> = Box<dyn Fn(&T) -> SqlValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, SqlValue) -> Result<(), OrmError> + Send + Sync>;

/// マッピング対象のエンティティ型
pub trait Entity: Default + Send + Sync + 'static {
    /// メタデータとフィールドアクセサーを宣言
    fn declare() -> EntityDeclaration<Self>;
}

/// プロパティ1つ分のアクセサー
pub struct FieldAccessor<T> {
    /// プロパティ名
    pub property: String,
    /// カラム名
    pub column: String,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> FieldAccessor<T> {
    /// 現在値を取得
    pub fn get(&self, entity: &T) -> SqlValue {
        (self.getter)(entity)
    }

    /// 値を設定
    pub fn set(&self, entity: &mut T, value: SqlValue) -> Result<(), OrmError> {
        (self.setter)(entity, value)
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("property", &self.property)
            .field("column", &self.column)
            .finish()
    }
}

struct PendingAccessor<T> {
    property: String,
    getter: Getter<T>,
    setter: Setter<T>,
}

fn typed_getter<T, V, G>(getter: G) -> Getter<T>
where
    V: Into<SqlValue>,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    Box::new(move |entity| getter(entity).into())
}

fn typed_setter<T, V, S>(setter: S) -> Setter<T>
where
    V: FromSqlValue,
    S: Fn(&mut T, V) + Send + Sync + 'static,
{
    Box::new(move |entity, value| {
        setter(entity, V::from_sql_value(value)?);
        Ok(())
    })
}

/// エンティティ宣言ビルダー
///
/// ```ignore
/// EntityDeclaration::new("Patient")
///     .table("patients")
///     .identity("Id", true, |p: &Patient| p.id, |p, v| p.id = v)
///     .column(ColumnDefinition::new("FirstName", ScalarKind::Text), |p| p.first_name.clone(), |p, v| p.first_name = v)
///     .collection("Examinations")
/// ```
pub struct EntityDeclaration<T> {
    definition: EntityDefinition,
    identity: Option<PendingAccessor<T>>,
    fields: Vec<PendingAccessor<T>>,
}

impl<T: 'static> EntityDeclaration<T> {
    /// 新しい宣言を作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: EntityDefinition::new(name),
            identity: None,
            fields: Vec::new(),
        }
    }

    /// テーブル名を宣言
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.definition.table = Some(table.into());
        self
    }

    /// 識別子を宣言（カラム名は `id`）
    pub fn identity<V, G, S>(
        mut self,
        property: impl Into<String>,
        auto_increment: bool,
        getter: G,
        setter: S,
    ) -> Self
    where
        V: Into<SqlValue> + FromSqlValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let property = property.into();
        self.definition.identity = Some(IdentityDefinition {
            property: property.clone(),
            column: None,
            auto_increment,
        });
        self.identity = Some(PendingAccessor {
            property,
            getter: typed_getter(getter),
            setter: typed_setter(setter),
        });
        self
    }

    /// スカラーカラムを宣言
    pub fn column<V, G, S>(mut self, column: ColumnDefinition, getter: G, setter: S) -> Self
    where
        V: Into<SqlValue> + FromSqlValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.fields.push(PendingAccessor {
            property: column.property.clone(),
            getter: typed_getter(getter),
            setter: typed_setter(setter),
        });
        self.definition.columns.push(column);
        self
    }

    /// 宣言済みプロパティに外部キーを宣言（参照先カラムは `id`）
    pub fn foreign_key(self, property: impl Into<String>, table: impl Into<String>) -> Self {
        self.foreign_key_to(property, table, naming::DEFAULT_REFERENCED_COLUMN)
    }

    /// 参照先カラムを指定して外部キーを宣言
    pub fn foreign_key_to(
        mut self,
        property: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.definition.foreign_keys.push(ForeignKeyDefinition {
            property: property.into(),
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// 1対多コレクションのナビゲーションを宣言
    pub fn collection(mut self, property: impl Into<String>) -> Self {
        self.definition.collections.push(property.into());
        self
    }

    /// 単一参照のナビゲーションを宣言
    pub fn reference(mut self, property: impl Into<String>) -> Self {
        self.definition.references.push(property.into());
        self
    }

    /// 宣言を解決してEntityMappingを構築
    pub fn resolve(self) -> Result<EntityMapping<T>, OrmError> {
        let metadata = self.definition.resolve()?;

        let identity = match (self.identity, &metadata.identity) {
            (Some(pending), Some(identity)) => Some(FieldAccessor {
                property: pending.property,
                column: identity.column.clone(),
                getter: pending.getter,
                setter: pending.setter,
            }),
            _ => None,
        };

        let mut pending: HashMap<String, PendingAccessor<T>> = self
            .fields
            .into_iter()
            .map(|accessor| (accessor.property.clone(), accessor))
            .collect();

        let mut fields = Vec::with_capacity(metadata.columns.len());
        for column in &metadata.columns {
            let accessor = pending.remove(&column.property).ok_or_else(|| {
                OrmError::configuration(
                    &metadata.entity,
                    format!("property '{}' has no field accessor", column.property),
                )
            })?;
            fields.push(FieldAccessor {
                property: accessor.property,
                column: column.name.clone(),
                getter: accessor.getter,
                setter: accessor.setter,
            });
        }

        Ok(EntityMapping {
            metadata,
            identity,
            fields,
        })
    }
}

/// 解決済みメタデータとフィールドアクセサー表
pub struct EntityMapping<T> {
    metadata: EntityMetadata,
    identity: Option<FieldAccessor<T>>,
    fields: Vec<FieldAccessor<T>>,
}

impl<T> EntityMapping<T> {
    /// メタデータを取得
    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// 識別子のアクセサーを取得
    pub fn identity(&self) -> Option<&FieldAccessor<T>> {
        self.identity.as_ref()
    }

    /// 識別子を除くスカラーカラムのアクセサー（宣言順）
    pub fn fields(&self) -> &[FieldAccessor<T>] {
        &self.fields
    }

    /// プロパティ名からアクセサーを取得
    pub fn field(&self, property: &str) -> Option<&FieldAccessor<T>> {
        self.fields.iter().find(|f| f.property == property)
    }
}

impl<T> fmt::Debug for EntityMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapping")
            .field("metadata", &self.metadata)
            .field("identity", &self.identity)
            .field("fields", &self.fields)
            .finish()
    }
}

/// 型ごとに解決済みのマッピングをキャッシュするレジストリ
#[derive(Default)]
pub struct MetadataRegistry {
    mappings: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MetadataRegistry {
    /// 新しいレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 型のマッピングを取得（初回のみ解決）
    ///
    /// # Returns
    ///
    /// 共有可能なマッピング、または宣言の設定エラー
    pub fn mapping<T: Entity>(&self) -> Result<Arc<EntityMapping<T>>, OrmError> {
        let key = TypeId::of::<T>();

        let cached = self
            .mappings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned();
        if let Some(cached) = cached {
            return downcast::<T>(cached);
        }

        let resolved: Arc<dyn Any + Send + Sync> = Arc::new(T::declare().resolve()?);
        let entry = self
            .mappings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key)
            .or_insert(resolved)
            .clone();

        downcast::<T>(entry)
    }

    /// 型のメタデータを取得
    pub fn metadata<T: Entity>(&self) -> Result<EntityMetadata, OrmError> {
        Ok(self.mapping::<T>()?.metadata().clone())
    }

    /// 解決済みの型の数
    pub fn len(&self) -> usize {
        self.mappings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn downcast<T: Entity>(mapping: Arc<dyn Any + Send + Sync>) -> Result<Arc<EntityMapping<T>>, OrmError> {
    mapping.downcast::<EntityMapping<T>>().map_err(|_| {
        OrmError::configuration(
            std::any::type_name::<T>(),
            "cached mapping has an unexpected type",
        )
    })
}
