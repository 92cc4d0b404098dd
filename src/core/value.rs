// SQL値とステートメント
//
// エンティティのフィールド値とデータベース間で受け渡される値の表現、
// および `@name` 形式の名前付きパラメータを持つSQL文を定義します。

use chrono::NaiveDateTime;
use std::fmt;

use crate::core::error::OrmError;

/// データベースとの間で受け渡されるスカラー値
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// NULLかどうか
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// 値の種類名
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Int(_) => "integer",
            SqlValue::BigInt(_) => "bigint",
            SqlValue::Double(_) => "double",
            SqlValue::Text(_) => "text",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::BigInt(v) => write!(f, "{}", v),
            SqlValue::Double(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
            SqlValue::Timestamp(v) => write!(f, "'{}'", v),
        }
    }
}

macro_rules! impl_from_scalar {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for SqlValue {
            fn from(value: $ty) -> Self {
                SqlValue::$variant(value.into())
            }
        }
    };
}

impl_from_scalar!(bool, Bool);
impl_from_scalar!(i32, Int);
impl_from_scalar!(i64, BigInt);
impl_from_scalar!(f64, Double);
impl_from_scalar!(f32, Double);
impl_from_scalar!(String, Text);
impl_from_scalar!(NaiveDateTime, Timestamp);

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

fn mismatch(expected: &'static str, found: &SqlValue) -> OrmError {
    OrmError::Conversion {
        expected,
        found: found.kind_name(),
    }
}

impl TryFrom<SqlValue> for bool {
    type Error = OrmError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl TryFrom<SqlValue> for i32 {
    type Error = OrmError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Int(v) => Ok(v),
            SqlValue::BigInt(v) => {
                i32::try_from(v).map_err(|_| mismatch("integer", &SqlValue::BigInt(v)))
            }
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl TryFrom<SqlValue> for i64 {
    type Error = OrmError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Int(v) => Ok(v.into()),
            SqlValue::BigInt(v) => Ok(v),
            other => Err(mismatch("bigint", &other)),
        }
    }
}

impl TryFrom<SqlValue> for f64 {
    type Error = OrmError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Double(v) => Ok(v),
            SqlValue::Int(v) => Ok(v.into()),
            other => Err(mismatch("double", &other)),
        }
    }
}

impl TryFrom<SqlValue> for String {
    type Error = OrmError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Text(v) => Ok(v),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl TryFrom<SqlValue> for NaiveDateTime {
    type Error = OrmError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Timestamp(v) => Ok(v),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

/// SqlValueからフィールド型への変換
///
/// スカラー型は `TryFrom<SqlValue>` に委譲し、`Option<T>` は `Null` を `None` に対応付けます。
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> Result<Self, OrmError>;
}

macro_rules! impl_from_sql_value {
    ($($ty:ty),*) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self, OrmError> {
                    <$ty>::try_from(value)
                }
            }
        )*
    };
}

impl_from_sql_value!(bool, i32, i64, f64, String, NaiveDateTime);

impl FromSqlValue for f32 {
    fn from_sql_value(value: SqlValue) -> Result<Self, OrmError> {
        f64::try_from(value).map(|v| v as f32)
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, OrmError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

/// 名前付きパラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    /// `@` を含むパラメータ名
    pub name: String,
    /// バインドする値
    pub value: SqlValue,
}

impl SqlParameter {
    /// 新しいパラメータを作成
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// パラメータ付きSQL文
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlStatement {
    /// `@name` プレースホルダを含むSQL
    pub sql: String,
    /// プレースホルダに対応するパラメータ
    pub parameters: Vec<SqlParameter>,
}

impl SqlStatement {
    /// 新しいステートメントを作成
    pub fn new(sql: impl Into<String>, parameters: Vec<SqlParameter>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    /// 名前でパラメータ値を取得
    pub fn parameter(&self, name: &str) -> Option<&SqlValue> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}
