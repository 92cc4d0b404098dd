// 述語AST
//
// エンティティのプロパティに対する制限付きブール式を表現するタグ付きAST。
// 型付きビルダーAPI（`prop("Age").gt(30).and(...)`）で構築します。

use crate::core::value::SqlValue;

/// 述語式
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// プロパティ参照
    Member(String),
    /// リテラル定数
    Literal(SqlValue),
    /// 二項比較
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    /// 論理積
    And(Box<Expr>, Box<Expr>),
    /// 論理和
    Or(Box<Expr>, Box<Expr>),
    /// 文字列マッチ（LIKEに変換）
    StringMatch {
        op: StringOp,
        target: Box<Expr>,
        pattern: Box<Expr>,
    },
    /// 任意のメソッド呼び出し（変換対象外）
    Call {
        method: String,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
}

/// 比較演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// 文字列マッチの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringOp {
    /// LIKEパターンを生成
    pub fn pattern(self, value: &str) -> String {
        match self {
            StringOp::Contains => format!("%{}%", value),
            StringOp::StartsWith => format!("{}%", value),
            StringOp::EndsWith => format!("%{}", value),
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            StringOp::Contains => "contains",
            StringOp::StartsWith => "starts_with",
            StringOp::EndsWith => "ends_with",
        }
    }
}

/// プロパティ参照を作成
pub fn prop(name: impl Into<String>) -> Expr {
    Expr::Member(name.into())
}

/// リテラルを作成
pub fn lit(value: impl Into<SqlValue>) -> Expr {
    Expr::Literal(value.into())
}

// Convenience constructors
impl Expr {
    /// 任意の右辺と比較
    pub fn compare(self, op: CompareOp, right: Expr) -> Self {
        Expr::Compare {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(self, value: impl Into<SqlValue>) -> Self {
        self.compare(CompareOp::Eq, lit(value))
    }

    pub fn ne(self, value: impl Into<SqlValue>) -> Self {
        self.compare(CompareOp::Ne, lit(value))
    }

    pub fn gt(self, value: impl Into<SqlValue>) -> Self {
        self.compare(CompareOp::Gt, lit(value))
    }

    pub fn ge(self, value: impl Into<SqlValue>) -> Self {
        self.compare(CompareOp::Ge, lit(value))
    }

    pub fn lt(self, value: impl Into<SqlValue>) -> Self {
        self.compare(CompareOp::Lt, lit(value))
    }

    pub fn le(self, value: impl Into<SqlValue>) -> Self {
        self.compare(CompareOp::Le, lit(value))
    }

    /// NULL比較（IS NULLに変換）
    pub fn is_null(self) -> Self {
        self.compare(CompareOp::Eq, lit(SqlValue::Null))
    }

    /// 非NULL比較（IS NOT NULLに変換）
    pub fn is_not_null(self) -> Self {
        self.compare(CompareOp::Ne, lit(SqlValue::Null))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    fn string_match(self, op: StringOp, value: impl Into<SqlValue>) -> Self {
        Expr::StringMatch {
            op,
            target: Box::new(self),
            pattern: Box::new(lit(value)),
        }
    }

    pub fn contains(self, value: impl Into<SqlValue>) -> Self {
        self.string_match(StringOp::Contains, value)
    }

    pub fn starts_with(self, value: impl Into<SqlValue>) -> Self {
        self.string_match(StringOp::StartsWith, value)
    }

    pub fn ends_with(self, value: impl Into<SqlValue>) -> Self {
        self.string_match(StringOp::EndsWith, value)
    }

    /// メソッド呼び出しを作成
    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            method: method.into(),
            target: Box::new(self),
            args,
        }
    }

    /// 論理演算ノードかどうか
    pub fn is_logical(&self) -> bool {
        matches!(self, Expr::And(..) | Expr::Or(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shape() {
        let expr = prop("Age").gt(30).and(prop("Name").eq("Ana"));

        match expr {
            Expr::And(left, right) => {
                assert_eq!(
                    *left,
                    Expr::Compare {
                        left: Box::new(Expr::Member("Age".to_string())),
                        op: CompareOp::Gt,
                        right: Box::new(Expr::Literal(SqlValue::Int(30))),
                    }
                );
                assert!(matches!(*right, Expr::Compare { op: CompareOp::Eq, .. }));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn test_like_patterns() {
        assert_eq!(StringOp::Contains.pattern("an"), "%an%");
        assert_eq!(StringOp::StartsWith.pattern("an"), "an%");
        assert_eq!(StringOp::EndsWith.pattern("an"), "%an");
    }

    #[test]
    fn test_null_helpers() {
        let expr = prop("Email").is_null();
        assert!(matches!(
            expr,
            Expr::Compare { op: CompareOp::Eq, ref right, .. } if **right == Expr::Literal(SqlValue::Null)
        ));
        assert!(!expr.is_logical());
        assert!(expr.or(prop("Age").lt(18)).is_logical());
    }
}
