// 述語変換サービス
//
// 述語ASTをパラメータ化されたSQLのブール式断片に変換します。
// 対応する演算子は閉じた集合のみで、変換できない構造はエラーになります。

use crate::core::error::OrmError;
use crate::core::metadata::{EntityMetadata, NavigationKind};
use crate::core::naming;
use crate::core::predicate::{CompareOp, Expr};
use crate::core::value::{SqlParameter, SqlValue};

/// 変換結果のSQL断片
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    /// `@p{n}` プレースホルダを含むSQL
    pub sql: String,
    /// 出現順のパラメータ
    pub parameters: Vec<SqlParameter>,
}

/// 述語変換サービス
#[derive(Debug, Clone)]
pub struct PredicateTranslator {}

impl PredicateTranslator {
    /// 新しいPredicateTranslatorを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 述語をSQL断片に変換
    ///
    /// # Arguments
    ///
    /// * `metadata` - プロパティ名をカラム名に解決するメタデータ
    /// * `expr` - 述語AST
    ///
    /// # Returns
    ///
    /// SQL断片、または変換できない構造を示す UnsupportedExpression
    pub fn translate(&self, metadata: &EntityMetadata, expr: &Expr) -> Result<SqlFragment, OrmError> {
        let mut context = TranslationContext {
            metadata,
            parameters: Vec::new(),
        };
        let sql = context.visit(expr)?;

        Ok(SqlFragment {
            sql,
            parameters: context.parameters,
        })
    }
}

impl Default for PredicateTranslator {
    fn default() -> Self {
        Self::new()
    }
}

/// 1回の変換の状態（パラメータ名は変換ごとに連番）
struct TranslationContext<'a> {
    metadata: &'a EntityMetadata,
    parameters: Vec<SqlParameter>,
}

impl TranslationContext<'_> {
    fn visit(&mut self, expr: &Expr) -> Result<String, OrmError> {
        match expr {
            Expr::Member(property) => self.column(property),
            Expr::Literal(value) => Ok(self.literal(value)),
            Expr::Compare { left, op, right } => self.compare(left, *op, right),
            Expr::And(left, right) => self.logical("AND", left, right),
            Expr::Or(left, right) => self.logical("OR", left, right),
            Expr::StringMatch {
                op,
                target,
                pattern,
            } => {
                let Expr::Member(_) = target.as_ref() else {
                    return Err(OrmError::unsupported(format!(
                        "'{}' must be called on an entity property",
                        op.method_name()
                    )));
                };
                let column = self.visit(target)?;

                let value = match pattern.as_ref() {
                    Expr::Literal(SqlValue::Text(value)) => value,
                    other => {
                        return Err(OrmError::unsupported(format!(
                            "'{}' requires a non-null text literal argument, got {:?}",
                            op.method_name(),
                            other
                        )))
                    }
                };

                let parameter = self.bind(SqlValue::Text(op.pattern(value)));
                Ok(format!("{} LIKE {}", column, parameter))
            }
            Expr::Call { method, .. } => Err(OrmError::unsupported(format!(
                "method '{}' is not supported in predicates",
                method
            ))),
        }
    }

    fn compare(&mut self, left: &Expr, op: CompareOp, right: &Expr) -> Result<String, OrmError> {
        let operand = match (left, right) {
            (other, Expr::Literal(SqlValue::Null)) | (Expr::Literal(SqlValue::Null), other) => {
                Some(other)
            }
            _ => None,
        };

        if let Some(operand) = operand {
            let keyword = match op {
                CompareOp::Eq => Some("IS NULL"),
                CompareOp::Ne => Some("IS NOT NULL"),
                _ => None,
            };
            if let Some(keyword) = keyword {
                return Ok(format!("({} {})", self.operand(operand)?, keyword));
            }
        }

        let left = self.operand(left)?;
        let right = self.operand(right)?;
        Ok(format!("({} {} {})", left, op.as_str(), right))
    }

    fn logical(&mut self, keyword: &str, left: &Expr, right: &Expr) -> Result<String, OrmError> {
        let left = self.operand(left)?;
        let right = self.operand(right)?;
        Ok(format!("{} {} {}", left, keyword, right))
    }

    /// 入れ子の論理演算は括弧で囲む
    fn operand(&mut self, expr: &Expr) -> Result<String, OrmError> {
        let sql = self.visit(expr)?;
        if expr.is_logical() {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }

    fn literal(&mut self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            other => self.bind(other.clone()),
        }
    }

    fn bind(&mut self, value: SqlValue) -> String {
        let name = format!("@p{}", self.parameters.len());
        self.parameters.push(SqlParameter::new(name.clone(), value));
        name
    }

    fn column(&self, property: &str) -> Result<String, OrmError> {
        if let Some(column) = self.metadata.column_name(property) {
            return Ok(naming::sql_identifier(column));
        }

        let message = match self.metadata.navigation(property).map(|n| n.kind) {
            Some(NavigationKind::Collection) => format!(
                "collection navigation '{}.{}' cannot be used in predicates",
                self.metadata.entity, property
            ),
            Some(NavigationKind::Reference) => format!(
                "reference navigation '{}.{}' cannot be used in predicates",
                self.metadata.entity, property
            ),
            None => format!(
                "unknown property '{}' on entity '{}'",
                property, self.metadata.entity
            ),
        };

        Err(OrmError::unsupported(message))
    }
}
