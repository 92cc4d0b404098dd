// migrateコマンドハンドラー
//
// エンティティ定義から期待スキーマを導出し、実スキーマとの差分を適用します。
// - エンティティ定義ファイルの読み込み
// - 差分計画と検証結果の表示（dry-run）
// - トランザクション内での適用と履歴への記録

use crate::cli::command_context::CommandContext;
use crate::cli::commands::highlight_destructive_sql;
use crate::core::error::ValidationWarning;
use crate::services::migration_executor::{MigrationOutcome, MigrationPreview};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// migrateコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct MigrateCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 対象環境
    pub env: String,
    /// SQLの表示のみ行う
    pub dry_run: bool,
}

/// migrateコマンドハンドラー
#[derive(Debug, Default)]
pub struct MigrateCommandHandler {}

impl MigrateCommandHandler {
    /// 新しいMigrateCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// migrateコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `command` - migrateコマンドのパラメータ
    ///
    /// # Returns
    ///
    /// 成功時は適用結果またはプレビュー、失敗時はエラーメッセージ
    pub async fn execute(&self, command: &MigrateCommand) -> Result<String> {
        let context = CommandContext::load_with_config(
            command.project_path.clone(),
            command.config_path.clone(),
        )?;
        let entities = context.load_entities()?;
        let executor = context.connect_executor(&command.env).await?;

        if command.dry_run {
            let preview = executor
                .plan(&entities)
                .await
                .with_context(|| "Failed to compute migration plan")?;
            return Ok(self.format_preview(&preview));
        }

        let outcome = executor
            .migrate(&entities)
            .await
            .with_context(|| "Failed to apply migration")?;

        Ok(self.format_outcome(&outcome))
    }

    /// dry-runのプレビューを整形
    pub fn format_preview(&self, preview: &MigrationPreview) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", "=== Dry Run: Migration Preview ===".bold()));
        output.push_str(&format!(
            "Tables: {} in database, {} in models\n",
            preview.actual.tables.len(),
            preview.desired.tables.len()
        ));
        output.push('\n');

        if !preview.validation.errors.is_empty() {
            output.push_str(&format!("{}\n", "--- Errors ---".red().bold()));
            for error in &preview.validation.errors {
                output.push_str(&format!("  {} {}\n", "✗".red(), error));
            }
            output.push('\n');
        }

        append_warnings(&mut output, &preview.validation.warnings);

        if preview.plan.is_empty() {
            output.push_str(&format!("{}\n", "Database schema is up to date.".green()));
            return output;
        }

        output.push_str(&format!("{}\n", "--- UP SQL ---".bold()));
        output.push_str(&format!("{}\n", highlight_destructive_sql(&preview.plan.up_sql())));
        output.push('\n');
        output.push_str(&format!("{}\n", "--- DOWN SQL ---".bold()));
        output.push_str(&format!("{}\n", highlight_destructive_sql(&preview.plan.down_sql())));
        output.push('\n');
        output.push_str(&format!(
            "{} statement(s) would be executed.\n",
            preview.plan.up.len()
        ));

        output
    }

    /// 適用結果を整形
    pub fn format_outcome(&self, outcome: &MigrationOutcome) -> String {
        let mut output = String::new();

        match outcome {
            MigrationOutcome::UpToDate { warnings } => {
                append_warnings(&mut output, warnings);
                output.push_str(&"Database schema is up to date.".green().to_string());
            }
            MigrationOutcome::Applied {
                id,
                name,
                statements,
                warnings,
            } => {
                append_warnings(&mut output, warnings);
                output.push_str(&format!("{}\n", "=== Migration Applied ===".bold()));
                output.push_str(&format!(
                    "{} {} (#{}, {} statement(s))",
                    "✓".green(),
                    name.cyan(),
                    id,
                    statements
                ));
            }
        }

        output
    }
}

fn append_warnings(output: &mut String, warnings: &[ValidationWarning]) {
    if warnings.is_empty() {
        return;
    }

    output.push_str(&format!("{}\n", "--- Warnings ---".yellow().bold()));
    for warning in warnings {
        output.push_str(&format!("  {} {}\n", "⚠".yellow(), warning.format()));
    }
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::MigrationValidation;
    use crate::core::migration::MigrationPlan;
    use crate::core::snapshot::SchemaSnapshot;

    fn preview(plan: MigrationPlan, validation: MigrationValidation) -> MigrationPreview {
        MigrationPreview {
            actual: SchemaSnapshot::new(),
            desired: SchemaSnapshot::new(),
            plan,
            validation,
        }
    }

    #[test]
    fn test_format_preview_lists_sql_and_warnings() {
        let mut plan = MigrationPlan::new();
        plan.push(
            "DROP TABLE IF EXISTS \"rooms\" CASCADE;".to_string(),
            "CREATE TABLE \"rooms\" (\n);".to_string(),
        );
        let mut validation = MigrationValidation::new();
        validation.add_warning(ValidationWarning::table_removed("rooms"));

        let handler = MigrateCommandHandler::new();
        let output = handler.format_preview(&preview(plan, validation));

        assert!(output.contains("Dry Run"));
        assert!(output.contains("UP SQL"));
        assert!(output.contains("DROP TABLE IF EXISTS \"rooms\" CASCADE;"));
        assert!(output.contains("rooms"));
        assert!(output.contains("1 statement(s) would be executed."));
    }

    #[test]
    fn test_format_preview_up_to_date() {
        let handler = MigrateCommandHandler::new();
        let output =
            handler.format_preview(&preview(MigrationPlan::new(), MigrationValidation::new()));

        assert!(output.contains("up to date"));
        assert!(!output.contains("UP SQL"));
    }

    #[test]
    fn test_format_outcome_applied() {
        let handler = MigrateCommandHandler::new();
        let output = handler.format_outcome(&MigrationOutcome::Applied {
            id: 3,
            name: "20261019120000_auto".to_string(),
            statements: 4,
            warnings: vec![],
        });

        assert!(output.contains("20261019120000_auto"));
        assert!(output.contains("#3, 4 statement(s)"));
    }
}
