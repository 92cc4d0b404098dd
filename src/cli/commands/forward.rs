// forwardコマンドハンドラー
//
// 最新のロールバック済みマイグレーションの up SQL を再実行します。
// 失敗した文はスキップされ、一覧として表示されます。

use crate::cli::command_context::CommandContext;
use crate::services::migration_executor::ForwardOutcome;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// forwardコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct ForwardCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 対象環境
    pub env: String,
}

/// forwardコマンドハンドラー
#[derive(Debug, Default)]
pub struct ForwardCommandHandler {}

impl ForwardCommandHandler {
    /// 新しいForwardCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// forwardコマンドを実行
    pub async fn execute(&self, command: &ForwardCommand) -> Result<String> {
        let context = CommandContext::load_with_config(
            command.project_path.clone(),
            command.config_path.clone(),
        )?;
        let executor = context.connect_executor(&command.env).await?;

        let outcome = executor
            .migrate_forward()
            .await
            .with_context(|| "Failed to re-apply migration")?;

        Ok(self.format_outcome(&outcome))
    }

    /// 再適用結果を整形
    pub fn format_outcome(&self, outcome: &ForwardOutcome) -> String {
        let mut output = String::new();

        match outcome {
            ForwardOutcome::NothingToReplay => {
                output.push_str(&"No rolled back migration to re-apply.".yellow().to_string());
            }
            ForwardOutcome::Replayed {
                id,
                name,
                executed,
                skipped,
            } => {
                output.push_str(&format!("{}\n", "=== Migration Re-applied ===".bold()));
                output.push_str(&format!(
                    "{} {} (#{}, {} statement(s) executed)",
                    "✓".green(),
                    name.cyan(),
                    id,
                    executed
                ));

                if !skipped.is_empty() {
                    output.push_str(&format!(
                        "\n{}",
                        format!("{} statement(s) skipped:", skipped.len()).yellow()
                    ));
                    for sql in skipped {
                        output.push_str(&format!("\n  {}", sql));
                    }
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_replayed_with_skipped_statements() {
        let output = ForwardCommandHandler::new().format_outcome(&ForwardOutcome::Replayed {
            id: 1,
            name: "20261019120000_auto".to_string(),
            executed: 1,
            skipped: vec!["ALTER TABLE \"doctors\" ADD COLUMN \"room\" integer NULL".to_string()],
        });

        assert!(output.contains("1 statement(s) executed"));
        assert!(output.contains("1 statement(s) skipped:"));
        assert!(output.contains("ADD COLUMN \"room\""));
    }

    #[test]
    fn test_format_nothing_to_replay() {
        let output = ForwardCommandHandler::new().format_outcome(&ForwardOutcome::NothingToReplay);
        assert!(output.contains("No rolled back migration"));
    }
}
