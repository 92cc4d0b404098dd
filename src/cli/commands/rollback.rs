// rollbackコマンドハンドラー
//
// 最新の適用済みマイグレーションの down SQL を実行し、
// 履歴レコードをロールバック済みにします。

use crate::cli::command_context::CommandContext;
use crate::services::migration_executor::RollbackOutcome;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// rollbackコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct RollbackCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 対象環境
    pub env: String,
}

/// rollbackコマンドハンドラー
#[derive(Debug, Default)]
pub struct RollbackCommandHandler {}

impl RollbackCommandHandler {
    /// 新しいRollbackCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// rollbackコマンドを実行
    ///
    /// # Returns
    ///
    /// 成功時はロールバックされたマイグレーションの概要、失敗時はエラーメッセージ
    pub async fn execute(&self, command: &RollbackCommand) -> Result<String> {
        let context = CommandContext::load_with_config(
            command.project_path.clone(),
            command.config_path.clone(),
        )?;
        let executor = context.connect_executor(&command.env).await?;

        let outcome = executor
            .rollback_last()
            .await
            .with_context(|| "Failed to roll back migration")?;

        Ok(self.format_outcome(&outcome))
    }

    /// ロールバック結果を整形
    pub fn format_outcome(&self, outcome: &RollbackOutcome) -> String {
        match outcome {
            RollbackOutcome::NothingToRollback => {
                "No applied migration to roll back.".yellow().to_string()
            }
            RollbackOutcome::RolledBack {
                id,
                name,
                statements,
            } => format!(
                "{}\n{} {} (#{}, {} statement(s))",
                "=== Migration Rolled Back ===".bold(),
                "↩".yellow(),
                name.cyan(),
                id,
                statements
            ),
        }
    }
}
