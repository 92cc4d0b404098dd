// statusコマンドハンドラー
//
// マイグレーション履歴と各レコードの状態（適用済み / ロールバック済み / 未適用）を表示します。

use crate::cli::command_context::CommandContext;
use crate::core::migration::{MigrationRecord, MigrationStatus};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tracing::debug;

/// statusコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct StatusCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 環境名
    pub env: String,
}

/// statusコマンドハンドラー
#[derive(Debug, Default)]
pub struct StatusCommandHandler {}

impl StatusCommandHandler {
    /// 新しいStatusCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// statusコマンドを実行
    ///
    /// # Returns
    ///
    /// 成功時はマイグレーション履歴の一覧、失敗時はエラーメッセージ
    pub async fn execute(&self, command: &StatusCommand) -> Result<String> {
        let context = CommandContext::load_with_config(
            command.project_path.clone(),
            command.config_path.clone(),
        )?;
        let executor = context.connect_executor(&command.env).await?;

        let records = executor
            .history()
            .await
            .with_context(|| "Failed to read migration history")?;
        debug!(count = records.len(), "Loaded migration history");

        Ok(self.format_history(&records))
    }

    /// 履歴を表形式で整形
    pub fn format_history(&self, records: &[MigrationRecord]) -> String {
        let mut output = String::new();
        output.push_str("=== Migration Status ===\n\n");

        if records.is_empty() {
            output.push_str("No migrations recorded.\n");
            output.push_str("\nUse the `migrate` command to apply the entity definitions.\n");
            return output;
        }

        output.push_str(&format!(
            "{:<6} {:<28} {:<14} {:<20} {:<20}\n",
            "ID", "Name", "Status", "Applied At", "Rolled Back At"
        ));
        output.push_str(&format!("{}\n", "-".repeat(90)));

        let mut applied = 0;
        let mut rolled_back = 0;
        for record in records {
            let status = record.status();
            let status_display = match status {
                MigrationStatus::Applied => {
                    applied += 1;
                    "✓ Applied"
                }
                MigrationStatus::RolledBack => {
                    rolled_back += 1;
                    "↩ Rolled back"
                }
                MigrationStatus::Pending => "  Pending",
            };

            output.push_str(&format!(
                "{:<6} {:<28} {:<14} {:<20} {:<20}\n",
                record.id,
                record.name,
                status_display,
                format_timestamp(record.applied_at),
                format_timestamp(record.rolled_back_at)
            ));
        }

        output.push_str(&format!("\n{}\n", "-".repeat(90)));
        output.push_str(&format!(
            "Total: {} (Applied: {}, Rolled back: {}, Pending: {})\n",
            records.len(),
            applied,
            rolled_back,
            records.len() - applied - rolled_back
        ));

        output
    }
}

fn format_timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
