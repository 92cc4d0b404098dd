// マイグレーションイベント
//
// 実行器の進行状況を呼び出し元が受け取るための構造化イベントとオブザーバー。

use crate::core::error::ValidationWarning;

/// マイグレーション実行中のイベント
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent<'a> {
    /// 計画を計算した
    PlanComputed {
        up_statements: usize,
        down_statements: usize,
    },
    /// 検証警告が発生した
    WarningRaised(&'a ValidationWarning),
    /// SQL文を実行した
    StatementExecuted { sql: &'a str },
    /// SQL文をスキップした（前方再適用のみ）
    StatementSkipped { sql: &'a str, error: String },
    /// マイグレーションを適用した
    MigrationApplied { name: &'a str, statements: usize },
    /// マイグレーションをロールバックした
    MigrationRolledBack { name: &'a str },
    /// マイグレーションを再適用した
    MigrationReplayed {
        name: &'a str,
        executed: usize,
        skipped: usize,
    },
    /// 対象となるマイグレーションがなかった
    NothingToDo { operation: &'static str },
}

/// マイグレーションイベントの受信者
pub trait MigrationObserver: Send + Sync {
    fn on_event(&self, event: &MigrationEvent<'_>);
}

/// イベントをtracingへ転送するオブザーバー
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_event(&self, event: &MigrationEvent<'_>) {
        match event {
            MigrationEvent::PlanComputed {
                up_statements,
                down_statements,
            } => tracing::debug!(up_statements, down_statements, "Computed migration plan"),
            MigrationEvent::WarningRaised(warning) => {
                tracing::warn!(kind = ?warning.kind, "{}", warning.message)
            }
            MigrationEvent::StatementExecuted { sql } => tracing::debug!(sql, "Executed statement"),
            MigrationEvent::StatementSkipped { sql, error } => {
                tracing::warn!(sql, error = %error, "Skipped failing statement")
            }
            MigrationEvent::MigrationApplied { name, statements } => {
                tracing::info!(name, statements, "Applied migration")
            }
            MigrationEvent::MigrationRolledBack { name } => {
                tracing::info!(name, "Rolled back migration")
            }
            MigrationEvent::MigrationReplayed {
                name,
                executed,
                skipped,
            } => tracing::info!(name, executed, skipped, "Replayed migration"),
            MigrationEvent::NothingToDo { operation } => {
                tracing::info!(operation, "No migration to process")
            }
        }
    }
}

/// イベントを破棄するオブザーバー
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl MigrationObserver for NoopObserver {
    fn on_event(&self, _event: &MigrationEvent<'_>) {}
}
