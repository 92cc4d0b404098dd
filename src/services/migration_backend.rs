// マイグレーションバックエンド
//
// マイグレーション実行器が利用するデータベース操作の抽象化。
// 履歴テーブルの管理、カタログのイントロスペクション、トランザクションを提供します。

use async_trait::async_trait;

use crate::core::error::OrmError;
use crate::core::migration::{MigrationRecord, NewMigration};
use crate::core::snapshot::SchemaSnapshot;

/// マイグレーション用データベースインターフェース
///
/// 各操作は自身の接続を取得し、全ての終了経路で解放します。
///
/// # 同時実行
///
/// 実装はプロセス間のロックを取りません。2つのプロセスから同時に
/// マイグレーションを実行することはサポートされないため、呼び出し側は
/// 外部のアドバイザリロックを保持するか、単一の実行者に限定する必要があります。
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// 履歴テーブルが存在しなければ作成し、不足カラムを追加
    async fn ensure_history_table(&self) -> Result<(), OrmError>;

    /// カタログから実状態のスナップショットを取得（履歴テーブルを除く）
    async fn introspect_schema(&self) -> Result<SchemaSnapshot, OrmError>;

    /// 全履歴レコードをid順に取得
    async fn history(&self) -> Result<Vec<MigrationRecord>, OrmError>;

    /// トランザクションを開始
    async fn begin(&self) -> Result<Box<dyn MigrationTransaction>, OrmError>;
}

/// マイグレーション用トランザクション
///
/// commit されずに破棄された場合はロールバックされます。
#[async_trait]
pub trait MigrationTransaction: Send {
    /// SQL文を実行（失敗時はトランザクション全体が失敗状態になる）
    async fn execute(&mut self, sql: &str) -> Result<(), OrmError>;

    /// SQL文をセーブポイント内で実行（失敗しても外側のトランザクションは継続可能）
    async fn execute_isolated(&mut self, sql: &str) -> Result<(), OrmError>;

    /// 適用済みとして履歴レコードを挿入し、採番されたidを返す
    async fn insert_record(&mut self, migration: &NewMigration) -> Result<i32, OrmError>;

    /// rolled_back_at を現在時刻に設定
    async fn mark_rolled_back(&mut self, id: i32) -> Result<(), OrmError>;

    /// rolled_back_at をクリア
    async fn clear_rolled_back(&mut self, id: i32) -> Result<(), OrmError>;

    /// コミット
    async fn commit(self: Box<Self>) -> Result<(), OrmError>;

    /// ロールバック
    async fn rollback(self: Box<Self>) -> Result<(), OrmError>;
}
