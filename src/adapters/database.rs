// データベース接続アダプター
//
// SQLxを使用したPostgreSQL接続プールの管理と、
// ドライバーエラーからライブラリエラーへの変換を行います。

use crate::core::config::DatabaseConfig;
use crate::core::error::OrmError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// 既定の接続取得タイムアウト（秒）
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// データベース接続サービス
///
/// データベース接続プールの初期化と管理を行います。
#[derive(Debug, Clone)]
pub struct DatabaseConnectionService {}

impl DatabaseConnectionService {
    /// 新しいDatabaseConnectionServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// データベース接続プールを作成
    ///
    /// # Arguments
    ///
    /// * `config` - データベース設定
    ///
    /// # Returns
    ///
    /// 接続プールまたは接続エラー
    pub async fn create_pool(&self, config: &DatabaseConfig) -> Result<PgPool, OrmError> {
        let connection_string = config.to_connection_string();

        self.create_pool_options(config.timeout)
            .connect(&connection_string)
            .await
            .map_err(|e| OrmError::Connection {
                message: format!(
                    "Failed to create connection pool for {}:{}/{}",
                    config.host, config.port, config.database
                ),
                cause: e.to_string(),
            })
    }

    /// 接続テストを実行
    pub async fn test_connection(&self, pool: &PgPool) -> Result<(), OrmError> {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(connection_error)
    }

    /// プールオプションを作成
    ///
    /// # Arguments
    ///
    /// * `timeout_secs` - 接続取得タイムアウト秒数（省略時30秒）
    pub fn create_pool_options(&self, timeout_secs: Option<u64>) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
    }
}

impl Default for DatabaseConnectionService {
    fn default() -> Self {
        Self::new()
    }
}

/// 接続取得の失敗を変換
pub(crate) fn connection_error(e: sqlx::Error) -> OrmError {
    OrmError::Connection {
        message: "Failed to acquire a database session".to_string(),
        cause: e.to_string(),
    }
}

/// SQL実行の失敗を変換
pub(crate) fn execution_error(e: sqlx::Error, sql: &str) -> OrmError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            connection_error(e)
        }
        other => OrmError::Execution {
            message: other.to_string(),
            sql: Some(sql.to_string()),
        },
    }
}
