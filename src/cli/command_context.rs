// コマンド共通コンテキスト
//
// 設定ファイル・エンティティ定義の読み込みとデータベース接続をCLI層で集約する。

use crate::adapters::database::DatabaseConnectionService;
use crate::adapters::database_migrator::PostgresMigrationBackend;
use crate::core::config::Config;
use crate::core::metadata::{EntityMetadata, ModelFile};
use crate::services::migration_executor::MigrationExecutor;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::debug;

/// CLIコマンド共通の実行コンテキスト
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_path: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CommandContext {
    /// カスタム設定ファイルパスを指定してコンテキストを作成
    pub fn load_with_config(
        project_path: PathBuf,
        custom_config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let config_path = custom_config_path
            .map(|path| {
                if path.is_absolute() {
                    path
                } else {
                    project_path.join(path)
                }
            })
            .unwrap_or_else(|| project_path.join(Config::DEFAULT_CONFIG_PATH));

        if !config_path.exists() {
            return Err(anyhow!(
                "Config file not found: {:?}. Create {} in the project root or pass --config.",
                config_path,
                Config::DEFAULT_CONFIG_PATH
            ));
        }

        let config = Config::from_file(&config_path).with_context(|| "Failed to read config file")?;

        Ok(Self {
            project_path,
            config_path,
            config,
        })
    }

    /// エンティティ定義ファイルの絶対パス
    pub fn models_path(&self) -> PathBuf {
        self.config.models_path(&self.config_path)
    }

    /// エンティティ定義を読み込んで解決
    pub fn load_entities(&self) -> Result<Vec<EntityMetadata>> {
        let path = self.models_path();
        if !path.exists() {
            return Err(anyhow!("Model file not found: {:?}", path));
        }

        let entities = ModelFile::from_file(&path)?
            .resolve_all()
            .with_context(|| format!("Invalid entity definition in {:?}", path))?;
        debug!(count = entities.len(), "Loaded entity definitions");

        Ok(entities)
    }

    /// 対象環境へ接続してマイグレーション実行器を作成
    pub async fn connect_executor(
        &self,
        env: &str,
    ) -> Result<MigrationExecutor<PostgresMigrationBackend>> {
        let db_config = self
            .config
            .get_database_config(env)
            .with_context(|| format!("Database config for environment '{}' not found", env))?;

        let pool = DatabaseConnectionService::new()
            .create_pool(&db_config)
            .await
            .with_context(|| "Failed to connect to database")?;

        Ok(MigrationExecutor::new(PostgresMigrationBackend::new(
            pool,
            self.config.schema.clone(),
        )))
    }
}
