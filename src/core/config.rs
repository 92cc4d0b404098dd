// 設定ファイル管理
//
// プロジェクトの設定ファイル（.orma.yaml）の読み込み、検証、
// 環境別のPostgreSQL接続設定の管理を行います。

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::naming;

/// プロジェクト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 設定ファイルのバージョン
    pub version: String,

    /// エンティティ定義ファイル
    #[serde(default = "default_models_path")]
    pub models: PathBuf,

    /// イントロスペクション対象のスキーマ
    #[serde(default = "default_schema")]
    pub schema: String,

    /// 環境別のデータベース設定
    pub environments: BTreeMap<String, DatabaseConfig>,
}

fn default_models_path() -> PathBuf {
    PathBuf::from(naming::MODELS_FILE)
}

fn default_schema() -> String {
    "public".to_string()
}

impl Config {
    /// デフォルトの設定ファイルパス
    pub const DEFAULT_CONFIG_PATH: &'static str = naming::CONFIG_FILE;

    /// 設定ファイルを読み込んで検証
    ///
    /// # Arguments
    ///
    /// * `path` - 設定ファイルのパス
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = content.parse()?;
        config.validate()?;

        Ok(config)
    }

    /// 設定ファイルからの相対パスを解決したエンティティ定義ファイルのパス
    pub fn models_path(&self, config_path: &Path) -> PathBuf {
        if self.models.is_absolute() {
            return self.models.clone();
        }

        config_path
            .parent()
            .map(|dir| dir.join(&self.models))
            .unwrap_or_else(|| self.models.clone())
    }

    /// 指定された環境のデータベース設定を取得
    pub fn get_database_config(&self, environment: &str) -> Result<DatabaseConfig> {
        self.environments.get(environment).cloned().ok_or_else(|| {
            anyhow!(
                "Environment '{}' not found. Available environments: {:?}",
                environment,
                self.environments.keys().collect::<Vec<_>>()
            )
        })
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(anyhow!("Config file version is not specified"));
        }

        if self.schema.is_empty() {
            return Err(anyhow!("Schema name must not be empty"));
        }

        if self.environments.is_empty() {
            return Err(anyhow!(
                "At least one environment configuration is required"
            ));
        }

        for (env_name, db_config) in &self.environments {
            db_config
                .validate()
                .with_context(|| format!("Invalid config for environment '{}'", env_name))?;
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse config file")
    }
}

/// データベース接続設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// ホスト名
    #[serde(default = "default_host")]
    pub host: String,

    /// ポート番号
    #[serde(default = "default_port")]
    pub port: u16,

    /// データベース名
    pub database: String,

    /// ユーザー名
    pub user: Option<String>,

    /// パスワード
    pub password: Option<String>,

    /// 接続タイムアウト（秒）
    pub timeout: Option<u64>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(anyhow!("Database name is not specified"));
        }
        if self.host.is_empty() {
            return Err(anyhow!("Database host is not specified"));
        }

        Ok(())
    }

    /// PostgreSQL接続文字列を生成
    pub fn to_connection_string(&self) -> String {
        let credentials = match (&self.user, &self.password) {
            (Some(user), Some(password)) => format!("{}:{}@", user, password),
            (Some(user), None) => format!("{}@", user),
            _ => String::new(),
        };

        format!(
            "postgresql://{}{}:{}/{}",
            credentials, self.host, self.port, self.database
        )
    }
}
