// マイグレーション実行サービス
//
// 期待状態と実状態の差分を計算・検証し、トランザクション内で適用して履歴に記録します。
// 履歴上のロールバック（down SQL）と前方再適用（up SQL）の状態遷移も提供します。

use chrono::Local;
use std::sync::Arc;

use crate::adapters::sql_generator::{PostgresSqlGenerator, SqlGenerator};
use crate::core::error::{MigrationValidation, OrmError, ValidationWarning};
use crate::core::metadata::EntityMetadata;
use crate::core::migration::{
    auto_migration_name, latest_applied, latest_rolled_back, split_sql_statements,
    MigrationPlan, MigrationRecord, NewMigration,
};
use crate::core::snapshot::SchemaSnapshot;
use crate::services::migration_backend::{MigrationBackend, MigrationTransaction};
use crate::services::migration_observer::{MigrationEvent, MigrationObserver, TracingObserver};
use crate::services::migration_validator::MigrationValidatorService;
use crate::services::schema_diff_detector::SchemaDiffDetector;
use crate::services::snapshot_builder::SnapshotBuilderService;

/// 実行せずに計算したマイグレーション（ドライラン結果）
#[derive(Debug, Clone)]
pub struct MigrationPreview {
    pub actual: SchemaSnapshot,
    pub desired: SchemaSnapshot,
    pub plan: MigrationPlan,
    pub validation: MigrationValidation,
}

/// migrate の結果
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// 差分がなく何も実行しなかった
    UpToDate { warnings: Vec<ValidationWarning> },
    /// 計画を適用して履歴に記録した
    Applied {
        id: i32,
        name: String,
        statements: usize,
        warnings: Vec<ValidationWarning>,
    },
}

/// rollback_last の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// 対象となる適用済みマイグレーションがない
    NothingToRollback,
    RolledBack {
        id: i32,
        name: String,
        statements: usize,
    },
}

/// migrate_forward の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// 対象となるロールバック済みマイグレーションがない
    NothingToReplay,
    Replayed {
        id: i32,
        name: String,
        executed: usize,
        /// 失敗してスキップされた文
        skipped: Vec<String>,
    },
}

/// マイグレーション実行サービス
///
/// # 同時実行
///
/// `migrate`・`rollback_last`・`migrate_forward` は履歴テーブルを排他ロックしません。
/// 複数プロセスからの同時実行はサポートされないため、呼び出し側は外部の
/// アドバイザリロック（`pg_advisory_lock` など）を保持するか、単一の実行者で運用してください。
pub struct MigrationExecutor<B: MigrationBackend> {
    backend: B,
    observer: Arc<dyn MigrationObserver>,
    snapshot_builder: SnapshotBuilderService,
    diff_detector: SchemaDiffDetector,
    validator: MigrationValidatorService,
    generator: PostgresSqlGenerator,
}

impl<B: MigrationBackend> MigrationExecutor<B> {
    /// 新しいMigrationExecutorを作成（イベントはtracingへ転送）
    pub fn new(backend: B) -> Self {
        Self::with_observer(backend, Arc::new(TracingObserver))
    }

    /// オブザーバーを指定してMigrationExecutorを作成
    pub fn with_observer(backend: B, observer: Arc<dyn MigrationObserver>) -> Self {
        Self {
            backend,
            observer,
            snapshot_builder: SnapshotBuilderService::new(),
            diff_detector: SchemaDiffDetector::new(),
            validator: MigrationValidatorService::new(),
            generator: PostgresSqlGenerator::new(),
        }
    }

    /// バックエンドへの参照を取得
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 差分・計画・検証結果を計算（何も実行しない）
    ///
    /// # Arguments
    ///
    /// * `entities` - 解決済みエンティティメタデータ
    pub async fn plan(&self, entities: &[EntityMetadata]) -> Result<MigrationPreview, OrmError> {
        let actual = self.backend.introspect_schema().await?;
        let desired = self.snapshot_builder.from_entities(entities);

        tracing::debug!(
            actual_tables = actual.tables.len(),
            desired_tables = desired.tables.len(),
            "Built schema snapshots"
        );

        let plan = self.diff_detector.detect_diff(&actual, &desired);
        let validation = self.validator.validate(&plan, &actual, &desired);

        Ok(MigrationPreview {
            actual,
            desired,
            plan,
            validation,
        })
    }

    /// 期待状態との差分を適用
    ///
    /// 計画が空または検証エラーがある場合は副作用なしで終了します。
    /// いずれかの文が失敗するとトランザクション全体をロールバックしてエラーを返します。
    ///
    /// # Arguments
    ///
    /// * `entities` - 解決済みエンティティメタデータ
    ///
    /// # Returns
    ///
    /// 適用結果、または検証・実行エラー
    pub async fn migrate(&self, entities: &[EntityMetadata]) -> Result<MigrationOutcome, OrmError> {
        self.backend.ensure_history_table().await?;

        let preview = self.plan(entities).await?;
        self.observer.on_event(&MigrationEvent::PlanComputed {
            up_statements: preview.plan.up.len(),
            down_statements: preview.plan.down.len(),
        });
        for warning in &preview.validation.warnings {
            self.observer.on_event(&MigrationEvent::WarningRaised(warning));
        }

        if !preview.validation.is_valid() {
            return Err(preview.validation.into_error());
        }

        let warnings = preview.validation.warnings;
        if preview.plan.is_empty() {
            self.observer
                .on_event(&MigrationEvent::NothingToDo { operation: "migrate" });
            return Ok(MigrationOutcome::UpToDate { warnings });
        }

        let up_sql = preview.plan.up_sql();
        let down_sql = preview.plan.down_sql();
        let snapshot_json = preview.desired.to_json()?;

        let mut statements = split_sql_statements(&up_sql);
        for entity in entities {
            for foreign_key in &entity.foreign_keys {
                statements.extend(self.generator.generate_foreign_key(&entity.table, foreign_key));
            }
        }

        let mut tx = self.backend.begin().await?;
        for sql in &statements {
            if let Err(error) = tx.execute(sql).await {
                return Err(abort(tx, error).await);
            }
            self.observer
                .on_event(&MigrationEvent::StatementExecuted { sql });
        }

        let migration = NewMigration {
            name: auto_migration_name(Local::now().naive_local()),
            snapshot_json,
            up_sql,
            down_sql,
        };
        let id = match tx.insert_record(&migration).await {
            Ok(id) => id,
            Err(error) => return Err(abort(tx, error).await),
        };
        tx.commit().await?;

        self.observer.on_event(&MigrationEvent::MigrationApplied {
            name: &migration.name,
            statements: statements.len(),
        });

        Ok(MigrationOutcome::Applied {
            id,
            name: migration.name,
            statements: statements.len(),
            warnings,
        })
    }

    /// 最新の適用済みマイグレーションをロールバック
    ///
    /// down SQLを1つのトランザクションで実行し、失敗時は全体をロールバックします。
    pub async fn rollback_last(&self) -> Result<RollbackOutcome, OrmError> {
        self.backend.ensure_history_table().await?;

        let records = self.backend.history().await?;
        let Some(record) = latest_applied(&records) else {
            self.observer
                .on_event(&MigrationEvent::NothingToDo { operation: "rollback" });
            return Ok(RollbackOutcome::NothingToRollback);
        };

        let statements = split_sql_statements(&record.down_sql);
        let mut tx = self.backend.begin().await?;
        for sql in &statements {
            if let Err(error) = tx.execute(sql).await {
                return Err(abort(tx, error).await);
            }
            self.observer
                .on_event(&MigrationEvent::StatementExecuted { sql });
        }

        if let Err(error) = tx.mark_rolled_back(record.id).await {
            return Err(abort(tx, error).await);
        }
        tx.commit().await?;

        self.observer
            .on_event(&MigrationEvent::MigrationRolledBack { name: &record.name });

        Ok(RollbackOutcome::RolledBack {
            id: record.id,
            name: record.name.clone(),
            statements: statements.len(),
        })
    }

    /// 最新のロールバック済みマイグレーションを再適用
    ///
    /// 文ごとの失敗は記録してスキップし、残りを実行した上でコミットします。
    ///
    /// 再実行するのは記録された up SQL のみです。外部キー制約は `migrate` 時に
    /// 追加で実行され up SQL に含まれないため、ロールバック（`DROP ... CASCADE`）後の
    /// 再適用ではテーブルは外部キー制約なしで再作成されます。
    pub async fn migrate_forward(&self) -> Result<ForwardOutcome, OrmError> {
        self.backend.ensure_history_table().await?;

        let records = self.backend.history().await?;
        let Some(record) = latest_rolled_back(&records) else {
            self.observer
                .on_event(&MigrationEvent::NothingToDo { operation: "forward" });
            return Ok(ForwardOutcome::NothingToReplay);
        };

        let mut executed = 0;
        let mut skipped = Vec::new();
        let mut tx = self.backend.begin().await?;

        for sql in split_sql_statements(&record.up_sql) {
            match tx.execute_isolated(&sql).await {
                Ok(()) => {
                    executed += 1;
                    self.observer
                        .on_event(&MigrationEvent::StatementExecuted { sql: &sql });
                }
                Err(error) => {
                    self.observer.on_event(&MigrationEvent::StatementSkipped {
                        sql: &sql,
                        error: error.to_string(),
                    });
                    skipped.push(sql);
                }
            }
        }

        if let Err(error) = tx.clear_rolled_back(record.id).await {
            return Err(abort(tx, error).await);
        }
        tx.commit().await?;

        self.observer.on_event(&MigrationEvent::MigrationReplayed {
            name: &record.name,
            executed,
            skipped: skipped.len(),
        });

        Ok(ForwardOutcome::Replayed {
            id: record.id,
            name: record.name.clone(),
            executed,
            skipped,
        })
    }

    /// 全履歴レコードをid順に取得
    pub async fn history(&self) -> Result<Vec<MigrationRecord>, OrmError> {
        self.backend.ensure_history_table().await?;

        let mut records = self.backend.history().await?;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

/// トランザクションをロールバックし、元のエラーを返す
async fn abort(tx: Box<dyn MigrationTransaction>, error: OrmError) -> OrmError {
    if let Err(rollback_error) = tx.rollback().await {
        tracing::warn!(error = %rollback_error, "Failed to roll back transaction");
    }
    tracing::warn!(error = %error, sql = ?error.sql(), "Migration transaction aborted");
    error
}
