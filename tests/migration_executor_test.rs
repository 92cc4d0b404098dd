/// マイグレーション実行器のテスト
///
/// メモリ上の MigrationBackend を使い、適用・ロールバック・前方再適用の
/// トランザクション境界と履歴の状態遷移を確認します。

#[cfg(test)]
mod migration_executor_tests {
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use orma::core::error::OrmError;
    use orma::core::metadata::{
        ColumnDefinition, EntityDefinition, EntityMetadata, IdentityDefinition,
        ReferenceDefinition, ScalarKind,
    };
    use orma::core::migration::{MigrationRecord, MigrationStatus, NewMigration};
    use orma::core::snapshot::{ColumnSnapshot, SchemaSnapshot, TableSnapshot};
    use orma::services::migration_backend::{MigrationBackend, MigrationTransaction};
    use orma::services::migration_executor::{
        ForwardOutcome, MigrationExecutor, MigrationOutcome, RollbackOutcome,
    };
    use orma::services::migration_observer::{MigrationEvent, MigrationObserver, NoopObserver};
    use std::sync::{Arc, Mutex};

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[derive(Debug, Default)]
    struct State {
        schema: SchemaSnapshot,
        records: Vec<MigrationRecord>,
        /// コミットされた文
        committed: Vec<String>,
        /// この文字列を含む文は失敗する
        failing: Vec<String>,
        rollbacks: usize,
        history_table_checks: usize,
    }

    #[derive(Clone, Default)]
    struct FakeBackend {
        state: Arc<Mutex<State>>,
    }

    impl FakeBackend {
        fn failing_on(pattern: &str) -> Self {
            let backend = Self::default();
            backend.state.lock().unwrap().failing.push(pattern.to_string());
            backend
        }

        fn with_record(self, record: MigrationRecord) -> Self {
            self.state.lock().unwrap().records.push(record);
            self
        }

        fn committed(&self) -> Vec<String> {
            self.state.lock().unwrap().committed.clone()
        }

        fn records(&self) -> Vec<MigrationRecord> {
            self.state.lock().unwrap().records.clone()
        }

        fn rollbacks(&self) -> usize {
            self.state.lock().unwrap().rollbacks
        }
    }

    #[async_trait]
    impl MigrationBackend for FakeBackend {
        async fn ensure_history_table(&self) -> Result<(), OrmError> {
            self.state.lock().unwrap().history_table_checks += 1;
            Ok(())
        }

        async fn introspect_schema(&self) -> Result<SchemaSnapshot, OrmError> {
            Ok(self.state.lock().unwrap().schema.clone())
        }

        async fn history(&self) -> Result<Vec<MigrationRecord>, OrmError> {
            Ok(self.records())
        }

        async fn begin(&self) -> Result<Box<dyn MigrationTransaction>, OrmError> {
            Ok(Box::new(FakeTransaction {
                state: Arc::clone(&self.state),
                executed: Vec::new(),
                inserted: Vec::new(),
                marked: Vec::new(),
                cleared: Vec::new(),
            }))
        }
    }

    /// コミットまで変更を保留するトランザクション
    struct FakeTransaction {
        state: Arc<Mutex<State>>,
        executed: Vec<String>,
        inserted: Vec<NewMigration>,
        marked: Vec<i32>,
        cleared: Vec<i32>,
    }

    impl FakeTransaction {
        fn check(&self, sql: &str) -> Result<(), OrmError> {
            let state = self.state.lock().unwrap();
            if state.failing.iter().any(|pattern| sql.contains(pattern)) {
                return Err(OrmError::execution("relation already exists", Some(sql)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MigrationTransaction for FakeTransaction {
        async fn execute(&mut self, sql: &str) -> Result<(), OrmError> {
            self.check(sql)?;
            self.executed.push(sql.to_string());
            Ok(())
        }

        async fn execute_isolated(&mut self, sql: &str) -> Result<(), OrmError> {
            self.execute(sql).await
        }

        async fn insert_record(&mut self, migration: &NewMigration) -> Result<i32, OrmError> {
            self.inserted.push(migration.clone());
            let state = self.state.lock().unwrap();
            Ok(state.records.len() as i32 + self.inserted.len() as i32)
        }

        async fn mark_rolled_back(&mut self, id: i32) -> Result<(), OrmError> {
            self.marked.push(id);
            Ok(())
        }

        async fn clear_rolled_back(&mut self, id: i32) -> Result<(), OrmError> {
            self.cleared.push(id);
            Ok(())
        }

        async fn commit(self: Box<Self>) -> Result<(), OrmError> {
            let mut state = self.state.lock().unwrap();
            state.committed.extend(self.executed);

            for migration in self.inserted {
                let id = state.records.len() as i32 + 1;
                state.records.push(MigrationRecord {
                    id,
                    name: migration.name,
                    snapshot_json: migration.snapshot_json,
                    up_sql: migration.up_sql,
                    down_sql: migration.down_sql,
                    applied_at: Some(timestamp()),
                    rolled_back_at: None,
                });
            }
            for record in state.records.iter_mut() {
                if self.marked.contains(&record.id) {
                    record.rolled_back_at = Some(timestamp());
                }
                if self.cleared.contains(&record.id) {
                    record.rolled_back_at = None;
                }
            }
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), OrmError> {
            self.state.lock().unwrap().rollbacks += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingObserver {
        events: Mutex<Vec<String>>,
    }

    impl MigrationObserver for CollectingObserver {
        fn on_event(&self, event: &MigrationEvent<'_>) {
            let label = match event {
                MigrationEvent::PlanComputed { .. } => "plan",
                MigrationEvent::WarningRaised(_) => "warning",
                MigrationEvent::StatementExecuted { .. } => "executed",
                MigrationEvent::StatementSkipped { .. } => "skipped",
                MigrationEvent::MigrationApplied { .. } => "applied",
                MigrationEvent::MigrationRolledBack { .. } => "rolled_back",
                MigrationEvent::MigrationReplayed { .. } => "replayed",
                MigrationEvent::NothingToDo { .. } => "nothing",
            };
            self.events.lock().unwrap().push(label.to_string());
        }
    }

    fn entity(name: &str, table: &str, columns: Vec<ColumnDefinition>) -> EntityMetadata {
        let mut definition = EntityDefinition::new(name);
        definition.table = Some(table.to_string());
        definition.identity = Some(IdentityDefinition {
            property: "Id".to_string(),
            column: None,
            auto_increment: true,
        });
        definition.columns = columns;
        definition.resolve().unwrap()
    }

    fn clinic() -> Vec<EntityMetadata> {
        let mut doctor_id = ColumnDefinition::new("DoctorId", ScalarKind::Integer);
        doctor_id.references = Some(ReferenceDefinition {
            table: "doctors".to_string(),
            column: "id".to_string(),
        });

        vec![
            entity(
                "Doctor",
                "doctors",
                vec![ColumnDefinition::new("LastName", ScalarKind::Text)],
            ),
            entity(
                "Patient",
                "patients",
                vec![ColumnDefinition::new("Name", ScalarKind::Text), doctor_id],
            ),
        ]
    }

    fn record(id: i32, up_sql: &str, down_sql: &str, rolled_back: bool) -> MigrationRecord {
        MigrationRecord {
            id,
            name: format!("2026101912000{}_auto", id),
            snapshot_json: "{}".to_string(),
            up_sql: up_sql.to_string(),
            down_sql: down_sql.to_string(),
            applied_at: Some(timestamp()),
            rolled_back_at: rolled_back.then(timestamp),
        }
    }

    /// 空のデータベースへの適用で全テーブルと外部キーが作成され、履歴が1件記録される
    #[tokio::test]
    async fn test_migrate_empty_database() {
        let backend = FakeBackend::default();
        let executor = MigrationExecutor::new(backend.clone());

        let outcome = executor.migrate(&clinic()).await.unwrap();

        let MigrationOutcome::Applied {
            id,
            name,
            statements,
            warnings,
        } = outcome
        else {
            panic!("expected Applied outcome");
        };
        assert_eq!(id, 1);
        assert!(name.ends_with("_auto"));
        assert_eq!(statements, 4);
        assert!(warnings.is_empty());

        let committed = backend.committed();
        assert!(committed[0].starts_with("CREATE TABLE \"doctors\""));
        assert!(committed[1].starts_with("CREATE TABLE \"patients\""));
        assert!(committed[3].contains("FOREIGN KEY (\"doctor_id\") REFERENCES \"doctors\"(\"id\")"));

        let records = backend.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status(), MigrationStatus::Applied);
        assert!(!records[0].up_sql.contains("FOREIGN KEY"));
        assert!(records[0].down_sql.starts_with("DROP TABLE IF EXISTS \"patients\""));
        assert!(records[0].snapshot_json.contains("doctors"));
    }

    /// 文が1つでも失敗すると何もコミットされず、履歴も記録されない
    #[tokio::test]
    async fn test_migrate_failure_rolls_back_everything() {
        let backend = FakeBackend::failing_on("\"patients\"");
        let executor = MigrationExecutor::new(backend.clone());

        let err = executor.migrate(&clinic()).await.unwrap_err();

        assert!(err.is_execution());
        assert!(err.sql().unwrap_or_default().contains("patients"));
        assert!(backend.committed().is_empty());
        assert!(backend.records().is_empty());
        assert_eq!(backend.rollbacks(), 1);
    }

    /// 差分がなければトランザクションを開始せず、警告のみ返す
    #[tokio::test]
    async fn test_migrate_up_to_date() {
        let backend = FakeBackend::default();
        {
            let mut state = backend.state.lock().unwrap();
            let mut doctors = TableSnapshot::new(Some("id".to_string()));
            doctors.add_column("last_name", ColumnSnapshot::nullable("varchar(255)"));
            doctors.add_column("pager", ColumnSnapshot::nullable("integer"));
            state.schema.add_table("doctors", doctors);
        }
        let executor = MigrationExecutor::new(backend.clone());
        let entities = vec![clinic().remove(0)];

        let outcome = executor.migrate(&entities).await.unwrap();

        let MigrationOutcome::UpToDate { warnings } = outcome else {
            panic!("expected UpToDate outcome");
        };
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("doctors.pager"));
        assert!(backend.committed().is_empty());
        assert!(backend.records().is_empty());
    }

    /// ロールバックは最新の適用済みレコードの down SQL を実行する
    #[tokio::test]
    async fn test_rollback_latest_applied() {
        let backend = FakeBackend::default()
            .with_record(record(1, "CREATE TABLE \"a\" (\n);", "DROP TABLE IF EXISTS \"a\" CASCADE;", false))
            .with_record(record(
                2,
                "CREATE TABLE \"b\" (\n);",
                "ALTER TABLE \"b\" DROP COLUMN IF EXISTS \"x\" CASCADE;\nDROP TABLE IF EXISTS \"b\" CASCADE;",
                false,
            ));
        let executor = MigrationExecutor::new(backend.clone());

        let outcome = executor.rollback_last().await.unwrap();

        assert_eq!(
            outcome,
            RollbackOutcome::RolledBack {
                id: 2,
                name: "20261019120002_auto".to_string(),
                statements: 2,
            }
        );
        assert_eq!(
            backend.committed(),
            vec![
                "ALTER TABLE \"b\" DROP COLUMN IF EXISTS \"x\" CASCADE;",
                "DROP TABLE IF EXISTS \"b\" CASCADE;",
            ]
        );
        let records = backend.records();
        assert_eq!(records[0].status(), MigrationStatus::Applied);
        assert_eq!(records[1].status(), MigrationStatus::RolledBack);
    }

    /// ロールバック中の失敗はレコードを適用済みのまま残す
    #[tokio::test]
    async fn test_rollback_failure_keeps_record_applied() {
        let backend = FakeBackend::failing_on("DROP TABLE")
            .with_record(record(1, "CREATE TABLE \"a\" (\n);", "DROP TABLE IF EXISTS \"a\" CASCADE;", false));
        let executor = MigrationExecutor::new(backend.clone());

        let err = executor.rollback_last().await.unwrap_err();

        assert!(err.is_execution());
        assert_eq!(backend.records()[0].status(), MigrationStatus::Applied);
        assert_eq!(backend.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_rollback_with_nothing_applied() {
        let backend = FakeBackend::default()
            .with_record(record(1, "CREATE TABLE \"a\" (\n);", "DROP TABLE IF EXISTS \"a\" CASCADE;", true));
        let executor = MigrationExecutor::new(backend.clone());

        let outcome = executor.rollback_last().await.unwrap();

        assert_eq!(outcome, RollbackOutcome::NothingToRollback);
        assert!(backend.committed().is_empty());
    }

    /// 前方再適用は失敗した文をスキップし、残りを実行して状態をクリアする
    #[tokio::test]
    async fn test_forward_skips_failing_statements() {
        let up_sql = "CREATE TABLE \"a\" (\n);\nALTER TABLE \"b\" ADD COLUMN \"x\" integer NULL;\nALTER TABLE \"c\" ADD COLUMN \"y\" integer NULL;";
        let backend = FakeBackend::failing_on("\"b\"").with_record(record(
            1,
            up_sql,
            "DROP TABLE IF EXISTS \"a\" CASCADE;",
            true,
        ));
        let observer = Arc::new(CollectingObserver::default());
        let executor = MigrationExecutor::with_observer(backend.clone(), observer.clone());

        let outcome = executor.migrate_forward().await.unwrap();

        let ForwardOutcome::Replayed {
            id,
            executed,
            skipped,
            ..
        } = outcome
        else {
            panic!("expected Replayed outcome");
        };
        assert_eq!(id, 1);
        assert_eq!(executed, 2);
        assert_eq!(skipped, vec!["ALTER TABLE \"b\" ADD COLUMN \"x\" integer NULL;"]);
        assert_eq!(backend.committed().len(), 2);
        assert_eq!(backend.records()[0].status(), MigrationStatus::Applied);

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(events, vec!["executed", "skipped", "executed", "replayed"]);
    }

    /// 前方再適用は記録された up SQL のみを実行し、外部キー文は再実行しない
    #[tokio::test]
    async fn test_forward_replays_only_recorded_up_sql() {
        let backend = FakeBackend::default();
        let executor = MigrationExecutor::new(backend.clone());

        executor.migrate(&clinic()).await.unwrap();
        executor.rollback_last().await.unwrap();
        let before_forward = backend.committed().len();

        executor.migrate_forward().await.unwrap();

        let replayed: Vec<String> = backend.committed()[before_forward..].to_vec();
        assert_eq!(replayed.len(), 2);
        assert!(replayed[0].starts_with("CREATE TABLE \"doctors\""));
        assert!(replayed[1].starts_with("CREATE TABLE \"patients\""));
        assert!(replayed.iter().all(|sql| !sql.contains("FOREIGN KEY")));
    }

    #[tokio::test]
    async fn test_forward_with_nothing_rolled_back() {
        let backend = FakeBackend::default();
        let executor = MigrationExecutor::new(backend.clone());

        let outcome = executor.migrate_forward().await.unwrap();

        assert_eq!(outcome, ForwardOutcome::NothingToReplay);
    }

    /// 適用 → ロールバック → 前方再適用で状態が往復する
    #[tokio::test]
    async fn test_status_round_trip() {
        let backend = FakeBackend::default();
        let executor = MigrationExecutor::new(backend.clone());

        executor.migrate(&clinic()).await.unwrap();
        assert_eq!(executor.history().await.unwrap()[0].status(), MigrationStatus::Applied);

        executor.rollback_last().await.unwrap();
        assert_eq!(executor.history().await.unwrap()[0].status(), MigrationStatus::RolledBack);

        executor.migrate_forward().await.unwrap();
        let history = executor.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), MigrationStatus::Applied);
    }

    /// dry-run は何も実行しない
    #[tokio::test]
    async fn test_plan_has_no_side_effects() {
        let backend = FakeBackend::default();
        let executor = MigrationExecutor::with_observer(backend.clone(), Arc::new(NoopObserver));

        let preview = executor.plan(&clinic()).await.unwrap();

        assert_eq!(preview.plan.up.len(), 2);
        assert!(preview.validation.is_valid());
        assert!(preview.actual.is_empty());
        assert!(backend.committed().is_empty());
        assert_eq!(backend.state.lock().unwrap().history_table_checks, 0);
    }
}
