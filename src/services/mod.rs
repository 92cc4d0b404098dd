// Services Layer
// ドメインロジックを実行するサービス層

pub mod change_tracker;
pub mod entity_registry;
pub mod migration_backend;
pub mod migration_executor;
pub mod migration_observer;
pub mod migration_validator;
pub mod predicate_translator;
pub mod schema_diff_detector;
pub mod snapshot_builder;
