// Adapters
// PostgreSQLへのアクセスを抽象化

pub mod database;
pub mod database_introspector;
pub mod database_migrator;
pub mod repository;
pub mod sql_executor;
pub mod sql_generator;
