// Ormaライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: ドメイン型（メタデータ、スナップショット、述語AST、値、エラー、設定）
// - services: 差分検出、検証、マイグレーション実行、述語変換、変更追跡
// - adapters: PostgreSQLへのアクセス（接続、イントロスペクション、履歴、DDL生成）

pub mod adapters;
pub mod cli;
pub mod core;
pub mod services;
