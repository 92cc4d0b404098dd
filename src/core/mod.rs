// Core Domain
// エンティティメタデータ、スナップショット、マイグレーション計画、述語ASTの純粋なドメイン型

pub mod config;
pub mod error;
pub mod metadata;
pub mod migration;
pub mod naming;
pub mod predicate;
pub mod snapshot;
pub mod value;
