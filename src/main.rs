use anyhow::Result;
use clap::Parser;
use orma::cli::commands::forward::{ForwardCommand, ForwardCommandHandler};
use orma::cli::commands::migrate::{MigrateCommand, MigrateCommandHandler};
use orma::cli::commands::rollback::{RollbackCommand, RollbackCommandHandler};
use orma::cli::commands::status::{StatusCommand, StatusCommandHandler};
use orma::cli::{Cli, Commands};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // CLIをパースして実行
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    // 非同期ランタイムを作成して実行
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create Tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(run_command(cli));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// ログ出力を初期化する（RUST_LOG が優先）
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "orma=debug" } else { "orma=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// コマンドを実行する
async fn run_command(cli: Cli) -> Result<String> {
    // プロジェクトのルートパスを取得
    let project_path = env::current_dir()?;
    let config_path = cli.config;
    let env = cli.env;

    match cli.command {
        Commands::Migrate { dry_run } => {
            let handler = MigrateCommandHandler::new();
            let command = MigrateCommand {
                project_path,
                config_path,
                env,
                dry_run,
            };
            handler.execute(&command).await
        }

        Commands::Rollback => {
            let handler = RollbackCommandHandler::new();
            let command = RollbackCommand {
                project_path,
                config_path,
                env,
            };
            handler.execute(&command).await
        }

        Commands::Forward => {
            let handler = ForwardCommandHandler::new();
            let command = ForwardCommand {
                project_path,
                config_path,
                env,
            };
            handler.execute(&command).await
        }

        Commands::Status => {
            let handler = StatusCommandHandler::new();
            let command = StatusCommand {
                project_path,
                config_path,
                env,
            };
            handler.execute(&command).await
        }
    }
}
