//! Boost Ledger admin CLI
//!
//! Runs one admin command against the configured data directory:
//!
//! ```text
//! boost_ledger [--env dev] addpoints 42 10
//! boost_ledger orders 2
//! boost_ledger stats
//! ```

use boost_ledger::admin::{self, AdminCommand};
use boost_ledger::config::AppConfig;
use boost_ledger::service::PointsService;

fn get_env(args: &[String]) -> String {
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Everything that is not `--env <value>` is the command
fn command_tokens(args: &[String]) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--env" || arg == "-e" {
            skip_next = true;
            continue;
        }
        tokens.push(arg.as_str());
    }
    tokens
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let env = get_env(&args);
    let app_config = AppConfig::load(&env)?;
    let log_guard = boost_ledger::logging::init_logging(&app_config);

    tracing::info!(
        "Starting boost_ledger admin ({}) in {} mode, data dir {}",
        env!("GIT_HASH"),
        env,
        app_config.store.data_dir
    );

    let cmd = AdminCommand::parse(&command_tokens(&args))?;
    let service = PointsService::from_config(&app_config);

    match admin::execute(&service, cmd).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(e) => {
            tracing::warn!(target: "ADMIN", code = e.code(), error = %e, "command rejected");
            eprintln!("❌ [{}] {}", e.code(), e);
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
