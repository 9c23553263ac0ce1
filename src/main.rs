//! Oracle adapter - DDL preview.
//!
//! Loads a models file, runs `define` or `drop` against a recording driver
//! and prints the statements that would be sent to Oracle.

use clap::Parser;
use oracle_adapter::OracleAdapter;
use oracle_adapter::config::{Command, Config, load_models};
use oracle_adapter::db::DryRunDriver;
use oracle_adapter::models::ConnectionConfig;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DRY_RUN_IDENTITY: &str = "dry-run";

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Print a statement the way SQL*Plus expects it.
fn print_statement(sql: &str) {
    if sql.ends_with("END;") {
        println!("{}\n/", sql);
    } else {
        println!("{};", sql);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let collections = load_models(&config.models)?;
    info!(
        models = collections.len(),
        path = %config.models.display(),
        "Loaded models"
    );

    let driver = DryRunDriver::new();
    let adapter = OracleAdapter::new(Arc::new(driver.clone()));
    adapter
        .register_connection(ConnectionConfig::new(DRY_RUN_IDENTITY), &collections)
        .await?;

    let outcome = match &config.command {
        Command::Define { table } => {
            let mut result = Ok(());
            for (model, meta) in &collections {
                let name = meta.table_name.as_deref().unwrap_or(model);
                if table.as_deref().is_some_and(|t| t != name) {
                    continue;
                }
                result = adapter.define(DRY_RUN_IDENTITY, name, &meta.definition).await;
                if result.is_err() {
                    break;
                }
            }
            result
        }
        Command::Drop { table, relations } => {
            adapter.drop(DRY_RUN_IDENTITY, table, relations).await
        }
    };

    adapter.teardown(None).await;

    if let Err(e) = outcome {
        error!(error = %e, "Command failed");
        if let Some(hint) = e.suggestion() {
            eprintln!("Hint: {}", hint);
        }
        return Err(e.into());
    }

    for statement in driver.statements() {
        print_statement(&statement.sql);
    }
    Ok(())
}
