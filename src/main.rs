mod cli;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use downsort::models::rules::Category;
use downsort::{api, AppState};

use cli::{Cli, Commands};

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("downsort")
        .join("index.db")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    let db_path = args.db.clone().unwrap_or_else(default_db_path);
    let state = AppState::open(&db_path)
        .with_context(|| format!("could not open index at {}", db_path.display()))?;

    if let Some(root) = &args.root {
        let mut settings = api::get_settings(&state)?;
        settings.downloads_path = root.to_string_lossy().to_string();
        api::update_settings(&state, &settings)?;
    }

    match args.command {
        Commands::Scan => print_json(&api::scan_files(&state)?)?,
        Commands::Organize { apply } => print_json(&api::organize_files(&state, !apply)?)?,
        Commands::Cleanup { apply } => print_json(&api::run_cleanup(&state, !apply)?)?,
        Commands::Duplicates => print_json(&api::find_duplicates(&state)?)?,
        Commands::Stats => print_json(&api::get_dashboard_stats(&state)?)?,
        Commands::Storage => print_json(&api::get_storage_info(&state)?)?,
        Commands::Files { category, search } => {
            let category = category
                .map(|c| c.parse::<Category>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            print_json(&api::get_files(&state, category, search.as_deref())?)?;
        }
        Commands::Activity { limit } => print_json(&api::get_recent_activity(&state, limit)?)?,
        Commands::Settings => print_json(&api::get_settings(&state)?)?,
        Commands::Rules => print_json(&api::get_organization_rules(&state)?.by_category())?,
        Commands::Watch => {
            api::start_watching(&state)?;
            let root = api::get_settings(&state)?.downloads_path;
            eprintln!("watching {root}; press Ctrl-C to stop");
            loop {
                std::thread::park();
            }
        }
    }
    Ok(())
}
