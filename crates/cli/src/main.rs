//! newsgate entry point.
//!
//! Logging goes to stderr so stdout carries only command output.

use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use newsgate_client::Pipeline;
use newsgate_core::{AppConfig, SourceConfig};

mod cli;
mod history;

use cli::{Cli, Commands, HistoryCommand};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { cold_start, sources } => {
            config.cold_start |= cold_start;
            run(&config, &sources).await
        }
        Commands::History { command: HistoryCommand::Export { out } } => {
            let rows = history::export(&config.history_dir, &out)?;
            tracing::info!(rows, out = %out.display(), "history exported");
            Ok(())
        }
        Commands::History { command: HistoryCommand::Show { source } } => {
            history::show(&config.history_dir, &source, &mut std::io::stdout().lock())
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: &AppConfig, only: &[String]) -> Result<()> {
    let sources = select_sources(&config.sources, only)?;
    if sources.is_empty() {
        bail!("no sources configured");
    }

    tracing::info!(sources = sources.len(), cold_start = config.cold_start, "starting newsgate run");

    let pipeline = Pipeline::from_config(config)?;
    let summary = pipeline.run(&sources).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.is_success() {
        bail!("{} of {} sources failed", summary.failures.len(), sources.len());
    }
    Ok(())
}

/// Configured sources, narrowed to `only` when it is non-empty.
fn select_sources(configured: &[SourceConfig], only: &[String]) -> Result<Vec<SourceConfig>> {
    if only.is_empty() {
        return Ok(configured.to_vec());
    }

    let mut selected = Vec::with_capacity(only.len());
    for id in only {
        match configured.iter().find(|s| &s.id == id) {
            Some(source) => selected.push(source.clone()),
            None => bail!("unknown source: {id}"),
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<SourceConfig> {
        ["farmnews", "graindaily", "dairywire"]
            .into_iter()
            .map(|id| SourceConfig { id: id.into(), homepage: format!("https://{id}.example/") })
            .collect()
    }

    #[test]
    fn test_select_all_by_default() {
        assert_eq!(select_sources(&sources(), &[]).unwrap().len(), 3);
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let picked = select_sources(&sources(), &["dairywire".into(), "farmnews".into()]).unwrap();
        let ids: Vec<_> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["dairywire", "farmnews"]);
    }

    #[test]
    fn test_select_unknown_source() {
        let err = select_sources(&sources(), &["nope".into()]).unwrap_err();
        assert!(err.to_string().contains("unknown source: nope"));
    }
}
