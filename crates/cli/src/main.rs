use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use histable_core::{Action, HistoryConfig, SqlValue};
use histable_db::{DataSource, DataSources, EnsureOutcome, HistoryRecorder, HistoryTables};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "histable", version, about = "Mirror audited tables into history tables")]
struct Cli {
    /// Mapping document; overrides `HISTABLE_MAPPING`.
    #[arg(long, global = true)]
    mapping: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the mapping document and print every entity mapping.
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Print the CREATE TABLE for an entity's history table.
    Ddl { entity: String },
    /// Create and backfill missing history tables (all entities by default).
    Ensure { entities: Vec<String> },
    /// Record one change of a source row.
    Record {
        entity: String,
        id: String,
        action: Action,
        #[arg(long)]
        actor: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "histable_cli=info,histable_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::from_env()?;
    if let Some(path) = cli.mapping {
        config.mapping_path = path;
    }

    let history_config = HistoryConfig::load(&config.mapping_path)
        .with_context(|| format!("Failed to load {}", config.mapping_path.display()))?;
    tracing::info!(
        path = %config.mapping_path.display(),
        entities = history_config.len(),
        "Mapping document loaded",
    );

    match cli.command {
        Command::Check { json } => print_mappings(&history_config, json)?,
        Command::Ddl { entity } => {
            let tables = open_tables(&config, history_config).await?;
            let manager = tables.manager(&entity).await?;
            println!("{};", manager.statements().create_table);
        }
        Command::Ensure { entities } => {
            let tables = open_tables(&config, history_config).await?;
            let now = chrono::Utc::now();

            let outcomes = if entities.is_empty() {
                tables.ensure_all(&config.actor, now).await?
            } else {
                let mut outcomes = Vec::with_capacity(entities.len());
                for entity in entities {
                    let outcome = tables.ensure_history_table(&entity, &config.actor, now).await?;
                    outcomes.push((entity, outcome));
                }
                outcomes
            };

            for (entity, outcome) in outcomes {
                println!("{entity}: {}", describe(outcome));
            }
        }
        Command::Record {
            entity,
            id,
            action,
            actor,
        } => {
            let tables = open_tables(&config, history_config).await?;
            let actor = actor.unwrap_or_else(|| config.actor.clone());
            let now = chrono::Utc::now();
            let id = SqlValue::parse_id(&id);

            tables.ensure_history_table(&entity, &actor, now).await?;
            tables.record_change(&entity, &id, action, &actor, now).await?;
            tracing::info!(%entity, %id, %action, %actor, "Change recorded");
        }
    }

    Ok(())
}

fn print_mappings(config: &HistoryConfig, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("source data source:  {}", config.source_data_source);
    println!("history data source: {}", config.history_data_source);
    for mapping in config.entities() {
        println!();
        println!("{}", mapping.entity_key);
        println!("  source:  {} ({})", mapping.source_table, mapping.source_id_column);
        println!("  history: {} ({})", mapping.history_table, mapping.history_id_column);
        for (property, columns) in &mapping.property_columns {
            println!(
                "  {property}: {} -> {}",
                columns.source_column, columns.history_column
            );
        }
    }
    Ok(())
}

fn describe(outcome: EnsureOutcome) -> String {
    match outcome {
        EnsureOutcome::AlreadyPresent => "already present".to_string(),
        EnsureOutcome::Created { rows } => format!("created, {rows} rows backfilled"),
        EnsureOutcome::CreatedElsewhere => "created concurrently elsewhere".to_string(),
    }
}

/// Connect the two data sources the mapping document names and build the registry.
async fn open_tables(config: &CliConfig, history_config: HistoryConfig) -> anyhow::Result<HistoryTables> {
    let mut sources = DataSources::new();

    for name in [
        &history_config.source_data_source,
        &history_config.history_data_source,
    ] {
        if sources.get(name).is_some() {
            continue;
        }

        let url = config.data_source_url(name)?;
        let source = DataSource::connect(&url, config.max_connections)
            .await
            .with_context(|| format!("Failed to connect to data source {name}"))?;
        source
            .health_check()
            .await
            .with_context(|| format!("Health check failed for data source {name}"))?;
        tracing::info!(data_source = %name, dialect = ?source.dialect(), "Data source connected");

        sources.insert(name.clone(), source);
    }

    Ok(HistoryTables::new(history_config, &sources)?)
}
