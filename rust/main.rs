// Import from library crate
use easybi_engine::config::EngineConfig;
use easybi_engine::ingestion::Locator;
use easybi_engine::observability::init_tracing;
use easybi_engine::query::QueryParams;
use easybi_engine::registry::DataSourceRegistry;
use easybi_engine::time::TimeBucket;
use easybi_engine::QueryEngine;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "easybi")]
#[command(about = "Query CSV, spreadsheet and Google Sheets data sources")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an ad-hoc query against a file path or URL
    Query {
        /// Local path or http(s) URL of the source
        locator: String,

        #[command(flatten)]
        params: QueryArgs,

        /// Bypass the cache and reload the source
        #[arg(long)]
        force_refresh: bool,
    },
    /// Run an ad-hoc query against a registered data source
    Datasource {
        /// Registry id of the data source
        id: String,

        #[command(flatten)]
        params: QueryArgs,
    },
    /// Show the first rows of a source and its total row count
    Preview {
        /// Local path or http(s) URL of the source
        locator: String,
    },
    /// List registered data sources
    Sources,
}

#[derive(ClapArgs, Debug, Default)]
struct QueryArgs {
    /// Column holding the dates to filter on
    #[arg(long)]
    date_column: Option<String>,

    /// Inclusive start date
    #[arg(long)]
    start_date: Option<String>,

    /// Inclusive end date (covers the whole day)
    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    filter_column: Option<String>,

    #[arg(long)]
    filter_value: Option<String>,

    /// Grouping column for aggregation
    #[arg(short, long)]
    x_column: Option<String>,

    /// Measure to sum
    #[arg(short, long)]
    y_column: Option<String>,

    /// Second measure to sum
    #[arg(long)]
    y_column_2: Option<String>,

    #[arg(long)]
    breakdown_column: Option<String>,

    /// Time bucket: day, week or month
    #[arg(long, value_parser = parse_bucket)]
    group_by: Option<TimeBucket>,

    #[arg(long)]
    sort_by: Option<String>,
}

impl From<QueryArgs> for QueryParams {
    fn from(args: QueryArgs) -> Self {
        QueryParams {
            start_date: args.start_date,
            end_date: args.end_date,
            date_column: args.date_column,
            filter_column: args.filter_column,
            filter_value: args.filter_value,
            x_column: args.x_column,
            y_column: args.y_column,
            y_column_2: args.y_column_2,
            breakdown_column: args.breakdown_column,
            group_by: args.group_by,
            sort_by: args.sort_by,
        }
    }
}

fn parse_bucket(raw: &str) -> std::result::Result<TimeBucket, String> {
    TimeBucket::parse(raw).ok_or_else(|| format!("expected day, week or month, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;

    match args.command {
        Commands::Query {
            locator,
            params,
            force_refresh,
        } => run_query(&config, locator, params.into(), force_refresh).await,
        Commands::Datasource { id, params } => run_datasource(&config, id, params.into()).await,
        Commands::Preview { locator } => run_preview(&config, locator).await,
        Commands::Sources => list_sources(&config),
    }
}

async fn run_query(config: &EngineConfig, locator: String, params: QueryParams, force_refresh: bool) -> Result<()> {
    let engine = QueryEngine::new(config)?;
    let result = engine
        .query_table(&Locator::new(locator.clone()), &params, force_refresh)
        .await
        .with_context(|| format!("query against {} failed", locator))?;
    info!("{} rows", result.len());
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_datasource(config: &EngineConfig, id: String, params: QueryParams) -> Result<()> {
    let registry = DataSourceRegistry::load(&config.registry_path)?;
    let engine = QueryEngine::new(config)?;
    let result = engine
        .query_datasource(&registry, &id, &params, false)
        .await
        .with_context(|| format!("query against data source {} failed", id))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_preview(config: &EngineConfig, locator: String) -> Result<()> {
    let engine = QueryEngine::new(config)?;
    let preview = engine
        .preview(&Locator::new(locator.clone()))
        .await
        .with_context(|| format!("preview of {} failed", locator))?;
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn list_sources(config: &EngineConfig) -> Result<()> {
    let registry = DataSourceRegistry::load(&config.registry_path)?;
    println!("{}", serde_json::to_string_pretty(registry.list())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_args_parse() {
        let args = Args::parse_from([
            "easybi",
            "query",
            "sales.csv",
            "-x",
            "Date",
            "-y",
            "Units",
            "--group-by",
            "month",
            "--force-refresh",
        ]);
        match args.command {
            Commands::Query {
                locator,
                params,
                force_refresh,
            } => {
                assert_eq!(locator, "sales.csv");
                assert!(force_refresh);
                let params: QueryParams = params.into();
                assert_eq!(params.group_by, Some(TimeBucket::Month));
                assert_eq!(params.y_column.as_deref(), Some("Units"));
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_bad_bucket_rejected() {
        let parsed = Args::try_parse_from(["easybi", "query", "s.csv", "--group-by", "year"]);
        assert!(parsed.is_err());
    }
}
