use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use lotlineage::db::Db;
use lotlineage::http::LineageHttpServer;
use lotlineage::lineage::{ColumnSpec, Direction, LineageRequest, Table};
use lotlineage::{Config, LineageService};

#[derive(Parser, Debug)]
#[command(name = "lotlineage", version)]
#[command(about = "Batch genealogy and traceability queries over material transactions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trace one or more lots, items, parent lots or supplier lots
    Trace {
        /// Seed identifiers
        #[arg(required = true)]
        seeds: Vec<String>,

        /// Keep only paths reaching these identifiers
        #[arg(short, long)]
        target: Vec<String>,

        /// gen, trc or all
        #[arg(short, long, default_value = "all")]
        direction: String,

        /// Maximum depth (defaults to traversal.default_max_depth)
        #[arg(long)]
        depth: Option<u32>,

        /// "default", a column list, or "exclude (...)"
        #[arg(short, long, default_value = "default")]
        columns: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Serve the lineage HTTP API
    Serve {
        /// Overrides http_server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check the configured database schema
    Verify,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.lineage.log_level.as_str())
    ).init();

    let service = LineageService::new(Db::new(config.db_path()), config.engine_settings());

    match cli.command.unwrap_or(Command::Verify) {
        Command::Trace {
            seeds,
            target,
            direction,
            depth,
            columns,
            format,
        } => {
            let direction: Direction = direction.parse()?;
            let mut request = LineageRequest::new(seeds.clone())
                .with_direction(direction)
                .with_columns(ColumnSpec::parse(&columns)?);
            if !target.is_empty() {
                request = request.with_targets(target);
            }
            if let Some(depth) = depth {
                request = request.with_max_depth(depth);
            }

            let table = service
                .resolve(request)
                .await
                .context("Lineage query failed")?;

            match format {
                OutputFormat::Table => print_table(&table),
                OutputFormat::Json => {
                    let report = serde_json::json!({
                        "generated_at": Utc::now().to_rfc3339(),
                        "seeds": seeds,
                        "direction": direction,
                        "row_count": table.len(),
                        "columns": table.columns,
                        "rows": table.rows,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
        Command::Serve { port } => {
            log::info!("Starting lotlineage v{}", env!("CARGO_PKG_VERSION"));
            log::info!("Database path: {}", config.db_path().display());

            let report = service.verify().await.context("Database schema check failed")?;
            log::info!(
                "Reference store: {} transactions, {} items",
                report.transactions,
                report.items
            );

            let port = port.unwrap_or(config.http_server.port);
            let server = LineageHttpServer::new(service, config.http_server.allowed_origins.clone());
            server.run(port).await?;
        }
        Command::Verify => {
            log::info!("Starting lotlineage v{}", env!("CARGO_PKG_VERSION"));
            log::info!("Database path: {}", config.db_path().display());

            let report = service.verify().await.context("Database schema check failed")?;
            log::info!("Migrations applied: {}", report.migrations.join(", "));
            log::info!("Material transactions: {}", report.transactions);
            log::info!("Item master entries: {}", report.items);
            log::info!("Schema verification passed");
        }
    }

    Ok(())
}

/// Plain-text table with left-aligned columns
fn print_table(table: &Table) {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(table.columns.iter().map(String::as_str).collect()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in &cells {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!("\n{} row(s)", table.len());
}
