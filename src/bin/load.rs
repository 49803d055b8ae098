use anyhow::{Context, Result};
use clap::Parser;
use lotlineage::db::{migrate, Db};
use lotlineage::store::{write_reference_data, ReferenceData};
use lotlineage::Config;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "load")]
#[command(about = "Create or migrate a lineage database and load reference data from JSON")]
struct Args {
    /// JSON file with "transactions" and "items" arrays
    fixture: PathBuf,

    /// Database to write (defaults to lineage.db_path from config.toml)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Migrations directory (defaults to the bundled migrations)
    #[arg(long)]
    migrations: Option<PathBuf>,

    /// Delete existing rows before loading
    #[arg(short, long)]
    replace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();
    let start = Instant::now();

    let db_path = match args.db {
        Some(path) => path,
        None => Config::load()?.db_path().to_path_buf(),
    };
    log::info!("Database path: {}", db_path.display());

    let raw = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("Failed to read {}", args.fixture.display()))?;
    let data: ReferenceData = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.fixture.display()))?;
    log::info!(
        "Fixture: {} transactions, {} items",
        data.transactions.len(),
        data.items.len()
    );

    let migrations = match &args.migrations {
        Some(dir) => migrate::load_migrations(dir)?,
        None => migrate::bundled_migrations()?,
    };
    let replace = args.replace;

    let db = Db::writable(&db_path);
    let (applied, (transactions, items)) = db
        .with_connection(move |conn| {
            let applied = migrate::apply_migrations(conn, &migrations)?;
            Ok((applied, write_reference_data(conn, &data, replace)?))
        })
        .await?;
    if !applied.is_empty() {
        log::info!("Applied migration versions: {:?}", applied);
    }

    log::info!(
        "Loaded {} transactions and {} items in {:.2}s",
        transactions,
        items,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
