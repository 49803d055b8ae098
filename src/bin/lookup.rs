use anyhow::Result;
use clap::{Parser, Subcommand};
use lotlineage::db::Db;
use lotlineage::{Config, LineageService};

#[derive(Parser, Debug)]
#[command(name = "lookup")]
#[command(about = "Item and product code lookups against the lineage database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Item codes containing TEXT, labelled with their product code
    Items { text: String },
    /// All product codes
    Products,
    /// Product code for each item code
    Mapping {
        #[arg(required = true)]
        item_codes: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let service = LineageService::new(Db::new(config.db_path()), config.engine_settings());

    match args.command {
        Command::Items { text } => {
            let options = service.lookup_item_codes(text).await?;
            if options.is_empty() {
                println!("No matching item codes.");
            }
            for option in &options {
                println!("{:<24} {}", option.value, option.label);
            }
        }
        Command::Products => {
            for option in service.lookup_product_codes().await? {
                println!("{}", option.value);
            }
        }
        Command::Mapping { item_codes } => {
            let mapping = service.item_to_product_mapping(item_codes.clone()).await?;
            for code in &item_codes {
                let product = mapping.get(code).map(String::as_str).unwrap_or("-");
                println!("{:<24} {}", code, product);
            }
        }
    }

    Ok(())
}
