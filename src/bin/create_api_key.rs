use anyhow::{Context, Result};
use clap::Parser;

use shortlink::config::Config;
use shortlink::db::Database;
use shortlink::repositories::{ApiKeyRepository, ApiKeyRepositoryTrait};
use shortlink::utils::hash::{generate_api_key, hash_api_key};

#[derive(Parser)]
#[command(name = "create-api-key")]
#[command(about = "Issue an API key for the link management API", long_about = None)]
struct Cli {
    /// Display name stored alongside the key hash
    #[arg(long, default_value = "default")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let db = Database::connect(&config.db)
        .await
        .context("Failed to connect to database")?;

    let raw_key = generate_api_key();
    let repository = ApiKeyRepository::new(&db);
    let key = repository
        .insert(&cli.name, &hash_api_key(&raw_key))
        .await
        .context("Failed to store API key")?;
    db.shutdown().await;

    println!("Created API key '{}' ({})", key.name, key.id);
    println!("{}", raw_key);
    println!("Store it now; only its hash is kept.");
    Ok(())
}
