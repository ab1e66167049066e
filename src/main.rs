use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use ai_registry::config::Config;
use ai_registry::config_store;
use ai_registry::domains::ai::Page;
use ai_registry::error::{AiRegistryError, Result};
use ai_registry::store::AiStore;

#[derive(Parser, Debug)]
#[command(name = "ai-registry")]
#[command(about = "Administration CLI for the AI registry database")]
struct Cli {
    #[arg(long, default_value = "./data/ai-registry.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    ConfigImport {
        #[arg(long)]
        path: String,
    },
    ConfigShow,
    UserAdd {
        #[arg(long)]
        address: String,

        #[arg(long)]
        nickname: String,
    },
    UserShow {
        #[arg(long)]
        address: String,
    },
    List {
        #[arg(long, default_value_t = 0)]
        offset: i64,

        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    Detail {
        #[arg(long)]
        ai_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ai_registry=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::ConfigImport { path } => {
            let config = Config::from_file(path)?;
            config_store::save_config(&cli.db, &config)?;
            println!("Config imported into {}", cli.db);
        }
        Commands::ConfigShow => {
            let config = Config::from_store(&cli.db)?;
            print_json(&redacted_config_value(&config)?)?;
        }
        Commands::UserAdd { address, nickname } => {
            let store = open_store(&cli.db).await?;
            let user = store.put_user(address, nickname).await?;
            println!("User {} saved as {}", user.user_address, user.nickname);
        }
        Commands::UserShow { address } => {
            let store = open_store(&cli.db).await?;
            match store.get_user(address).await? {
                Some(user) => print_json(&user)?,
                None => println!("No user with address {address}"),
            }
        }
        Commands::List { offset, limit } => {
            let store = open_store(&cli.db).await?;
            let ais = store.list_ais(Page::new(*offset, *limit)).await?;
            print_json(&ais)?;
        }
        Commands::Detail { ai_id } => {
            let store = open_store(&cli.db).await?;
            match store.get_detail(ai_id).await? {
                Some(detail) => print_json(&detail)?,
                None => println!("No AI with id {ai_id}"),
            }
        }
    }
    Ok(())
}

/// Data may live in a different file than the config row; follow the stored config when present.
async fn open_store(db: &str) -> Result<AiStore> {
    let path = Config::from_store(db)
        .map(|config| config.sqlite_path())
        .unwrap_or_else(|_| db.to_string());
    AiStore::new(path).await
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AiRegistryError::Serialization(e.to_string()))?;
    println!("{text}");
    Ok(())
}

fn redacted_config_value(config: &Config) -> Result<Value> {
    let mut value =
        serde_json::to_value(config).map_err(|e| AiRegistryError::Serialization(e.to_string()))?;
    for section in ["embedding", "blockchain"] {
        if let Some(key) = value
            .get_mut(section)
            .and_then(|v| v.get_mut("api_key"))
            .filter(|v| !v.is_null())
        {
            *key = Value::String("***".to_string());
        }
    }
    Ok(value)
}
