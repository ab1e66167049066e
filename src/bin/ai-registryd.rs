use ai_registry::daemon;
use ai_registry::error::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ai-registryd")]
#[command(about = "AI registry HTTP daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    #[arg(long, default_value = "./data/ai-registry.db")]
    db: String,

    #[arg(long, env = "AI_REGISTRY_TOKEN", default_value = "")]
    token: String,

    /// JSON config file; stored in the database and used instead of the stored config.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ai_registry=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    daemon::run_with_shutdown(
        &cli.host,
        cli.port,
        &cli.db,
        &cli.token,
        cli.config.as_deref(),
        shutdown,
    )
    .await
}
