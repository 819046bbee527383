mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "container-injector",
    about = "Kubernetes admission webhook injecting sidecar containers"
)]
struct Cli {
    /// Log filter, used when RUST_LOG is not set.
    #[arg(long, global = true, env = "INJECTOR_LOG_FILTER", default_value = "info")]
    log_filter: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Serve the mutating webhook over HTTPS.
    Server(config::ServerArgs),
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(args: config::ServerArgs) -> anyhow::Result<()> {
    tracing::info!(
        address = %args.address,
        port = args.port,
        excluded_namespaces = ?args.excluded_namespaces,
        "HTTP server starts listening"
    );
    webhook::server::build(args.figment(), args.injector())
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("webhook server failed: {}", e))?;
    tracing::info!("server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_filter);
    match cli.command {
        Command::Server(args) => serve(args).await,
    }
}
