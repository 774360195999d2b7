use anyhow::Result;
use clap::{Parser, Subcommand};
use hireflow::auth::AuthConfig;
use hireflow::core::ConfigManager;
use hireflow::start_web_server;
use hireflow::tenant_cli::{handle_tenant_command, TenantCli};
use std::fs::OpenOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "hireflow")]
#[command(about = "Multi-tenant job search API with AI matching and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server
    Serve {
        #[arg(long, env = "ROCKET_PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Manage tenants
    Tenant(TenantCli),
    /// Issue a signed API token for local testing
    Token {
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hireflow=info,rocket::server=off"));

    // Optional JSON log file alongside the console output
    let file_layer = match std::env::var("LOG_FILE") {
        Ok(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false)
                    .boxed(),
            )
        }
        Err(_) => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let config = ConfigManager::load()?;

    match cli.command {
        Command::Serve { port } => start_web_server(config, port).await,
        Command::Tenant(tenant_cli) => {
            handle_tenant_command(tenant_cli, &config.environment.database_path).await
        }
        Command::Token { email, name, hours } => {
            let token = AuthConfig::new(&config.auth).issue_token(
                &email,
                name.as_deref(),
                chrono::Duration::hours(hours),
            )?;
            println!("{}", token);
            Ok(())
        }
    }
}
