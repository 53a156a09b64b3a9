use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use timetrack_cli::commands::{entries, start, status, stop};
use timetrack_cli::{ApiClient, Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let client = ApiClient::new(config.base_url()).context("failed to create API client")?;

    let mut stdout = std::io::stdout().lock();
    match command {
        Commands::Start { url, description } => {
            start::run(&mut stdout, &client, &config, url, description).await?;
        }
        Commands::Stop { url } => {
            stop::run(&mut stdout, &client, &config, url).await?;
        }
        Commands::Status => {
            status::run(&mut stdout, &client, &config).await?;
        }
        Commands::Entries {
            username,
            url,
            format,
        } => {
            entries::run(
                &mut stdout,
                &client,
                username.as_deref(),
                url.as_deref(),
                format,
            )
            .await?;
        }
    }

    Ok(())
}
