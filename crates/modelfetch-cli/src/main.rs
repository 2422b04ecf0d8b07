//! CLI entry point.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use modelfetch_cli::handlers::{self, get::GetArgs};
use modelfetch_cli::{Cli, CliConfig, CliError, Commands, bootstrap};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "modelfetch=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Get {
            urls,
            model_ref,
            kind,
            priority,
            checksum,
            concurrency,
            retries,
            json,
        } => {
            let config = CliConfig::resolve(cli.base_dir)?
                .with_max_concurrent(concurrency)
                .with_retries(retries);
            let ctx = bootstrap(&config)?;
            let args = GetArgs {
                urls,
                model_ref,
                kind,
                priority,
                checksum,
                json,
            };
            handlers::get::execute(&ctx, args).await?;
        }
        Commands::Paths => {
            let config = CliConfig::resolve(cli.base_dir)?;
            let ctx = bootstrap(&config)?;
            handlers::paths::execute(&ctx)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads its `env` fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        eprintln!("Error: {err:#}");
        std::process::exit(code);
    }
}
