use clap::Parser;
use tokenvault::cli::{commands, Cli, Commands};
use tokenvault::config::Settings;
use tokenvault::errors::TokenVaultError;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter.
const LOG_ENV: &str = "TOKENVAULT_LOG";

fn main() {
    let cli = Cli::parse();

    let settings = match std::env::current_dir()
        .map_err(TokenVaultError::from)
        .and_then(|cwd| Settings::load(&cwd))
    {
        Ok(settings) => settings,
        Err(e) => {
            tokenvault::cli::output::error(&e.to_string());
            std::process::exit(1);
        }
    };

    init_logging(&settings.log_level);

    let result = match cli.command {
        Commands::Status => commands::status::execute(&cli, &settings),
        Commands::Lock { ref hint } => commands::lock::execute(&cli, &settings, hint.as_deref()),
        Commands::Unlock => commands::unlock::execute(&cli, &settings),
        Commands::Rotate { ref hint } => {
            commands::rotate::execute(&cli, &settings, hint.as_deref())
        }
        Commands::Verify { deep } => commands::verify::execute(&cli, &settings, deep),
        Commands::Account { ref action } => commands::account::execute(&cli, &settings, action),
        Commands::Token { ref owner_id } => commands::token::execute(&cli, &settings, owner_id),
    };

    if let Err(e) = result {
        tracing::debug!(kind = ?e.kind(), "command failed");
        tokenvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log to stderr so stdout stays clean for `token` output.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("tokenvault={default_filter}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
