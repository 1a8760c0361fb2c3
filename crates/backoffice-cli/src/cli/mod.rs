//! CLI entry and dispatch.

use anyhow::{Context, Result};
use backoffice_core::auth::HeaderFlags;
use backoffice_core::{config, logging};
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(version)]
#[command(about = "Session and credential tooling for the backoffice admin console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Store a session issued by the identity provider
    Login {
        /// Access token (sent as bearer on API calls)
        #[arg(long, env = "BACKOFFICE_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        /// Refresh token (traded for a new pair when the session expires)
        #[arg(long, env = "BACKOFFICE_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,

        /// Seconds until the access token expires
        #[arg(long, default_value_t = 3600)]
        expires_in: u64,
    },

    /// Sign out and clear stored tokens
    Logout,

    /// Resolve the current session, refreshing it if it has expired
    Status,

    /// Show the headers an API request would carry
    Headers {
        /// Attach the identity provider API key
        #[arg(long)]
        api_key: bool,

        /// Use the refresh token as bearer instead of the access token
        #[arg(long)]
        use_refresh_token: bool,

        /// Attach the static client keys
        #[arg(long)]
        client_keys: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the venue code used for token refresh
    Venue {
        #[arg(value_name = "CODE")]
        code: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config::paths::logs_dir(), &config.log_level)?;

    match cli.command {
        Commands::Login {
            access_token,
            refresh_token,
            expires_in,
        } => {
            let ctx = commands::AppContext::open(&config)?;
            commands::auth::login(&ctx, access_token, refresh_token, expires_in)
        }
        Commands::Logout => {
            let ctx = commands::AppContext::open(&config)?;
            commands::auth::logout(&ctx).await
        }
        Commands::Status => {
            let ctx = commands::AppContext::open(&config)?;
            commands::status::run(&ctx, &config).await
        }
        Commands::Headers {
            api_key,
            use_refresh_token,
            client_keys,
        } => {
            let ctx = commands::AppContext::open(&config)?;
            commands::headers::show(
                &ctx,
                HeaderFlags {
                    use_api_key: api_key,
                    use_refresh_token,
                    use_client_api_key: client_keys,
                },
            );
            Ok(())
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Venue { code } => commands::config::venue(&code),
        },
    }
}
