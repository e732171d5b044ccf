//! tokengate server and administration CLI

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokengate::secrets::ClientCredentials;
use tokengate_cli_lib::commands::{
    ProvisionCommand, RotateCommand, ServeCommand, ShowConfigCommand,
};
use tokengate_cli_lib::load_config;

#[derive(Parser)]
#[command(name = "tokengate")]
#[command(version)]
#[command(about = "Stateless bearer-token authentication server", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the layered lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the /Auth routes
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Store the OAuth2 client credentials (once per deployment)
    ProvisionOauth {
        /// OAuth2 client id
        #[arg(long)]
        client_id: String,
        /// OAuth2 client secret
        #[arg(long)]
        client_secret: String,
    },
    /// Replace the token secret, revoking every issued token
    RotateSecret,
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            ServeCommand::new(config, bind).execute().await?;
        }
        Commands::ProvisionOauth {
            client_id,
            client_secret,
        } => {
            let credentials = ClientCredentials::new(client_id, client_secret);
            ProvisionCommand::new(config.store, credentials)
                .execute()
                .await?;
        }
        Commands::RotateSecret => {
            RotateCommand::new(config.store).execute().await?;
        }
        Commands::ShowConfig => {
            ShowConfigCommand::new(config).execute()?;
        }
    }

    Ok(())
}
