//! Storehouse CLI - Database migrations and account seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! storehouse migrate
//!
//! # Create the super admin from SUPERADMIN_* variables
//! storehouse superadmin create
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `superadmin create` - Seed the single super admin account

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "storehouse")]
#[command(author, version, about = "Storehouse CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the super admin account
    Superadmin {
        #[command(subcommand)]
        action: SuperadminAction,
    },
}

#[derive(Subcommand)]
enum SuperadminAction {
    /// Create the super admin from environment variables
    Create,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Superadmin { action } => match action {
            SuperadminAction::Create => {
                commands::superadmin::create().await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_superadmin_create() {
        let cli = Cli::try_parse_from(["storehouse", "superadmin", "create"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Superadmin {
                action: SuperadminAction::Create
            })
        ));
    }
}
