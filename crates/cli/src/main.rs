//! Milo CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! milo-cli migrate
//!
//! # Create an account (password is read from stdin)
//! echo 's3cret-pass' | milo-cli account create -e chef@milo.com -n "Chef" -r 2
//!
//! # Sign an account out everywhere
//! milo-cli account revoke-sessions -e chef@milo.com
//! ```
//!
//! All commands read `DATABASE_URL` from the environment (or `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "milo-cli")]
#[command(author, version, about = "Milo backend operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create a new account; the password is read from stdin
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role id (1 = Administrador, 2 = Mesero, 3 = Cliente)
        #[arg(short, long, default_value_t = 3)]
        role: i32,

        /// Delivery address
        #[arg(long)]
        address: Option<String>,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Revoke every refresh token held by an account
    RevokeSessions {
        /// Login email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Account { action } => match action {
            AccountAction::Create {
                email,
                name,
                role,
                address,
                phone,
            } => {
                let password = commands::account::read_password()?;
                commands::account::create(
                    commands::account::CreateAccount {
                        email,
                        name,
                        role_id: role,
                        address,
                        phone,
                    },
                    password,
                )
                .await?;
            }
            AccountAction::RevokeSessions { email } => {
                commands::account::revoke_sessions(&email).await?;
            }
        },
    }
    Ok(())
}
