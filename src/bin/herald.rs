//! herald - command line client for the herald daemon
//!
//! # Usage
//!
//! ```text
//! herald subscribe                         # stream notifications to stdout
//! herald notify --token 3 --command "hi"   # push a message to subscriber 3
//! herald unsubscribe --token 3             # disconnect subscriber 3
//! herald subscribers                       # list active tokens
//! herald health                            # daemon liveness
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use herald_cli::{subscribe, ControlClient, DEFAULT_CONTROL_URL, DEFAULT_SUBSCRIPTION_ADDR};

// ============================================================================
// CLI Arguments
// ============================================================================

/// herald - notify subscribers of a herald daemon
#[derive(Parser, Debug)]
#[command(name = "herald", version, about)]
struct Args {
    /// Control endpoint of the daemon
    #[arg(long, global = true, env = "HERALD_URL", default_value = DEFAULT_CONTROL_URL)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe and print every notification until the daemon hangs up
    Subscribe {
        /// Subscription address of the daemon
        #[arg(long, default_value = DEFAULT_SUBSCRIPTION_ADDR)]
        addr: String,
    },
    /// Push a message to one subscriber
    Notify {
        /// Subscriber token
        #[arg(short, long)]
        token: String,

        /// Message written verbatim to the subscriber
        #[arg(short, long)]
        command: String,
    },
    /// Disconnect one subscriber
    Unsubscribe {
        /// Subscriber token
        #[arg(short, long)]
        token: String,

        /// Farewell written before the connection is closed
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the tokens of active subscribers
    Subscribers,
    /// Show daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Subscribe { addr } => {
            let mut stdout = tokio::io::stdout();
            subscribe(&addr, &mut stdout)
                .await
                .with_context(|| format!("Subscription to {addr} failed"))?;
        }
        Command::Notify { token, command } => {
            let client = ControlClient::new(args.url)?;
            client
                .notify(&token, &command)
                .await
                .with_context(|| format!("Failed to notify subscriber {token}"))?;
        }
        Command::Unsubscribe { token, message } => {
            let client = ControlClient::new(args.url)?;
            client
                .unsubscribe(&token, message.as_deref())
                .await
                .with_context(|| format!("Failed to unsubscribe {token}"))?;
        }
        Command::Subscribers => {
            let client = ControlClient::new(args.url)?;
            for token in client.subscribers().await? {
                println!("{token}");
            }
        }
        Command::Health => {
            let client = ControlClient::new(args.url)?;
            let health = client.health().await?;
            println!(
                "{} (version {}, {} subscribers)",
                health.status, health.version, health.subscribers
            );
        }
    }

    Ok(())
}
