//! herald daemon - subscriber registry and control endpoint
//!
//! This binary accepts subscriber connections over TCP and pushes
//! notifications to them on request from the HTTP control endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! heraldd start
//!
//! # Start the daemon (background/daemonized) with a config file
//! heraldd start -d --config /etc/herald/heraldd.toml
//!
//! # Stop the daemon
//! heraldd stop
//!
//! # Check daemon status
//! heraldd status
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use heraldd::config::Config;
use heraldd::daemon::Daemon;
use heraldd::shutdown::wait_for_shutdown_signal;

/// herald daemon - minimal notification broker
#[derive(Parser, Debug)]
#[command(name = "heraldd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port of the HTTP control endpoint
        #[arg(long)]
        control_port: Option<u16>,

        /// Port subscribers connect to
        #[arg(long)]
        subscription_port: Option<u16>,

        /// Maximum number of concurrent subscribers
        #[arg(long)]
        max_subscribers: Option<usize>,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

impl Default for Command {
    fn default() -> Self {
        Self::Start {
            daemon: false,
            config: None,
            control_port: None,
            subscription_port: None,
            max_subscribers: None,
        }
    }
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("herald")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("heraldd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("heraldd.log")
}

fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let path = pid_file_path();
    let _ = fs::remove_file(path);
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

/// Config file (or `HERALD_CONFIG`), environment, then command line flags.
fn load_config(
    path: Option<&Path>,
    control_port: Option<u16>,
    subscription_port: Option<u16>,
    max_subscribers: Option<usize>,
) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;

    if let Some(port) = control_port {
        config.control_port = port;
    }
    if let Some(port) = subscription_port {
        config.subscription_port = port;
    }
    if let Some(max) = max_subscribers {
        config.max_subscribers = max;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command.unwrap_or_default() {
        Command::Start {
            daemon,
            config,
            control_port,
            subscription_port,
            max_subscribers,
        } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'heraldd stop' to stop it first.");
                process::exit(1);
            }

            // Fail before forking so configuration errors reach the terminal
            let config = load_config(
                config.as_deref(),
                control_port,
                subscription_port,
                max_subscribers,
            )?;

            if daemon {
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon(config);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..100 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 10 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");

                if let Ok(config) = Config::load(None) {
                    println!("Control:      http://{}", config.control_addr());
                    println!("Subscription: {}", config.subscription_addr());
                }

                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("heraldd=info".parse()?)
                .add_directive("herald_core=info".parse()?)
                .add_directive("herald_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        control = %config.control_addr(),
        subscription = %config.subscription_addr(),
        max_subscribers = config.max_subscribers,
        "herald daemon starting"
    );

    let daemon = Daemon::new(config);

    let shutdown_token = daemon.cancel_token();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    match daemon.run().await {
        Ok(report) => {
            info!(closed = report.closed, "herald daemon stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server error");
            Err(e.into())
        }
    }
}
