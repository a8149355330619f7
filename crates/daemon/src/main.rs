//! dgftp
//!
//! File server and interactive download client.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dgftp::client::{ClientOptions, ClientSession};
use dgftp::command::CommandScanner;
use dgftp::config::{default_config_path, Config};
use dgftp::server::{FileServer, ServerError};
use dgftp::session::BYE_COMMAND;
use dgftp::transfer::{ReceiveEvent, TransferError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// dgftp - browse a remote directory and download files over UDP.
#[derive(Parser, Debug)]
#[command(name = "dgftp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve a directory
    Serve {
        /// Directory to serve (overrides config)
        #[arg(long, short)]
        root: Option<PathBuf>,

        /// Control port (overrides config)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(long, short)]
        bind: Option<String>,
    },

    /// Connect to a server interactively
    Connect {
        /// Server address as host:port (overrides config)
        #[arg(long, short)]
        server: Option<String>,

        /// Directory downloads are written to (overrides config)
        #[arg(long, short)]
        download_dir: Option<PathBuf>,

        /// Maximum datagram payload to request (overrides config)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        let path = cli.config.unwrap_or_else(default_config_path);
        init_config(&path, force)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Command-line flags take precedence over file and environment
    config.apply_env_overrides();
    apply_cli_overrides(&mut config, &cli.command);
    config.validate()?;

    // Initialize tracing; logs go to stderr so they never mix with the prompt
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    match cli.command {
        Commands::Serve { .. } => serve(&config).await,
        Commands::Connect { .. } => connect(&config).await,
        Commands::Init { .. } => Ok(()),
    }
}

/// Write the default configuration to `path`.
fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)
}

fn apply_cli_overrides(config: &mut Config, command: &Commands) {
    match command {
        Commands::Serve { root, port, bind } => {
            if let Some(root) = root {
                config.server.root = root.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind.clone();
            }
        }
        Commands::Connect {
            server,
            download_dir,
            chunk_size,
        } => {
            if let Some(server) = server {
                config.client.server_address = server.clone();
            }
            if let Some(download_dir) = download_dir {
                config.client.download_dir = download_dir.clone();
            }
            if let Some(chunk_size) = chunk_size {
                config.transfer.chunk_size = *chunk_size;
            }
        }
        Commands::Init { .. } => {}
    }
}

/// Run the server until SIGINT or SIGTERM.
async fn serve(config: &Config) -> anyhow::Result<()> {
    let settings = config.server_settings()?;
    let server = match FileServer::bind(settings).await {
        Ok(server) => server,
        Err(ServerError::InvalidRoot(e)) => {
            eprintln!("This is not a valid root path!");
            tracing::debug!("Root validation failed: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    println!("Server listening on {}", server.local_addr()?);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            tracing::error!("Failed to install signal handlers: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal");
        signal_token.cancel();
    });

    server.run(shutdown).await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Interactive command loop against a server.
async fn connect(config: &Config) -> anyhow::Result<()> {
    let options = ClientOptions {
        download_dir: config.client.download_dir.clone(),
        chunk_size: config.transfer.chunk_size,
        timings: config.transfer_timings(),
    };
    let mut session = ClientSession::connect(config.client.server_address.as_str(), options)
        .await
        .with_context(|| format!("Failed to connect to {}", config.client.server_address))?;
    println!("{}", session.acknowledgement());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", session.prompt());
        std::io::stdout().flush()?;

        let Some(mut text) = stdin.next_line().await? else {
            // end of input counts as leaving
            run_command(&mut session, BYE_COMMAND).await?;
            break;
        };
        // gather continuation lines so the whole command goes out at once
        let mut scanner = CommandScanner::new(&text);
        while scanner.wants_line() {
            let next = stdin.next_line().await?;
            if let Some(next) = &next {
                text.push('\n');
                text.push_str(next);
            }
            scanner.continue_with(next.as_deref());
        }

        run_command(&mut session, &text).await?;
        if session.is_closed() {
            break;
        }
    }
    Ok(())
}

/// Execute one command and print everything it produced.
async fn run_command(session: &mut ClientSession, text: &str) -> anyhow::Result<()> {
    let outcome = session
        .execute(text, |event| {
            if let ReceiveEvent::Started { file_name, .. } = event {
                println!("Start receiving file: {}", file_name);
            }
        })
        .await?;

    for line in &outcome.lines {
        println!("{}", line);
    }
    match outcome.transfer {
        Some(Ok(report)) => println!(
            "File transfer completed (checksum verified): {}",
            report.file_name
        ),
        Some(Err(TransferError::DescriptorTimeout(_))) => {
            println!("No file received. Please try again.")
        }
        Some(Err(e)) => println!("{}", e),
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from(["dgftp", "serve", "--root", "/srv", "--port", "2121"])
            .unwrap();
        match cli.command {
            Commands::Serve { root, port, bind } => {
                assert_eq!(root, Some(PathBuf::from("/srv")));
                assert_eq!(port, Some(2121));
                assert_eq!(bind, None);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_connect_command() {
        let cli = Cli::try_parse_from([
            "dgftp",
            "connect",
            "--server",
            "10.0.0.5:2020",
            "--chunk-size",
            "4096",
        ])
        .unwrap();
        match cli.command {
            Commands::Connect {
                server,
                download_dir,
                chunk_size,
            } => {
                assert_eq!(server.as_deref(), Some("10.0.0.5:2020"));
                assert_eq!(download_dir, None);
                assert_eq!(chunk_size, Some(4096));
            }
            _ => panic!("Expected Connect command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["dgftp", "serve", "-v", "--config", "/etc/dgftp.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dgftp.toml")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["dgftp"]).is_err());
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::try_parse_from(["dgftp", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { force: true }));
    }

    #[test]
    fn test_init_config_writes_loadable_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        init_config(&path, false).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.port, Config::default().server.port);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9\n").unwrap();

        let err = init_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(Config::load(&path).unwrap().server.port, 9);

        init_config(&path, true).unwrap();
        assert_eq!(Config::load(&path).unwrap().server.port, 2020);
    }

    #[test]
    fn test_cli_overrides_apply() {
        let mut config = Config::default();
        let command = Commands::Serve {
            root: Some(PathBuf::from("/data")),
            port: Some(3030),
            bind: Some("127.0.0.1".to_string()),
        };
        apply_cli_overrides(&mut config, &command);
        assert_eq!(config.server.root, PathBuf::from("/data"));
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.server.bind_address, "127.0.0.1");

        let command = Commands::Connect {
            server: None,
            download_dir: Some(PathBuf::from("/tmp/dl")),
            chunk_size: Some(1024),
        };
        apply_cli_overrides(&mut config, &command);
        assert_eq!(config.client.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.transfer.chunk_size, 1024);
        assert_eq!(config.client.server_address, "127.0.0.1:2020");
    }
}
