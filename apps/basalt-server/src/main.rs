//! Basalt — a single-host, S3-compatible object storage server.
//!
//! # Usage
//!
//! ```text
//! basalt run [--hostname 127.0.0.1] [--port 8080] [--storage ./data]
//! basalt user create <username> <access-key> <secret-key> [--storage ./data]
//! basalt user list [--storage ./data]
//! basalt user delete <username> [--storage ./data]
//! ```
//!
//! `run` binds the listener, initializes the schema (seeding the admin
//! user on first start), spawns the lifecycle janitor, and serves until
//! ctrl-c. Exit code 0 on clean shutdown; non-zero when the bind or the
//! schema initialization fails.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use basalt_core::{KeyAuthenticator, ServerConfig, ServiceState, janitor};
use basalt_http::BasaltService;
use basalt_index::Index;

#[derive(Debug, Parser)]
#[command(name = "basalt", version, about = "S3-compatible object storage server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the server.
    Run(RunArgs),
    /// Manage users.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Bind hostname.
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Storage root for blobs and the metadata database.
    #[arg(long, default_value = "./data")]
    storage: PathBuf,

    /// Log level filter when RUST_LOG is unset.
    #[arg(long, default_value = "info", env = "BASALT_LOG_LEVEL")]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Create a user.
    Create {
        /// Unique username.
        username: String,
        /// Access key id.
        access_key: String,
        /// Secret key.
        secret_key: String,
        /// Storage root holding the metadata database.
        #[arg(long, default_value = "./data")]
        storage: PathBuf,
    },
    /// List users.
    List {
        /// Storage root holding the metadata database.
        #[arg(long, default_value = "./data")]
        storage: PathBuf,
    },
    /// Delete a user.
    Delete {
        /// Username to delete.
        username: String,
        /// Storage root holding the metadata database.
        #[arg(long, default_value = "./data")]
        storage: PathBuf,
    },
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    Ok(())
}

fn open_index(storage: &std::path::Path) -> Result<Index> {
    std::fs::create_dir_all(storage)
        .with_context(|| format!("cannot create storage root {}", storage.display()))?;
    Index::open(&storage.join("metadata.db")).context("cannot open metadata index")
}

async fn serve(listener: TcpListener, state: Arc<ServiceState>) -> Result<()> {
    let authenticator = Arc::new(KeyAuthenticator::new(Arc::clone(&state.index)));
    let service = BasaltService::new(state, authenticator);

    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone().with_peer(peer_addr);
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    init_tracing(&args.log_level)?;

    let config = ServerConfig::builder()
        .hostname(args.hostname)
        .port(args.port)
        .storage_root(args.storage)
        .log_level(args.log_level)
        .build()
        .apply_env();

    info!(
        bind = %config.bind_addr(),
        storage = %config.storage_root.display(),
        region = %config.region,
        version = env!("CARGO_PKG_VERSION"),
        "starting basalt"
    );

    let state = ServiceState::open(config.clone()).await?;

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.bind_addr()))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!(%addr, "listening for connections");

    tokio::spawn(janitor::run(Arc::clone(&state)));

    serve(listener, state).await
}

fn run_user_command(command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Create {
            username,
            access_key,
            secret_key,
            storage,
        } => {
            let index = open_index(&storage)?;
            let user = index.create_user(&username, &access_key, &secret_key)?;
            println!("created user {} ({})", user.username, user.canonical_id);
        }
        UserCommand::List { storage } => {
            let index = open_index(&storage)?;
            for user in index.list_users()? {
                println!(
                    "{}\t{}\t{}\tcreated {}",
                    user.username,
                    user.access_key,
                    user.canonical_id,
                    user.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        UserCommand::Delete { username, storage } => {
            let index = open_index(&storage)?;
            index.delete_user(&username)?;
            println!("deleted user {username}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::User { command } => run_user_command(command),
    }
}
