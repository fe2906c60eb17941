use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use rand::RngCore;

use detections_server::config::Config;
use detections_server::store::{MemoryRepository, MySqlRepository, Repository};
use detections_server::{run_server, AppState};

#[derive(Parser, Debug)]
#[command(name = "detections_server")]
#[command(about = "traffic violation detection desk", long_about = None)]
struct Args {
    /// Overrides IP
    #[arg(long)]
    host: Option<String>,

    /// Overrides PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep everything in memory instead of MySQL
    #[arg(long, action)]
    memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grant the admin flag to a registered user
    Promote { email: String },
    /// Take the admin flag away again
    Demote { email: String },
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let store: Arc<dyn Repository> = if args.memory {
        warn!("Using the in-memory store, nothing will survive a restart");
        Arc::new(MemoryRepository::new())
    } else {
        Arc::new(MySqlRepository::new(
            config.require_database_url()?,
            config.max_connections,
            Duration::from_secs(config.connect_timeout),
        ))
    };

    if let Some(command) = args.command {
        let (email, is_admin) = match command {
            Command::Promote { email } => (email, true),
            Command::Demote { email } => (email, false),
        };
        if store.set_admin(&email, is_admin).await? {
            info!("{email}: isAdmin = {is_admin}");
            return Ok(());
        }
        return Err(format!("no user registered as {email}").into());
    }

    let secret = match config.require_jwt_secret() {
        Ok(secret) => secret.to_vec(),
        Err(e) if args.memory => {
            warn!("{e}; signing sessions with a random key for this run");
            let mut secret = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            secret
        }
        Err(e) => return Err(e.into()),
    };

    info!("Starting server...");
    run_server(&config, AppState::new(store, &secret)).await?;
    info!("Server shutting down...");
    Ok(())
}
