use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, warn};

use detections_server::client::{ApiClient, ClientError, FileStorage, ScanReply, SessionContext};
use detections_server::compliance;
use detections_server::model::{DetectionFlag, DetectionForm, FlagUpdate};

#[derive(Parser, Debug)]
#[command(name = "scanctl")]
#[command(about = "command-line client for the detection desk", long_about = None)]
struct Cli {
    #[arg(long, env = "SCANCTL_SERVER", default_value = "http://127.0.0.1:8081")]
    server: String,

    /// Where the session is remembered between runs
    #[arg(long, env = "SCANCTL_STORAGE")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Register {
        name: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Whoami,
    /// Submit a detection record
    Submit(SubmitArgs),
    /// List your scans
    Scans,
    /// Show one scan with its compliance score
    Scan {
        id: String,
        /// Extra attempts when the fetch fails
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// Print only the compliance score of one scan
    Score { id: String },
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// List every detection awaiting review
    List,
    /// Set one review flag on a detection
    Set {
        id: String,
        flag: DetectionFlag,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    vehicle_number: String,
    #[arg(long)]
    vehicle_type: String,
    #[arg(long)]
    number_plate_type: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    image_path: String,
    #[arg(long, default_value_t = 0.0)]
    speed: f64,
    #[arg(long)]
    helmet_detected: bool,
    #[arg(long)]
    helmet_image: String,
    #[arg(long)]
    non_helmet_rider: bool,
    #[arg(long)]
    rider_image: String,
    #[arg(long)]
    passenger_with_helmet: bool,
    #[arg(long)]
    passenger_image: String,
}

fn default_storage() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".scanctl")
        .join("storage.json")
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn fetch_scan(
    api: &ApiClient,
    token: &str,
    id: &str,
    retries: u32,
) -> Result<ScanReply, ClientError> {
    let mut attempt = 0;
    loop {
        match api.fetch_single_scan(token, id).await {
            Ok(reply) => return Ok(reply),
            // a missing scan will not appear by asking again
            Err(e @ ClientError::Api { status: 404, .. }) => return Err(e),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!("fetch failed ({e}), retry {attempt}/{retries}");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let api = ApiClient::new(&cli.server)?;
    let storage = FileStorage::new(cli.storage.unwrap_or_else(default_storage));
    let mut session = SessionContext::load(storage)?;

    match cli.command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let user = api.register(&name, &email, &password).await?;
            println!("registered {} ({})", user.email, user.id);
        }
        Command::Login { email, password } => {
            let login = api.login(&email, &password).await?;
            session.logout()?;
            session.set_auth_token(login.token)?;
            let user = session.fetch_authenticated_user(&api).await?;
            println!("logged in as {}", user.email);
        }
        Command::Logout => {
            if let Some(token) = session.auth_token() {
                if let Err(e) = api.logout(token).await {
                    warn!("server-side logout failed: {e}");
                }
            }
            session.logout()?;
            println!("logged out");
        }
        Command::Whoami => {
            let user = session.fetch_authenticated_user(&api).await?;
            let role = if user.is_admin { "admin" } else { "officer" };
            println!("{} ({}, {role})", user.email, user.id);
        }
        Command::Submit(args) => {
            let user = session.current_user().ok_or(ClientError::Unauthenticated)?;
            let form = DetectionForm {
                user_id: Some(user.id.clone()),
                vehicle_number: Some(args.vehicle_number),
                vehicle_type: Some(args.vehicle_type),
                number_plate_type: Some(args.number_plate_type),
                helmet_detected: Some(args.helmet_detected),
                helmet_detected_image_path: Some(args.helmet_image),
                non_helmet_rider: Some(args.non_helmet_rider),
                non_helmet_rider_image_path: Some(args.rider_image),
                passenger_with_helmet: Some(args.passenger_with_helmet),
                passenger_with_helmet_image_path: Some(args.passenger_image),
                vehicle_speed: Some(args.speed),
                location: Some(args.location),
                image_path: Some(args.image_path),
            };
            let stored = api.submit_detection(session.require_token()?, &form).await?;
            println!("stored detection {}", stored.id);
        }
        Command::Scans => {
            let user = session.current_user().ok_or(ClientError::Unauthenticated)?;
            let scans = api.fetch_scans(session.require_token()?, &user.id).await?;
            if scans.is_empty() {
                println!("no scans yet");
            }
            for scan in scans {
                let report = compliance::assess(&scan);
                println!(
                    "{}  {:<12} {:<5} {:>5.1} km/h  {:>3}%  {}",
                    scan.id,
                    scan.vehicle_number,
                    scan.vehicle_type,
                    scan.vehicle_speed,
                    report.score,
                    scan.location
                );
            }
        }
        Command::Scan { id, retries } => {
            let reply = fetch_scan(&api, session.require_token()?, &id, retries).await?;
            let scan = reply.scan_data;
            println!(
                "{} {} ({} plate)",
                scan.vehicle_number, scan.vehicle_type, scan.number_plate_type
            );
            println!("  at {} on {}", scan.location, scan.timestamp);
            println!("  speed: {} km/h", scan.vehicle_speed);
            println!("  helmet detected: {}", scan.helmet_detected);
            println!("  non-helmet rider: {}", scan.non_helmet_rider);
            println!("  passenger with helmet: {}", scan.passenger_with_helmet);
            println!(
                "  compliance: {}% ({})",
                reply.compliance.score,
                reply.compliance.grade.label()
            );
            for violation in &reply.compliance.violations {
                println!("    - {}", violation.describe());
            }
        }
        Command::Score { id } => {
            let reply = fetch_scan(&api, session.require_token()?, &id, 0).await?;
            println!(
                "{}%  {}",
                reply.compliance.score,
                reply.compliance.grade.label()
            );
        }
        Command::Admin(AdminCommand::List) => {
            let detections = api.fetch_detections(session.require_token()?).await?;
            for d in detections {
                println!(
                    "{}  {:<12} {:<5} helmet={} rider={} passenger={}",
                    d.id,
                    d.vehicle_number,
                    d.vehicle_type,
                    d.helmet_detected,
                    d.non_helmet_rider,
                    d.passenger_with_helmet
                );
            }
        }
        Command::Admin(AdminCommand::Set { id, flag, value }) => {
            let updated = api
                .update_detection(session.require_token()?, &id, FlagUpdate { flag, value })
                .await?;
            println!("{}: {}={}", updated.id, flag.column(), value);
        }
    }

    Ok(())
}
