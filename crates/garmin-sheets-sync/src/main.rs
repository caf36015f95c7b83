use clap::{Parser, Subcommand};
use garmin_sheets_sync::cli::commands;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "garmin-sheets")]
#[command(author, version, about = "Sync Garmin Connect activities and daily health into Google Sheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile to use for the token cache
    #[arg(short, long, global = true, env = "GARMIN_PROFILE")]
    profile: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle
    Sync {
        /// Only sync activities
        #[arg(long)]
        activities: bool,
        /// Only sync daily health
        #[arg(long)]
        health: bool,
        /// Number of most recent activities to fetch
        #[arg(long, env = "ACTIVITY_LIMIT", default_value = "10")]
        limit: u32,
        /// Days of daily health to upsert, today included
        #[arg(
            long,
            env = "HEALTH_DAYS",
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(0..=i64::from(garmin_sheets_sync::sync::MAX_HEALTH_DAYS))
        )]
        days: u32,
        /// Last day of the health window (YYYY-MM-DD), defaults to today
        #[arg(long)]
        until: Option<String>,
        /// Extra attempts for failed network requests
        #[arg(long, default_value = "0")]
        retries: u32,
        /// Show what would be written without writing
        #[arg(long)]
        dry_run: bool,
        /// Session blob exported by 'auth export-session'
        #[arg(long, env = "GARMIN_SESSION_BASE64", hide_env_values = true)]
        session: Option<String>,
        /// Email address for credential login
        #[arg(long, env = "GARMIN_EMAIL")]
        email: Option<String>,
        /// Password for credential login
        #[arg(long, env = "GARMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Target spreadsheet id
        #[arg(long, env = "SHEET_ID")]
        sheet_id: Option<String>,
        /// Service-account key JSON (or a path to it) for the Sheets API
        #[arg(long, env = "GOOGLE_CREDENTIALS", hide_env_values = true)]
        google_credentials: Option<String>,
        /// Sheets API access token, used instead of the service account
        #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
        google_token: Option<String>,
    },
    /// Token cache commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Log in interactively (prompts for password and MFA code) and cache the tokens
    Login {
        /// Email address, prompted for when missing
        #[arg(long, env = "GARMIN_EMAIL")]
        email: Option<String>,
        /// Password, prompted for when missing
        #[arg(long, env = "GARMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show cached token state
    Status,
    /// Print the cached session as a GARMIN_SESSION_BASE64 value
    ExportSession,
    /// Clear cached tokens
    Logout,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> garmin_sheets_sync::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sync {
            activities,
            health,
            limit,
            days,
            until,
            retries,
            dry_run,
            session,
            email,
            password,
            sheet_id,
            google_credentials,
            google_token,
        } => {
            commands::sync_run(commands::SyncArgs {
                profile: cli.profile,
                session_blob: session,
                email,
                password,
                sheet_id,
                google_credentials,
                google_token,
                activities,
                health,
                limit,
                days,
                until,
                retries,
                dry_run,
            })
            .await
        }
        Commands::Auth { command } => match command {
            AuthCommands::Login { email, password } => commands::login(email, password, cli.profile).await,
            AuthCommands::Status => commands::status(cli.profile).await,
            AuthCommands::ExportSession => commands::export_session(cli.profile).await,
            AuthCommands::Logout => commands::logout(cli.profile).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", garmin_sheets_sync::error::format_user_error(&e));
        std::process::exit(1);
    }

    Ok(())
}
