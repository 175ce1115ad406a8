//!
//! uniteam CLI binary
//! ------------------
//! Command-line front end over the UniTeam client core: log in, inspect the current
//! session, check what a route would do for the logged-in user, render the role's
//! dashboard and list backend collections. The session persists between invocations
//! in `~/.uniteam/session.json` (override with `UNITEAM_SESSION_FILE` or `--session-file`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use uniteam::api::{ApiGateway, AuthService, ResourceClient, ResourceKind};
use uniteam::cli::{json_forced, print_json, print_records};
use uniteam::config::ClientConfig;
use uniteam::dashboard::{load_dashboard, pending_lecturers, DashboardSummary};
use uniteam::error::AppError;
use uniteam::identity::{RecordingNavigator, SessionStore};
use uniteam::preferences::{Preferences, Theme};
use uniteam::routes::{NavOutcome, RouteTable};
use uniteam::storage::{FileBackend, KeyValueBackend};

#[derive(Parser)]
#[command(name = "uniteam")]
#[command(author, version, about = "UniTeam client - session, routes and dashboards from the terminal", long_about = None)]
struct Cli {
    /// Backend origin (overrides UNITEAM_API_BASE)
    #[arg(long, global = true)]
    api: Option<String>,

    /// Session file (overrides UNITEAM_SESSION_FILE)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        #[arg(long)]
        username: String,
        /// Password (falls back to UNITEAM_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Show the current user, re-validating the stored session
    Whoami,
    /// Show the dashboard for the current user's role
    Dashboard,
    /// Show what navigating to a route would do
    Open { path: String },
    /// List a backend collection (projects, milestones, invitations, team-memberships, project-templates, users)
    List { resource: String },
    /// Show one record
    Get { resource: String, id: u64 },
    /// Accept or decline an invitation
    Invitation {
        #[command(subcommand)]
        action: InvitationAction,
    },
    /// Approve a pending lecturer account (admin)
    ApproveLecturer { id: u64 },
    /// Show or change the colour theme
    Theme { value: Option<String> },
    /// Toggle the collapsed sidebar preference
    Sidebar,
}

#[derive(Subcommand)]
enum InvitationAction {
    Accept { id: u64 },
    Decline { id: u64 },
}

struct Client {
    auth: AuthService,
    resources: ResourceClient,
    navigator: Arc<RecordingNavigator>,
    backend: Arc<dyn KeyValueBackend>,
}

fn build_client(cli: &Cli) -> Result<Client> {
    let mut config = match cli.api.as_deref() {
        Some(api) => ClientConfig::new(api)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(p) = cli.session_file.clone() {
        config = config.with_session_file(p);
    } else if cli.api.is_some() {
        // keep the env-configured session file when only the origin is overridden
        config = config.with_session_file(ClientConfig::from_env()?.session_file);
    }
    debug!(target: "uniteam", "api={} session_file={}", config.base_url, config.session_file.display());

    let backend: Arc<dyn KeyValueBackend> = Arc::new(FileBackend::new(config.session_file.clone()));
    let store = Arc::new(SessionStore::restore(backend.clone()).context("failed to read stored session")?);
    let navigator = Arc::new(RecordingNavigator::new());
    let gateway = Arc::new(ApiGateway::new(config, store, navigator.clone())?);
    Ok(Client {
        auth: AuthService::new(gateway.clone()),
        resources: ResourceClient::new(gateway),
        navigator,
        backend,
    })
}

fn print_list(records: &[serde_json::Value]) {
    if !print_records(records) {
        print_json(&serde_json::Value::Array(records.to_vec()));
    }
}

fn print_dashboard(summary: &DashboardSummary) {
    if json_forced() {
        print_json(&serde_json::to_value(summary).unwrap_or_default());
        return;
    }
    match summary {
        DashboardSummary::Student { projects, pending_invitations } => {
            println!("Active projects:      {}", projects);
            println!("Pending invitations:  {}", pending_invitations);
        }
        DashboardSummary::Lecturer { projects, templates } => {
            println!("Supervised projects:  {}", projects);
            println!("Project templates:    {}", templates);
        }
        DashboardSummary::Admin { total_users, students, lecturers, pending_lecturers } => {
            println!("Total users:          {}", total_users);
            println!("Students:             {}", students);
            println!("Lecturers:            {}", lecturers);
            println!("Pending lecturers:    {}", pending_lecturers);
        }
    }
}

async fn run(cli: Cli, client: &Client) -> Result<()> {
    let store = client.auth.gateway().store().clone();
    match cli.command {
        Commands::Login { username, password } => {
            let password = password
                .or_else(|| std::env::var("UNITEAM_PASSWORD").ok())
                .ok_or_else(|| anyhow!("password required: pass --password or set UNITEAM_PASSWORD"))?;
            let user = client.auth.login(&username, &password).await?;
            println!("Welcome back, {}! ({})", user.display_name(), user.role);
            if let NavOutcome::Redirect(to) = RouteTable::standard().navigate(&store.get_session(), "/") {
                println!("Landing page: {}", to);
            }
        }
        Commands::Logout => {
            client.auth.logout()?;
            println!("Logged out.");
        }
        Commands::Whoami => match client.auth.bootstrap().await? {
            Some(user) => {
                println!("{} ({}) id={} approved={}", user.username, user.role, user.id, user.is_approved);
            }
            None => println!("Not logged in."),
        },
        Commands::Dashboard => {
            let Some(user) = client.auth.bootstrap().await? else {
                return Err(anyhow!("not logged in; run 'uniteam login' first"));
            };
            println!("Welcome back, {}!", user.display_name());
            let summary = load_dashboard(&client.resources, &user.role).await?;
            print_dashboard(&summary);
            if let DashboardSummary::Admin { pending_lecturers: n, .. } = summary {
                if n > 0 {
                    let users = client.resources.list(ResourceKind::Users).await?;
                    print_list(&pending_lecturers(&users));
                }
            }
        }
        Commands::Open { path } => match RouteTable::standard().navigate(&store.get_session(), &path) {
            NavOutcome::Render(pattern) => println!("render {}", pattern),
            NavOutcome::Redirect(to) => println!("redirect -> {}", to),
            NavOutcome::NotFound => println!("404 - Page Not Found"),
        },
        Commands::List { resource } => {
            let kind: ResourceKind = resource.parse()?;
            print_list(&client.resources.list(kind).await?);
        }
        Commands::Get { resource, id } => {
            let kind: ResourceKind = resource.parse()?;
            print_json(&client.resources.get(kind, id).await?);
        }
        Commands::Invitation { action } => {
            let out = match action {
                InvitationAction::Accept { id } => client.resources.accept_invitation(id).await?,
                InvitationAction::Decline { id } => client.resources.decline_invitation(id).await?,
            };
            print_json(&out);
        }
        Commands::ApproveLecturer { id } => {
            print_json(&client.resources.approve_lecturer(id).await?);
        }
        Commands::Theme { value } => {
            let prefs = Preferences::new(client.backend.clone());
            let theme = match value.as_deref() {
                None => prefs.theme()?,
                Some("toggle") => prefs.toggle_theme()?,
                Some(v) => {
                    let t = Theme::parse(v).ok_or_else(|| anyhow!("theme must be 'light', 'dark' or 'toggle'"))?;
                    prefs.set_theme(t)?;
                    t
                }
            };
            println!("theme: {}", theme);
        }
        Commands::Sidebar => {
            let collapsed = Preferences::new(client.backend.clone()).toggle_sidebar()?;
            println!("sidebar collapsed: {}", collapsed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("invalid RUST_LOG filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let client = build_client(&cli)?;
    let result = run(cli, &client).await;

    if let Some(to) = client.navigator.last() {
        eprintln!("redirect -> {}", to);
    }
    match result {
        Err(e) if e.downcast_ref::<AppError>().is_some_and(AppError::is_session_expired) => {
            Err(anyhow!("session expired, please log in again ({})", e))
        }
        other => other,
    }
}
