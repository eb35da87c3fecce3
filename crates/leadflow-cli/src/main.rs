mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use leadflow_client::{init_logging, ApiClient, ClientConfig, ConfigOverrides, LogOptions};
use leadflow_core::{LeadFilters, LeadStatus, Temperature};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(about = "Sales pipeline client for the leadflow portal", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/leadflow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    ws_url: Option<String>,
    /// Session file holding the bearer tokens
    #[arg(long, global = true)]
    session: Option<String>,
    #[arg(long, global = true)]
    log_dir: Option<String>,
    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,
    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Work with leads
    Leads {
        #[command(subcommand)]
        action: LeadCommands,
    },
    /// Pipeline dashboard numbers
    Stats,
    /// Client projects
    Projects {
        #[command(subcommand)]
        action: ProjectCommands,
    },
    /// Invoices
    Invoices {
        #[command(subcommand)]
        action: InvoiceCommands,
    },
    /// Send a test message to the sales agent
    Chat {
        message: String,
        #[arg(long)]
        lead: Option<i64>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Follow lead changes using the configured sync mode
    Watch {
        /// polling, push or off
        #[arg(long)]
        mode: Option<String>,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Subcommand)]
pub(crate) enum LeadCommands {
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        fields: LeadFields,
        #[arg(long)]
        status: Option<LeadStatus>,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: LeadFields,
    },
    /// Move a lead to another pipeline stage
    Move {
        id: i64,
        status: LeadStatus,
    },
    Delete {
        id: i64,
    },
    /// Ask the sales agent to qualify the lead again
    Requalify {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum ProjectCommands {
    List,
    Show { id: i64 },
    Timeline { id: i64 },
    Invoices { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum InvoiceCommands {
    /// Attach a payment proof (PDF or image) to an invoice
    UploadProof { invoice_id: i64, file: PathBuf },
}

#[derive(Args, Clone, Default)]
pub(crate) struct FilterArgs {
    #[arg(long)]
    status: Option<LeadStatus>,
    #[arg(long)]
    temperature: Option<Temperature>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    offset: Option<u32>,
}

impl FilterArgs {
    pub(crate) fn into_filters(self) -> LeadFilters {
        LeadFilters {
            status: self.status,
            temperature: self.temperature,
            search: self.search,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Args, Clone, Default)]
pub(crate) struct LeadFields {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    temperature: Option<Temperature>,
    #[arg(long)]
    value: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        api_url: cli.api_url.clone(),
        ws_url: cli.ws_url.clone(),
        session_path: cli.session.clone(),
        sync_mode: None,
        log_dir: cli.log_dir.clone(),
    };
    let config = ClientConfig::resolve(&overrides).context("failed to load configuration")?;

    let _log_guard = init_logging(&LogOptions {
        level: config.log_level.clone(),
        log_dir: config.log_dir.clone(),
        file_stem: "leadflow-cli".to_string(),
        stderr: cli.verbose,
    });

    let client = ApiClient::from_config(&config).context("failed to build HTTP client")?;
    let ctx = commands::Context {
        client,
        config,
        json: cli.json,
    };

    match cli.command {
        Commands::Login { email, password } => commands::login(&ctx, email, password).await,
        Commands::Register {
            name,
            email,
            password,
            company,
        } => commands::register(&ctx, name, email, password, company).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Whoami => commands::whoami(&ctx).await,
        Commands::Leads { action } => commands::leads(&ctx, action).await,
        Commands::Stats => commands::stats(&ctx).await,
        Commands::Projects { action } => commands::projects(&ctx, action).await,
        Commands::Invoices { action } => commands::invoices(&ctx, action).await,
        Commands::Chat {
            message,
            lead,
            session_id,
        } => commands::chat(&ctx, message, lead, session_id).await,
        Commands::Watch { mode, filters } => {
            commands::watch(&ctx, mode, filters.into_filters()).await
        }
    }
}
