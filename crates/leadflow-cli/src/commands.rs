use crate::output::{self, print_json};
use crate::{InvoiceCommands, LeadCommands, LeadFields, ProjectCommands};
use anyhow::{anyhow, bail, Context as _, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use leadflow_client::{ApiClient, ClientConfig, SyncMode};
use leadflow_core::portal::{ChatRequest, Credentials, Registration};
use leadflow_core::{LeadDraft, LeadFilters, LeadPatch};
use leadflow_store::{spawn_store, StoreHandle};
use leadflow_sync::spawn_sync;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct Context {
    pub client: ApiClient,
    pub config: ClientConfig,
    pub json: bool,
}

impl Context {
    fn store(&self) -> StoreHandle {
        spawn_store(Arc::new(self.client.clone()))
    }
}

pub async fn login(ctx: &Context, email: String, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_secret("Password: ")?,
    };
    let user = ctx
        .client
        .login(&Credentials { email, password })
        .await
        .context("login failed")?;
    if ctx.json {
        return print_json(&user);
    }
    println!("Signed in as {}", output::user_line(&user));
    Ok(())
}

pub async fn register(
    ctx: &Context,
    name: String,
    email: String,
    password: Option<String>,
    company: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_secret("Password: ")?,
    };
    let user = ctx
        .client
        .register(&Registration {
            name,
            email,
            password,
            company,
        })
        .await
        .context("registration failed")?;
    if ctx.json {
        return print_json(&user);
    }
    println!("Account created for {}", output::user_line(&user));
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    ctx.client.logout().await?;
    if !ctx.json {
        println!("Signed out");
    }
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let session = ctx.client.session().await;
    if !session.is_authenticated() {
        bail!("not signed in; run `leadflow login`");
    }
    let user = ctx.client.me().await?;
    if ctx.json {
        return print_json(&user);
    }
    println!("{}", output::user_line(&user));
    Ok(())
}

pub async fn leads(ctx: &Context, action: LeadCommands) -> Result<()> {
    let store = ctx.store();
    let result = run_lead_command(ctx, &store, action).await;
    store.shutdown().await;
    result
}

async fn run_lead_command(ctx: &Context, store: &StoreHandle, action: LeadCommands) -> Result<()> {
    match action {
        LeadCommands::List { filters } => {
            store.fetch_all(filters.into_filters()).await?;
            let leads = store.snapshot().leads;
            if ctx.json {
                return print_json(&leads);
            }
            if leads.is_empty() {
                println!("No leads found");
            }
            for lead in &leads {
                println!("{}", output::lead_line(lead));
            }
        }
        LeadCommands::Show { id } => {
            let lead = store.fetch_one(id).await?;
            if ctx.json {
                return print_json(&lead);
            }
            println!("{}", output::lead_detail(&lead));
        }
        LeadCommands::Create {
            name,
            fields,
            status,
        } => {
            let draft = draft_from(name, fields, status);
            let lead = store.create(draft).await?;
            if ctx.json {
                return print_json(&lead);
            }
            println!("Created {}", output::lead_line(&lead));
        }
        LeadCommands::Update { id, name, fields } => {
            let patch = patch_from(name, fields);
            if patch.is_empty() {
                bail!("nothing to update; pass at least one field");
            }
            let lead = store.update(id, patch).await?;
            if ctx.json {
                return print_json(&lead);
            }
            println!("Updated {}", output::lead_line(&lead));
        }
        LeadCommands::Move { id, status } => {
            let lead = store.fetch_one(id).await?;
            let from = lead.status;
            store.change_status(id, status).await?;
            info!(event = "cli_move", lead_id = id, from = %from, to = %status);
            if ctx.json {
                return print_json(&store.snapshot().lead(id));
            }
            println!(
                "Moved #{id} {}: {} -> {}",
                lead.name,
                from.label(),
                status.label()
            );
        }
        LeadCommands::Delete { id } => {
            store.delete(id).await?;
            if !ctx.json {
                println!("Deleted lead #{id}");
            }
        }
        LeadCommands::Requalify { id } => {
            let lead = store.requalify(id).await?;
            if ctx.json {
                return print_json(&lead);
            }
            println!("{}", output::lead_detail(&lead));
        }
    }
    Ok(())
}

pub async fn stats(ctx: &Context) -> Result<()> {
    let store = ctx.store();
    // Local fallback needs the leads in the snapshot.
    if let Err(err) = store.fetch_all(LeadFilters::default()).await {
        warn!(event = "stats_leads_unavailable", error = %err);
    }
    let stats = store.refresh_stats().await;
    store.shutdown().await;
    let stats = stats?;
    if ctx.json {
        return print_json(&stats);
    }
    println!("{}", output::stats_block(&stats));
    Ok(())
}

pub async fn projects(ctx: &Context, action: ProjectCommands) -> Result<()> {
    match action {
        ProjectCommands::List => {
            let projects = ctx.client.list_projects().await?;
            if ctx.json {
                return print_json(&projects);
            }
            for project in &projects {
                println!("{}", output::project_line(project));
            }
        }
        ProjectCommands::Show { id } => {
            let project = ctx.client.get_project(id).await?;
            if ctx.json {
                return print_json(&project);
            }
            println!("{}", output::project_line(&project));
            if let Some(client) = &project.client {
                println!("  client: {client}");
            }
            if let Some(due) = project.due_date {
                println!("  due:    {due}");
            }
        }
        ProjectCommands::Timeline { id } => {
            let events = ctx.client.project_timeline(id).await?;
            if ctx.json {
                return print_json(&events);
            }
            for event in &events {
                println!("{}", output::timeline_line(event));
            }
        }
        ProjectCommands::Invoices { id } => {
            let invoices = ctx.client.project_invoices(id).await?;
            if ctx.json {
                return print_json(&invoices);
            }
            for invoice in &invoices {
                println!("{}", output::invoice_line(invoice));
            }
        }
    }
    Ok(())
}

pub async fn invoices(ctx: &Context, action: InvoiceCommands) -> Result<()> {
    match action {
        InvoiceCommands::UploadProof { invoice_id, file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("invalid file name: {}", file.display()))?
                .to_string();
            let invoice = ctx
                .client
                .upload_invoice_proof(invoice_id, &file_name, bytes)
                .await?;
            if ctx.json {
                return print_json(&invoice);
            }
            println!("Proof uploaded: {}", output::invoice_line(&invoice));
        }
    }
    Ok(())
}

pub async fn chat(
    ctx: &Context,
    message: String,
    lead_id: Option<i64>,
    session_id: Option<String>,
) -> Result<()> {
    let reply = ctx
        .client
        .agent_chat(&ChatRequest {
            message,
            lead_id,
            session_id,
        })
        .await?;
    if ctx.json {
        return print_json(&reply);
    }
    println!("{}", output::chat_block(&reply));
    Ok(())
}

/// Follow the store until Ctrl-C, printing each change.
pub async fn watch(ctx: &Context, mode: Option<String>, filters: LeadFilters) -> Result<()> {
    let mut settings = ctx.config.sync.clone();
    if let Some(mode) = mode {
        settings.mode = SyncMode::parse(&mode)?;
    }

    let store = ctx.store();
    let mut snapshots = store.subscribe();
    let mut last = snapshots.borrow_and_update().clone();

    // Polling fetches on its first tick; the other modes need a seed.
    if settings.mode != SyncMode::Polling {
        store.fetch_all(filters.clone()).await?;
    }

    let (stop, shutdown) = watch::channel(false);
    let feed = spawn_sync(
        &settings,
        &ctx.config.ws_url,
        ctx.client.clone(),
        store.clone(),
        filters,
        shutdown,
    );
    if !ctx.json {
        eprintln!("watching leads ({}), Ctrl-C to stop", settings.mode.as_str());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = snapshots.borrow_and_update().clone();
                if ctx.json {
                    println!("{}", serde_json::to_string(&next)?);
                } else {
                    for line in output::describe_changes(&last, &next) {
                        println!("{line}");
                    }
                }
                last = next;
            }
            _ = &mut ctrl_c => break,
        }
    }

    let _ = stop.send(true);
    if let Some(feed) = feed {
        let _ = feed.await;
    }
    store.shutdown().await;
    Ok(())
}

fn draft_from(
    name: String,
    fields: LeadFields,
    status: Option<leadflow_core::LeadStatus>,
) -> LeadDraft {
    LeadDraft {
        name,
        email: fields.email,
        phone: fields.phone,
        company: fields.company,
        role: fields.role,
        source: fields.source,
        status,
        temperature: fields.temperature,
        estimated_value: fields.value,
    }
}

fn patch_from(name: Option<String>, fields: LeadFields) -> LeadPatch {
    LeadPatch {
        name,
        email: fields.email,
        phone: fields.phone,
        company: fields.company,
        role: fields.role,
        source: fields.source,
        temperature: fields.temperature,
        estimated_value: fields.value,
    }
}

fn read_secret(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let secret = if io::stdin().is_terminal() {
        terminal::enable_raw_mode()?;
        let typed = read_hidden_line();
        terminal::disable_raw_mode()?;
        eprintln!();
        typed?
    } else {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };
    if secret.is_empty() {
        bail!("empty password");
    }
    Ok(secret)
}

/// Key presses are read in raw mode, so nothing is echoed.
fn read_hidden_line() -> Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match secret_key(&mut secret, key) {
            SecretInput::Pending => {}
            SecretInput::Done => return Ok(secret),
            SecretInput::Cancelled => bail!("cancelled"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SecretInput {
    Pending,
    Done,
    Cancelled,
}

fn secret_key(secret: &mut String, key: KeyEvent) -> SecretInput {
    if key.kind == KeyEventKind::Release {
        return SecretInput::Pending;
    }
    match key.code {
        KeyCode::Enter => SecretInput::Done,
        KeyCode::Esc => SecretInput::Cancelled,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            SecretInput::Cancelled
        }
        KeyCode::Char(ch) => {
            secret.push(ch);
            SecretInput::Pending
        }
        KeyCode::Backspace => {
            secret.pop();
            SecretInput::Pending
        }
        _ => SecretInput::Pending,
    }
}
