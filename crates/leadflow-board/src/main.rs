mod app;
mod state;
mod theme;
mod ui;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use leadflow_client::{init_logging, ApiClient, ClientConfig, ConfigOverrides, LogOptions, SyncMode};
use leadflow_core::{LeadFilters, Temperature};
use leadflow_store::spawn_store;
use leadflow_sync::spawn_sync;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "leadflow-board")]
#[command(about = "Terminal kanban for the leadflow sales pipeline", long_about = None)]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    ws_url: Option<String>,
    #[arg(long)]
    session: Option<String>,
    /// polling, push or off
    #[arg(long)]
    sync: Option<String>,
    #[arg(long)]
    log_dir: Option<String>,
    /// Only show leads at this temperature
    #[arg(long)]
    temperature: Option<Temperature>,
    #[arg(long)]
    search: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        api_url: args.api_url.clone(),
        ws_url: args.ws_url.clone(),
        session_path: args.session.clone(),
        sync_mode: args.sync.clone(),
        log_dir: args.log_dir.clone(),
    };
    let config = ClientConfig::resolve(&overrides).context("failed to load configuration")?;

    // The terminal owns stderr; logs only go to the file.
    let log_dir = if config.log_dir.trim().is_empty() {
        default_log_dir()
    } else {
        config.log_dir.clone()
    };
    let _log_guard = init_logging(&LogOptions {
        level: config.log_level.clone(),
        log_dir,
        file_stem: "leadflow-board".to_string(),
        stderr: false,
    });

    let filters = LeadFilters {
        temperature: args.temperature,
        search: args.search.clone(),
        ..LeadFilters::default()
    };
    let client = ApiClient::from_config(&config).context("failed to build HTTP client")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let (stop, shutdown) = watch::channel(false);
    let (store, feed) = runtime.block_on(async {
        if !client.session().await.is_authenticated() {
            bail!("not signed in; run `leadflow login` first");
        }
        let store = spawn_store(Arc::new(client.clone()));
        // Polling fetches on its first tick; the other modes need a seed.
        if config.sync.mode != SyncMode::Polling {
            store.dispatch_fetch_all(filters.clone())?;
        }
        let feed = spawn_sync(
            &config.sync,
            &config.ws_url,
            client.clone(),
            store.clone(),
            filters.clone(),
            shutdown,
        );
        Ok::<_, anyhow::Error>((store, feed))
    })?;
    info!(event = "board_start", sync = config.sync.mode.as_str());

    let mut app = app::App::new(store.clone(), filters);
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    let _ = stop.send(true);
    runtime.block_on(async {
        if let Some(feed) = feed {
            let _ = feed.await;
        }
        store.shutdown().await;
    });
    info!(event = "board_stop");

    if let Err(err) = result {
        eprintln!("leadflow-board: {err}");
    }

    Ok(())
}

fn default_log_dir() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("leadflow").join("logs"))
        .and_then(|dir| dir.to_str().map(str::to_string))
        .unwrap_or_default()
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut app::App,
) -> Result<()> {
    let input_poll = Duration::from_millis(100);
    let mut dirty = true;

    loop {
        if app.sync_snapshot() {
            dirty = true;
        }
        if dirty {
            terminal.draw(|f| ui::render(f, &mut app.board))?;
            dirty = false;
        }

        if event::poll(input_poll)? {
            match event::read()? {
                Event::Key(key) => {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        app.handle_key(key);
                        dirty = true;
                    }
                }
                Event::Mouse(mouse) => {
                    app.handle_mouse(mouse);
                    dirty = true;
                }
                Event::Resize(_, _) => {
                    dirty = true;
                }
                _ => {}
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
