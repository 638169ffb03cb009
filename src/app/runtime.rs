use std::fs::File;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing_subscriber::EnvFilter;

use super::cache::DiskCache;
use super::fetch::HttpFetcher;
use super::session::Navigator;
use super::tui::draw_loop;
use super::types::{
    AppState, Cli, HeadlessReport, PageView, Phase, ViewerControl, ViewerEvent,
};

const SITE_DOMAIN: &str = "gocomics.com";
const URL_PROMPT: &str = "Enter GoComics URL (e.g., https://www.gocomics.com/pearlsbeforeswine): ";
const INVALID_URL: &str = "Please enter a valid GoComics URL.";

type HttpNavigator = Navigator<HttpFetcher, DiskCache<HttpFetcher>>;

pub fn handle_viewer_event(state: &mut AppState, event: ViewerEvent) {
    match event {
        ViewerEvent::Loading { url } => state.begin_loading(url),
        ViewerEvent::Loaded(view) => {
            let view = *view;
            let summary = format!("{}: {}", view.phase.label(), view.nav.current_url);
            state.apply_view(view);
            state.push_status(summary);
        }
        ViewerEvent::Status(message) => state.push_status(message),
        ViewerEvent::Error(err) => state.push_error(err),
        ViewerEvent::Finished => state.done = true,
    }
}

pub async fn run() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let start_url = match cli.url.clone() {
        Some(url) => url.trim().to_string(),
        None => prompt_start_url()?,
    };
    if !is_valid_start_url(&start_url) {
        eprintln!("{INVALID_URL}");
        return Err(io::Error::new(io::ErrorKind::InvalidInput, INVALID_URL));
    }

    let navigator = build_navigator(&cli, &start_url)?;
    if cli.no_tui {
        return run_headless(navigator, &start_url).await;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ViewerEvent>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<ViewerControl>();
    let session_handle = tokio::spawn(run_session(navigator, start_url.clone(), tx, control_rx));
    let tui_result = run_tui(&start_url, control_tx, &mut rx);

    if let Err(e) = session_handle.await {
        eprintln!("session task join error: {e}");
    }

    tui_result
}

fn build_navigator(cli: &Cli, start_url: &str) -> io::Result<HttpNavigator> {
    let fetcher = HttpFetcher::new(&cli.user_agent, Duration::from_secs(cli.timeout_secs.max(1)))
        .map_err(io::Error::other)?;
    let cache = DiskCache::new(&cli.cache_dir, fetcher.clone());
    Ok(Navigator::new(fetcher, cache, cli.origin.clone(), start_url))
}

fn init_logging(cli: &Cli) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = cli.log_file.as_ref() {
        let file = File::create(path)?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if cli.no_tui {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }
    Ok(())
}

fn prompt_start_url() -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(URL_PROMPT.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Loose check only: anything naming the site and starting with `http` goes
/// through, and a bad URL shows up later as a failed page load.
fn is_valid_start_url(url: &str) -> bool {
    url.contains(SITE_DOMAIN) && url.starts_with("http")
}

/// Owns the navigator for the lifetime of the viewer and applies one control
/// at a time, so page loads never overlap.
async fn run_session(
    mut navigator: HttpNavigator,
    start_url: String,
    tx: UnboundedSender<ViewerEvent>,
    mut control_rx: UnboundedReceiver<ViewerControl>,
) {
    let _ = tx.send(ViewerEvent::Loading {
        url: start_url.clone(),
    });
    let (view, _) = navigator.show_page(&start_url).await;
    report_view(&tx, view);

    while let Some(control) = control_rx.recv().await {
        let target = match control {
            ViewerControl::Shutdown => break,
            ViewerControl::ShowPrev => navigator.state().prev_url.clone(),
            ViewerControl::ShowNext => navigator.state().next_url.clone(),
            ViewerControl::Reload => Some(navigator.state().current_url.clone()),
        };
        let Some(url) = target else {
            let _ = tx.send(ViewerEvent::Status("no strip in that direction".to_string()));
            continue;
        };

        let _ = tx.send(ViewerEvent::Loading { url: url.clone() });
        let view = match control {
            ViewerControl::ShowPrev => navigator.show_prev().await,
            ViewerControl::ShowNext => navigator.show_next().await,
            _ => Some(navigator.reload().await),
        };
        match view {
            Some(view) => report_view(&tx, view),
            None => {
                let _ = tx.send(ViewerEvent::Error(format!("navigation to {url} was skipped")));
            }
        }
    }

    let _ = tx.send(ViewerEvent::Finished);
}

fn report_view(tx: &UnboundedSender<ViewerEvent>, view: PageView) {
    if let Some(path) = view.nav.cached_image_path.as_ref() {
        let _ = tx.send(ViewerEvent::Status(format!("image at {}", path.display())));
    }
    if let Some(reason) = view.error.as_ref() {
        let _ = tx.send(ViewerEvent::Error(reason.clone()));
    } else if view.image_url.is_none() && view.phase == Phase::NotFound {
        let _ = tx.send(ViewerEvent::Error(format!(
            "no strip found at {}",
            view.nav.current_url
        )));
    }
    let _ = tx.send(ViewerEvent::Loaded(Box::new(view)));
}

async fn run_headless(mut navigator: HttpNavigator, start_url: &str) -> io::Result<()> {
    let (view, page) = navigator.show_page(start_url).await;
    let report = HeadlessReport {
        url: &view.nav.current_url,
        phase: navigator.phase(),
        status: &view.status,
        page,
        cached_image_path: view.nav.cached_image_path.as_ref(),
        error: view.error.as_deref(),
    };
    let line = serde_json::to_string(&report).map_err(io::Error::other)?;
    println!("{line}");
    eprintln!(
        "{}: prev={} next={}",
        view.phase.label(),
        view.nav.prev_url.as_deref().unwrap_or("-"),
        view.nav.next_url.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn run_tui(
    session_label: &str,
    control_tx: UnboundedSender<ViewerControl>,
    rx: &mut UnboundedReceiver<ViewerEvent>,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let tui_result = draw_loop(&mut terminal, session_label, control_tx, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    tui_result
}
