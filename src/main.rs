// src/main.rs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deckchat::commands::{ActiveSession, ChatSurface, SessionManager, SurfaceMode};
use deckchat::export::{export_rows, write_export, ExportFormat};
use deckchat::server::wait_for_server_ready;
use deckchat::settings::{load_settings, AppSettings};
use deckchat::types::{Message, StepStatus, SurfaceEvent};
use deckchat::{render, BackendClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Parser)]
#[command(name = "deckchat")]
#[command(about = "Ask questions about power-system planning decks")]
struct Cli {
    /// Backend base URL (overrides settings and DECKCHAT_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Directory for /export files
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the decks the backend can load
    Decks,

    /// Rebuild the backend's documentation index
    Reindex,

    /// Chat about a single deck
    Chat {
        /// Name of a deck known to the backend
        #[arg(long, conflicts_with = "upload")]
        deck: Option<String>,

        /// Path of a zipped deck to upload
        #[arg(long)]
        upload: Option<PathBuf>,
    },

    /// Compare two or more decks
    Compare {
        #[arg(long = "deck", required = true)]
        decks: Vec<String>,
    },
}

const HELP: &str = "\
Type a question, or:
  /pick N          choose option N of the pending question
  /yes, /no        answer the pending correction prompt
  /export csv|json export the last table
  /cancel          stop the running query (Ctrl-C also works)
  /clear           clear the conversation
  /quit            leave";

#[derive(Debug, PartialEq)]
enum Input {
    Query(String),
    Pick(usize),
    Correction(bool),
    Export(ExportFormat),
    Cancel,
    Clear,
    Help,
    Quit,
    Invalid(String),
}

impl Input {
    fn parse(line: &str) -> Input {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Input::Query(line.to_string());
        };
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        match (name.as_str(), arg) {
            ("pick", Some(n)) => match n.parse::<usize>() {
                Ok(n) if n >= 1 => Input::Pick(n - 1),
                _ => Input::Invalid(format!("not an option number: {}", n)),
            },
            ("pick", None) => Input::Invalid("usage: /pick N".to_string()),
            ("yes", _) => Input::Correction(true),
            ("no", _) => Input::Correction(false),
            ("export", fmt) => match fmt.unwrap_or("csv").parse() {
                Ok(format) => Input::Export(format),
                Err(e) => Input::Invalid(e.to_string()),
            },
            ("cancel", _) => Input::Cancel,
            ("clear", _) => Input::Clear,
            ("help", _) => Input::Help,
            ("quit", _) | ("exit", _) => Input::Quit,
            (other, _) => Input::Invalid(format!("unknown command /{}", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    deckchat::init_tracing("deckchat=info");
    let cli = Cli::parse();

    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(url) = cli.backend_url {
        settings.backend.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(dir) = cli.export_dir {
        settings.export.directory = dir;
    }

    wait_for_server_ready(
        &settings.backend.base_url,
        settings.behavior.health_timeout_secs,
    )
    .await
    .context("backend is not reachable")?;

    let client = BackendClient::new(&settings.backend.base_url, settings.request_timeout())
        .context("failed to build HTTP client")?;

    let sessions = SessionManager::new(client);

    match cli.command {
        Commands::Decks => cmd_decks(&sessions).await,
        Commands::Reindex => cmd_reindex(&sessions).await,
        Commands::Chat { deck, upload } => {
            let session = match (deck, upload) {
                (Some(deck), _) => sessions.open_deck(&deck).await,
                (None, Some(path)) => sessions.open_upload(&path).await,
                (None, None) => bail!("pass --deck NAME or --upload PATH"),
            }
            .context("failed to open session")?;
            cmd_chat(&settings, sessions, session).await
        }
        Commands::Compare { decks } => {
            let session = sessions
                .open_comparison(&decks)
                .await
                .context("failed to start comparison")?;
            cmd_chat(&settings, sessions, session).await
        }
    }
}

async fn cmd_decks(sessions: &SessionManager) -> Result<()> {
    let decks = sessions.list_decks().await.context("failed to list decks")?;
    if decks.is_empty() {
        println!("No decks available.");
    }
    for deck in decks {
        match &deck.description {
            Some(description) => println!("{:<20} {} - {}", deck.name, deck.label(), description),
            None => println!("{:<20} {}", deck.name, deck.label()),
        }
    }
    Ok(())
}

async fn cmd_reindex(sessions: &SessionManager) -> Result<()> {
    let result = sessions
        .reindex()
        .await
        .context("failed to reindex documentation")?;
    println!("Reindexed {} documents.", result.documents_processed);
    Ok(())
}

async fn cmd_chat(
    settings: &AppSettings,
    sessions: SessionManager,
    session: ActiveSession,
) -> Result<()> {
    let transport = sessions
        .client()
        .stream_transport()
        .context("failed to build stream client")?;
    let surface = Arc::new(ChatSurface::new(Arc::new(transport), settings.stall_timeout()));
    surface.attach_session(session.id(), session.mode());

    println!("Connected: {}", session.describe());
    println!("{}", HELP);

    let printer = tokio::spawn(print_events(
        surface.subscribe(),
        surface.clone(),
        settings.behavior.max_table_rows,
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                if surface.cancel_query() {
                    continue;
                }
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match Input::parse(&line) {
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::Invalid(reason) => eprintln!("{}", reason),
            Input::Cancel => {
                if !surface.cancel_query() {
                    println!("Nothing to cancel.");
                }
            }
            Input::Clear => surface.clear(),
            Input::Export(format) => {
                let stem = export_stem(&surface.mode());
                match export_latest(&surface, format, &settings.export.directory, &stem) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => eprintln!("{:#}", e),
                }
            }
            Input::Query(query) => {
                let s = surface.clone();
                tokio::spawn(async move {
                    if let Err(e) = s.submit_query(&query).await {
                        eprintln!("{}", e);
                    }
                });
            }
            Input::Pick(index) => {
                let Some(id) = latest(&surface, Message::pending_question) else {
                    eprintln!("No question is waiting for an answer.");
                    continue;
                };
                let s = surface.clone();
                tokio::spawn(async move {
                    if let Err(e) = s.select_option(&id, index).await {
                        eprintln!("{}", e);
                    }
                });
            }
            Input::Correction(accept) => {
                let Some(id) = latest(&surface, |m| {
                    m.correction.as_ref().is_some_and(|c| c.answered.is_none())
                }) else {
                    eprintln!("No correction prompt is open.");
                    continue;
                };
                let s = surface.clone();
                tokio::spawn(async move {
                    if let Err(e) = s.answer_correction(&id, accept).await {
                        eprintln!("{}", e);
                    }
                });
            }
        }
    }

    surface.detach_session();
    printer.abort();
    sessions.close().await;
    Ok(())
}

fn latest(surface: &ChatSurface, pred: impl Fn(&Message) -> bool) -> Option<String> {
    surface
        .messages()
        .iter()
        .rev()
        .find(|m| pred(m))
        .map(|m| m.id.clone())
}

fn export_stem(mode: &SurfaceMode) -> String {
    match mode {
        SurfaceMode::Single { deck: Some(deck) } => deck.clone(),
        SurfaceMode::Single { deck: None } => "deck".to_string(),
        SurfaceMode::Comparison { decks } => format!("comparison_{}", decks.join("_")),
    }
}

fn export_latest(
    surface: &ChatSurface,
    format: ExportFormat,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf> {
    let rows = surface
        .messages()
        .iter()
        .rev()
        .map(export_rows)
        .find(|rows| !rows.is_empty())
        .context("no table to export yet")?;
    Ok(write_export(&rows, format, dir, stem)?)
}

async fn print_events(
    mut events: broadcast::Receiver<SurfaceEvent>,
    surface: Arc<ChatSurface>,
    max_rows: usize,
) {
    let mut streamed = String::new();
    let mut shown_steps = 0usize;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "display fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            SurfaceEvent::QueryBegin => {
                streamed.clear();
                shown_steps = 0;
            }
            SurfaceEvent::Progress(steps) => {
                shown_steps = shown_steps.min(steps.len());
                for step in &steps[shown_steps..] {
                    if step.status == StepStatus::Running {
                        eprintln!("  {} {}", step.icon, step.name);
                    }
                }
                shown_steps = steps.len();
            }
            SurfaceEvent::Delta(piece) => {
                print!("{}", piece);
                let _ = std::io::stdout().flush();
                streamed.push_str(&piece);
            }
            SurfaceEvent::MessageAdded(id) | SurfaceEvent::MessageUpdated(id) => {
                let Some(mut message) = surface.message(&id) else {
                    continue;
                };
                if !streamed.is_empty() {
                    println!();
                    if message.content.trim() == streamed.trim() {
                        message.content.clear();
                    }
                    streamed.clear();
                }
                print!("{}", render::message(&message, max_rows));
                let _ = std::io::stdout().flush();
            }
            SurfaceEvent::QueryEnd { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_queries() {
        assert_eq!(
            Input::parse("  thermal plants in SE "),
            Input::Query("thermal plants in SE".to_string())
        );
    }

    #[test]
    fn pick_is_one_based() {
        assert_eq!(Input::parse("/pick 2"), Input::Pick(1));
        assert!(matches!(Input::parse("/pick 0"), Input::Invalid(_)));
        assert!(matches!(Input::parse("/pick x"), Input::Invalid(_)));
        assert!(matches!(Input::parse("/pick"), Input::Invalid(_)));
    }

    #[test]
    fn export_defaults_to_csv() {
        assert_eq!(Input::parse("/export"), Input::Export(ExportFormat::Csv));
        assert_eq!(Input::parse("/export JSON"), Input::Export(ExportFormat::Json));
        assert!(matches!(Input::parse("/export xlsx"), Input::Invalid(_)));
    }

    #[test]
    fn control_commands() {
        assert_eq!(Input::parse("/yes"), Input::Correction(true));
        assert_eq!(Input::parse("/no"), Input::Correction(false));
        assert_eq!(Input::parse("/cancel"), Input::Cancel);
        assert_eq!(Input::parse("/quit"), Input::Quit);
        assert!(matches!(Input::parse("/frobnicate"), Input::Invalid(_)));
    }

    #[test]
    fn comparison_exports_name_all_decks() {
        let mode = SurfaceMode::Comparison {
            decks: vec!["DEC_A".to_string(), "DEC_B".to_string()],
        };
        assert_eq!(export_stem(&mode), "comparison_DEC_A_DEC_B");
    }
}
