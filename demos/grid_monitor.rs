//! Live grid monitor.
//!
//! Demonstrates:
//! - Building a supervisor against a stream server
//! - Registering grid surfaces by target id
//! - Logging surface updates
//! - Toggling visibility from stdin (`hide` / `show`)
//!
//! Usage:
//!   cargo run --example grid_monitor -- bot-1 bot-2
//!   cargo run --example grid_monitor -- --url http://192.168.1.20:8084 bot-1
//!   cargo run --example grid_monitor -- --space --debug bot-1

// ============================================================================
// Imports
// ============================================================================

use framegrid::{ConnectionSupervisor, Delimiter, Result, SurfaceGrid, VisibilityEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    delimiter: Delimiter,
    url: Option<String>,
    targets: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            debug: false,
            delimiter: Delimiter::Newline,
            url: None,
            targets: Vec::new(),
        };

        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" => args.debug = true,
                "--space" => args.delimiter = Delimiter::Space,
                "--url" => args.url = iter.next(),
                _ => args.targets.push(arg),
            }
        }
        args
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "framegrid=debug,grid_monitor=debug"
    } else {
        "framegrid=info,grid_monitor=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Grid Monitor ===\n");

    if args.targets.is_empty() {
        println!("[Setup] No targets given, nothing will be displayed.");
    }
    let grid = SurfaceGrid::with_targets(args.targets.iter().map(String::as_str));
    let mut updates = grid.subscribe();

    let mut builder = ConnectionSupervisor::builder()
        .delimiter(args.delimiter)
        .sink(grid.clone());
    if let Some(url) = &args.url {
        builder = builder.base_url(url.clone());
    }
    let supervisor = builder.spawn()?;
    println!("[Setup] Streaming from {}", supervisor.options().endpoint);
    println!("        Type `hide` or `show`, Ctrl+C to exit.\n");

    let (events_tx, events_rx) = mpsc::channel(8);
    let watcher = supervisor.watch_visibility(events_rx);
    tokio::spawn(read_commands(events_tx));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(target) => {
                    let Some(frame) = grid.latest(&target) else { continue };
                    let size = frame.decode_payload().map(|b| b.len()).unwrap_or(0);
                    println!(
                        "[Frame] {target}: #{} ({size} bytes)",
                        grid.update_count(&target)
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    println!("[Frame] skipped {skipped} updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    supervisor.stop();
    watcher.abort();

    let stats = supervisor.stats();
    println!(
        "\n[Done] sessions started: {}, restarts scheduled: {}",
        stats.sessions_started, stats.restarts_scheduled
    );
    Ok(())
}

async fn read_commands(events: mpsc::Sender<VisibilityEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let event = match line.trim() {
            "hide" => VisibilityEvent::BecameHidden,
            "show" => VisibilityEvent::BecameVisible,
            other => {
                println!("[Input] unknown command: {other}");
                continue;
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}
