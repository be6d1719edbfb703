//! Audio focus demo (focus-arbiter) - Main entry point
//!
//! Replays the classic two-player scenario against the simulated renderer:
//! long-running music holds focus, a short sound interrupts it with the
//! chosen duration hint and then completes. The music is restored after a
//! transient interruption; an exclusive one leaves it paused for good.
//! Focus events are printed to stdout as JSON lines; logs go to stderr.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use focus_arbiter::render::SimulatedRenderer;
use focus_arbiter::{AppContext, PlaybackSession, SessionOptions};
use focus_common::config::{self, ConfigResolver, ConfigSource, FocusConfig, LoggingConfig};
use focus_common::events::FocusEvent;
use focus_common::DurationHint;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for focus-arbiter
#[derive(Parser, Debug)]
#[command(name = "focus-arbiter")]
#[command(about = "In-process audio focus arbitration demo")]
#[command(version)]
struct Args {
    /// Duration hint of the interrupting sound (exclusive, transient, transient-may-duck)
    #[arg(long, default_value = "transient-may-duck", env = "FOCUS_ARBITER_HINT")]
    hint: DurationHint,

    /// How long the interrupting sound plays before it completes
    #[arg(long, default_value = "1500", env = "FOCUS_ARBITER_SOUND_MS")]
    sound_ms: u64,

    /// Config file (overrides FOCUS_ARBITER_CONFIG and the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        config::write_config(&FocusConfig::default(), path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let (config, source) = ConfigResolver::new(args.config.clone())
        .resolve()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging, &source)?;

    info!(
        "Starting focus-arbiter (git {}, built {}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Configuration: {:?}", source);

    let renderer = Arc::new(SimulatedRenderer::new());
    let context = AppContext::new(config, renderer.clone());
    let (stop_printer, printer) = spawn_event_printer(context.subscribe_events());

    run_scenario(&context, &renderer, args.hint, Duration::from_millis(args.sound_ms)).await?;

    let snapshot = context.snapshot().await;
    info!(
        "Final arbiter state: {}",
        serde_json::to_string(&snapshot).context("Failed to serialize snapshot")?
    );

    let _ = stop_printer.send(());
    printer.await.context("Event printer task failed")?;
    info!("Demo complete");
    Ok(())
}

/// Initialize tracing; RUST_LOG wins over the config file's level
fn init_tracing(logging: &LoggingConfig, source: &ConfigSource) -> Result<()> {
    let default_filter = match source {
        ConfigSource::CompiledDefaults => "focus_arbiter=debug,focus_common=info".to_string(),
        _ => format!(
            "focus_arbiter={level},focus_common={level}",
            level = logging.level
        ),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// Print every focus event as a JSON line until told to stop
fn spawn_event_printer(
    mut events: broadcast::Receiver<FocusEvent>,
) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                received = events.recv() => match received {
                    Ok(event) => print_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event printer lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut stop_rx => {
                    // Drain whatever is still buffered
                    while let Ok(event) = events.try_recv() {
                        print_event(&event);
                    }
                    break;
                }
            }
        }
    });

    (stop_tx, handle)
}

fn print_event(event: &FocusEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
    }
}

async fn log_session(session: &PlaybackSession) {
    let (left, right) = session.volume().await;
    info!(
        "{}: {} (rendering: {}, volume {:.2}/{:.2})",
        session.label(),
        session.focus_state().await,
        session.is_rendering(),
        left,
        right
    );
}

async fn run_scenario(
    context: &AppContext,
    renderer: &SimulatedRenderer,
    hint: DurationHint,
    sound_length: Duration,
) -> Result<()> {
    let music = context
        .create_session(SessionOptions::new("Music", DurationHint::Exclusive))
        .await;
    let sound = context
        .create_session(SessionOptions::new("Sound", hint))
        .await;

    music.set_looping(true)?;
    music.start().await.context("Music failed to start")?;
    log_session(&music).await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("Sound requests focus ({})", hint);
    sound.start().await.context("Sound failed to start")?;
    music.sync().await;
    log_session(&music).await;
    log_session(&sound).await;

    tokio::time::sleep(sound_length).await;

    if !renderer.complete(sound.id()) {
        warn!("Sound was not rendering when its track should have ended");
    }
    sound.sync().await;
    music.sync().await;
    log_session(&sound).await;
    log_session(&music).await;

    music.stop().await?;
    sound.release().await?;
    music.release().await?;
    Ok(())
}
