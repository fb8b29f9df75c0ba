//! Command-line interface for capture-diff
//!
//! # Usage Examples
//!
//! ## Capture
//! ```bash
//! # Replay a recorded change stream, write both captures under ./work/data
//! capture-diff capture --input frames.jsonl --work-dir ./work
//!
//! # Frames piped on stdin, settings from a file, open the result in meld
//! tail -f stream.log | capture-diff capture --input - \
//!   --config capture.toml --diff-tool meld --open-diff-tool
//!
//! # Keep create/update/delete datetime columns
//! capture-diff capture --input frames.jsonl --work-dir ./work --show-datetime-columns
//! ```
//!
//! Press Ctrl+C to disconnect; frames received so far are still stored.
//!
//! ## Normalize
//! ```bash
//! capture-diff normalize '{"after": {"Id": "5"}, "source": {"name": "oracle", "table": "ORD_P1"}, "ts_ms": 1000}'
//! ```

use anyhow::{bail, Context};
use capture_diff::sink::{CaptureSink, FilesystemSink, NullSink};
use capture_diff::types::{decode_frame, display_lines, normalize};
use capture_diff::{
    channel, spawn_replay, CaptureOpts, CaptureSession, ReplaySource, SessionBuffer,
    SessionReport, Settings, TransportHandle, DEFAULT_CHANNEL_CAPACITY,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "capture-diff")]
#[command(about = "Capture a two-engine change stream into comparable, ordered record files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one capture session over a stream of frames
    Capture {
        /// Newline-delimited frames to read ("-" for stdin)
        #[arg(long, default_value = "-")]
        input: String,

        #[command(flatten)]
        opts: CaptureOpts,
    },

    /// Decode and normalize a single frame, printing the canonical record
    Normalize {
        /// Raw frame (JSON)
        frame: String,

        /// Drop create/update/delete datetime columns
        #[arg(long)]
        strip_timestamp_columns: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match run().await {
        Ok(Exit::Normal) => Ok(()),
        Ok(Exit::Immediate) => {
            // A replay still blocked on stdin would keep the runtime from
            // shutting down; everything has been stored by now.
            let _ = std::io::stdout().flush();
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// How the process should end after a successful command.
enum Exit {
    /// Return from `main` and let the runtime shut down.
    Normal,
    /// Exit without waiting for the runtime's blocking threads.
    Immediate,
}

async fn run() -> anyhow::Result<Exit> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Capture { input, opts } => {
            let settings = opts.resolve()?;
            let source = ReplaySource::parse(&input);
            let exit = if source.reads_stdin() {
                Exit::Immediate
            } else {
                Exit::Normal
            };

            if opts.dry_run {
                run_capture(Arc::new(NullSink), &settings, source).await?;
            } else {
                let Some(work_dir) = settings.work_dir.as_deref() else {
                    bail!("No work directory configured; pass --work-dir or set work_dir in the settings file");
                };
                let mut sink = FilesystemSink::new(work_dir);
                if let Some(tool) = settings.active_diff_tool() {
                    sink = sink.with_diff_tool(tool);
                }
                info!("Writing captures under {}", sink.work_dir().display());
                run_capture(Arc::new(sink), &settings, source).await?;
            }
            Ok(exit)
        }
        Commands::Normalize {
            frame,
            strip_timestamp_columns,
        } => {
            let event = decode_frame(&frame).context("Failed to decode frame")?;
            let record = normalize(&event, strip_timestamp_columns);
            println!(
                "{}",
                serde_json::to_string_pretty(&record.stored_form(false))?
            );
            Ok(Exit::Normal)
        }
    }
}

async fn run_capture<S: CaptureSink + 'static>(
    sink: Arc<S>,
    settings: &Settings,
    source: ReplaySource,
) -> anyhow::Result<()> {
    if let Some(endpoint) = settings.stream_endpoint() {
        info!("Stream endpoint: {endpoint}");
    }

    let buffer = Arc::new(SessionBuffer::new());
    let session = CaptureSession::new(buffer, sink, settings.session_options());

    let (handle, events) = channel(DEFAULT_CHANNEL_CAPACITY);
    spawn_disconnect_on_ctrl_c(handle.clone());
    let replay = spawn_replay(source, handle);

    let report = session.run(events).await;
    replay.abort();

    summarize(&report)
}

/// Disconnects the session on Ctrl+C. Buffered frames are still stored.
fn spawn_disconnect_on_ctrl_c(handle: TransportHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt signal (Ctrl+C), disconnecting");
            handle.disconnect().await;
        }
    });
}

fn summarize(report: &SessionReport) -> anyhow::Result<()> {
    let stats = &report.stats;
    info!(
        "Session finished: {} frames received, {} buffered, {} malformed, {} from unknown sources",
        stats.received, stats.buffered, stats.decode_failures, stats.unknown_source
    );

    for (name, records) in [
        ("Oracle", &report.records.oracle),
        ("PostgreSQL", &report.records.postgres),
    ] {
        println!("{name} ({} records)", records.len());
        for line in display_lines(records) {
            println!("  {line}");
        }
    }

    if let Some(e) = &report.transport_error {
        warn!("Session ended by a stream failure: {e}");
    }

    match &report.store_result {
        Some(Ok(receipt)) => {
            for path in &receipt.artifacts {
                println!("Wrote {}", path.display());
            }
            if receipt.diff_tool_launched {
                println!("Diff tool launched");
            }
            Ok(())
        }
        Some(Err(e)) => {
            error!("{e}");
            bail!("{e}")
        }
        None => {
            warn!("Stream never opened, nothing was stored");
            Ok(())
        }
    }
}
