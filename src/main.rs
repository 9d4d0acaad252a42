//! Signalmonitor - live instrument-monitoring client
//!
//! Console front end: connects to an instrument, runs one acquisition mode
//! and prints status changes until Ctrl+C or `--duration` elapses.

mod terminal;

use anyhow::Result;
use signalmonitor::acquisition::rate::format_rate;
use signalmonitor::instrument::{InstrumentState, ServerConfig};
use signalmonitor::link::transport::WebSocketConnector;
use signalmonitor::render::axis::axis_labels;
use signalmonitor::{
    AcquisitionMode, AcquisitionSession, Notification, SessionConfig, SessionHandle, Viewport,
};
use std::path::PathBuf;
use std::time::Duration;
use terminal::TerminalSurface;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

/// How often the status line is refreshed
const STATUS_INTERVAL: Duration = Duration::from_millis(250);

/// Pixel size the frames are laid out for
const VIEWPORT: Viewport = Viewport {
    width: 800.0,
    height: 400.0,
};

struct Options {
    config: SessionConfig,
    mode: AcquisitionMode,
    duration: Option<Duration>,
    mock: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signalmonitor=info".parse()?),
        )
        .init();

    let Some(options) = parse_args()? else {
        return Ok(());
    };

    println!("╔════════════════════════════════════════════════════════════╗");
    println!(
        "║        Signalmonitor v{} - Live Instrument Monitor        ║",
        signalmonitor::VERSION
    );
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(options))
}

/// Parse the command line. `None` means the request was fully handled
/// (help, version, or an argument error already reported).
fn parse_args() -> Result<Option<Options>> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut endpoint: Option<String> = None;
    let mut mode = AcquisitionMode::Osc;
    let mut duration: Option<Duration> = None;
    let mut led_sim = true;
    let mut mock = false;
    let mut i = 1;

    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("signalmonitor {} ({})", signalmonitor::VERSION, signalmonitor::BUILD_DATE);
                return Ok(None);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--no-led-sim" => led_sim = false,
            "--mock" => mock = true,
            "--config" | "-c" | "--endpoint" | "-e" | "--mode" | "-m" | "--duration" | "-d"
                if value.is_none() =>
            {
                eprintln!("Error: {} requires a value", args[i]);
                return Ok(None);
            }
            "--config" | "-c" => {
                config_path = value.map(PathBuf::from);
                i += 1;
            }
            "--endpoint" | "-e" => {
                endpoint = value.cloned();
                i += 1;
            }
            "--mode" | "-m" => {
                match value.map(|v| v.parse::<AcquisitionMode>()) {
                    Some(Ok(m)) => mode = m,
                    Some(Err(e)) => {
                        eprintln!("Error: {}", e);
                        return Ok(None);
                    }
                    None => {}
                }
                i += 1;
            }
            "--duration" | "-d" => {
                match value.and_then(|v| v.parse::<f64>().ok()) {
                    Some(secs) if secs > 0.0 && secs.is_finite() => {
                        duration = Some(Duration::from_secs_f64(secs))
                    }
                    _ => {
                        eprintln!("Error: Invalid duration: {}", value.map(String::as_str).unwrap_or(""));
                        return Ok(None);
                    }
                }
                i += 1;
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(None);
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => SessionConfig::load(path),
        None => SessionConfig::default(),
    };
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    if !led_sim {
        config.simulate_status_led = false;
    }

    Ok(Some(Options {
        config,
        mode,
        duration,
        mock,
    }))
}

fn print_help() {
    println!("Usage: signalmonitor [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH       Load session settings from a JSON file");
    println!("  -e, --endpoint URL      Instrument endpoint (default: ws://localhost:8080)");
    println!("  -m, --mode MODE         Acquisition mode: osc, fft or idle (default: osc)");
    println!("  -d, --duration SECS     Stop after SECS seconds (default: until Ctrl+C)");
    println!("      --no-led-sim        Do not cycle the status indicator");
    println!("      --mock              Serve a mock instrument on the endpoint's port");
    println!("  -v, --version           Show version");
    println!("  -h, --help              Show this help");
    println!();
    println!("Examples:");
    println!("  signalmonitor --mock --mode fft --duration 10");
    println!("  signalmonitor -e ws://192.168.1.20:8080 -m osc");
}

/// Port of a `ws://host:port[/path]` endpoint
fn endpoint_port(endpoint: &str) -> Option<u16> {
    let authority = endpoint.split("://").nth(1)?.split('/').next()?;
    authority.rsplit_once(':')?.1.parse().ok()
}

async fn run(options: Options) -> Result<()> {
    let Options {
        config,
        mode,
        duration,
        mock,
    } = options;

    if mock {
        let port = endpoint_port(&config.endpoint).unwrap_or(8080);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let state = InstrumentState::new(ServerConfig {
            port,
            ..ServerConfig::default()
        });
        tokio::spawn(async move {
            if let Err(e) = signalmonitor::instrument::serve_listener(listener, state).await {
                error!("Mock instrument error: {}", e);
            }
        });
        println!("Mock instrument on port {}", port);
    }

    println!("Endpoint: {}", config.endpoint);
    println!("Mode: {}", mode);
    println!();

    let surface = TerminalSurface::new(VIEWPORT);
    let session = AcquisitionSession::new(&config, Box::new(WebSocketConnector::new()), surface.clone());
    let (handle, task) = SessionHandle::spawn(session);

    // Set up Ctrl+C handler
    let stopper = handle.clone();
    ctrlc::set_handler(move || {
        let _ = stopper.shutdown_blocking();
    })
    .ok();

    let mut notifications = handle.subscribe();
    handle.connect().await?;
    handle.start(mode).await?;
    print_axis(mode, config.sampling_rate);

    println!("Monitoring started. Press Ctrl+C to stop.");
    println!();
    println!("Status:");
    println!("────────────────────────────────────────");

    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    let mut last_status = String::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            received = notifications.recv() => {
                match received {
                    Ok(Notification::SamplingRate(hz)) => {
                        println!("Sampling rate: {}", format_rate(hz));
                        print_axis(mode, hz);
                    }
                    Ok(Notification::RetriesExhausted { attempts }) => {
                        println!("Instrument unreachable after {} attempts; giving up", attempts);
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                continue;
            }
        }

        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            info!("Duration elapsed, shutting down");
            handle.shutdown().await.ok();
            break;
        }

        // Fails once Ctrl+C has shut the session down
        let Ok(status) = handle.status().await else {
            break;
        };

        let status_line = format!(
            "Link: {:<13} | LED: {:<13} | Mode: {} | Rate: {:>8} | FPS: {:>4.1} | {}",
            status.connection.to_string(),
            status.indicator.to_string(),
            status.mode,
            format_rate(status.sampling_rate),
            status.fps,
            surface.summary()
        );

        // Only print if changed (reduce spam)
        if status_line != last_status {
            println!("{}", status_line);
            last_status = status_line;
        }
    }

    println!();
    println!("Stopping...");
    let session = task.await?;
    let counters = session.diagnostics().counters();
    println!(
        "Frames: {} ({} grid-only) | Requests: {} sent, {} dropped | Replies: {} applied, {} discarded, {} malformed",
        counters.frames_rendered,
        counters.degenerate_frames,
        counters.requests_sent,
        counters.requests_dropped,
        counters.inbound_applied,
        counters.inbound_discarded,
        counters.inbound_malformed
    );
    println!("Done.");

    Ok(())
}

fn print_axis(mode: AcquisitionMode, rate: u32) {
    let labels = axis_labels(mode, rate);
    println!("Axis: {} | {} | {}", labels.start, labels.title, labels.end);
}
