use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use config_model::CameraDriver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use photobooth::display::ChannelDisplay;
use photobooth::{config, control, printer};

#[derive(Debug, Parser)]
#[command(name = "photo-booth", version, about = "Touch-screen photo booth")]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Use the simulated camera and read zone names from stdin
    #[arg(long)]
    simulate: bool,
    /// Override the configured tick interval
    #[arg(long = "tick-ms", value_name = "MILLIS")]
    tick_ms: Option<u64>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(fallback)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config: config_path,
        simulate,
        tick_ms,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = config::from_yaml_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    if simulate {
        cfg.camera.driver = CameraDriver::Simulated;
    }
    if let Some(ms) = tick_ms {
        cfg.general.tick_interval = Duration::from_millis(ms.max(1));
    }
    let cfg = config::validated(cfg).context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config_path.display(),
        cfg
    );

    let window = cfg.window.size;
    let tick_interval = cfg.general.tick_interval;
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            tracing::info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let path = cfg.controls.socket.clone();
        let events = events_tx.clone();
        let cancel = cancel.clone();
        async move {
            control::serve_socket(path, window, events, cancel)
                .await
                .context("control socket failed")
        }
    });

    if simulate || io::stdin().is_terminal() {
        let events = events_tx.clone();
        let cancel = cancel.clone();
        // Plain thread: a blocked stdin read must not hold up runtime shutdown.
        std::thread::spawn(move || control::read_console(events, cancel));
    } else {
        tracing::debug!("stdin is not a terminal; console input disabled");
    }
    drop(events_tx);

    let printer = printer::from_config(&cfg.printer);
    let display = Box::new(ChannelDisplay::new(window, events_rx));
    let mut machine =
        photobooth::build_machine(cfg, photobooth::default_plugins(), display, printer)?;

    let booth = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || machine.run(&cancel, tick_interval)
    });
    if let Err(err) = booth.await {
        tracing::error!("booth loop panicked: {err}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
