//! roboneo - two-board animated LED face

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use roboneo_core::{FaceResult, MonotonicClock};
use roboneo_link::open_serial;
use roboneo_runtime::{
    run_primary, run_secondary, spawn_line_triggers, Display, DisplayKind, Face, PanelOrientation,
    RuntimeConfig, TerminalDisplay, UnicornHatDisplay,
};

#[derive(Parser, Debug)]
#[command(name = "roboneo")]
#[command(about = "Animated LED face across two linked boards")]
#[command(version)]
struct Cli {
    /// JSON configuration file, comments allowed
    #[arg(short, long, default_value = "config.jsonc")]
    config: PathBuf,

    /// Run as the secondary board: display what arrives over the link
    #[arg(long)]
    secondary: bool,

    /// Simulate the hardware in the terminal (no serial relay)
    #[arg(long)]
    simulate: bool,
}

fn open_display(config: &RuntimeConfig, simulate: bool) -> FaceResult<Box<dyn Display>> {
    if simulate {
        return Ok(Box::new(TerminalDisplay::stdout()));
    }
    match config.display {
        DisplayKind::Terminal => Ok(Box::new(TerminalDisplay::stdout())),
        DisplayKind::UnicornHat => {
            let orientation = PanelOrientation {
                rotation: config.rotation,
                flip_horizontal: config.flip_horizontal,
                flip_vertical: config.flip_vertical,
            };
            Ok(Box::new(UnicornHatDisplay::open(&config.spi_device, orientation)?))
        }
    }
}

async fn run(cli: Cli, shutdown: watch::Receiver<bool>) -> FaceResult<()> {
    let config = RuntimeConfig::load(&cli.config)?;
    let display = open_display(&config, cli.simulate)?;

    if cli.secondary {
        let (reader, _writer) = open_serial(&config.port, config.baud_rate).await?;
        let stats = run_secondary(&config, display, reader, shutdown).await;
        tracing::info!("Secondary stopped: {} half-images shown", stats.halves_shown);
        return Ok(());
    }

    let face = Face::new(&config, Arc::new(MonotonicClock::default()));
    let loaded = face.prepare(&config.assets_dir);
    tracing::info!("{} expression assets loaded", loaded);

    // GPIO inputs are not wired up; triggers come from stdin lines
    spawn_line_triggers(tokio::io::stdin(), face.start_triggers());

    let link = if cli.simulate {
        None
    } else {
        let (_reader, writer) = open_serial(&config.port, config.baud_rate).await?;
        Some(writer)
    };

    tracing::info!("Running, press Ctrl-C to stop");
    let stats = run_primary(&config, face, display, link, shutdown).await;
    tracing::info!("Primary stopped after {} ticks", stats.ticks);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    let result = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl-C, shutting down");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::error!("Cannot listen for Ctrl-C: {}", e);
                    // Dropping the sender would stop everything
                    std::future::pending::<()>().await;
                }
            }
        });
        run(cli, shutdown_rx).await
    });

    // The stdin reader thread cannot be cancelled
    runtime.shutdown_timeout(Duration::from_millis(200));
    result.map_err(Into::into)
}
