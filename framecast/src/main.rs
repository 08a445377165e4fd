//! framecast entry point.
//!
//! ```text
//! framecast                       Stream the configured source
//! framecast --config <path>       Load a custom config TOML
//! framecast --gen-config          Write default config to stdout
//! framecast --image photo.png     Stream a still image
//! framecast --pattern 320x240     Stream a synthetic test pattern
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use framecast::config::{FilterConfig, SourceKind, StreamConfig};
use framecast::console::{self, Command, Console};
use framecast::service::StreamService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast", about = "Frame filtering and WebSocket streaming service")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Stream this image file instead of the configured source.
    #[arg(long, conflicts_with = "pattern")]
    image: Option<PathBuf>,

    /// Stream a test pattern of the given size, e.g. `640x480`.
    #[arg(long, value_parser = parse_size)]
    pattern: Option<(u32, u32)>,

    /// WebSocket port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Target frames per second (0 = unpaced).
    #[arg(long)]
    fps: Option<f64>,

    /// JPEG quality (1-100).
    #[arg(short, long)]
    quality: Option<u8>,

    /// Do not read pipeline commands from stdin.
    #[arg(long)]
    no_console: bool,

    /// Seconds between status log lines (0 disables).
    #[arg(long, default_value_t = 5)]
    status_interval: u64,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w = w.parse().map_err(|_| format!("bad width '{w}'"))?;
    let h = h.parse().map_err(|_| format!("bad height '{h}'"))?;
    Ok((w, h))
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, config: &mut StreamConfig) {
        if let Some(path) = &self.image {
            config.source.kind = SourceKind::Image;
            config.source.path = path.clone();
        }
        if let Some((width, height)) = self.pattern {
            config.source.kind = SourceKind::Pattern;
            config.source.width = width;
            config.source.height = height;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(fps) = self.fps {
            config.processing.target_fps = fps;
        }
        if let Some(quality) = self.quality {
            config.encoder.quality = quality;
        }
    }
}

/// Filters used when the config names none.
fn default_filters() -> Vec<FilterConfig> {
    vec![
        FilterConfig::Grayscale { enabled: true },
        FilterConfig::Resize {
            width: Some(640),
            height: Some(480),
            scale: None,
            enabled: true,
        },
        FilterConfig::Lut {
            lut_type: "invert".into(),
            param: 1.0,
            custom_lut: None,
            enabled: true,
        },
    ]
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let config = StreamConfig {
            filters: default_filters(),
            ..StreamConfig::default()
        };
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut config = StreamConfig::load(&cli.config);
    cli.apply(&mut config);
    if config.filters.is_empty() {
        config.filters = default_filters();
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast v{}", env!("CARGO_PKG_VERSION"));
    info!("source: {:?}", config.source.kind);
    info!("target FPS: {}", config.processing.target_fps);
    info!("JPEG quality: {}", config.encoder.quality);

    let mut service = StreamService::new(config)?;
    service.start()?;
    if let Some(addr) = service.local_addr() {
        info!("clients connect to ws://{addr}");
    }

    let pipeline = Arc::clone(service.pipeline());
    let service = Arc::new(Mutex::new(service));

    let status_source = Arc::clone(&service);
    let commands = Console::new(pipeline).with_status(move || match status_source.lock() {
        Ok(svc) => svc.status().to_string(),
        Err(_) => "service state unavailable".to_string(),
    });

    let mut stdin_open = !cli.no_console;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if stdin_open {
        info!("console ready; type 'help' for commands");
    }

    let status_every = Duration::from_secs(cli.status_interval.max(1));
    let mut ticker = tokio::time::interval(status_every);
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(cmd)) => match commands.execute(cmd) {
                        Ok(reply) => println!("{reply}"),
                        Err(e) => println!("error {}: {e}", e.status()),
                    },
                    Ok(None) => {}
                    Err(e) => println!("error 400: {e}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin closed: {e}");
                    stdin_open = false;
                }
            },
            _ = ticker.tick(), if cli.status_interval > 0 => {
                info!("{}", commands.execute(Command::Stats).unwrap_or_default());
            }
        }
    }

    let stopped = match service.lock() {
        Ok(mut svc) => svc.stop(),
        Err(_) => Ok(()),
    };
    if let Err(e) = stopped {
        error!("shutdown error: {e}");
    }
    info!("framecast stopped");
    Ok(())
}
