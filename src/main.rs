//! dev-proxy
//!
//! Local development proxy reproducing a static host's routing in front of
//! a site's dev server.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │                  DEV PROXY                    │
//!   Client Request   │  ┌────────┐   ┌──────────┐   ┌────────────┐   │
//!   ─────────────────┼─▶│  http  │──▶│ routing  │──▶│  dispatch  │───┼──▶ app origin
//!                    │  │ server │   │  engine  │   │ + fallback │───┼──▶ functions
//!                    │  └────────┘   └────┬─────┘   └────────────┘───┼──▶ addons / external
//!                    │                    │                          │
//!                    │          ┌─────────┴─────────┐                │
//!                    │          │ rule / header     │◀── watcher ◀───┼─── _redirects,
//!                    │          │ table snapshots   │                │    _headers
//!                    │          └───────────────────┘                │
//!                    └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use dev_proxy::config::validation::validate_config;
use dev_proxy::config::{load_config, ConfigError, DevConfig, TableWatcher};
use dev_proxy::http::{static_origin, HttpServer};
use dev_proxy::lifecycle::{startup, Shutdown, StartupError};
use dev_proxy::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "dev-proxy", version, about = "Local development routing proxy")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "devproxy.toml")]
    config: PathBuf,

    /// Port the proxy listens on
    #[arg(long)]
    port: Option<u16>,

    /// Port of the app dev server
    #[arg(long)]
    target_port: Option<u16>,

    /// Port of the functions server
    #[arg(long)]
    functions_port: Option<u16>,

    /// Publish directory (document root)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Framework dev server name; disables static shadowing of rules
    #[arg(long)]
    framework: Option<String>,

    /// Serve the publish directory on the target port
    #[arg(long = "static")]
    serve_static: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::init("info");
            tracing::error!(error = %e, "dev-proxy failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let (config, config_path) = load(&cli)?;
    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dev-proxy starting");

    startup::export_dev_environment();

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let upstream = &config.upstream;
    if upstream.serve_static {
        let address = format!("{}:{}", upstream.host, upstream.app_port);
        let listener = bind(&address).await?;
        let publish_dir = config.site.publish_dir.clone();
        let stop = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = static_origin::serve(listener, &publish_dir, stop).await {
                tracing::error!(error = %e, "Static origin stopped");
            }
        });
    }

    let startup_timeout = Duration::from_secs(upstream.startup_timeout_secs);
    if let Err(e) = startup::wait_for_port(&upstream.host, upstream.app_port, startup_timeout).await {
        tracing::error!(
            port = upstream.app_port,
            "App server never opened its port; set --target-port to the port your dev server uses"
        );
        return Err(e);
    }
    if let Some(port) = upstream.functions_port {
        startup::wait_for_port(&upstream.host, port, startup_timeout).await?;
    }

    let listener = bind(&config.listener.bind_address).await?;
    let url = startup::set_serving_url(listener.local_addr()?);

    let watch = config.watch.clone();
    let server = HttpServer::new(config, config_path)?;

    let (reloads, _watcher) = if watch.enabled {
        let (watcher, reloads) = TableWatcher::new(
            server.tables().sources().watch_targets(),
            Duration::from_secs(watch.poll_interval_secs),
        );
        (reloads, Some(watcher.run()?))
    } else {
        (mpsc::unbounded_channel().1, None)
    };

    tracing::info!(url = %url, "Server now ready");
    server.run(listener, reloads, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Config file (when present) with CLI overrides applied, then validated.
fn load(cli: &Cli) -> Result<(DevConfig, Option<PathBuf>), ConfigError> {
    let (mut config, config_path) = if cli.config.exists() {
        (load_config(&cli.config)?, Some(cli.config.clone()))
    } else {
        (DevConfig::default(), None)
    };

    if let Some(port) = cli.port {
        let host = bind_host(&config.listener.bind_address);
        config.listener.bind_address = format!("{host}:{port}");
    }
    if let Some(port) = cli.target_port {
        config.upstream.app_port = port;
    }
    if let Some(port) = cli.functions_port {
        config.upstream.functions_port = Some(port);
    }
    if let Some(dir) = &cli.dir {
        config.site.publish_dir = dir.clone();
    }
    if let Some(framework) = &cli.framework {
        config.site.framework = Some(framework.clone());
    }
    if cli.serve_static {
        config.upstream.serve_static = true;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, config_path))
}

fn bind_host(bind_address: &str) -> &str {
    bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("127.0.0.1")
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
