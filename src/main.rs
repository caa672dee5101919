use clap::{Args, Parser};
use std::path::PathBuf;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use mikrotik_monitor::{
    http_api::{start_http_server, ApiState},
    setup_logging, CsvExporter, HistoryRecorder, HistoryStore, MonitorConfig, RefreshController,
    StatsFetcher,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the config file, layered config/ files and environment are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump default config and exit
    #[arg(long = "dump-default-config")]
    dump_default: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line args
    let cli = Cli::parse();

    if cli.common.dump_default {
        let config = MonitorConfig::default();
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    // Load config
    let config = match &cli.common.config {
        Some(path) => MonitorConfig::from_file(path.clone())?,
        None => MonitorConfig::new()?,
    };

    // Initialize logging
    let _log_guard = setup_logging(&config.logging)?;

    if let Some(path) = &cli.common.config {
        info!("Loaded config from {}", path.display());
    }

    let fetcher = StatsFetcher::new(&config.backend)?;
    info!("Stats backend: {}", fetcher.endpoint());
    if fetcher.endpoint().starts_with("http://") {
        warn!("Router credentials are sent to the backend without TLS");
    }

    let (mut controller, handle) = RefreshController::new(config.refresh.clone(), fetcher);
    if config.history.enabled {
        info!(
            "Saving history to {} every {:?}",
            config.history.path, config.history.save_interval
        );
        controller = controller.with_history(HistoryRecorder::new(&config.history));
    }
    let exporter = CsvExporter::new(&config.export);

    let (main_shutdown, main_shutdown_rx) = watch::channel(false);
    let (http_shutdown, _) = broadcast::channel(1);

    let controller_task = tokio::spawn(async move {
        controller.run(main_shutdown_rx).await;
        controller
    });

    let http_task = if config.http.enabled {
        let state = ApiState {
            refresh: handle.clone(),
            exporter: exporter.clone(),
            history: HistoryStore::new(&config.history.path),
        };
        let shutdown_rx = http_shutdown.subscribe();
        let (addr, port) = (config.http.bind_addr.clone(), config.http.bind_port);
        Some(tokio::spawn(async move {
            if let Err(e) = start_http_server(addr, port, state, shutdown_rx).await {
                error!("{}", e);
            }
        }))
    } else {
        None
    };

    match config.target.to_target() {
        Some(target) => handle.start(target).await?,
        None => info!("No target configured, waiting for POST /api/monitor"),
    }

    tokio::signal::ctrl_c().await?;
    info!("Initiating graceful shutdown");

    let _ = http_shutdown.send(());
    if let Some(task) = http_task {
        if let Err(e) = task.await {
            error!("HTTP task failed: {}", e);
        }
    }

    let _ = main_shutdown.send(true);
    let controller = controller_task.await?;

    if config.export.on_shutdown {
        let table = controller.table();
        match exporter.write(table, time::OffsetDateTime::now_utc()) {
            Ok(path) => info!("Final report written to {}", path.display()),
            Err(e) => error!("Final report failed: {}", e),
        }
    }

    info!("Shutdown complete");
    Ok(())
}
