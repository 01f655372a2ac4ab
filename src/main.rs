use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use metrics_monitor::{
    create_router,
    error_channel,
    listen_for_signals,
    load_env_file,
    shared::{collector::DEFAULT_SINK_CAPACITY, storage},
    Collector,
    Config,
    MonitorError,
    ShutdownCoordinator,
    SysinfoSource,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let dotenv = load_env_file(Path::new(".env"));
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match dotenv {
        Ok(true) => info!("Loaded environment from .env"),
        Ok(false) => debug!("No .env file found"),
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    if let Err(e) = run(Config::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), MonitorError> {
    let collector_config = config.collector()?;
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| String::from("unknown"));
    info!("Starting metrics monitor on {}", hostname);

    // Backend failures at startup are fatal.
    let store = storage::open(&config.database()).await?;

    let addr = config.listen_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            store.close().await;
            return Err(e.into());
        }
    };

    let token = CancellationToken::new();
    listen_for_signals(token.clone());

    let (sink, mut errors) = error_channel(DEFAULT_SINK_CAPACITY);
    let collector = Collector::new(
        Arc::new(SysinfoSource::new()),
        Arc::clone(&store),
        collector_config,
    );
    let collector_task = tokio::spawn({
        let collector = collector.clone();
        let token = token.clone();
        async move {
            let summary = collector.run(token, sink, &mut errors).await;
            (summary, errors)
        }
    });

    info!("Starting API server on {}", addr);
    let server_task = tokio::spawn({
        let app = create_router(Arc::clone(&store));
        let token = token.clone();
        async move {
            let shutdown = token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = &result {
                error!("Server failed: {}", e);
                token.cancel();
            }
            result
        }
    });
    let server = async move {
        if let Err(e) = server_task.await {
            error!("Server task failed: {}", e);
        }
    };

    let coordinator = ShutdownCoordinator::new(config.grace_period(), config.shutdown_timeout());
    let report = coordinator
        .shutdown(&token, &collector, collector_task, server, store.as_ref())
        .await;

    info!("Shutting down gracefully... {:?}", report);
    Ok(())
}
