use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use docker_monitor::{
    actors::{dedup::AlertDeduplicator, ingest, poller::Poller},
    alerts::build_notifier,
    config::{Config, SinkBackend, SinkConfig, read_config_file},
    runtime::DockerRuntime,
    storage::{MetricSink, influx::InfluxSink, memory::MemorySink, with_deadline},
    util::{get_docker_socket, get_listen_address},
};
use tokio::spawn;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults apply when omitted)
    #[arg(short, long, env = "MONITOR_CONFIG")]
    file: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "MONITOR_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,

    #[arg(long, env = "MONITOR_LOG_FORMAT", value_enum, default_value = "human")]
    log_format: LogFormat,
}

fn init(level: LevelFilter, format: LogFormat) {
    let filter = filter::Targets::new().with_targets(vec![
        ("docker_monitor", level),
        ("tower_http", level),
    ]);

    let json = matches!(format, LogFormat::Json);
    tracing_subscriber::registry()
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false)
        }))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .json()
        }))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level, args.log_format);
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };
    config.listen_address = get_listen_address(config.listen_address);
    if config.docker_socket.is_none() {
        config.docker_socket = get_docker_socket();
    }

    let sink = build_sink(&config.sink).await?;

    let runtime = Arc::new(DockerRuntime::connect(config.docker_socket.as_deref())?);
    runtime.ping().await?;

    let notifier = build_notifier(
        config.alert.as_ref(),
        &config.restart_base_url,
        config.alert_timeout(),
    )?;

    let shutdown = CancellationToken::new();
    let mut handles = vec![];

    let (queue, worker) = ingest::channel(
        config.queue_capacity,
        sink.clone(),
        &config.sink.database,
        config.sink.timeout(),
    );
    handles.push(spawn(worker.run(shutdown.clone())));

    for (i, kind) in config.kinds.iter().enumerate() {
        debug!("starting {kind} poller every {}s", config.poll_interval);
        let poller = Poller::new(
            *kind,
            runtime.clone(),
            queue.clone(),
            config.poll_interval(),
        )
        .record_unmatched(config.record_unmatched && i == 0);
        handles.push(spawn(poller.run(shutdown.clone())));
    }

    let deduplicator = Arc::new(
        AlertDeduplicator::new(
            sink.clone(),
            notifier,
            &config.sink.database,
            config.sink.timeout(),
        )
        .notify_timeout(config.alert_timeout()),
    );
    for kind in &config.kinds {
        handles.push(spawn(deduplicator.clone().run(
            *kind,
            config.monitor_interval(),
            shutdown.clone(),
        )));
    }

    #[cfg(feature = "api")]
    {
        use docker_monitor::api::{ApiState, spawn_api_server};

        let state = ApiState::new(runtime.clone(), queue.clone(), deduplicator.clone());
        spawn_api_server(config.listen_address, state, shutdown.clone())
            .await
            .with_context(|| format!("failed to bind {}", config.listen_address))?;
    }

    info!("monitoring {} kinds", config.kinds.len());

    shutdown_signal().await;
    info!("shutting down");
    shutdown.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            error!("{e}");
        }
    }

    Ok(())
}

/// Build the configured sink, check it answers and create the database.
async fn build_sink(config: &SinkConfig) -> anyhow::Result<Arc<dyn MetricSink>> {
    let sink: Arc<dyn MetricSink> = match &config.backend {
        SinkBackend::None => {
            info!("using in-memory sink, samples are not persisted");
            Arc::new(MemorySink::new())
        }
        SinkBackend::Influxdb {
            url,
            username,
            password,
            skip_tls_verify,
        } => {
            info!("using InfluxDB sink at {url}");
            Arc::new(InfluxSink::new(
                url,
                username.clone(),
                password.clone(),
                *skip_tls_verify,
                config.timeout(),
            )?)
        }
    };

    with_deadline(config.timeout(), sink.ping())
        .await
        .context("sink is not reachable")?;
    with_deadline(config.timeout(), sink.create_database(&config.database))
        .await
        .with_context(|| format!("failed to create database {}", config.database))?;

    Ok(sink)
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
