//! Catalog aggregator CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use catalog_aggregator::{
    build_providers, spawn_event_logger, AggregationScheduler, EventBus, QueryService,
    SchedulerConfig,
};
use catalog_core::{init_logging, AggregatorSettings, Clock, LogConfig, SystemClock};
use catalog_store::{InMemoryProductStore, ProductStore};

#[derive(Parser)]
#[command(name = "catalog-aggregator")]
#[command(about = "Provider polling catalog aggregator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 스케줄러 실행 (Ctrl-C로 종료)
    Run,

    /// 조회 주기와 staleness 스윕을 한 번씩 실행하고 요약 출력
    Once,

    /// 설정을 검증하고 출력
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: cli.log_level.clone(),
        ..LogConfig::from_env()
    };
    init_logging(log_config).map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let settings = AggregatorSettings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            tracing::info!(providers = settings.providers.len(), "Configuration is valid");
            return Ok(());
        }
        Commands::Once => {
            let app = App::build(&settings)?;

            let cycle = app.scheduler.run_fetch_cycle().await;
            cycle.log_summary();
            let sweep = app.scheduler.run_staleness_sweep().await?;

            let summary = json!({
                "cycle": cycle,
                "agedSweep": sweep,
                "circuits": app.scheduler.circuit_metrics(),
                "products": app.store.count(&catalog_core::ProductFilter::all()).await?,
                "stale": app.query.count_stale().await?,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Run => {
            let app = App::build(&settings)?;
            let shutdown = CancellationToken::new();
            let logger = spawn_event_logger(&app.events, shutdown.clone());

            tracing::info!(
                providers = ?app.scheduler.provider_names(),
                "Catalog aggregator starting"
            );
            app.scheduler.start().await;

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received, stopping scheduler");

            app.scheduler.stop().await;
            shutdown.cancel();
            logger.await.ok();

            let stale = app.query.count_stale().await?;
            tracing::info!(stale, "Catalog aggregator stopped");
        }
    }

    Ok(())
}

/// 실행에 필요한 구성 요소.
struct App {
    scheduler: AggregationScheduler,
    query: QueryService,
    store: Arc<dyn ProductStore>,
    events: EventBus,
}

impl App {
    fn build(settings: &AggregatorSettings) -> anyhow::Result<Self> {
        let store: Arc<dyn ProductStore> = Arc::new(InMemoryProductStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let events = EventBus::new(settings.event_buffer_size);

        let providers = build_providers(settings)?;
        if providers.is_empty() {
            tracing::warn!("No providers configured");
        }

        let scheduler = AggregationScheduler::new(
            SchedulerConfig::from(settings),
            providers,
            Arc::clone(&store),
            Arc::clone(&clock),
            events.clone(),
        )?;
        let query = QueryService::new(Arc::clone(&store), clock, settings.default_change_window());

        Ok(Self {
            scheduler,
            query,
            store,
            events,
        })
    }
}
