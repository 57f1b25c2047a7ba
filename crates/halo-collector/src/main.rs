//! Stock sync collector CLI.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use halo_collector::{CollectorConfig, SyncOptions, SyncOrchestrator, SyncResult};
use halo_core::{LogConfig, MarketDataSource, StockRepository};
use halo_data::{
    Database, DatabaseConfig, PgStockRepository, PythonBridgeConfig, PythonBridgeSource,
};

#[derive(Parser)]
#[command(name = "halo-collector")]
#[command(about = "Halo stock list and price history synchronizer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 청크당 항목 수 (SYNC_BATCH_SIZE 대신 사용)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// 항목당 최대 시도 횟수 (SYNC_MAX_RETRIES 대신 사용)
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// 청크 간 딜레이, 밀리초 (SYNC_BATCH_DELAY_MS 대신 사용)
    #[arg(long, global = true)]
    delay_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 목록 동기화 (신규 종목만)
    SyncStocks,

    /// 가격 이력 증분 동기화 (일봉)
    SyncPrices,

    /// 전체 동기화 실행 (종목 목록 → 가격 이력), 결과를 JSON으로 출력
    RunAll,

    /// 데몬 모드: 주기적으로 전체 동기화 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // .env의 RUST_LOG/LOG_FORMAT이 로깅에 반영되도록 먼저 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    halo_core::init_logging(LogConfig {
        level: cli.log_level.clone(),
        ..LogConfig::from_env()
    })?;

    tracing::info!("Halo Collector 시작");

    // 설정 로드 (CLI 플래그 우선)
    let mut config = CollectorConfig::from_env()?;
    if let Some(batch_size) = cli.batch_size {
        config.sync.batch_size = batch_size;
    }
    if let Some(max_retries) = cli.max_retries {
        config.sync.max_retries = max_retries;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.sync.batch_delay_ms = delay_ms;
    }
    tracing::debug!(sync = ?config.sync, "설정 로드 완료");

    // DB 연결 및 스키마 준비
    let db = Database::connect(&DatabaseConfig {
        max_connections: config.db_max_connections,
        ..DatabaseConfig::new(config.database_url.as_str())
    })
    .await?;
    db.migrate().await?;
    tracing::info!("데이터베이스 연결 성공");

    let repo: Arc<dyn StockRepository> = Arc::new(PgStockRepository::new(&db));
    let source: Arc<dyn MarketDataSource> = Arc::new(PythonBridgeSource::new(PythonBridgeConfig {
        python_path: config.bridge.python_path.clone(),
        package_dir: config.bridge.package_dir.clone(),
        timeout: config.sync.fetch_timeout(),
    }));

    let orchestrator = SyncOrchestrator::new(repo, source)
        .with_fetch_timeout(config.sync.fetch_timeout())
        .with_retry_base_delay(config.sync.retry_base_delay());
    let sync = &config.sync;

    match cli.command {
        Commands::SyncStocks => {
            let report = orchestrator
                .stock_list_syncer()
                .sync(sync.batch_size, sync.max_retries, sync.batch_delay())
                .await?;
            for error in &report.errors {
                tracing::warn!(error = %error, "종목 동기화 에러");
            }
        }
        Commands::SyncPrices => {
            let report = orchestrator
                .price_history_syncer()
                .sync(sync.batch_size, sync.max_retries, sync.batch_delay())
                .await?;
            for error in &report.errors {
                tracing::warn!(error = %error, "가격 동기화 에러");
            }
        }
        Commands::RunAll => {
            let result = orchestrator.run(sync.to_options()).await?;
            print_result(&result)?;
        }
        Commands::Daemon => {
            run_daemon(&orchestrator, sync.to_options(), config.daemon.interval()).await;
        }
    }

    db.close().await;
    tracing::info!("Halo Collector 종료");

    Ok(())
}

fn print_result(result: &SyncResult) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Ctrl-C를 받을 때까지 주기적으로 전체 동기화를 실행합니다.
async fn run_daemon(orchestrator: &SyncOrchestrator, options: SyncOptions, period: Duration) {
    tracing::info!(
        "=== 데몬 모드 시작 (주기: {}분) ===",
        period.as_secs() / 60
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("종료 신호 수신, 데몬 종료 중...");
                break;
            }
            _ = interval.tick() => {
                match orchestrator.run(options.clone()).await {
                    Ok(result) => {
                        tracing::info!(
                            success = result.success,
                            outcome = ?result.outcome,
                            new_stocks = result.new_stocks,
                            updated_prices = result.updated_prices,
                            errors = result.errors.len(),
                            "전체 동기화 실행 완료"
                        );
                    }
                    Err(e) => {
                        tracing::error!("전체 동기화 실패: {}", e);
                    }
                }

                tracing::info!(
                    "=== 다음 실행: {}분 후 ===",
                    period.as_secs() / 60
                );
            }
        }
    }
}
