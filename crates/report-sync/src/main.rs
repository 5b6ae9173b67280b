//! Report sync CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use report_core::{init_logging, AppConfig, LocalStore, LogConfig, SchemaRegistry};
use report_data::PgStore;
use report_exchange::{BitfinexClient, BitfinexConfig, RemoteDataSource};
use report_sync::DataInserter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "report-sync")]
#[command(about = "Exchange report incremental sync", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 모든 활성 사용자 동기화 1회 실행
    Sync,

    /// 저장된 진행률 출력
    Progress,

    /// 데몬 모드: 주기적으로 동기화 실행
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 설정 로드
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path),
        None => AppConfig::load_default(),
    }
    .context("설정 로드 실패")?;

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // 로깅 초기화
    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Report Sync 시작");

    // DB 연결
    let store = Arc::new(PgStore::connect(&config.database).await?);
    store.ensure_schema().await?;

    let source: Arc<dyn RemoteDataSource> =
        Arc::new(BitfinexClient::new(BitfinexConfig::from(&config.exchange))?);
    let local: Arc<dyn LocalStore> = store.clone();
    let inserter = DataInserter::new(source, local, SchemaRegistry::default(), &config.sync)?;

    // 명령 실행
    match cli.command {
        Commands::Sync => {
            let stats = inserter.run().await?;
            stats.log_summary("전체 동기화");
        }
        Commands::Progress => {
            let progress = inserter.progress().get_progress().await?;
            println!("{}", progress);
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.sync.interval_minutes
            );

            let mut interval = tokio::time::interval(config.sync.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        match inserter.run().await {
                            Ok(stats) => stats.log_summary("전체 동기화"),
                            Err(e) => tracing::error!("동기화 실패: {}", e),
                        }

                        tracing::info!(
                            "=== 다음 실행: {}분 후 ===",
                            config.sync.interval_minutes
                        );
                    }
                }
            }
        }
    }

    store.pool().close().await;
    tracing::info!("Report Sync 종료");

    Ok(())
}
