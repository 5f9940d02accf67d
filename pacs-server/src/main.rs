//! 影像桥接服务主程序
//!
//! 启动顺序：配置 → 日志 → 两个数据库连接池 → 台账建表 → 后台循环 → Web服务。
//! 启动阶段任一数据库无法连接即退出；之后的依赖故障只影响单轮循环。

use anyhow::{Context, Result};
use clap::Parser;
use pacs_admin::{BridgeConfig, LivenessProbe, ProbeTargets};
use pacs_core::{StatusBoard, WorklistBoard};
use pacs_database::{connect_hospital, connect_ledger, MySqlOrderRepository, PgDispatchLedger};
use pacs_dicom::WorklistWriter;
use pacs_integration::{HttpHealthCheck, OrthancClient, ViewerLinks};
use pacs_web::{AppState, WebServer};
use pacs_workflow::{DispatchWorker, PullWorker, Reconciler};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "pacs-server")]
#[command(about = "医院信息系统与影像归档之间的检查申请派发及报告对账服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// Web监听地址，覆盖配置文件
    #[arg(short, long)]
    bind: Option<String>,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::load(args.config.as_deref()).context("Invalid configuration")?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(bind) = args.bind {
        config.web.bind_addr = bind;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    info!("Starting bridge v{}", env!("CARGO_PKG_VERSION"));

    let bind_addr: SocketAddr = config
        .web
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.web.bind_addr))?;

    // 数据库
    let hospital_pool = connect_hospital(&config.hospital_db)
        .await
        .context("Hospital database unreachable at startup")?;
    let ledger_pool = connect_ledger(&config.ledger_db)
        .await
        .context("Ledger database unreachable at startup")?;

    let repository = Arc::new(MySqlOrderRepository::new(hospital_pool));
    let ledger = Arc::new(PgDispatchLedger::new(ledger_pool));
    ledger.migrate().await.context("Failed to prepare dispatch ledger")?;

    // 影像归档
    let writer = WorklistWriter::new(
        config.archive.worklist_dir.clone(),
        config.archive.worklist_defaults(),
    );
    let archive = Arc::new(
        OrthancClient::new(
            config.archive.base_url.clone(),
            config.archive.credentials(),
            config.archive.request_timeout(),
            writer,
        )
        .context("Failed to build archive client")?,
    );
    info!(
        "Archive at {}, worklists written to {}",
        config.archive.base_url,
        config.archive.worklist_dir.display()
    );

    let viewer = ViewerLinks::new(config.viewer.base_url.clone());
    let viewer_check = Arc::new(
        HttpHealthCheck::new("viewer", viewer.base_url(), Duration::from_secs(config.probe.timeout_secs))
            .context("Failed to build viewer probe")?,
    );

    let status = StatusBoard::new();
    let worklists = WorklistBoard::new();

    let reconciler = Arc::new(Reconciler::new(
        repository.clone(),
        ledger.clone(),
        archive.clone(),
        viewer,
        config.archive.report_modality.clone(),
    ));

    // 后台循环
    let dispatch = DispatchWorker::new(
        repository.clone(),
        ledger.clone(),
        archive.clone(),
        worklists.clone(),
        Duration::from_secs(config.dispatch.interval_secs),
        Duration::from_secs(config.dispatch.failure_backoff_secs),
    );
    tokio::spawn(dispatch.run());

    if config.reconciliation.enabled {
        let pull = PullWorker::new(
            reconciler.clone(),
            Duration::from_secs(config.reconciliation.interval_secs),
        );
        tokio::spawn(pull.run());
    } else {
        info!("Report pull disabled, relying on push notifications");
    }

    let probe = LivenessProbe::new(
        ProbeTargets {
            hospital_db: repository,
            ledger_db: ledger,
            archive,
            viewer: viewer_check,
        },
        status.clone(),
        Duration::from_secs(config.probe.interval_secs),
        Duration::from_secs(config.probe.timeout_secs),
    );
    tokio::spawn(probe.run());

    let server = WebServer::new(
        bind_addr,
        AppState {
            status,
            worklists,
            reconciler,
        },
    );
    if let Err(e) = server.run().await {
        error!("Web server stopped: {}", e);
        return Err(e.into());
    }

    Ok(())
}
