//! 订单派发循环
//!
//! 每轮：取当天订单 → 查台账（已派发则跳过）→ 投递工作列表 → 成功后写台账。
//! 单个订单失败只记日志，不影响同批其他订单；取订单失败则整轮放弃并退避。

use chrono::{Local, NaiveDate};
use pacs_core::{Order, Result, WorklistBoard};
use pacs_database::{DispatchLedger, OrderRepository};
use pacs_integration::ArchiveClient;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 一轮派发的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub fetched: usize,
    pub already_dispatched: usize,
    pub duplicates: usize,
    pub sent: usize,
    pub failed: usize,
}

/// 派发工作者
pub struct DispatchWorker {
    repository: Arc<dyn OrderRepository>,
    ledger: Arc<dyn DispatchLedger>,
    archive: Arc<dyn ArchiveClient>,
    worklists: WorklistBoard,
    interval: Duration,
    failure_backoff: Duration,
}

impl DispatchWorker {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        ledger: Arc<dyn DispatchLedger>,
        archive: Arc<dyn ArchiveClient>,
        worklists: WorklistBoard,
        interval: Duration,
        failure_backoff: Duration,
    ) -> Self {
        Self {
            repository,
            ledger,
            archive,
            worklists,
            interval,
            failure_backoff,
        }
    }

    /// 持续运行，不会返回
    pub async fn run(self) {
        info!(
            "Dispatch worker started (interval {:?}, backoff {:?})",
            self.interval, self.failure_backoff
        );

        loop {
            let today = Local::now().date_naive();
            let pause = match self.run_cycle(today).await {
                Ok(report) => {
                    info!(
                        "Dispatch cycle done: fetched={} sent={} already={} duplicates={} failed={}",
                        report.fetched, report.sent, report.already_dispatched, report.duplicates, report.failed
                    );
                    self.interval
                }
                Err(e) => {
                    error!("Dispatch cycle abandoned, cannot fetch orders: {}", e);
                    self.failure_backoff
                }
            };
            tokio::time::sleep(pause).await;
        }
    }

    /// 执行一轮派发
    pub async fn run_cycle(&self, date: NaiveDate) -> Result<DispatchReport> {
        let orders = match self.repository.pending_orders(date).await {
            Ok(orders) => orders,
            Err(e) => {
                self.worklists.clear().await;
                return Err(e);
            }
        };
        self.worklists.publish(&orders).await;

        let mut report = DispatchReport {
            fetched: orders.len(),
            ..DispatchReport::default()
        };
        let mut seen = HashSet::new();

        for order in &orders {
            // 同一申请的多条检查项目可能得到同一检查号，首条生效
            if !seen.insert(order.accession_number.as_str()) {
                debug!(
                    "Skipping duplicate accession {} ({})",
                    order.accession_number, order.procedure_description
                );
                report.duplicates += 1;
                continue;
            }

            match self.ledger.is_dispatched(&order.accession_number).await {
                Ok(true) => {
                    debug!("Accession {} already dispatched", order.accession_number);
                    report.already_dispatched += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Ledger check failed for {}, skipping: {}", order.accession_number, e);
                    report.failed += 1;
                    continue;
                }
            }

            if self.dispatch_one(order).await {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }

        Ok(report)
    }

    async fn dispatch_one(&self, order: &Order) -> bool {
        if let Err(e) = self.archive.send(order).await {
            warn!("Failed to send worklist {}: {}", order.accession_number, e);
            return false;
        }

        let payload = match serde_json::to_string(order) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot serialize order {}: {}", order.accession_number, e);
                return false;
            }
        };

        match self
            .ledger
            .record_dispatch(&order.accession_number, &order.order_id, &payload)
            .await
        {
            Ok(true) => {
                info!(
                    "Dispatched {} ({} {}) for order {}",
                    order.accession_number, order.modality, order.procedure_description, order.order_id
                );
                true
            }
            Ok(false) => {
                debug!("Accession {} was recorded concurrently", order.accession_number);
                true
            }
            Err(e) => {
                // 归档按检查号覆盖，下轮重发无副作用
                warn!(
                    "Worklist {} sent but not recorded, will resend next cycle: {}",
                    order.accession_number, e
                );
                false
            }
        }
    }
}
